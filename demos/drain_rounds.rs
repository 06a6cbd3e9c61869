//! Runs many rounds of "submit a burst, wait for it to drain" on one pool and reports
//! how many bytes were allocated overall.

use bounded_pool::{Task, TaskResult, WorkerPool};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::info;

const POOL_CAPACITY: usize = 1000;
const ROUNDS: usize = 20;
const TASKS_PER_ROUND: usize = 1000;
const TASK_SLEEP: Duration = Duration::from_millis(100);

struct CountingAllocator;

static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    TOTAL_ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
    System.alloc(layout)
  }

  unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
    System.dealloc(ptr, layout)
  }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

async fn demo_task() -> TaskResult {
  tokio::time::sleep(TASK_SLEEP).await;
  Ok(())
}

async fn run_round(pool: &WorkerPool) {
  for _ in 0..TASKS_PER_ROUND {
    let _ = pool.submit(Task::new(demo_task())).await;
  }
  pool.wait_outstanding().await;
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt().with_target(false).init();

  let allocated_at_start = TOTAL_ALLOCATED.load(Ordering::Relaxed);
  info!(
    "Starting {} rounds of {} tasks on a pool of {} workers.",
    ROUNDS, TASKS_PER_ROUND, POOL_CAPACITY
  );

  let started = Instant::now();
  let pool = WorkerPool::new(POOL_CAPACITY, Handle::current(), "drain_rounds_pool").expect("capacity is non-zero");
  for round in 0..ROUNDS {
    run_round(&pool).await;
    info!("Round {} drained after {:?}.", round, started.elapsed());
  }
  pool.shutdown().await;

  let usage = TOTAL_ALLOCATED.load(Ordering::Relaxed) - allocated_at_start;
  info!("memory usage: {} B over {:?}", usage, started.elapsed());
}
