use bounded_pool::{PoolError, Task, TaskOutcome, TaskResult, WorkerPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

async fn work_task_fn(id: usize, duration_ms: u64) -> TaskResult {
  info!("Task {} starting (will run for {}ms)", id, duration_ms);
  tokio::time::sleep(Duration::from_millis(duration_ms)).await;
  if id == 3 {
    return Err(format!("task {} could not finish its work", id).into());
  }
  info!("Task {} finished", id);
  Ok(())
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Basic Usage Example (capacity 2) ---");

  let pool = WorkerPool::new(2, Handle::current(), "basic_usage_pool").expect("capacity is non-zero");
  let (sink, mut outcomes) = mpsc::unbounded_channel();

  // Five 500ms tasks on two workers take about three waves.
  for i in 0..5 {
    let task = Task::new(work_task_fn(i, 500)).with_sink(sink.clone());
    if let Err(e) = pool.submit(task).await {
      warn!("Failed to submit task {}: {}", i, e);
    }
  }
  drop(sink);

  info!("Submitted all tasks. Waiting for the pool to drain.");
  pool.wait_outstanding().await;

  while let Some(outcome) = outcomes.recv().await {
    match outcome {
      TaskOutcome::Failed(err) => warn!("A task failed: {}", err),
      other => info!("Task outcome: {:?}", other),
    }
  }

  pool.shutdown().await;
  info!("Pool shutdown complete. Active workers: {}", pool.active_workers());

  match pool.submit(Task::new(work_task_fn(99, 10))).await {
    Err(PoolError::PoolClosed) => info!("Submitting after shutdown was rejected as expected."),
    other => warn!("Unexpected result submitting after shutdown: {:?}", other),
  }
  info!("--- Basic Usage Example End ---");
}
