use crate::counter::WaitCounter;
use crate::error::PoolError;
use crate::task::Task;
use crate::worker::{Worker, WorkerId};

use std::fmt;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// State shared between a pool and its workers: the two completion counters and the
/// sending half of the idle-worker queue.
#[derive(Debug)]
pub(crate) struct PoolShared {
  pub(crate) pool_name: Arc<String>,
  outstanding: WaitCounter,
  active: WaitCounter,
  idle_tx: mpsc::Sender<WorkerId>,
}

impl PoolShared {
  pub(crate) fn on_worker_started(&self, worker_id: WorkerId) {
    self.active.increment();
    trace!(pool_name = %*self.pool_name, worker_id, "Worker registered as active.");
  }

  /// A worker finished its task: count the task done, then make the worker available again.
  pub(crate) async fn on_worker_released(&self, worker_id: WorkerId) {
    self.outstanding.decrement();
    // The dispatch loop drops the idle queue once it has sent the stop signal.
    if self.idle_tx.send(worker_id).await.is_err() {
      debug!(pool_name = %*self.pool_name, worker_id, "Idle-worker queue closed, pool is stopping.");
    }
  }

  pub(crate) fn on_worker_closed(&self, worker_id: WorkerId) {
    self.active.decrement();
    debug!(pool_name = %*self.pool_name, worker_id, "Worker terminated.");
  }
}

/// A pool that runs submitted tasks on a fixed set of `capacity` long-lived workers.
///
/// No more than `capacity` tasks execute at once, however many are submitted. A single
/// dispatch loop takes tasks off a bounded submission queue in FIFO order and hands each
/// one to the next worker popped from the idle-worker queue. Once the submission queue
/// is full, [`submit`](Self::submit) waits, which throttles producers running in a hot loop.
///
/// Task results are discarded. Use [`Task::with_sink`] to collect them.
pub struct WorkerPool {
  pool_name: Arc<String>,
  submission_tx: mpsc::Sender<Task>,
  workers: Arc<[Worker]>,
  shared: Arc<PoolShared>,
  closed_token: CancellationToken,
  stop_sent: AtomicBool,
  dispatch_join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
  /// Creates a pool with `capacity` workers spawned on `tokio_handle`.
  ///
  /// Every worker starts out idle. The dispatch loop is spawned before this returns;
  /// nothing here waits.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidCapacity` if `capacity` is zero. No worker or loop is started then.
  pub fn new(capacity: usize, tokio_handle: TokioHandle, pool_name: &str) -> Result<Arc<Self>, PoolError> {
    if capacity == 0 {
      warn!(pool_name, "Refusing to create a worker pool with zero capacity.");
      return Err(PoolError::InvalidCapacity);
    }

    let pool_name = Arc::new(pool_name.to_string());
    let (submission_tx, submission_rx) = mpsc::channel(capacity);
    let (idle_tx, idle_rx) = mpsc::channel(capacity);

    let shared = Arc::new(PoolShared {
      pool_name: pool_name.clone(),
      outstanding: WaitCounter::new(),
      active: WaitCounter::new(),
      idle_tx,
    });

    let workers: Arc<[Worker]> = (0..capacity)
      .map(|worker_id| Worker::spawn(worker_id, shared.clone(), &tokio_handle))
      .collect();

    // On error the workers are dropped with their inboxes, which ends their run loops.
    for worker in workers.iter() {
      shared
        .idle_tx
        .try_send(worker.id())
        .map_err(|_| PoolError::IdleQueueUnavailable(worker.id()))?;
    }

    let dispatch_join_handle = tokio_handle.spawn(
      Self::run_dispatch_loop(submission_rx, idle_rx, workers.clone())
        .instrument(info_span!("worker_pool_dispatch_loop", pool_name = %*pool_name)),
    );

    info!(pool_name = %*pool_name, capacity, "Worker pool started.");

    Ok(Arc::new(Self {
      pool_name,
      submission_tx,
      workers,
      shared,
      closed_token: CancellationToken::new(),
      stop_sent: AtomicBool::new(false),
      dispatch_join_handle: Mutex::new(Some(dispatch_join_handle)),
    }))
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// The fixed number of workers.
  pub fn capacity(&self) -> usize {
    self.workers.len()
  }

  /// Tasks submitted but not yet completed.
  pub fn outstanding_tasks(&self) -> usize {
    self.shared.outstanding.get()
  }

  /// Workers whose run loop has not terminated yet.
  pub fn active_workers(&self) -> usize {
    self.shared.active.get()
  }

  /// Workers currently sitting in the idle-worker queue.
  pub fn idle_workers(&self) -> usize {
    self.shared.idle_tx.max_capacity() - self.shared.idle_tx.capacity()
  }

  /// Tasks waiting in the submission queue for the dispatch loop.
  pub fn queued_tasks(&self) -> usize {
    self.submission_tx.max_capacity() - self.submission_tx.capacity()
  }

  /// Returns `true` once shutdown has started.
  pub fn is_closed(&self) -> bool {
    self.closed_token.is_cancelled()
  }

  /// Submits a task for execution.
  ///
  /// Waits while the submission queue is full. Dropping the returned future while it
  /// waits withdraws the task without affecting the outstanding count.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidTask` for the empty task and `PoolError::PoolClosed`
  /// once shutdown has started.
  pub async fn submit(&self, task: Task) -> Result<(), PoolError> {
    if task.is_empty() {
      debug!(pool_name = %*self.pool_name, "Submit: Rejecting empty task.");
      return Err(PoolError::InvalidTask);
    }

    // Count the task before checking the closed flag, so shutdown either waits for it
    // or this call sees the flag.
    let outstanding = self.shared.outstanding.enter();
    fence(Ordering::SeqCst);
    if self.closed_token.is_cancelled() {
      warn!(pool_name = %*self.pool_name, "Submit: Attempted to submit task to a pool that is shutting down or closed.");
      return Err(PoolError::PoolClosed);
    }

    match self.submission_tx.send(task).await {
      Ok(()) => {
        outstanding.keep();
        trace!(pool_name = %*self.pool_name, "Task queued for dispatch.");
        Ok(())
      }
      Err(_) => {
        error!(pool_name = %*self.pool_name, "Submit: Submission queue closed unexpectedly, dispatch loop is gone.");
        Err(PoolError::PoolClosed)
      }
    }
  }

  /// Waits until no submitted task is outstanding.
  ///
  /// This is a drain barrier between bursts of submissions from one producer. If other
  /// tasks keep submitting concurrently, it returns at any moment the counter is zero,
  /// not when some particular set of tasks has finished.
  pub async fn wait_outstanding(&self) {
    self.shared.outstanding.wait_zero().await;
  }

  /// Shuts the pool down: stops accepting tasks, drains outstanding ones, then stops
  /// every worker and waits until all of them have terminated.
  ///
  /// Safe to call more than once and from several tasks at once. Every call returns
  /// only after all workers have terminated.
  pub async fn shutdown(&self) {
    if self.closed_token.is_cancelled() {
      info!(pool_name = %*self.pool_name, "Shutdown already in progress or completed.");
    } else {
      info!(pool_name = %*self.pool_name, "Initiating pool shutdown.");
      self.closed_token.cancel();
    }
    fence(Ordering::SeqCst);

    self.shared.outstanding.wait_zero().await;

    if !self.stop_sent.swap(true, Ordering::SeqCst) {
      debug!(pool_name = %*self.pool_name, "Outstanding tasks drained. Sending stop signal to dispatch loop.");
      if self.submission_tx.send(Task::empty()).await.is_err() {
        warn!(pool_name = %*self.pool_name, "Dispatch loop already stopped before the stop signal was sent.");
      }
    }

    self.shared.active.wait_zero().await;

    let handle_to_await = self.dispatch_join_handle.lock().take();
    if let Some(handle) = handle_to_await {
      match handle.await {
        Ok(()) => debug!(pool_name = %*self.pool_name, "Dispatch loop joined."),
        Err(join_error) => {
          error!(pool_name = %*self.pool_name, "Error joining dispatch loop during shutdown: {:?}", join_error);
        }
      }
    }

    info!(pool_name = %*self.pool_name, "Pool shutdown completed, all workers terminated.");
  }

  async fn run_dispatch_loop(
    mut submission_rx: mpsc::Receiver<Task>,
    mut idle_rx: mpsc::Receiver<WorkerId>,
    workers: Arc<[Worker]>,
  ) {
    info!(workers = workers.len(), "Dispatch loop started.");

    loop {
      let task = match submission_rx.recv().await {
        Some(task) => task,
        None => {
          info!("Submission queue disconnected, pool was dropped. Stopping workers.");
          Task::empty()
        }
      };

      if task.is_empty() {
        debug!("Stop signal received. Forwarding to {} workers.", workers.len());
        for worker in workers.iter() {
          worker.deliver(Task::empty()).await;
        }
        break;
      }

      let Some(worker_id) = idle_rx.recv().await else {
        error!("Idle-worker queue disconnected. Dispatch loop exiting.");
        break;
      };
      trace!(worker_id, "Assigning task to idle worker.");
      workers[worker_id].deliver(task).await;
    }

    info!("Dispatch loop stopped.");
  }
}

impl fmt::Debug for WorkerPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
      .field("pool_name", &self.pool_name)
      .field("capacity", &self.capacity())
      .field("outstanding_tasks", &self.outstanding_tasks())
      .field("active_workers", &self.active_workers())
      .field("is_closed", &self.is_closed())
      .finish_non_exhaustive()
  }
}

impl Drop for WorkerPool {
  fn drop(&mut self) {
    if !self.closed_token.is_cancelled() {
      // Dropping `submission_tx` right after this disconnects the dispatch loop, which
      // dispatches what is still queued and then stops every worker.
      info!(
        pool_name = %*self.pool_name,
        "WorkerPool dropped without shutdown. Closing it; workers stop once queued tasks are dispatched."
      );
      self.closed_token.cancel();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Shutdown already in progress or completed.");
    }
  }
}
