use crate::pool::PoolShared;
use crate::task::Task;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info_span, trace, warn, Instrument};

/// Index of a worker in its pool's fixed worker array.
pub(crate) type WorkerId = usize;

/// A long-lived execution unit owned by a `WorkerPool`.
///
/// Each worker runs one task at a time, received through a private single-slot inbox.
/// Its run loop lives on a Tokio task for as long as the pool does and exits only when
/// it receives the empty task.
#[derive(Debug)]
pub(crate) struct Worker {
  id: WorkerId,
  inbox_tx: mpsc::Sender<Task>,
}

impl Worker {
  /// Creates the worker, registers it as active with the pool and starts its run loop.
  pub(crate) fn spawn(id: WorkerId, shared: Arc<PoolShared>, tokio_handle: &TokioHandle) -> Self {
    let (inbox_tx, inbox_rx) = mpsc::channel(1);

    shared.on_worker_started(id);
    let span = info_span!("pool_worker", pool_name = %*shared.pool_name, worker_id = id);
    tokio_handle.spawn(Self::run_loop(id, inbox_rx, shared).instrument(span));

    Self { id, inbox_tx }
  }

  pub(crate) fn id(&self) -> WorkerId {
    self.id
  }

  /// Places a task (or the empty task) into this worker's inbox.
  ///
  /// Waits if the inbox is occupied, which does not happen while the dispatch loop only
  /// hands tasks to workers it popped from the idle queue.
  pub(crate) async fn deliver(&self, task: Task) {
    if self.inbox_tx.send(task).await.is_err() {
      warn!(worker_id = self.id, "Deliver: worker inbox is closed, the worker has already terminated.");
    }
  }

  async fn run_loop(id: WorkerId, mut inbox_rx: mpsc::Receiver<Task>, shared: Arc<PoolShared>) {
    debug!("Worker run loop started.");

    loop {
      let Some(task) = inbox_rx.recv().await else {
        debug!("Worker inbox disconnected. Terminating.");
        break;
      };
      let Some(future) = task.into_future() else {
        debug!("Received stop signal. Terminating.");
        break;
      };

      trace!("Running task.");
      match AssertUnwindSafe(future).catch_unwind().await {
        // The task's own success or failure is not the pool's concern.
        Ok(_task_result) => trace!("Task finished."),
        Err(_panic_payload) => error!("Task panicked during execution."),
      }

      shared.on_worker_released(id).await;
    }

    shared.on_worker_closed(id);
  }
}
