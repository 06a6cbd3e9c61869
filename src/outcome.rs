use crate::task::{BoxError, Task, TaskFuture, TaskResult};

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;

/// How a decorated task finished.
#[derive(Debug)]
pub enum TaskOutcome {
  Succeeded,
  Failed(BoxError),
  Panicked,
}

impl TaskOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, TaskOutcome::Succeeded)
  }
}

impl Task {
  /// Decorates this task so its outcome is written into a caller-owned sink.
  ///
  /// The pool itself discards whatever a task returns. Callers that need failures
  /// (aggregation, first-error-wins, retries) wrap their tasks with this and drain the
  /// matching receiver. A panic inside the inner future is caught here and reported as
  /// [`TaskOutcome::Panicked`]. If the receiver has been dropped the outcome is lost.
  ///
  /// Wrapping the empty task yields the empty task.
  pub fn with_sink(self, sink: UnboundedSender<TaskOutcome>) -> Task {
    let Some(inner) = self.into_future() else {
      return Task::empty();
    };

    Task::new(report_outcome(inner, sink))
  }
}

async fn report_outcome(inner: TaskFuture, sink: UnboundedSender<TaskOutcome>) -> TaskResult {
  let outcome = match AssertUnwindSafe(inner).catch_unwind().await {
    Ok(Ok(())) => TaskOutcome::Succeeded,
    Ok(Err(err)) => TaskOutcome::Failed(err),
    Err(_panic_payload) => TaskOutcome::Panicked,
  };
  let _ = sink.send(outcome);
  Ok(())
}
