use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Error type a task may fail with. The pool never inspects it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The success/failure indicator produced by a task.
pub type TaskResult = Result<(), BoxError>;

/// The type of future that the pool's workers execute.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

/// A unit of work submitted to a [`WorkerPool`](crate::WorkerPool).
///
/// A `Task` carries no identity and is consumed when it runs. The empty task
/// (`Task::empty()` or `Task::default()`) is never executed: the pool rejects it on
/// submission and uses it internally to tell the dispatch loop and workers to stop.
#[derive(Default)]
pub struct Task {
  future: Option<TaskFuture>,
}

impl Task {
  /// Wraps a future as a task. The future does not start until a worker picks it up.
  pub fn new<F>(future: F) -> Self
  where
    F: Future<Output = TaskResult> + Send + 'static,
  {
    Self {
      future: Some(Box::pin(future)),
    }
  }

  /// Wraps a zero-argument closure returning a future. The closure is invoked on the
  /// worker, when the task runs.
  pub fn from_fn<F, Fut>(f: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
  {
    Self::new(async move { f().await })
  }

  /// The distinguished empty value.
  pub fn empty() -> Self {
    Self { future: None }
  }

  pub fn is_empty(&self) -> bool {
    self.future.is_none()
  }

  /// Splits the task into its future, or `None` for the empty task.
  pub(crate) fn into_future(self) -> Option<TaskFuture> {
    self.future
  }
}

impl fmt::Debug for Task {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("is_empty", &self.is_empty())
      .finish_non_exhaustive()
  }
}
