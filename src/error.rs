use thiserror::Error;

/// Errors that can occur within the `bounded_pool` worker pool.
#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
  #[error("Worker pool capacity must be greater than zero")]
  InvalidCapacity,

  #[error("Cannot submit an empty task to the pool")]
  InvalidTask,

  #[error("Pool is shutting down or already shut down, cannot accept new tasks")]
  PoolClosed,

  #[error("Pool's internal idle-worker queue rejected worker {0} during construction")]
  IdleQueueUnavailable(usize),
}
