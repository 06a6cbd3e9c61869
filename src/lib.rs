//! A Tokio-based worker pool that runs submitted futures on a fixed set of long-lived
//! workers, so a hot submission loop never grows concurrency past the pool's capacity.
//!
//! The pool offers backpressure on submission, a drain barrier between bursts
//! ([`WorkerPool::wait_outstanding`]) and a two-phase shutdown that drains outstanding
//! work before terminating workers.

mod counter;
mod error;
mod outcome;
mod pool;
mod task;
mod worker;

pub use error::PoolError;
pub use outcome::TaskOutcome;
pub use pool::WorkerPool;
pub use task::{BoxError, Task, TaskFuture, TaskResult};
