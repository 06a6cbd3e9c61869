use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// An atomic counter that tasks can wait on until it drops to zero.
///
/// Every transition to zero bumps a generation number on a `watch` channel. A waiter
/// subscribes before it reads the count, so a zero crossing between the read and the
/// wait is never missed.
#[derive(Debug)]
pub(crate) struct WaitCounter {
  count: AtomicUsize,
  zero_generation: watch::Sender<u64>,
}

impl WaitCounter {
  pub(crate) fn new() -> Self {
    let (zero_generation, _) = watch::channel(0);
    Self {
      count: AtomicUsize::new(0),
      zero_generation,
    }
  }

  pub(crate) fn get(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }

  pub(crate) fn increment(&self) {
    self.count.fetch_add(1, Ordering::SeqCst);
  }

  pub(crate) fn decrement(&self) {
    let previous = self.count.fetch_sub(1, Ordering::SeqCst);
    debug_assert!(previous > 0, "WaitCounter decremented below zero");
    if previous == 1 {
      self.zero_generation.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
  }

  /// Increments the counter and returns a guard that undoes the increment on drop
  /// unless [`CountGuard::keep`] is called.
  pub(crate) fn enter(&self) -> CountGuard<'_> {
    self.increment();
    CountGuard {
      counter: self,
      armed: true,
    }
  }

  /// Waits until the counter reads zero.
  pub(crate) async fn wait_zero(&self) {
    let mut zero_rx = self.zero_generation.subscribe();
    while self.get() != 0 {
      if zero_rx.changed().await.is_err() {
        // Sender lives as long as `self`.
        return;
      }
    }
  }
}

/// Holds one count on a [`WaitCounter`] until it is dropped or kept.
#[derive(Debug)]
pub(crate) struct CountGuard<'a> {
  counter: &'a WaitCounter,
  armed: bool,
}

impl CountGuard<'_> {
  /// Leaves the count in place; someone else becomes responsible for decrementing it.
  pub(crate) fn keep(mut self) {
    self.armed = false;
  }
}

impl Drop for CountGuard<'_> {
  fn drop(&mut self) {
    if self.armed {
      self.counter.decrement();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_wait_zero_returns_immediately_when_idle() {
    let counter = WaitCounter::new();
    tokio::time::timeout(Duration::from_millis(50), counter.wait_zero())
      .await
      .expect("wait_zero should not block on an idle counter");
  }

  #[tokio::test]
  async fn test_wait_zero_blocks_until_last_decrement() {
    let counter = Arc::new(WaitCounter::new());
    counter.increment();
    counter.increment();

    let waiter = {
      let counter = counter.clone();
      tokio::spawn(async move { counter.wait_zero().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    counter.decrement();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished(), "waiter must not wake while count is 1");

    counter.decrement();
    tokio::time::timeout(Duration::from_millis(200), waiter)
      .await
      .expect("waiter did not wake after count reached zero")
      .unwrap();
    assert_eq!(counter.get(), 0);
  }

  #[tokio::test]
  async fn test_guard_releases_unless_kept() {
    let counter = WaitCounter::new();

    let guard = counter.enter();
    assert_eq!(counter.get(), 1);
    drop(guard);
    assert_eq!(counter.get(), 0);

    counter.enter().keep();
    assert_eq!(counter.get(), 1);
    counter.decrement();
    assert_eq!(counter.get(), 0);
  }
}
