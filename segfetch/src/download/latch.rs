//! Countdown latch used as the job completion barrier.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Blocks waiters until a fixed number of completions have been signalled.
///
/// The count never goes back up; once it reaches zero every current and
/// future wait returns immediately.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl CompletionLatch {
    /// Create a latch waiting for `count` completions.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Record one completion. Extra calls after zero are ignored.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    /// Number of completions still outstanding.
    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    /// Whether every completion has been recorded.
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.zero.wait(&mut remaining);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.zero.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_count_is_done() {
        let latch = CompletionLatch::new(0);
        assert!(latch.is_done());
        latch.wait();
        assert!(latch.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_count_down_saturates() {
        let latch = CompletionLatch::new(2);
        latch.count_down();
        assert_eq!(latch.remaining(), 1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn test_wait_timeout_expires() {
        let latch = CompletionLatch::new(1);
        let start = Instant::now();
        assert!(!latch.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_releases_after_all_threads() {
        let latch = Arc::new(CompletionLatch::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i));
                    latch.count_down();
                })
            })
            .collect();

        latch.wait();
        assert!(latch.is_done());

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
