use std::sync::atomic::{AtomicU64, Ordering};

/// Running total of records still awaiting their write sequence.
#[derive(Debug)]
pub struct Progress {
    total: u64,
    remaining: AtomicU64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            remaining: AtomicU64::new(total),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Subtract `count` finished records and return what is left.
    ///
    /// Saturates at zero.
    pub fn complete(&self, count: u64) -> u64 {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(count))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_sub(count)
    }

    /// Whole-number percentage of records completed.
    pub fn percent_complete(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        100 - (self.remaining() * 100) / self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_complete_and_percent() {
        let progress = Progress::new(4000);
        assert_eq!(progress.percent_complete(), 0);
        assert_eq!(progress.complete(1000), 3000);
        assert_eq!(progress.percent_complete(), 25);
        assert_eq!(progress.complete(3000), 0);
        assert_eq!(progress.percent_complete(), 100);
    }

    #[test]
    fn test_complete_saturates() {
        let progress = Progress::new(10);
        assert_eq!(progress.complete(25), 0);
        assert_eq!(progress.remaining(), 0);
    }

    #[test]
    fn test_zero_total_reports_full() {
        assert_eq!(Progress::new(0).percent_complete(), 100);
    }

    #[test]
    fn test_concurrent_decrements_do_not_lose_updates() {
        let progress = Arc::new(Progress::new(80_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        progress.complete(1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.remaining(), 0);
    }
}
