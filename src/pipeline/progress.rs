//! The rows-encoded progress counter shared by every stream of one export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counts encoded rows across all streams and forwards the running total to an
/// optional caller callback.
///
/// Codecs report only between row batches, so the column buffers are never
/// locked. The callback always sees a strictly increasing total, even when
/// several streams report at once.
pub struct ProgressReporter<'a> {
    rows: AtomicU64,
    last_reported: Mutex<u64>,
    callback: Option<&'a (dyn Fn(u64) + Sync)>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: Option<&'a (dyn Fn(u64) + Sync)>) -> Self {
        Self {
            rows: AtomicU64::new(0),
            last_reported: Mutex::new(0),
            callback,
        }
    }

    /// A reporter that only counts.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Adds `rows` to the counter and notifies the callback.
    pub fn advance(&self, rows: usize) {
        if rows == 0 {
            return;
        }
        self.rows.fetch_add(rows as u64, Ordering::Relaxed);
        if let Some(callback) = self.callback {
            if let Ok(mut last) = self.last_reported.lock() {
                let total = self.rows.load(Ordering::Relaxed);
                if total > *last {
                    *last = total;
                    callback(total);
                }
            }
        }
    }

    pub fn rows_encoded(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("rows", &self.rows_encoded())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_counter_accumulates() {
        let progress = ProgressReporter::silent();
        progress.advance(10);
        progress.advance(0);
        progress.advance(5);
        assert_eq!(progress.rows_encoded(), 15);
    }

    #[test]
    fn test_callback_sees_increasing_totals_under_contention() {
        let seen = Mutex::new(Vec::new());
        {
            let callback = |total: u64| seen.lock().unwrap().push(total);
            let progress = ProgressReporter::new(Some(&callback));
            (0..1_000).into_par_iter().for_each(|_| progress.advance(3));
            assert_eq!(progress.rows_encoded(), 3_000);
        }
        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&3_000));
    }
}
