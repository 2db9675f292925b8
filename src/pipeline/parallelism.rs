//! How per-stream encodes are scheduled.
//!
//! Streams share no mutable state, so each one is an independent task. The
//! [`Parallelism`] hint decides where those tasks run.

use rayon::prelude::*;

use crate::error::TambakError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// Every stream is encoded on the calling thread, in input order.
    Sequential,
    /// Streams run on rayon's global pool.
    Global,
    /// Streams run on a dedicated pool of `n` threads.
    Pool(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Self::Global
    }
}

impl Parallelism {
    /// Create a parallelism hint from a thread count.
    ///
    /// - `0` → rayon's global pool
    /// - `1` → sequential
    /// - `n > 1` → dedicated pool with n threads
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        match n_threads {
            0 => Self::Global,
            1 => Self::Sequential,
            n => Self::Pool(n),
        }
    }

    /// Self-correct: a single stream never needs a pool.
    #[inline]
    pub fn correct_for_workload(self, n_streams: usize) -> Self {
        if n_streams <= 1 {
            Self::Sequential
        } else {
            self
        }
    }

    /// Maps `task` over `items`, preserving input order in the output.
    pub fn map<I, T, F>(self, items: &[I], task: F) -> Result<Vec<T>, TambakError>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync + Send,
    {
        match self {
            Self::Sequential => Ok(items.iter().map(task).collect()),
            Self::Global => Ok(items.par_iter().map(task).collect()),
            Self::Pool(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| TambakError::InternalError(format!("thread pool: {}", e)))?;
                Ok(pool.install(|| items.par_iter().map(task).collect()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_threads() {
        assert_eq!(Parallelism::from_threads(0), Parallelism::Global);
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_threads(4), Parallelism::Pool(4));
    }

    #[test]
    fn test_correct_for_workload() {
        assert_eq!(
            Parallelism::Pool(8).correct_for_workload(1),
            Parallelism::Sequential
        );
        assert_eq!(Parallelism::Global.correct_for_workload(3), Parallelism::Global);
    }

    #[test]
    fn test_map_preserves_order() {
        let items: Vec<u32> = (0..64).collect();
        for p in [Parallelism::Sequential, Parallelism::Global, Parallelism::Pool(3)] {
            let doubled = p.map(&items, |v| v * 2).unwrap();
            assert_eq!(doubled, items.iter().map(|v| v * 2).collect::<Vec<_>>());
        }
    }
}
