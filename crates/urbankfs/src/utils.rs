//! Worker-pool plumbing shared by the prediction stages.
//!
//! Components receive a [`Parallelism`] flag and decide between rayon and
//! sequential iteration; the pool itself is only set up at the pipeline
//! entry point via [`run_with_threads`].

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// When `Parallel`, components may use `rayon` parallel iterators.
/// When `Sequential`, components must iterate on the calling thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if the rayon pool has multiple threads)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map every item of a slice, keeping the output in input order.
    ///
    /// Rayon's indexed `collect` preserves order, so both branches produce
    /// identical output for a pure `f`.
    #[inline]
    pub fn maybe_par_map<T, R, F>(self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if self.is_parallel() {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use the global rayon pool)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// If a dedicated pool cannot be built the closure still runs, on the
/// global pool.
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel if n_threads == 0 => f(Parallelism::Parallel),
        Parallelism::Parallel => match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
            Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
            Err(_) => f(Parallelism::Parallel),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_thread_is_sequential() {
        assert_eq!(Parallelism::from_threads(1), Parallelism::Sequential);
        assert!(!Parallelism::from_threads(1).is_parallel());
    }

    #[test]
    fn many_threads_is_parallel() {
        assert_eq!(Parallelism::from_threads(4), Parallelism::Parallel);
    }

    #[test]
    fn par_map_preserves_order() {
        let items: Vec<u32> = (0..257).collect();
        let seq = Parallelism::Sequential.maybe_par_map(&items, |x| x * 2);
        let par = Parallelism::Parallel.maybe_par_map(&items, |x| x * 2);
        assert_eq!(seq, par);
        assert_eq!(seq[256], 512);
    }

    #[test]
    fn run_with_threads_passes_flag() {
        assert_eq!(run_with_threads(1, |p| p), Parallelism::Sequential);
        assert_eq!(run_with_threads(2, |p| p), Parallelism::Parallel);
    }
}
