//! Common utilities: the parallel execution toggle for batch inference.

use rayon::prelude::*;

/// Whether parallel execution is allowed.
///
/// Passed through batch prediction entry points. When `Parallel`, the
/// predictor may distribute row blocks over the ambient rayon pool; when
/// `Sequential`, it must stay on the calling thread. Components don't
/// manage thread pools, they just respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
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

    /// Run `f` over `items`, in parallel when allowed.
    #[inline]
    pub fn maybe_par_for_each<I, F>(self, items: I, f: F)
    where
        I: IntoIterator + IntoParallelIterator<Item = <I as IntoIterator>::Item>,
        <I as IntoIterator>::Item: Send,
        F: Fn(<I as IntoIterator>::Item) + Send + Sync,
    {
        match self {
            Parallelism::Sequential => items.into_iter().for_each(f),
            Parallelism::Parallel => items.into_par_iter().for_each(f),
        }
    }
}
