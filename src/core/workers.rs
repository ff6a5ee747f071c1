//! Rayon pools for background fan-out (directory walk, batch decode).
//!
//! Pools are built per job and dropped with it, so idle threads never
//! outlive a walk or a batch. The pool size is the concurrency bound:
//! work spawned into a scope on the pool runs on at most `threads` threads.

use log::{trace, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Worker threads for one directory walk
pub const INDEXER_THREADS: usize = 200;

/// Build a pool of `threads` workers (at least one) named `{name}-{i}`.
///
/// `None` when the OS refuses the threads; callers then run the work on
/// their own thread.
pub fn build_pool(name: &'static str, threads: usize) -> Option<ThreadPool> {
    let threads = threads.max(1);
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{}-{}", name, i))
        .build()
    {
        Ok(pool) => {
            trace!("Pool {} built: {} thread(s)", name, threads);
            Some(pool)
        }
        Err(e) => {
            warn!("Failed to build {} pool ({} threads): {}", name, threads, e);
            None
        }
    }
}
