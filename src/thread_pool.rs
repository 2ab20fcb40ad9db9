//! Shared thread pool for parallel trials.
//!
//! Thread count defaults to rayon's choice (logical CPUs) and can be pinned
//! with `DID_POWER_THREADS`.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;

#[cfg(feature = "parallel")]
use std::sync::OnceLock;

#[cfg(feature = "parallel")]
static THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Get or initialize the shared pool.
///
/// Returns `None` if the pool could not be built; callers then fall back to
/// rayon's global pool.
#[cfg(feature = "parallel")]
pub fn get_thread_pool() -> Option<&'static ThreadPool> {
    THREAD_POOL
        .get_or_init(|| {
            let mut builder =
                rayon::ThreadPoolBuilder::new().thread_name(|i| format!("did-power-{i}"));
            if let Some(n) = std::env::var("DID_POWER_THREADS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
            {
                builder = builder.num_threads(n);
            }
            match builder.build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!("could not build did-power thread pool ({e}); using rayon global pool");
                    None
                }
            }
        })
        .as_ref()
}

/// Execute a parallel operation on the shared pool.
#[cfg(feature = "parallel")]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match get_thread_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Without the `parallel` feature, run the operation inline.
#[cfg(not(feature = "parallel"))]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R,
{
    op()
}
