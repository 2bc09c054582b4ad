use std::sync::atomic::{AtomicU64, Ordering};

pub mod array;
pub mod instance;
pub mod monitor;

static IDENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique object identity, the basis for `identityHashCode`.
pub(crate) fn next_identity() -> u64 {
    IDENTITY_COUNTER.fetch_add(1, Ordering::Relaxed)
}
