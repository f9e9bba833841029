//! The parallel-for primitive the SR-index build path needs.
//!
//! The specification treats thread-pool implementation as an external
//! collaborator; this crate only requires *some* way to run independent
//! per-sentinel workers and join on them. [`ParallelFor`] captures exactly
//! that shape. The default [`Sequential`] implementation runs workers
//! in-line and is always correct; callers linking against a real thread
//! pool can supply their own implementation (e.g. one backed by `rayon` or
//! a hand-rolled pool) without this crate depending on it directly.
pub trait ParallelFor {
    /// Runs `f(i)` for every `i` in `0..n`. Implementations may run these
    /// concurrently; callers must not rely on any particular order, and
    /// `f` must not assume exclusive access to anything but its own output
    /// slot.
    fn for_each(&self, n: usize, f: impl Fn(usize) + Sync);
}

/// Runs every iteration on the calling thread, in order. Always available,
/// always correct; used as the default when no thread pool is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl ParallelFor for Sequential {
    fn for_each(&self, n: usize, f: impl Fn(usize) + Sync) {
        for i in 0..n {
            f(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sequential_visits_every_index_once() {
        let seen = AtomicUsize::new(0);
        Sequential.for_each(10, |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }
}
