//! Single-execution guard for the cleanup pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Non-blocking, non-reentrant gate that lets at most one pass run at a time.
///
/// Clones share the same counter. A caller that loses the race does not
/// wait; it gets `None` and is expected to give up.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGuard {
    counter: Arc<AtomicUsize>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section if nobody else is in it.
    ///
    /// The returned permit releases the guard when dropped, on every exit
    /// path including unwinding.
    pub fn try_enter(&self) -> Option<ExecutionPermit<'_>> {
        let holders = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        let permit = ExecutionPermit { guard: self };
        if holders == 1 {
            Some(permit)
        } else {
            // dropping the permit undoes our increment
            None
        }
    }

    /// Number of callers currently inside `try_enter`'s window.
    pub fn holders(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    fn exit(&self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Proof of exclusive entry; leaves the guard on drop.
#[derive(Debug)]
pub struct ExecutionPermit<'a> {
    guard: &'a ExecutionGuard,
}

impl Drop for ExecutionPermit<'_> {
    fn drop(&mut self) {
        self.guard.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_single_entry() {
        let guard = ExecutionGuard::new();

        let permit = guard.try_enter();
        assert!(permit.is_some());
        assert_eq!(guard.holders(), 1);

        drop(permit);
        assert_eq!(guard.holders(), 0);
    }

    #[test]
    fn test_second_entrant_is_rejected() {
        let guard = ExecutionGuard::new();
        let _permit = guard.try_enter().unwrap();

        assert!(guard.try_enter().is_none());
        assert!(guard.clone().try_enter().is_none());
        // losers leave the counter as they found it
        assert_eq!(guard.holders(), 1);
    }

    #[test]
    fn test_reentry_after_release() {
        let guard = ExecutionGuard::new();

        drop(guard.try_enter().unwrap());
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let guard = ExecutionGuard::new();

        let result = std::panic::catch_unwind(|| {
            let _permit = guard.try_enter().unwrap();
            panic!("cleanup blew up");
        });

        assert!(result.is_err());
        assert_eq!(guard.holders(), 0);
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn test_concurrent_entrants_while_held() {
        let guard = ExecutionGuard::new();
        let permit = guard.try_enter().unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let guard = guard.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    guard.try_enter().is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.join().unwrap(), "guard must stay exclusive");
        }
        drop(permit);
        assert_eq!(guard.holders(), 0);
    }

    #[test]
    fn test_racing_entrants_never_overlap() {
        let guard = ExecutionGuard::new();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let guard = guard.clone();
                let barrier = Arc::clone(&barrier);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    barrier.wait();
                    if let Some(_permit) = guard.try_enter() {
                        let concurrent = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                        concurrent
                    } else {
                        0
                    }
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.join().unwrap() {
                0 => {}
                1 => winners += 1,
                n => panic!("{n} passes ran at once"),
            }
        }
        assert!(winners >= 1);
        assert_eq!(guard.holders(), 0);
    }
}
