//! Busy-wait mutual exclusion around the PIA.
//!
//! Holds are a handful of register operations long, so spinning is cheaper
//! than parking a thread. The gate is not reentrant: taking it twice from the
//! same thread spins forever.

use std::cell::UnsafeCell;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Gate<T> {
    held: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: the value is only reachable through a guard, and `held` lets at
// most one guard exist at a time, so sharing the gate only ever hands `T` to
// one thread at once. That needs `T: Send` and nothing more.
unsafe impl<T: Send> Sync for Gate<T> {}

impl<T> Gate<T> {
    pub const fn new(value: T) -> Self {
        Gate {
            held: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// spin until the gate is ours
    pub fn lock(&self) -> GateGuard<'_, T> {
        loop {
            if self
                .held
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return GateGuard { gate: self };
            }
            // wait for a release before trying the cmpxchg again
            while self.held.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    pub fn try_lock(&self) -> Option<GateGuard<'_, T>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    /// run `f` with the gate held
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

pub struct GateGuard<'a, T> {
    gate: &'a Gate<T>,
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: this guard won `held`, so no other reference to the value
        // exists until it drops
        unsafe { &*self.gate.value.get() }
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for deref; `&mut self` rules out a live shared borrow
        // through this same guard
        unsafe { &mut *self.gate.value.get() }
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        self.gate.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = Gate::new(1u8);
        {
            let mut g = gate.lock();
            *g = 2;
            assert!(gate.try_lock().is_none());
        }
        assert_eq!(*gate.try_lock().unwrap(), 2);
    }

    #[test]
    fn test_with_returns_value() {
        let gate = Gate::new(vec![1, 2, 3]);
        let n = gate.with(|v| {
            v.push(4);
            v.len()
        });
        assert_eq!(n, 4);
        assert_eq!(gate.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_no_lost_updates() {
        let gate = Arc::new(Gate::new(0u64));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        *gate.lock() += 1;
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(*gate.lock(), 40_000);
    }

    #[test]
    fn test_paired_fields_never_torn() {
        // writer keeps both halves equal; any reader seeing them differ
        // means it got in mid-update
        let gate = Arc::new(Gate::new((0u32, 0u32)));
        let writer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                for i in 1..=50_000u32 {
                    let mut g = gate.lock();
                    g.0 = i;
                    hint::spin_loop();
                    g.1 = i;
                }
            })
        };
        loop {
            let (a, b) = *gate.lock();
            assert_eq!(a, b);
            if a == 50_000 {
                break;
            }
        }
        writer.join().unwrap();
    }
}
