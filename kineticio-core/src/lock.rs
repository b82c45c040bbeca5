//! Destruction-safe lock
//!
//! A mutex whose protected value can be declared dead. After
//! `mark_destructed` returns, every `acquire` fails with
//! `UseAfterDestruction` instead of handing out the value, so an operation
//! racing a teardown gets an explicit error rather than blocking forever or
//! touching released state.
//!
//! The destructed flag lives inside the mutex: checking it and taking the
//! lock are the same step.

use crate::error::{KineticIoError, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};

struct Slot<T> {
    destructed: bool,
    value: T,
}

/// Mutex with a one-way "destructed" state
pub struct DestructionSafeLock<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> DestructionSafeLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                destructed: false,
                value,
            }),
        }
    }

    /// Block until the lock is held, then fail if the value was destructed.
    ///
    /// On failure the lock is already released.
    pub fn acquire(&self) -> Result<DestructionGuard<'_, T>> {
        let slot = self.slot.lock();
        if slot.destructed {
            return Err(KineticIoError::UseAfterDestruction);
        }
        Ok(DestructionGuard { slot })
    }

    /// Permanently mark the value as destructed.
    pub fn mark_destructed(&self) {
        self.mark_destructed_with(|_| ());
    }

    /// Mark as destructed and run `teardown` on the value while the lock is
    /// still held. Returns `false` (and skips `teardown`) if the value was
    /// already destructed.
    pub fn mark_destructed_with<F>(&self, teardown: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut slot = self.slot.lock();
        if slot.destructed {
            return false;
        }
        slot.destructed = true;
        teardown(&mut slot.value);
        true
    }

    pub fn is_destructed(&self) -> bool {
        self.slot.lock().destructed
    }

    /// Release a guard obtained from `acquire`.
    pub fn release(guard: DestructionGuard<'_, T>) {
        drop(guard);
    }
}

impl<T: Default> Default for DestructionSafeLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for DestructionSafeLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestructionSafeLock")
            .field("destructed", &self.is_destructed())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a live value; releases the lock on drop
pub struct DestructionGuard<'a, T> {
    slot: MutexGuard<'a, Slot<T>>,
}

impl<T> DestructionGuard<'_, T> {
    pub fn release(self) {}
}

impl<T> Deref for DestructionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.value
    }
}

impl<T> DerefMut for DestructionGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slot.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_and_mutate() {
        let lock = DestructionSafeLock::new(0u32);
        {
            let mut guard = lock.acquire().unwrap();
            *guard += 5;
        }
        assert_eq!(*lock.acquire().unwrap(), 5);
    }

    #[test]
    fn test_acquire_after_destruction_fails() {
        let lock = DestructionSafeLock::new(());
        lock.mark_destructed();

        for _ in 0..3 {
            assert!(matches!(
                lock.acquire(),
                Err(KineticIoError::UseAfterDestruction)
            ));
        }
        assert!(lock.is_destructed());
    }

    #[test]
    fn test_failed_acquire_does_not_hold_lock() {
        let lock = DestructionSafeLock::new(());
        lock.mark_destructed();
        assert!(lock.acquire().is_err());

        // Would deadlock if the failed acquire leaked the mutex
        assert!(lock.is_destructed());
        assert!(!lock.mark_destructed_with(|_| ()));
    }

    #[test]
    fn test_teardown_runs_once() {
        let lock = DestructionSafeLock::new(Some(String::from("cluster")));
        assert!(lock.mark_destructed_with(|v| {
            v.take();
        }));
        assert!(!lock.mark_destructed_with(|_| panic!("teardown ran twice")));
    }

    #[test]
    fn test_destruction_visible_from_other_threads() {
        let lock = Arc::new(DestructionSafeLock::new(0u64));
        lock.mark_destructed();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || lock.acquire().is_err())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_mark_destructed_waits_for_holder() {
        let lock = Arc::new(DestructionSafeLock::new(0u32));
        let holder_done = Arc::new(AtomicBool::new(false));
        let (locked_tx, locked_rx) = mpsc::channel();

        let holder = {
            let lock = Arc::clone(&lock);
            let holder_done = Arc::clone(&holder_done);
            thread::spawn(move || {
                let mut guard = lock.acquire().unwrap();
                locked_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                *guard = 7;
                holder_done.store(true, Ordering::SeqCst);
            })
        };

        locked_rx.recv().unwrap();
        let mut seen = 0;
        lock.mark_destructed_with(|v| seen = *v);

        assert!(holder_done.load(Ordering::SeqCst));
        assert_eq!(seen, 7);
        holder.join().unwrap();
    }

    #[test]
    fn test_racing_acquirers_never_deadlock() {
        let lock = Arc::new(DestructionSafeLock::new(0u64));
        let barrier = Arc::new(Barrier::new(9));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut ok = 0u64;
                    for _ in 0..1000 {
                        match lock.acquire() {
                            Ok(mut guard) => {
                                *guard += 1;
                                ok += 1;
                            }
                            Err(KineticIoError::UseAfterDestruction) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    ok
                })
            })
            .collect();

        barrier.wait();
        let mut final_count = 0;
        lock.mark_destructed_with(|v| final_count = *v);

        let total: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(total, final_count);
        assert!(lock.acquire().is_err());
    }
}
