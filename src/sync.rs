//! Critical-section primitive
//!
//! The scheduler's shared state (task arena, PID registry, per-CPU
//! lists) sits behind a single system-wide lock, the software
//! equivalent of the interrupt-masked critical section on the target.
//! [`CsLock`] names that role: holding a [`CsGuard`] *is* being inside
//! the critical section, and every state-mutating primitive requires
//! `&mut SchedulerState`, which is only reachable through the guard.
//!
//! Critical sections must stay short: index relinking and counter
//! updates only. Nothing that can block or allocate belongs inside.

use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

/// System-wide scheduler lock.
pub struct CsLock<T> {
    inner: Mutex<T>,
}

impl<T> CsLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Enters the critical section, spinning until the lock is free.
    pub fn enter(&self) -> CsGuard<'_, T> {
        CsGuard {
            guard: self.inner.lock(),
        }
    }

    /// Runs `f` inside the critical section. Preferred over [`enter`]
    /// because the borrow checker bounds the section to the closure.
    ///
    /// [`enter`]: CsLock::enter
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.enter();
        f(&mut guard)
    }
}

/// Proof of being inside the critical section.
pub struct CsGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for CsGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for CsGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
