//! Reader/writer discipline around synth state.
//!
//! Control threads take the shared side to read parameters or to touch a
//! single part. The audio thread takes the exclusive side, and only ever with
//! a bounded wait: if the lock can't be had in time the block renders without
//! whatever needed it.

use core::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type SharedGuard<'a, T> = RwLockReadGuard<'a, T>;
pub type ExclusiveGuard<'a, T> = RwLockWriteGuard<'a, T>;

/// Default bound on the audio thread's exclusive wait.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_micros(666);

pub struct SynthLock<T> {
    inner: RwLock<T>,
    wait: Duration,
}

impl<T> SynthLock<T> {
    pub fn new(value: T, wait: Duration) -> Self {
        Self {
            inner: RwLock::new(value),
            wait,
        }
    }

    #[inline]
    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn lock_shared(&self) -> SharedGuard<'_, T> {
        self.inner.read()
    }

    pub fn try_lock_shared(&self) -> Option<SharedGuard<'_, T>> {
        self.inner.try_read()
    }

    pub fn timed_lock_shared(&self) -> Option<SharedGuard<'_, T>> {
        self.inner.try_read_for(self.wait)
    }

    /// Blocking exclusive lock. Not for the audio thread.
    pub fn lock_exclusive(&self) -> ExclusiveGuard<'_, T> {
        self.inner.write()
    }

    pub fn try_lock_exclusive(&self) -> Option<ExclusiveGuard<'_, T>> {
        self.inner.try_write()
    }

    /// Exclusive lock, giving up after the configured wait.
    pub fn timed_lock_exclusive(&self) -> Option<ExclusiveGuard<'_, T>> {
        self.inner.try_write_for(self.wait)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};
    use std::thread;

    #[test]
    fn shared_holders_coexist() {
        let lock = SynthLock::new(5, DEFAULT_LOCK_WAIT);
        let a = lock.lock_shared();
        let b = lock.try_lock_shared().expect("second reader");
        assert_eq!(*a + *b, 10);
        assert!(lock.try_lock_exclusive().is_none());
    }

    #[test]
    fn exclusive_excludes_readers() {
        let lock = SynthLock::new(0, DEFAULT_LOCK_WAIT);
        let mut w = lock.lock_exclusive();
        *w = 3;
        assert!(lock.try_lock_shared().is_none());
        drop(w);
        assert_eq!(*lock.lock_shared(), 3);
    }

    #[test]
    fn timed_exclusive_gives_up() {
        let lock = Arc::new(SynthLock::new(0u32, Duration::from_millis(5)));
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let reader = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _guard = lock.lock_shared();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        held_rx.recv().unwrap();
        assert!(lock.timed_lock_exclusive().is_none());
        release_tx.send(()).unwrap();
        reader.join().unwrap();
        assert!(lock.timed_lock_exclusive().is_some());
    }
}
