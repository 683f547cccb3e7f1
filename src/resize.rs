use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Coordinates directory replacement with every operation that relies on the directory
/// staying put.
///
/// Operations that hold segment locks (`insert`, `remove`, `range_query`, `size`) first
/// [`enter`](Self::enter) the gate: the shared side of `drain` acts as the in-flight counter.
/// A resizer wins the `resizing` flag with a compare-and-swap, then takes the exclusive side,
/// which both waits for in-flight operations to leave and keeps new ones out until the new
/// directory is published. Entering re-checks the flag after registering, so an operation
/// can never slip in between a resizer winning the flag and draining.
///
/// All flag accesses are `SeqCst`: every thread must agree on the order of flag changes and
/// registrations for the drain to be sound.
#[derive(Debug, Default)]
pub(crate) struct ResizeGate {
    resizing: AtomicBool,
    drain: RwLock<()>,
    completed: AtomicUsize,
}

/// Proof that the holder is registered as in flight. No resize can start until it is dropped.
pub(crate) type InFlight<'a> = RwLockReadGuard<'a, ()>;

impl ResizeGate {
    pub(crate) fn enter(&self) -> InFlight<'_> {
        loop {
            let pass = self.drain.read();
            if !self.resizing.load(Ordering::SeqCst) {
                return pass;
            }
            // a resizer won the flag but may still be waiting for us to leave
            drop(pass);
            self.wait();
        }
    }

    pub(crate) fn is_resizing(&self) -> bool {
        self.resizing.load(Ordering::SeqCst)
    }

    /// Blocks until no resize is in progress.
    pub(crate) fn wait(&self) {
        while self.resizing.load(Ordering::SeqCst) {
            // parks behind the resizer once it holds the exclusive side
            drop(self.drain.read());
            std::thread::yield_now();
        }
    }

    /// Tries to become the single resizer.
    ///
    /// Returns `None` if another thread is already resizing. Otherwise returns once every
    /// in-flight operation has left; the caller must therefore not be registered itself.
    pub(crate) fn try_begin(&self) -> Option<ResizeToken<'_>> {
        self.resizing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        let drained = self.drain.write();
        Some(ResizeToken {
            gate: self,
            _drained: drained,
            grown: false,
        })
    }

    /// Number of resizes that have completed.
    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Exclusive right to replace the directory. The gate reopens when this is dropped.
pub(crate) struct ResizeToken<'a> {
    gate: &'a ResizeGate,
    _drained: RwLockWriteGuard<'a, ()>,
    grown: bool,
}

impl ResizeToken<'_> {
    pub(crate) fn grown(&mut self) {
        self.grown = true;
    }
}

impl Drop for ResizeToken<'_> {
    fn drop(&mut self) {
        if self.grown {
            self.gate.completed.fetch_add(1, Ordering::Relaxed);
        }
        // cleared before `_drained` is released so that waiters wake to a stable gate
        self.gate.resizing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn single_winner() {
        let gate = ResizeGate::default();
        let token = gate.try_begin();
        assert!(token.is_some());
        assert!(gate.is_resizing());
        assert!(gate.try_begin().is_none());
        drop(token);
        assert!(!gate.is_resizing());
        assert_eq!(gate.completed(), 0);

        let mut token = gate.try_begin().unwrap();
        token.grown();
        drop(token);
        assert_eq!(gate.completed(), 1);
    }

    #[test]
    fn resize_waits_for_in_flight() {
        let gate = Arc::new(ResizeGate::default());
        let pass = gate.enter();

        let g = Arc::clone(&gate);
        let resizer = thread::spawn(move || {
            let mut token = g.try_begin().unwrap();
            token.grown();
        });

        while !gate.is_resizing() {
            thread::yield_now();
        }
        // the resizer holds the flag but cannot finish while we are registered
        thread::sleep(Duration::from_millis(50));
        assert_eq!(gate.completed(), 0);
        drop(pass);

        resizer.join().unwrap();
        assert_eq!(gate.completed(), 1);
        assert!(!gate.is_resizing());
        drop(gate.enter());
    }
}
