pub(crate) use seize::{Collector, Guard, Linked};

use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::{fmt, ptr};

/// A pointer slot whose pointee is reclaimed through a [`Collector`].
///
/// Directories and bucket chains are published through these. A slot is only ever
/// overwritten by a thread that has excluded all other writers of that slot (the
/// segment lock for chains, the resize gate for the directory).
pub(crate) struct Atomic<T>(seize::AtomicPtr<T>);

impl<T> Atomic<T> {
    pub(crate) fn null() -> Self {
        Self(seize::AtomicPtr::default())
    }

    pub(crate) fn load<'g>(&self, ordering: Ordering, guard: &'g Guard<'_>) -> Shared<'g, T> {
        guard.protect(&self.0, ordering).into()
    }

    pub(crate) fn store(&self, new: Shared<'_, T>, ordering: Ordering) {
        self.0.store(new.ptr, ordering);
    }

    pub(crate) fn swap<'g>(
        &self,
        new: Shared<'_, T>,
        ord: Ordering,
        _: &'g Guard<'_>,
    ) -> Shared<'g, T> {
        self.0.swap(new.ptr, ord).into()
    }

    /// Drops the pointee immediately, leaving the slot null.
    ///
    /// # Safety
    ///
    /// No other thread may hold, or later obtain, a reference to the pointee.
    pub(crate) unsafe fn drop_in_place(&mut self) {
        let ptr = std::mem::replace(self.0.get_mut(), ptr::null_mut());
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl<T> From<Shared<'_, T>> for Atomic<T> {
    fn from(shared: Shared<'_, T>) -> Self {
        Atomic(shared.ptr.into())
    }
}

impl<T> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", self.0.load(Ordering::SeqCst))
    }
}

pub(crate) struct Shared<'g, T> {
    ptr: *mut Linked<T>,
    _g: PhantomData<&'g ()>,
}

impl<'g, T> Shared<'g, T> {
    pub(crate) fn boxed(value: T, collector: &Collector) -> Self {
        Shared::from(collector.link_boxed(value))
    }

    /// Dereference the shared pointer if it is not null.
    ///
    /// # Safety
    ///
    /// All concerns of calling `as_ref` on a shared, raw pointer apply.
    pub(crate) unsafe fn as_ref(&self) -> Option<&'g Linked<T>> {
        unsafe { self.ptr.as_ref() }
    }

    /// Dereference the shared pointer.
    ///
    /// # Safety
    ///
    /// All concerns of dereferencing a shared, raw pointer apply.
    pub(crate) unsafe fn deref(&self) -> &'g Linked<T> {
        unsafe { &*self.ptr }
    }

    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shared<'_, T> {}

impl<T> From<*mut Linked<T>> for Shared<'_, T> {
    fn from(ptr: *mut Linked<T>) -> Self {
        Shared {
            ptr,
            _g: PhantomData,
        }
    }
}

pub(crate) trait RetireShared {
    unsafe fn retire_shared<T>(&self, shared: Shared<'_, T>);
}

impl RetireShared for Guard<'_> {
    /// Retire the value, reclaiming it when all outstanding references are dropped.
    ///
    /// # Safety
    ///
    /// An object can only be retired if it is non-null, and is no longer accessible
    /// to any thread. The value also may not be accessed by the current thread after
    /// this guard is dropped.
    unsafe fn retire_shared<T>(&self, shared: Shared<'_, T>) {
        unsafe { self.retire(shared.ptr, seize::reclaim::boxed::<T>) }
    }
}
