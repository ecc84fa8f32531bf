//! Owned interface references.

use std::fmt;
use std::ptr::{self, NonNull};

use super::guid::Guid;
use super::hresult::HResult;
use super::vtable::{vtable_of, IUnknownVtbl, RawPtr};

/// One counted reference to a protocol object.
///
/// Dropping it calls `Release` through the object's own vtable. It is neither
/// `Send` nor `Sync`: a plain interface pointer is only valid in the context
/// it was obtained in.
pub struct ComRef {
    ptr: NonNull<std::ffi::c_void>,
}

impl ComRef {
    /// Take ownership of a reference the caller already holds.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live interface pointer carrying one reference
    /// that is transferred to the returned value.
    pub unsafe fn from_raw(ptr: RawPtr) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Take ownership of a non-null reference the caller already holds.
    ///
    /// # Safety
    ///
    /// Same contract as [`ComRef::from_raw`].
    pub unsafe fn from_non_null<T>(ptr: NonNull<T>) -> Self {
        Self { ptr: ptr.cast() }
    }

    /// Add a reference to a borrowed pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live interface pointer.
    pub unsafe fn from_borrowed(ptr: RawPtr) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        // SAFETY: caller guarantees `ptr` is live.
        unsafe { add_ref_raw(ptr.as_ptr()) };
        Some(Self { ptr })
    }

    /// The raw pointer, still owned by `self`.
    pub fn as_raw(&self) -> RawPtr {
        self.ptr.as_ptr()
    }

    /// Give up ownership without releasing.
    pub fn into_raw(self) -> RawPtr {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// The object's vtable viewed as layout `V`.
    ///
    /// # Safety
    ///
    /// The object must implement an interface with layout `V`.
    pub unsafe fn vtable<V>(&self) -> &V {
        // SAFETY: self holds a live reference, layout guaranteed by caller.
        unsafe { vtable_of::<V>(self.as_raw()) }
    }

    /// `QueryInterface` for another interface of the same object.
    pub fn query_interface(&self, iid: &Guid) -> Result<ComRef, HResult> {
        let mut out: RawPtr = ptr::null_mut();
        // SAFETY: every protocol object starts with an IUnknown vtable.
        let status = unsafe {
            let vtbl = self.vtable::<IUnknownVtbl>();
            (vtbl.query_interface)(self.as_raw(), iid, &mut out)
        };
        if status.is_failure() {
            return Err(status);
        }
        // SAFETY: a successful QueryInterface hands out one reference.
        unsafe { ComRef::from_raw(out) }.ok_or(HResult::E_POINTER)
    }
}

impl Clone for ComRef {
    fn clone(&self) -> Self {
        // SAFETY: self keeps the object alive.
        unsafe { add_ref_raw(self.as_raw()) };
        Self { ptr: self.ptr }
    }
}

impl Drop for ComRef {
    fn drop(&mut self) {
        // SAFETY: self owns exactly one reference.
        unsafe { release_raw(self.as_raw()) };
    }
}

impl fmt::Debug for ComRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComRef").field(&self.ptr).finish()
    }
}

/// `AddRef` through slot 1.
///
/// # Safety
///
/// `ptr` must be a live interface pointer.
pub unsafe fn add_ref_raw(ptr: RawPtr) -> u32 {
    // SAFETY: guaranteed by caller.
    unsafe { (vtable_of::<IUnknownVtbl>(ptr).add_ref)(ptr) }
}

/// `Release` through slot 2.
///
/// # Safety
///
/// `ptr` must be a live interface pointer and the caller must own the
/// reference being released.
pub unsafe fn release_raw(ptr: RawPtr) -> u32 {
    // SAFETY: guaranteed by caller.
    unsafe { (vtable_of::<IUnknownVtbl>(ptr).release)(ptr) }
}
