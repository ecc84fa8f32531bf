//! Agile references
//!
//! An [`AgileReference`] owns one IAgileReference obtained from the platform's
//! cross-context marshaling facility. It can be resolved from any apartment
//! into an interface pointer valid in that apartment.

use std::fmt;
use std::ptr::{self, NonNull};

use tracing::trace;

use super::error::{BridgeError, Result};
use crate::com::{release_raw, ComRef, Guid, HResult, IAgileReferenceVtbl, RawPtr};
use crate::platform::{AgileReferenceOptions, OlePlatform};

/// Owned IAgileReference
pub struct AgileReference {
    instance: NonNull<std::ffi::c_void>,
    vtable: NonNull<IAgileReferenceVtbl>,
}

// SAFETY: IAgileReference is free-threaded; resolve and release are valid
// from any apartment and the platform serializes them internally.
unsafe impl Send for AgileReference {}
unsafe impl Sync for AgileReference {}

impl AgileReference {
    /// Wrap an IAgileReference the caller owns one reference to.
    ///
    /// # Safety
    ///
    /// `instance` must be null or a live IAgileReference pointer; its
    /// reference moves into the returned value.
    pub unsafe fn from_raw(instance: RawPtr) -> Result<Self> {
        let instance = NonNull::new(instance)
            .ok_or_else(|| BridgeError::from_status("RoGetAgileReference", HResult::E_POINTER))?;
        // SAFETY: a live interface pointer starts with its vtable pointer.
        let vtable = unsafe { *(instance.as_ptr() as *const *mut IAgileReferenceVtbl) };
        let vtable = NonNull::new(vtable)
            .ok_or_else(|| BridgeError::from_status("RoGetAgileReference", HResult::E_POINTER))?;
        Ok(Self { instance, vtable })
    }

    /// `RoGetAgileReference` over `instance`, which keeps its own reference.
    ///
    /// # Safety
    ///
    /// `instance` must be a live pointer implementing `iid`, valid in the
    /// calling context.
    pub unsafe fn create(platform: &dyn OlePlatform, iid: &Guid, instance: RawPtr) -> Result<Self> {
        let mut agile: RawPtr = ptr::null_mut();
        // SAFETY: guaranteed by caller.
        let status = unsafe {
            platform.create_agile_reference(AgileReferenceOptions::Default, iid, instance, &mut agile)
        };
        if status.is_failure() {
            return Err(BridgeError::from_status("RoGetAgileReference", status));
        }
        // SAFETY: on success the platform handed us one reference.
        unsafe { Self::from_raw(agile) }
    }

    /// A new reference to `iid`, valid in the calling context.
    ///
    /// Fails if the original object can no longer produce one (e.g. it died).
    pub fn resolve(&self, iid: &Guid) -> Result<ComRef> {
        let mut resolved: RawPtr = ptr::null_mut();
        // SAFETY: self owns a live IAgileReference.
        let status = unsafe { (self.vtable.as_ref().resolve)(self.instance.as_ptr(), iid, &mut resolved) };
        trace!("IAgileReference::Resolve({}) -> {}", iid, status);
        if status.is_failure() {
            return Err(BridgeError::from_status("IAgileReference::Resolve", status));
        }
        // SAFETY: a successful Resolve transfers one reference.
        unsafe { ComRef::from_raw(resolved) }
            .ok_or_else(|| BridgeError::from_status("IAgileReference::Resolve", HResult::E_POINTER))
    }
}

impl Drop for AgileReference {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference; agile objects may be released
        // from any context.
        unsafe { release_raw(self.instance.as_ptr()) };
    }
}

impl fmt::Debug for AgileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgileReference")
            .field("instance", &self.instance)
            .finish()
    }
}
