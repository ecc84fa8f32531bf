//! Remote data object proxy
//!
//! Implements [`DataObject`] for a clipboard object owned by another process
//! or apartment. Every call resolves a fresh context-safe pointer through the
//! [`AgileReference`], dispatches one vtable slot, and releases the resolved
//! pointer before the status is translated.
//!
//! The proxy also keeps the pointer resolved at construction (the "home"
//! pointer). It is never used for dispatch; it exists so the original object
//! can be installed back on the clipboard from its home apartment, and it is
//! released only on that apartment's thread.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use super::agile::AgileReference;
use super::data_object::{DataObject, Presence};
use super::error::{BridgeError, Result};
use super::formats::{Aspect, FormatDescriptor, FormatRegistry, TransferMedium, QUERYABLE_MEDIA};
use super::release::{ReleaseDispatcher, ReleaseRequest};
use crate::com::{release_raw, HResult, IDataObjectVtbl, RawPtr, StgMedium, IID_IDATAOBJECT};
use crate::platform::{require_single_threaded, OlePlatform};

/// Pointer resolved in the apartment that created the proxy
struct HomeInstance {
    ptr: NonNull<std::ffi::c_void>,
    owner: ThreadId,
}

// SAFETY: the pointer is only dereferenced or released on `owner`; other
// threads merely carry it to the release queue.
unsafe impl Send for HomeInstance {}
unsafe impl Sync for HomeInstance {}

/// [`DataObject`] over a foreign IDataObject
pub struct RemoteDataObjectProxy {
    agile: AgileReference,
    home: Option<HomeInstance>,
    platform: Arc<dyn OlePlatform>,
    formats: Arc<dyn FormatRegistry>,
    releaser: Option<ReleaseDispatcher>,
}

impl RemoteDataObjectProxy {
    /// Build a proxy over `agile` on the calling thread, which becomes the
    /// proxy's home.
    ///
    /// `releaser` should be bound to that same thread; without one, a proxy
    /// dropped elsewhere leaks its home pointer.
    pub fn new(
        agile: AgileReference,
        platform: Arc<dyn OlePlatform>,
        formats: Arc<dyn FormatRegistry>,
        releaser: Option<ReleaseDispatcher>,
    ) -> Result<Self> {
        require_single_threaded(platform.as_ref())?;
        let resolved = agile.resolve(&IID_IDATAOBJECT)?;
        let ptr = NonNull::new(resolved.into_raw())
            .ok_or_else(|| BridgeError::from_status("IAgileReference::Resolve", HResult::E_POINTER))?;

        let owner = thread::current().id();
        if let Some(releaser) = &releaser {
            if releaser.owner() != owner {
                debug!("Proxy release dispatcher is bound to another thread");
            }
        }

        Ok(Self {
            agile,
            home: Some(HomeInstance { ptr, owner }),
            platform,
            formats,
            releaser,
        })
    }

    /// Thread the home pointer belongs to
    pub fn home_thread(&self) -> Option<ThreadId> {
        self.home.as_ref().map(|home| home.owner)
    }

    /// Run `f` with an IDataObject pointer valid on the calling thread.
    ///
    /// On the home thread this is the construction-time pointer; on any
    /// other thread a call-scoped pointer is resolved and released after `f`
    /// returns. `f` must not keep the pointer.
    pub fn with_context_handle<R>(&self, f: impl FnOnce(RawPtr) -> R) -> Result<R> {
        require_single_threaded(self.platform.as_ref())?;
        match &self.home {
            Some(home) if home.owner == thread::current().id() => Ok(f(home.ptr.as_ptr())),
            _ => {
                trace!("Resolving call-scoped handle off the proxy's home thread");
                let resolved = self.agile.resolve(&IID_IDATAOBJECT)?;
                Ok(f(resolved.as_raw()))
            }
        }
    }

    /// Resolve, dispatch one slot, release. Returns the slot's raw status.
    fn dispatch<F>(&self, operation: &'static str, call: F) -> Result<HResult>
    where
        F: FnOnce(RawPtr, &IDataObjectVtbl) -> HResult,
    {
        require_single_threaded(self.platform.as_ref())?;
        let resolved = self.agile.resolve(&IID_IDATAOBJECT)?;
        // SAFETY: resolved for IID_IDATAOBJECT.
        let vtbl = unsafe { resolved.vtable::<IDataObjectVtbl>() };
        let status = call(resolved.as_raw(), vtbl);
        drop(resolved);
        trace!("{} -> {}", operation, status);
        Ok(status)
    }

    fn remote_query(&self, format: &FormatDescriptor) -> Result<HResult> {
        let raw = format.to_raw();
        self.dispatch("IDataObject::QueryGetData", |this, vtbl| {
            // SAFETY: `this` is live for the duration of the call.
            unsafe { (vtbl.query_get_data)(this, &raw) }
        })
    }
}

impl DataObject for RemoteDataObjectProxy {
    fn get_data(&self, format: &FormatDescriptor) -> Result<TransferMedium> {
        let raw = format.to_raw();
        let mut medium = StgMedium::default();
        let status = self.dispatch("IDataObject::GetData", |this, vtbl| {
            // SAFETY: `this` is live for the duration of the call.
            unsafe { (vtbl.get_data)(this, &raw, &mut medium) }
        })?;
        if status.is_failure() {
            return Err(BridgeError::from_status("IDataObject::GetData", status));
        }
        // SAFETY: a successful GetData hands us the medium and its owner.
        Ok(unsafe { TransferMedium::adopt(medium) })
    }

    fn query_get_data(&self, format: &FormatDescriptor) -> Result<Presence> {
        require_single_threaded(self.platform.as_ref())?;
        if format.aspect != Aspect::Content {
            return Ok(Presence::Unavailable(HResult::DV_E_DVASPECT));
        }
        if !format.medium.intersects(QUERYABLE_MEDIA) {
            return Ok(Presence::Unavailable(HResult::DV_E_TYMED));
        }
        if format.format_id == 0 {
            return Ok(Presence::Unavailable(HResult::S_FALSE));
        }

        let status = self.remote_query(format)?;
        if status == HResult::S_OK {
            return Ok(Presence::Available);
        }

        let canonical = self.formats.canonical_id(format.format_id);
        if canonical != format.format_id {
            debug!(
                "Format {} not offered ({}), retrying as canonical {}",
                format.format_id, status, canonical
            );
            let retry = self.remote_query(&format.with_format_id(canonical))?;
            if retry == HResult::S_OK {
                return Ok(Presence::Available);
            }
            return Ok(Presence::Unavailable(HResult::DV_E_FORMATETC));
        }

        if status.is_success() {
            return Ok(Presence::Unavailable(status));
        }
        match BridgeError::from_status("IDataObject::QueryGetData", status) {
            BridgeError::FormatMismatch { status, .. } => Ok(Presence::Unavailable(status)),
            err => Err(err),
        }
    }

    fn set_data(&self, format: &FormatDescriptor, medium: TransferMedium, release: bool) -> Result<()> {
        let raw_format = format.to_raw();
        let status = if release {
            let raw_medium = medium.into_raw();
            let status = self.dispatch("IDataObject::SetData", |this, vtbl| {
                // SAFETY: `this` is live for the duration of the call.
                unsafe { (vtbl.set_data)(this, &raw_format, &raw_medium, 1) }
            });
            // The callee only takes the medium when it succeeds.
            if !matches!(&status, Ok(s) if s.is_success()) {
                // SAFETY: ownership came back to us; adopt to release the owner.
                drop(unsafe { TransferMedium::adopt(raw_medium) });
            }
            status?
        } else {
            let raw_medium = medium.as_raw();
            self.dispatch("IDataObject::SetData", |this, vtbl| {
                // SAFETY: `medium` outlives the call.
                unsafe { (vtbl.set_data)(this, &raw_format, &raw_medium, 0) }
            })?
        };

        if status.is_failure() {
            return Err(BridgeError::from_status("IDataObject::SetData", status));
        }
        Ok(())
    }
}

impl Drop for RemoteDataObjectProxy {
    fn drop(&mut self) {
        let Some(home) = self.home.take() else {
            return;
        };

        if thread::current().id() == home.owner {
            // SAFETY: on the home thread, releasing the reference we own.
            unsafe { release_raw(home.ptr.as_ptr()) };
            return;
        }

        match &self.releaser {
            Some(releaser) if releaser.owner() == home.owner => {
                // SAFETY: the queue releases on `home.owner`.
                let request = unsafe { ReleaseRequest::new(home.ptr) };
                if releaser.post(request).is_err() {
                    warn!("Release queue for {:p} is gone; leaking the home reference", home.ptr);
                }
            }
            _ => {
                warn!(
                    "Proxy dropped off its home thread with no dispatcher; leaking {:p}",
                    home.ptr
                );
            }
        }
    }
}

impl fmt::Debug for RemoteDataObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDataObjectProxy")
            .field("agile", &self.agile)
            .field("home", &self.home.as_ref().map(|home| home.ptr))
            .field("deferred_release", &self.releaser.is_some())
            .finish()
    }
}
