//! Local data object wrapper
//!
//! Exposes a [`LocalDataObject`] through the binary IDataObject protocol
//! without copying it. Each wrapper is one `repr(C)` record allocated outside
//! Rust ownership:
//!
//! ```text
//! +--------------------+
//! | vtable  ---------------> shared IDataObjectVtbl (one per process)
//! | handle  ---------------> Box<Arc<dyn DataObject>>
//! | ref_count (atomic) |
//! +--------------------+
//! ```
//!
//! A pointer is ours iff its first field equals the shared vtable address.
//! That comparison is the whole identity test, so any foreign pointer can be
//! checked without further dereference.
//!
//! The data-transfer slots are stubs returning `E_NOTIMPL`: the wrapper is a
//! valid protocol citizen, and in-process callers reach the real object
//! through [`LocalDataObjectWrapper::try_identify`].

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicPtr, AtomicU32, Ordering};
use std::sync::OnceLock;

use tracing::{debug, trace};

use super::data_object::LocalDataObject;
use super::error::{BridgeError, Result};
use crate::com::{
    Bool, ComRef, FormatEtc, Guid, HResult, IDataObjectVtbl, IUnknownVtbl, RawPtr, StgMedium,
    IID_IDATAOBJECT, IID_IUNKNOWN,
};

#[repr(C)]
struct Lifetime {
    vtable: *const IDataObjectVtbl,
    handle: AtomicPtr<LocalDataObject>,
    ref_count: AtomicU32,
}

static SHARED_VTABLE: OnceLock<IDataObjectVtbl> = OnceLock::new();

fn shared_vtable() -> &'static IDataObjectVtbl {
    SHARED_VTABLE.get_or_init(|| {
        debug!("Building shared IDataObject vtable");
        IDataObjectVtbl {
            base: IUnknownVtbl {
                query_interface,
                add_ref,
                release,
            },
            get_data,
            get_data_here,
            query_get_data,
            get_canonical_format_etc,
            set_data,
            enum_format_etc,
            d_advise,
            d_unadvise,
            enum_d_advise,
        }
    })
}

/// One reference to a wrapper record.
pub struct LocalDataObjectWrapper {
    instance: ComRef,
}

impl LocalDataObjectWrapper {
    /// Wrap `object` in a new record with a reference count of 1, owned by
    /// the returned value.
    pub fn create(object: LocalDataObject) -> Result<Self> {
        let layout = Layout::new::<Lifetime>();
        // SAFETY: Lifetime is not zero-sized.
        let record = unsafe { alloc(layout) } as *mut Lifetime;
        let record = NonNull::new(record).ok_or(BridgeError::OutOfMemory {
            what: "data object wrapper",
            size: layout.size(),
        })?;

        let handle = Box::into_raw(Box::new(object));
        // SAFETY: freshly allocated with the layout of Lifetime.
        unsafe {
            record.as_ptr().write(Lifetime {
                vtable: shared_vtable(),
                handle: AtomicPtr::new(handle),
                ref_count: AtomicU32::new(1),
            });
        }
        trace!("Created data object wrapper at {:p}", record);

        // SAFETY: the record is a live protocol object holding one reference.
        let instance = unsafe { ComRef::from_non_null(record) };
        Ok(Self { instance })
    }

    /// Interface pointer, still owned by `self`
    pub fn as_raw(&self) -> RawPtr {
        self.instance.as_raw()
    }

    /// Hand the reference to the caller
    pub fn into_raw(self) -> RawPtr {
        self.instance.into_raw()
    }

    /// Current reference count
    pub fn ref_count(&self) -> u32 {
        // SAFETY: self keeps the record alive.
        unsafe { (*(self.as_raw() as *const Lifetime)).ref_count.load(Ordering::Acquire) }
    }

    /// The wrapped object
    pub fn object(&self) -> Option<LocalDataObject> {
        // SAFETY: self keeps the record alive.
        unsafe { Self::try_identify(self.as_raw()) }
    }

    /// Returns true if `handle` is one of our records.
    ///
    /// # Safety
    ///
    /// `handle` must be null or a live interface pointer (any implementation).
    pub unsafe fn is_wrapper(handle: RawPtr) -> bool {
        if handle.is_null() {
            return false;
        }
        // SAFETY: every live interface pointer starts with a vtable pointer.
        let vtable = unsafe { ptr::read(handle as *const *const IDataObjectVtbl) };
        ptr::eq(vtable, shared_vtable())
    }

    /// The wrapped object if `handle` is one of our records, `None` for any
    /// foreign object.
    ///
    /// # Safety
    ///
    /// `handle` must be null or a live interface pointer (any implementation).
    pub unsafe fn try_identify(handle: RawPtr) -> Option<LocalDataObject> {
        // SAFETY: guaranteed by caller.
        if !unsafe { Self::is_wrapper(handle) } {
            return None;
        }
        // SAFETY: the vtable matched, so this is a live Lifetime record.
        let lifetime = unsafe { &*(handle as *const Lifetime) };
        let object = lifetime.handle.load(Ordering::Acquire);
        if object.is_null() {
            return None;
        }
        // SAFETY: handle is non-null while the record is referenced.
        Some(unsafe { (*object).clone() })
    }
}

impl fmt::Debug for LocalDataObjectWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalDataObjectWrapper")
            .field("instance", &self.instance)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// =============================================================================
// IUnknown
// =============================================================================

unsafe extern "system" fn query_interface(this: RawPtr, iid: *const Guid, object: *mut RawPtr) -> HResult {
    if object.is_null() {
        return HResult::E_POINTER;
    }
    // SAFETY: out-param checked above, iid provided by the protocol caller.
    unsafe {
        if iid.is_null() || (*iid != IID_IUNKNOWN && *iid != IID_IDATAOBJECT) {
            *object = ptr::null_mut();
            return HResult::E_NOINTERFACE;
        }
        *object = this;
        add_ref(this);
    }
    HResult::S_OK
}

unsafe extern "system" fn add_ref(this: RawPtr) -> u32 {
    // SAFETY: called through our vtable, so `this` is a live record.
    let lifetime = unsafe { &*(this as *const Lifetime) };
    let count = lifetime.ref_count.fetch_add(1, Ordering::Relaxed) + 1;
    debug_assert!(count > 1, "AddRef on a released wrapper");
    count
}

unsafe extern "system" fn release(this: RawPtr) -> u32 {
    // SAFETY: called through our vtable, so `this` is a live record.
    let lifetime = unsafe { &*(this as *const Lifetime) };
    let previous = lifetime.ref_count.fetch_sub(1, Ordering::Release);
    debug_assert!(previous > 0, "Release on a released wrapper");
    if previous != 1 {
        return previous.wrapping_sub(1);
    }

    fence(Ordering::Acquire);
    let handle = lifetime.handle.swap(ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        // SAFETY: created by Box::into_raw in create(); swapped out exactly once.
        drop(unsafe { Box::from_raw(handle) });
    }
    trace!("Destroyed data object wrapper at {:p}", this);
    // SAFETY: last reference gone; allocated in create() with this layout.
    unsafe { dealloc(this as *mut u8, Layout::new::<Lifetime>()) };
    0
}

// =============================================================================
// IDataObject
// =============================================================================

unsafe extern "system" fn get_data(_this: RawPtr, _format: *const FormatEtc, medium: *mut StgMedium) -> HResult {
    if !medium.is_null() {
        // SAFETY: non-null out-param from the protocol caller.
        unsafe { medium.write(StgMedium::default()) };
    }
    HResult::E_NOTIMPL
}

unsafe extern "system" fn get_data_here(
    _this: RawPtr,
    _format: *const FormatEtc,
    _medium: *mut StgMedium,
) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn query_get_data(_this: RawPtr, _format: *const FormatEtc) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn get_canonical_format_etc(
    _this: RawPtr,
    _format_in: *const FormatEtc,
    format_out: *mut FormatEtc,
) -> HResult {
    if !format_out.is_null() {
        // SAFETY: non-null out-param from the protocol caller.
        unsafe { format_out.write(FormatEtc::default()) };
    }
    HResult::E_NOTIMPL
}

unsafe extern "system" fn set_data(
    _this: RawPtr,
    _format: *const FormatEtc,
    _medium: *const StgMedium,
    _release: Bool,
) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn enum_format_etc(_this: RawPtr, _direction: u32, enumerator: *mut RawPtr) -> HResult {
    if !enumerator.is_null() {
        // SAFETY: non-null out-param from the protocol caller.
        unsafe { enumerator.write(ptr::null_mut()) };
    }
    HResult::E_NOTIMPL
}

unsafe extern "system" fn d_advise(
    _this: RawPtr,
    _format: *const FormatEtc,
    _advf: u32,
    _sink: RawPtr,
    connection: *mut u32,
) -> HResult {
    if !connection.is_null() {
        // SAFETY: non-null out-param from the protocol caller.
        unsafe { connection.write(0) };
    }
    HResult::E_NOTIMPL
}

unsafe extern "system" fn d_unadvise(_this: RawPtr, _connection: u32) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn enum_d_advise(_this: RawPtr, enumerator: *mut RawPtr) -> HResult {
    if !enumerator.is_null() {
        // SAFETY: non-null out-param from the protocol caller.
        unsafe { enumerator.write(ptr::null_mut()) };
    }
    HResult::E_NOTIMPL
}
