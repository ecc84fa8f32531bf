//! Binary layouts of the interfaces the bridge speaks.
//!
//! Slot order matches the published ABI of IUnknown, IDataObject and
//! IAgileReference. Clipboard producers and consumers dispatch by slot
//! offset, so fields must never be reordered.

use std::ffi::c_void;

use super::guid::Guid;
use super::hresult::HResult;

/// An interface pointer: address of a record whose first field is a vtable
/// pointer.
pub type RawPtr = *mut c_void;

/// Win32 BOOL
pub type Bool = i32;

/// FORMATETC
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FormatEtc {
    /// CLIPFORMAT
    pub cf_format: u16,
    /// DVTARGETDEVICE*, owned by the caller
    pub ptd: *mut c_void,
    /// DVASPECT
    pub dw_aspect: u32,
    /// Page / piece index, -1 for all
    pub lindex: i32,
    /// TYMED mask
    pub tymed: u32,
}

impl Default for FormatEtc {
    fn default() -> Self {
        Self {
            cf_format: 0,
            ptd: std::ptr::null_mut(),
            dw_aspect: 0,
            lindex: 0,
            tymed: 0,
        }
    }
}

/// STGMEDIUM. The union member is carried as one pointer-sized handle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StgMedium {
    /// Single TYMED bit, 0 for TYMED_NULL
    pub tymed: u32,
    /// HGLOBAL / IStream* / HBITMAP / ...
    pub data: *mut c_void,
    /// IUnknown* through which the payload must be released, or null
    pub unk_for_release: RawPtr,
}

impl Default for StgMedium {
    fn default() -> Self {
        Self {
            tymed: 0,
            data: std::ptr::null_mut(),
            unk_for_release: std::ptr::null_mut(),
        }
    }
}

/// IUnknown::QueryInterface
pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: RawPtr, iid: *const Guid, object: *mut RawPtr) -> HResult;
/// IUnknown::AddRef
pub type AddRefFn = unsafe extern "system" fn(this: RawPtr) -> u32;
/// IUnknown::Release
pub type ReleaseFn = unsafe extern "system" fn(this: RawPtr) -> u32;

/// IUnknown vtable
#[repr(C)]
pub struct IUnknownVtbl {
    /// Slot 0
    pub query_interface: QueryInterfaceFn,
    /// Slot 1
    pub add_ref: AddRefFn,
    /// Slot 2
    pub release: ReleaseFn,
}

/// IDataObject vtable
#[repr(C)]
pub struct IDataObjectVtbl {
    /// Slots 0-2
    pub base: IUnknownVtbl,
    /// Slot 3
    pub get_data:
        unsafe extern "system" fn(this: RawPtr, format: *const FormatEtc, medium: *mut StgMedium) -> HResult,
    /// Slot 4
    pub get_data_here:
        unsafe extern "system" fn(this: RawPtr, format: *const FormatEtc, medium: *mut StgMedium) -> HResult,
    /// Slot 5
    pub query_get_data: unsafe extern "system" fn(this: RawPtr, format: *const FormatEtc) -> HResult,
    /// Slot 6
    pub get_canonical_format_etc: unsafe extern "system" fn(
        this: RawPtr,
        format_in: *const FormatEtc,
        format_out: *mut FormatEtc,
    ) -> HResult,
    /// Slot 7
    pub set_data: unsafe extern "system" fn(
        this: RawPtr,
        format: *const FormatEtc,
        medium: *const StgMedium,
        release: Bool,
    ) -> HResult,
    /// Slot 8
    pub enum_format_etc:
        unsafe extern "system" fn(this: RawPtr, direction: u32, enumerator: *mut RawPtr) -> HResult,
    /// Slot 9
    pub d_advise: unsafe extern "system" fn(
        this: RawPtr,
        format: *const FormatEtc,
        advf: u32,
        sink: RawPtr,
        connection: *mut u32,
    ) -> HResult,
    /// Slot 10
    pub d_unadvise: unsafe extern "system" fn(this: RawPtr, connection: u32) -> HResult,
    /// Slot 11
    pub enum_d_advise: unsafe extern "system" fn(this: RawPtr, enumerator: *mut RawPtr) -> HResult,
}

/// IAgileReference vtable
#[repr(C)]
pub struct IAgileReferenceVtbl {
    /// Slots 0-2
    pub base: IUnknownVtbl,
    /// Slot 3
    pub resolve: unsafe extern "system" fn(this: RawPtr, iid: *const Guid, object: *mut RawPtr) -> HResult,
}

/// Read the vtable of an interface pointer.
///
/// # Safety
///
/// `this` must be a live interface pointer whose vtable has layout `V`.
pub unsafe fn vtable_of<'a, V>(this: RawPtr) -> &'a V {
    // SAFETY: every interface record starts with its vtable pointer.
    unsafe { &**(this as *const *const V) }
}
