//! Platform contracts
//!
//! The OLE clipboard store, apartment state and cross-context marshaling are
//! owned by the operating system. The bridge consumes them only through
//! [`OlePlatform`], which keeps the core testable off Windows and lets the
//! binary plug in the real ole32 implementation.
//!
//! All methods mirror the raw platform calls: they return the platform's
//! status code untouched and write interface pointers to out-parameters.
//! Translation into [`BridgeError`](crate::clipboard::BridgeError) happens in
//! the callers.

use std::fmt;

use crate::clipboard::error::{BridgeError, Result};
use crate::com::{Guid, HResult, RawPtr};

#[cfg(windows)]
pub mod ole32;

#[cfg(windows)]
pub use ole32::{Ole32Platform, Win32FormatRegistry};

/// Threading model of the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApartmentState {
    /// Single-threaded apartment (the only state the clipboard accepts)
    SingleThreaded,
    /// Multi-threaded apartment
    MultiThreaded,
    /// Neutral apartment
    Neutral,
    /// COM not initialized on this thread
    Uninitialized,
}

impl fmt::Display for ApartmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SingleThreaded => "STA",
            Self::MultiThreaded => "MTA",
            Self::Neutral => "NA",
            Self::Uninitialized => "uninitialized",
        };
        f.write_str(name)
    }
}

/// `AgileReferenceOptions` for `RoGetAgileReference`
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgileReferenceOptions {
    /// Marshal immediately
    #[default]
    Default = 0,
    /// Marshal on first resolve
    DelayedMarshal = 1,
}

/// The operating system services the bridge depends on.
pub trait OlePlatform: Send + Sync {
    /// `OleInitialize`
    fn initialize(&self) -> HResult;

    /// Apartment of the calling thread
    fn apartment_state(&self) -> ApartmentState;

    /// `OleGetClipboard`. On success the caller owns one reference to the
    /// object written to `data_object`.
    fn get_clipboard(&self, data_object: &mut RawPtr) -> HResult;

    /// `OleSetClipboard`. Null clears the clipboard. The platform takes its
    /// own reference; the caller keeps theirs.
    ///
    /// # Safety
    ///
    /// `data_object` must be null or a live IDataObject pointer valid in the
    /// calling context.
    unsafe fn set_clipboard(&self, data_object: RawPtr) -> HResult;

    /// `OleFlushClipboard`
    fn flush_clipboard(&self) -> HResult;

    /// `RoGetAgileReference`. On success the caller owns one reference to the
    /// IAgileReference written to `agile`.
    ///
    /// # Safety
    ///
    /// `instance` must be a live interface pointer valid in the calling
    /// context that implements `iid`.
    unsafe fn create_agile_reference(
        &self,
        options: AgileReferenceOptions,
        iid: &Guid,
        instance: RawPtr,
        agile: &mut RawPtr,
    ) -> HResult;
}

/// Fail unless the calling thread is in a single-threaded apartment.
pub fn require_single_threaded(platform: &dyn OlePlatform) -> Result<()> {
    match platform.apartment_state() {
        ApartmentState::SingleThreaded => Ok(()),
        actual => Err(BridgeError::ApartmentState { actual }),
    }
}
