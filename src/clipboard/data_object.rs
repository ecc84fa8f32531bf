//! The data-transfer capability set.
//!
//! Both process-local objects and [`RemoteDataObjectProxy`] implement
//! [`DataObject`]; callers treat them the same way.
//!
//! [`RemoteDataObjectProxy`]: super::proxy::RemoteDataObjectProxy

use std::sync::Arc;

use super::error::{BridgeError, Result};
use super::formats::{FormatDescriptor, TransferMedium};
use crate::com::{ComRef, HResult};

/// A local object shared with the clipboard
pub type LocalDataObject = Arc<dyn DataObject>;

/// Result of a presence query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The representation can be produced
    Available,
    /// It cannot; the code says why (S_FALSE, DV_E_FORMATETC, DV_E_TYMED, ...)
    Unavailable(HResult),
}

impl Presence {
    /// Returns true if the format is available
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Status code a protocol caller would see
    pub fn status(&self) -> HResult {
        match self {
            Self::Available => HResult::S_OK,
            Self::Unavailable(status) => *status,
        }
    }
}

/// DATADIR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    /// Formats that can be read
    Get,
    /// Formats that can be written
    Set,
}

/// Get, set and query typed payloads by format.
///
/// Enumeration, canonical-format negotiation, in-place rendering and advisory
/// connections are optional; the defaults report them as not implemented.
pub trait DataObject: Send + Sync {
    /// Render `format` into a new medium
    fn get_data(&self, format: &FormatDescriptor) -> Result<TransferMedium>;

    /// Whether `format` could be rendered
    fn query_get_data(&self, format: &FormatDescriptor) -> Result<Presence>;

    /// Store `medium` under `format`. With `release` the callee takes
    /// ownership of the medium.
    fn set_data(&self, format: &FormatDescriptor, medium: TransferMedium, release: bool) -> Result<()>;

    /// Render into a caller-provided medium
    fn get_data_here(&self, _format: &FormatDescriptor, _medium: &mut TransferMedium) -> Result<()> {
        Err(BridgeError::NotImplemented("GetDataHere"))
    }

    /// Canonical equivalent of `format`
    fn get_canonical_format(&self, _format: &FormatDescriptor) -> Result<FormatDescriptor> {
        Err(BridgeError::NotImplemented("GetCanonicalFormatEtc"))
    }

    /// Offered formats
    fn enum_formats(&self, _direction: DataDirection) -> Result<Vec<FormatDescriptor>> {
        Err(BridgeError::NotImplemented("EnumFormatEtc"))
    }

    /// Open an advisory connection, returning its cookie
    fn advise(&self, _format: &FormatDescriptor, _flags: u32, _sink: &ComRef) -> Result<u32> {
        Err(BridgeError::NotImplemented("DAdvise"))
    }

    /// Close an advisory connection
    fn unadvise(&self, _connection: u32) -> Result<()> {
        Err(BridgeError::NotImplemented("DUnadvise"))
    }

    /// Open advisory connections
    fn enum_advise(&self) -> Result<Vec<u32>> {
        Err(BridgeError::NotImplemented("EnumDAdvise"))
    }
}
