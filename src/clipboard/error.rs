//! Bridge Error Types
//!
//! Every failure the core surfaces falls into one of five kinds: the calling
//! thread is in the wrong apartment, a dispatched call or platform API
//! returned a negative status, the peer rejected the requested
//! representation, a capability is intentionally unimplemented, or the
//! unmanaged record allocation failed.

use thiserror::Error;

use crate::com::HResult;
use crate::platform::ApartmentState;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Clipboard touched from outside a single-threaded apartment
    #[error("clipboard requires a single-threaded apartment, calling thread is {actual}")]
    ApartmentState {
        /// Apartment the calling thread is in
        actual: ApartmentState,
    },

    /// Negative status from a vtable dispatch or platform call
    #[error("{operation} failed: {status}")]
    Status {
        /// Call that failed
        operation: &'static str,
        /// Status it returned
        status: HResult,
    },

    /// The peer cannot produce the requested representation
    #[error("{operation} rejected the requested format: {status}")]
    FormatMismatch {
        /// Call that failed
        operation: &'static str,
        /// DV_E_* status it returned
        status: HResult,
    },

    /// Capability intentionally left unimplemented
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Unmanaged allocation failed
    #[error("failed to allocate {size} bytes for {what}")]
    OutOfMemory {
        /// What was being allocated
        what: &'static str,
        /// Requested size in bytes
        size: usize,
    },
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong execution context
    Apartment,
    /// Protocol status failure
    Protocol,
    /// Representation not available
    FormatMismatch,
    /// Stubbed capability
    NotImplemented,
    /// Allocation failure
    ResourceExhaustion,
}

impl BridgeError {
    /// Translate a failing status into a typed error.
    pub fn from_status(operation: &'static str, status: HResult) -> Self {
        match status {
            HResult::DV_E_FORMATETC | HResult::DV_E_TYMED | HResult::DV_E_DVASPECT => {
                Self::FormatMismatch { operation, status }
            }
            _ => Self::Status { operation, status },
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ApartmentState { .. } => ErrorKind::Apartment,
            Self::Status { .. } => ErrorKind::Protocol,
            Self::FormatMismatch { .. } => ErrorKind::FormatMismatch,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::OutOfMemory { .. } => ErrorKind::ResourceExhaustion,
        }
    }

    /// Status code equivalent of this error
    pub fn status(&self) -> HResult {
        match self {
            Self::ApartmentState { .. } => HResult::RPC_E_WRONG_THREAD,
            Self::Status { status, .. } | Self::FormatMismatch { status, .. } => *status,
            Self::NotImplemented(_) => HResult::E_NOTIMPL,
            Self::OutOfMemory { .. } => HResult::E_OUTOFMEMORY,
        }
    }

    /// Returns true if the call must be abandoned rather than inspected
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ApartmentState { .. } | Self::OutOfMemory { .. }
        )
    }
}
