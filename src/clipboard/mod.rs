//! Clipboard Bridge Module
//!
//! Moves data objects across the OLE clipboard between this process and
//! foreign processes or apartments.
//!
//! # Architecture
//!
//! - [`ClipboardBridge`] - get, set, clear and flush the clipboard
//! - [`RemoteDataObjectProxy`] - a foreign object seen as a [`DataObject`]
//! - [`LocalDataObjectWrapper`] - a local object seen as an IDataObject
//! - [`AgileReference`] - cross-apartment handle behind every proxy
//! - [`ReleaseQueue`] - releases proxy references on their home thread
//!
//! # Data Flow
//!
//! ```text
//! get():
//!   OleGetClipboard ──> try_identify ──> ours?  ──> LocalDataObject
//!                                    └─> foreign ─> AgileReference ─> RemoteDataObjectProxy
//!
//! set(object):
//!   LocalDataObject ───────> LocalDataObjectWrapper::create ──> OleSetClipboard
//!   RemoteDataObjectProxy ─> with_context_handle ─────────────> OleSetClipboard
//! ```

pub mod agile;
pub mod bridge;
pub mod data_object;
pub mod error;
pub mod formats;
pub mod proxy;
pub mod release;
pub mod wrapper;

pub use agile::AgileReference;
pub use bridge::{BridgeOptions, ClipboardBridge, ClipboardContent, ClipboardObject};
pub use data_object::{DataDirection, DataObject, LocalDataObject, Presence};
pub use error::{BridgeError, ErrorKind, Result};
pub use formats::{
    standard_format_id, standard_format_name, Aspect, FormatDescriptor, FormatRegistry, FormatTable,
    MediumKind, TransferMedium, QUERYABLE_MEDIA,
};
pub use proxy::RemoteDataObjectProxy;
pub use release::{ReleaseDispatcher, ReleaseQueue, ReleaseRequest};
pub use wrapper::LocalDataObjectWrapper;
