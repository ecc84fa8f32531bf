//! # ole-clipboard-bridge
//!
//! Share data objects through the OLE clipboard across processes and
//! apartments.
//!
//! # Architecture
//!
//! ```text
//! ole-clipboard-bridge
//!   ├─> com       (status codes, GUIDs, FORMATETC/STGMEDIUM, vtable layouts)
//!   ├─> platform  (OlePlatform contract + ole32 implementation)
//!   ├─> clipboard (ClipboardBridge, proxy, wrapper, agile references)
//!   └─> config    (TOML configuration for the CLI)
//! ```
//!
//! # Data Flow
//!
//! **Read Path:** OleGetClipboard → own wrapper? → LocalDataObject,
//! otherwise AgileReference → RemoteDataObjectProxy
//!
//! **Write Path:** LocalDataObject → LocalDataObjectWrapper → OleSetClipboard

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Binary object-protocol primitives
pub mod com;

/// Platform services consumed by the bridge
pub mod platform;

/// Clipboard bridge core
///
/// Converts between the clipboard's IDataObject pointers and process-local
/// [`DataObject`](clipboard::DataObject) values.
pub mod clipboard;

/// CLI configuration
pub mod config;

pub use clipboard::{
    BridgeError, BridgeOptions, ClipboardBridge, ClipboardContent, ClipboardObject, DataObject,
    FormatDescriptor, FormatRegistry, LocalDataObject, Presence, Result, TransferMedium,
};
pub use platform::{ApartmentState, OlePlatform};
