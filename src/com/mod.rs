//! Binary object-protocol primitives
//!
//! Status codes, interface identifiers, the `repr(C)` records exchanged with
//! IDataObject, the vtable layouts, and [`ComRef`], an owned counted
//! reference that releases through the object's own vtable.
//!
//! Nothing here knows about the clipboard; it is the wire format the rest of
//! the crate dispatches through.

pub mod guid;
pub mod hresult;
pub mod unknown;
pub mod vtable;

pub use guid::{Guid, IID_IAGILEREFERENCE, IID_IDATAOBJECT, IID_IUNKNOWN};
pub use hresult::{Completion, HResult};
pub use unknown::{add_ref_raw, release_raw, ComRef};
pub use vtable::{
    vtable_of, Bool, FormatEtc, IAgileReferenceVtbl, IDataObjectVtbl, IUnknownVtbl, RawPtr, StgMedium,
};
