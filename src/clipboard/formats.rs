//! Clipboard data model and format registry.
//!
//! [`FormatDescriptor`] and [`TransferMedium`] are the local views of
//! FORMATETC and STGMEDIUM. [`FormatRegistry`] maps between registered
//! format names and numeric ids; the bridge uses it to canonicalize ids that
//! a peer did not recognize.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use enumflags2::{bitflags, make_bitflags, BitFlags};
use parking_lot::RwLock;
use tracing::trace;

use crate::com::{ComRef, FormatEtc, StgMedium};

// =============================================================================
// Standard Windows Clipboard Format IDs
// =============================================================================

/// ANSI text
pub const CF_TEXT: u16 = 1;
/// Device-dependent bitmap (HBITMAP)
pub const CF_BITMAP: u16 = 2;
/// Metafile picture
pub const CF_METAFILEPICT: u16 = 3;
/// Microsoft Symbolic Link
pub const CF_SYLK: u16 = 4;
/// Data Interchange Format
pub const CF_DIF: u16 = 5;
/// Tagged Image File Format
pub const CF_TIFF: u16 = 6;
/// OEM text
pub const CF_OEMTEXT: u16 = 7;
/// Device-independent bitmap
pub const CF_DIB: u16 = 8;
/// Color palette
pub const CF_PALETTE: u16 = 9;
/// Pen data
pub const CF_PENDATA: u16 = 10;
/// RIFF audio
pub const CF_RIFF: u16 = 11;
/// Wave audio
pub const CF_WAVE: u16 = 12;
/// Unicode text (UTF-16LE)
pub const CF_UNICODETEXT: u16 = 13;
/// Enhanced metafile
pub const CF_ENHMETAFILE: u16 = 14;
/// File drop list
pub const CF_HDROP: u16 = 15;
/// Locale identifier
pub const CF_LOCALE: u16 = 16;
/// DIBV5
pub const CF_DIBV5: u16 = 17;

/// First id handed out for registered formats
pub const FIRST_REGISTERED_FORMAT: u16 = 0xC000;

const STANDARD_FORMATS: &[(u16, &str)] = &[
    (CF_TEXT, "Text"),
    (CF_BITMAP, "Bitmap"),
    (CF_METAFILEPICT, "MetaFilePict"),
    (CF_SYLK, "SymbolicLink"),
    (CF_DIF, "DataInterchangeFormat"),
    (CF_TIFF, "TaggedImageFileFormat"),
    (CF_OEMTEXT, "OEMText"),
    (CF_DIB, "DeviceIndependentBitmap"),
    (CF_PALETTE, "Palette"),
    (CF_PENDATA, "PenData"),
    (CF_RIFF, "RiffAudio"),
    (CF_WAVE, "WaveAudio"),
    (CF_UNICODETEXT, "UnicodeText"),
    (CF_ENHMETAFILE, "EnhancedMetafile"),
    (CF_HDROP, "FileDrop"),
    (CF_LOCALE, "Locale"),
    (CF_DIBV5, "DeviceIndependentBitmapV5"),
];

/// Name of a predefined format
pub fn standard_format_name(id: u16) -> Option<&'static str> {
    STANDARD_FORMATS
        .iter()
        .find(|(std_id, _)| *std_id == id)
        .map(|(_, name)| *name)
}

/// Id of a predefined format, by name (case-insensitive)
pub fn standard_format_id(name: &str) -> Option<u16> {
    STANDARD_FORMATS
        .iter()
        .find(|(_, std_name)| std_name.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}

// =============================================================================
// Aspect and medium kinds
// =============================================================================

/// DVASPECT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    /// Full content rendering
    Content,
    /// Thumbnail
    Thumbnail,
    /// Icon
    Icon,
    /// Print preview
    DocPrint,
    /// Any other value a peer sent
    Other(u32),
}

impl Aspect {
    /// Wire value
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Content => 1,
            Self::Thumbnail => 2,
            Self::Icon => 4,
            Self::DocPrint => 8,
            Self::Other(raw) => raw,
        }
    }

    /// From wire value
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Content,
            2 => Self::Thumbnail,
            4 => Self::Icon,
            8 => Self::DocPrint,
            other => Self::Other(other),
        }
    }
}

/// TYMED: one concrete carrier for a payload
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediumKind {
    /// Global memory block
    HGlobal = 1,
    /// File on disk
    File = 2,
    /// IStream
    Stream = 4,
    /// IStorage
    Storage = 8,
    /// GDI object (HBITMAP)
    Gdi = 16,
    /// Metafile picture
    MetafilePict = 32,
    /// Enhanced metafile
    EnhancedMetafile = 64,
}

/// Media the bridge will offer presence checks for
pub const QUERYABLE_MEDIA: BitFlags<MediumKind> =
    make_bitflags!(MediumKind::{HGlobal | Stream | Gdi});

// =============================================================================
// Format descriptor
// =============================================================================

/// One requested representation of a payload (FORMATETC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Clipboard format id
    pub format_id: u16,
    /// Rendering aspect
    pub aspect: Aspect,
    /// DVTARGETDEVICE owned by the requester, passed through untouched
    pub target_device: Option<NonNull<c_void>>,
    /// Acceptable media
    pub medium: BitFlags<MediumKind>,
    /// Piece index, -1 for all
    pub index: i32,
}

impl FormatDescriptor {
    /// Content aspect, global-memory medium, all pieces
    pub fn new(format_id: u16) -> Self {
        Self {
            format_id,
            aspect: Aspect::Content,
            target_device: None,
            medium: MediumKind::HGlobal.into(),
            index: -1,
        }
    }

    /// Replace the acceptable media
    pub fn with_medium(mut self, medium: impl Into<BitFlags<MediumKind>>) -> Self {
        self.medium = medium.into();
        self
    }

    /// Replace the aspect
    pub fn with_aspect(mut self, aspect: Aspect) -> Self {
        self.aspect = aspect;
        self
    }

    /// Replace the format id
    pub fn with_format_id(mut self, format_id: u16) -> Self {
        self.format_id = format_id;
        self
    }

    /// Wire form
    pub fn to_raw(&self) -> FormatEtc {
        FormatEtc {
            cf_format: self.format_id,
            ptd: self.target_device.map_or(ptr::null_mut(), NonNull::as_ptr),
            dw_aspect: self.aspect.to_raw(),
            lindex: self.index,
            tymed: self.medium.bits(),
        }
    }

    /// From wire form. Unknown TYMED bits are dropped.
    pub fn from_raw(raw: &FormatEtc) -> Self {
        Self {
            format_id: raw.cf_format,
            aspect: Aspect::from_raw(raw.dw_aspect),
            target_device: NonNull::new(raw.ptd),
            medium: BitFlags::from_bits_truncate(raw.tymed),
            index: raw.lindex,
        }
    }
}

// =============================================================================
// Transfer medium
// =============================================================================

/// One concrete payload instance (STGMEDIUM).
///
/// If `release_owner` is set the payload belongs to that object and is freed
/// by releasing it; otherwise the holder owns the payload handle.
pub struct TransferMedium {
    kind: Option<MediumKind>,
    payload: *mut c_void,
    release_owner: Option<ComRef>,
}

impl TransferMedium {
    /// Payload carried in `kind`
    pub fn new(kind: MediumKind, payload: *mut c_void) -> Self {
        Self {
            kind: Some(kind),
            payload,
            release_owner: None,
        }
    }

    /// TYMED_NULL
    pub fn empty() -> Self {
        Self {
            kind: None,
            payload: ptr::null_mut(),
            release_owner: None,
        }
    }

    /// Attach the object through which the payload is released
    pub fn with_release_owner(mut self, owner: ComRef) -> Self {
        self.release_owner = Some(owner);
        self
    }

    /// Medium kind, `None` for TYMED_NULL
    pub fn kind(&self) -> Option<MediumKind> {
        self.kind
    }

    /// Raw payload handle
    pub fn payload(&self) -> *mut c_void {
        self.payload
    }

    /// Releasing owner, if the payload is not ours
    pub fn release_owner(&self) -> Option<&ComRef> {
        self.release_owner.as_ref()
    }

    /// Returns true for TYMED_NULL
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }

    /// Adopt a STGMEDIUM filled in by a peer, taking over its owner reference.
    /// A tymed that is not exactly one known bit is treated as TYMED_NULL.
    ///
    /// # Safety
    ///
    /// `raw.unk_for_release` must be null or a live interface pointer whose
    /// reference is transferred to the returned value.
    pub unsafe fn adopt(raw: StgMedium) -> Self {
        let kind = BitFlags::<MediumKind>::from_bits(raw.tymed)
            .ok()
            .and_then(BitFlags::exactly_one);
        // SAFETY: guaranteed by caller.
        let release_owner = unsafe { ComRef::from_raw(raw.unk_for_release) };
        Self {
            kind,
            payload: raw.data,
            release_owner,
        }
    }

    /// Wire view; the owner reference stays with `self`.
    pub fn as_raw(&self) -> StgMedium {
        StgMedium {
            tymed: self.kind.map_or(0, |k| k as u32),
            data: self.payload,
            unk_for_release: self.release_owner.as_ref().map_or(ptr::null_mut(), ComRef::as_raw),
        }
    }

    /// Wire form carrying the owner reference to the receiver.
    pub fn into_raw(self) -> StgMedium {
        StgMedium {
            tymed: self.kind.map_or(0, |k| k as u32),
            data: self.payload,
            unk_for_release: self.release_owner.map_or(ptr::null_mut(), ComRef::into_raw),
        }
    }
}

impl fmt::Debug for TransferMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferMedium")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("release_owner", &self.release_owner.is_some())
            .finish()
    }
}

// =============================================================================
// Format registry
// =============================================================================

/// Maps between registered format names and numeric ids.
pub trait FormatRegistry: Send + Sync {
    /// Name registered for `id`
    fn format_name(&self, id: u16) -> Option<String>;

    /// Register `name` (or look it up if already registered)
    fn register_format(&self, name: &str) -> Option<u16>;

    /// Canonical id for `id`.
    ///
    /// Predefined ids are their own canonical form. Any other id is looked up
    /// by name and re-registered. An id with no name is kept as is and never
    /// registers anything.
    fn canonical_id(&self, id: u16) -> u16 {
        if standard_format_name(id).is_some() {
            return id;
        }
        let Some(name) = self.format_name(id) else {
            return id;
        };
        let canonical = self.register_format(&name).unwrap_or(id);
        trace!("Canonical format for {} ({}) is {}", id, name, canonical);
        canonical
    }
}

#[derive(Debug, Default)]
struct FormatTableInner {
    by_name: HashMap<String, u16>,
    by_id: HashMap<u16, String>,
    next: u16,
}

/// In-process format registry.
///
/// Behaves like the system registry for one session: predefined formats keep
/// their ids, new names get ids from [`FIRST_REGISTERED_FORMAT`] upward.
#[derive(Debug)]
pub struct FormatTable {
    inner: RwLock<FormatTableInner>,
}

impl FormatTable {
    /// Empty table (predefined formats are always known)
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FormatTableInner {
                next: FIRST_REGISTERED_FORMAT,
                ..Default::default()
            }),
        }
    }

    /// Number of registered (non-predefined) formats
    pub fn registered_count(&self) -> usize {
        self.inner.read().by_id.len()
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry for FormatTable {
    fn format_name(&self, id: u16) -> Option<String> {
        if let Some(name) = standard_format_name(id) {
            return Some(name.to_string());
        }
        self.inner.read().by_id.get(&id).cloned()
    }

    fn register_format(&self, name: &str) -> Option<u16> {
        if name.is_empty() {
            return None;
        }
        if let Some(id) = standard_format_id(name) {
            return Some(id);
        }
        let key = name.to_ascii_lowercase();
        if let Some(id) = self.inner.read().by_name.get(&key) {
            return Some(*id);
        }

        let mut inner = self.inner.write();
        if let Some(id) = inner.by_name.get(&key) {
            return Some(*id);
        }
        let id = inner.next;
        inner.next = id.checked_add(1)?;
        inner.by_name.insert(key, id);
        inner.by_id.insert(id, name.to_string());
        Some(id)
    }
}
