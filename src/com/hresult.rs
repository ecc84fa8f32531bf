//! Signed 32-bit status codes.
//!
//! Non-negative values are success (including informational codes such as
//! `S_FALSE`), negative values are failures.

use std::fmt;

/// A COM status code.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

/// Outcome of a successful status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// `S_OK`
    Done,
    /// Any other non-negative code (`S_FALSE`, "already initialized", ...)
    Informational(HResult),
}

impl Completion {
    /// Returns true if the call reported an informational code.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::Informational(_))
    }

    /// The status code the call returned.
    pub fn status(&self) -> HResult {
        match self {
            Self::Done => HResult::S_OK,
            Self::Informational(hr) => *hr,
        }
    }
}

const fn code(value: u32) -> HResult {
    HResult(value as i32)
}

impl HResult {
    /// Operation succeeded
    pub const S_OK: Self = code(0);
    /// Operation succeeded with a "false" / "already done" meaning
    pub const S_FALSE: Self = code(1);

    /// Not implemented
    pub const E_NOTIMPL: Self = code(0x8000_4001);
    /// No such interface supported
    pub const E_NOINTERFACE: Self = code(0x8000_4002);
    /// Invalid pointer
    pub const E_POINTER: Self = code(0x8000_4003);
    /// Unspecified failure
    pub const E_FAIL: Self = code(0x8000_4005);
    /// Catastrophic failure
    pub const E_UNEXPECTED: Self = code(0x8000_FFFF);
    /// Ran out of memory
    pub const E_OUTOFMEMORY: Self = code(0x8007_000E);
    /// One or more arguments are invalid
    pub const E_INVALIDARG: Self = code(0x8007_0057);

    /// Invalid FORMATETC structure
    pub const DV_E_FORMATETC: Self = code(0x8004_0064);
    /// Invalid TYMED
    pub const DV_E_TYMED: Self = code(0x8004_0069);
    /// Invalid DVASPECT
    pub const DV_E_DVASPECT: Self = code(0x8004_006B);

    /// OpenClipboard failed (another process holds the clipboard)
    pub const CLIPBRD_E_CANT_OPEN: Self = code(0x8004_01D0);
    /// CoInitialize has not been called
    pub const CO_E_NOTINITIALIZED: Self = code(0x8004_01F0);
    /// Cannot change thread mode after it is set
    pub const RPC_E_CHANGED_MODE: Self = code(0x8001_0106);
    /// The object invoked has disconnected from its clients
    pub const RPC_E_DISCONNECTED: Self = code(0x8001_0108);
    /// Interface was marshalled for a different thread
    pub const RPC_E_WRONG_THREAD: Self = code(0x8001_010E);

    /// Non-negative status
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Negative status
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Split into success (with optional informational code) or failure.
    pub fn check(self) -> Result<Completion, HResult> {
        match self {
            Self::S_OK => Ok(Completion::Done),
            hr if hr.is_success() => Ok(Completion::Informational(hr)),
            hr => Err(hr),
        }
    }

    /// Raw code as the unsigned hex form used in documentation
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Symbolic name for codes this crate knows
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::DV_E_FORMATETC => "DV_E_FORMATETC",
            Self::DV_E_TYMED => "DV_E_TYMED",
            Self::DV_E_DVASPECT => "DV_E_DVASPECT",
            Self::CLIPBRD_E_CANT_OPEN => "CLIPBRD_E_CANT_OPEN",
            Self::CO_E_NOTINITIALIZED => "CO_E_NOTINITIALIZED",
            Self::RPC_E_CHANGED_MODE => "RPC_E_CHANGED_MODE",
            Self::RPC_E_DISCONNECTED => "RPC_E_DISCONNECTED",
            Self::RPC_E_WRONG_THREAD => "RPC_E_WRONG_THREAD",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "HRESULT {} [0x{:08X} ({})]", name, self.as_u32(), self.0),
            None => write!(f, "HRESULT [0x{:08X} ({})]", self.as_u32(), self.0),
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
