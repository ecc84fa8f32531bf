//! Interface identifiers.

use std::fmt;

/// 128-bit GUID in the Windows in-memory layout.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    /// First 8 hex digits
    pub data1: u32,
    /// Next 4 hex digits
    pub data2: u16,
    /// Next 4 hex digits
    pub data3: u16,
    /// Remaining 16 hex digits, in textual order
    pub data4: [u8; 8],
}

impl Guid {
    /// Build from the textual form read as one big-endian number,
    /// e.g. `0x0000010e_0000_0000_c000_000000000046`.
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }
}

/// IUnknown
pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_c000_000000000046);

/// IDataObject
pub const IID_IDATAOBJECT: Guid = Guid::from_u128(0x0000010e_0000_0000_c000_000000000046);

/// IAgileReference
pub const IID_IAGILEREFERENCE: Guid = Guid::from_u128(0xc03f6a43_65a4_9818_987e_e0b810d2a6f2);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
