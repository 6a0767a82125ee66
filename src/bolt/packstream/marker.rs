//! PackStream marker bytes and the marker classification table.
//!
//! Every PackStream value starts with one marker byte. The high nibble of
//! the tiny forms carries the type and the low nibble carries a size of up
//! to 15; all other markers announce a fixed-width size or payload that
//! follows.

pub const NULL: u8 = 0xC0;
pub const FLOAT_64: u8 = 0xC1;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;

pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

pub const TINY_STRING: u8 = 0x80;
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

pub const TINY_LIST: u8 = 0x90;
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

pub const TINY_MAP: u8 = 0xA0;
pub const MAP_8: u8 = 0xD8;
pub const MAP_16: u8 = 0xD9;
pub const MAP_32: u8 = 0xDA;

pub const TINY_STRUCT: u8 = 0xB0;

/// Largest size that fits in the low nibble of a tiny marker.
pub const TINY_MAX: usize = 15;

/// Range of integers packed directly into the marker byte.
pub const TINY_INT_RANGE: std::ops::RangeInclusive<i64> = -16..=127;

/// Width in bytes of an explicit size or integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    /// Number of bytes occupied by a field of this width.
    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    /// Smallest width able to carry `len` as an unsigned 8/16/32-bit size.
    pub fn for_size(len: usize) -> Option<Width> {
        if len <= u8::MAX as usize {
            Some(Width::W8)
        } else if len <= u16::MAX as usize {
            Some(Width::W16)
        } else if len <= i32::MAX as usize {
            Some(Width::W32)
        } else {
            None
        }
    }
}

/// How the size of a sized container is announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// Size carried in the marker's low nibble.
    Tiny(usize),
    /// Size follows the marker as a big-endian field.
    Explicit(Width),
}

/// Decoded meaning of a marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Null,
    Boolean(bool),
    TinyInt(i8),
    Int(Width),
    Float,
    Bytes(Width),
    String(Size),
    List(Size),
    Map(Size),
    Struct(usize),
    Reserved(u8),
}

impl Marker {
    /// Classify a marker byte.
    pub fn classify(byte: u8) -> Marker {
        match byte {
            0x00..=0x7F | 0xF0..=0xFF => Marker::TinyInt(byte as i8),
            0x80..=0x8F => Marker::String(Size::Tiny((byte & 0x0F) as usize)),
            0x90..=0x9F => Marker::List(Size::Tiny((byte & 0x0F) as usize)),
            0xA0..=0xAF => Marker::Map(Size::Tiny((byte & 0x0F) as usize)),
            0xB0..=0xBF => Marker::Struct((byte & 0x0F) as usize),
            NULL => Marker::Null,
            FLOAT_64 => Marker::Float,
            FALSE => Marker::Boolean(false),
            TRUE => Marker::Boolean(true),
            INT_8 => Marker::Int(Width::W8),
            INT_16 => Marker::Int(Width::W16),
            INT_32 => Marker::Int(Width::W32),
            INT_64 => Marker::Int(Width::W64),
            BYTES_8 => Marker::Bytes(Width::W8),
            BYTES_16 => Marker::Bytes(Width::W16),
            BYTES_32 => Marker::Bytes(Width::W32),
            STRING_8 => Marker::String(Size::Explicit(Width::W8)),
            STRING_16 => Marker::String(Size::Explicit(Width::W16)),
            STRING_32 => Marker::String(Size::Explicit(Width::W32)),
            LIST_8 => Marker::List(Size::Explicit(Width::W8)),
            LIST_16 => Marker::List(Size::Explicit(Width::W16)),
            LIST_32 => Marker::List(Size::Explicit(Width::W32)),
            MAP_8 => Marker::Map(Size::Explicit(Width::W8)),
            MAP_16 => Marker::Map(Size::Explicit(Width::W16)),
            MAP_32 => Marker::Map(Size::Explicit(Width::W32)),
            other => Marker::Reserved(other),
        }
    }
}

/// Explicit-size marker for a container family, given its chosen width.
pub(crate) fn sized_marker(base_8: u8, width: Width) -> u8 {
    match width {
        Width::W8 => base_8,
        Width::W16 => base_8 + 1,
        _ => base_8 + 2,
    }
}
