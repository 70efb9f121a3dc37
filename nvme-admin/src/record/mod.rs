//! Decoders for the fixed layout data structures returned by admin commands
//!
//! Every record is described by a field table of `(name, offset, width,
//! encoding)` entries, generated together with the record struct by
//! [record_layout]. Decoding never zero fills: a buffer shorter than the
//! structure is a [MalformedPayload](crate::AdminError::MalformedPayload).

use core::fmt;

use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize, Serializer,
};

use crate::{AdminError, Result};

mod feature;
mod identify;
mod smart;

pub use feature::*;
pub use identify::*;
pub use smart::*;

/// How a field is stored on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// unsigned little endian integer of the field width
    UnsignedLe,
    /// a single byte
    Byte,
    /// fixed length ascii, right trimmed of NUL and whitespace
    Ascii,
}

/// One entry of a record's field table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// descriptive name
    pub name: &'static str,
    /// NVMe short form name
    pub short: &'static str,
    /// byte offset into the structure
    pub offset: usize,
    /// width in bytes
    pub width: usize,
    /// wire encoding
    pub encoding: Encoding,
}

/// A type that can be decoded from a fixed width slice of a record
pub trait FieldType: Sized {
    /// number of bytes the field occupies
    const WIDTH: usize;
    /// wire encoding
    const ENCODING: Encoding;

    /// Decode from exactly [Self::WIDTH] bytes.
    ///
    /// `name` is only used for diagnostics.
    fn decode(name: &str, bytes: &[u8]) -> Self;

    /// the value for a [RecordMap]
    fn to_value(&self) -> FieldValue;
}

impl FieldType for u8 {
    const WIDTH: usize = 1;
    const ENCODING: Encoding = Encoding::Byte;

    fn decode(_name: &str, bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Uint(*self as u128)
    }
}

macro_rules! le_uint_field {
    ($($ty:ty),*) => {
        $(
            impl FieldType for $ty {
                const WIDTH: usize = core::mem::size_of::<$ty>();
                const ENCODING: Encoding = Encoding::UnsignedLe;

                fn decode(_name: &str, bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                fn to_value(&self) -> FieldValue {
                    FieldValue::Uint(*self as u128)
                }
            }
        )*
    };
}

le_uint_field!(u16, u32, u64, u128);

/// 3 byte little endian integer, e.g. the IEEE OUI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct U24(pub u32);

impl FieldType for U24 {
    const WIDTH: usize = 3;
    const ENCODING: Encoding = Encoding::UnsignedLe;

    fn decode(_name: &str, bytes: &[u8]) -> Self {
        U24(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Uint(self.0 as u128)
    }
}

/// Fixed width ascii field
///
/// Decoding is lossy: bytes that are not ascii are replaced and a warning is
/// logged, the record is still decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AsciiString<const N: usize>(String);

impl<const N: usize> AsciiString<N> {
    /// the trimmed string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> core::ops::Deref for AsciiString<N> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const N: usize> fmt::Display for AsciiString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> FieldType for AsciiString<N> {
    const WIDTH: usize = N;
    const ENCODING: Encoding = Encoding::Ascii;

    fn decode(name: &str, bytes: &[u8]) -> Self {
        if !bytes.is_ascii() {
            log::warn!("field {name} is not valid ascii, decoding lossy: {bytes:02x?}");
        }
        let text = String::from_utf8_lossy(bytes);
        AsciiString(
            text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_owned(),
        )
    }

    fn to_value(&self) -> FieldValue {
        FieldValue::Text(self.0.clone())
    }
}

/// Which names a [RecordMap] uses as keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// descriptive field names
    #[default]
    Long,
    /// NVMe short form abbreviations
    Short,
}

impl KeyStyle {
    /// pick `long` or `short`
    pub fn pick(self, long: &'static str, short: &'static str) -> &'static str {
        match self {
            KeyStyle::Long => long,
            KeyStyle::Short => short,
        }
    }
}

/// Value of a single decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// any integer field
    Uint(u128),
    /// a flag
    Bool(bool),
    /// ascii fields and hex formatted values
    Text(String),
    /// nested records, e.g. the LBA formats of a namespace
    List(Vec<RecordMap>),
}

impl FieldValue {
    /// the integer value, if this is an integer
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Uint(v) => match u64::try_from(*v) {
                Ok(v) => serializer.serialize_u64(v),
                Err(_) => serializer.serialize_u128(*v),
            },
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
            FieldValue::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for map in list {
                    seq.serialize_element(map)?;
                }
                seq.end()
            }
        }
    }
}

/// Ordered field name to value mapping of a decoded record
///
/// Serializes as a map, keeping the wire order of the fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordMap(Vec<(&'static str, FieldValue)>);

impl RecordMap {
    /// empty map with room for `capacity` fields
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// append a field
    pub fn push(&mut self, key: &'static str, value: FieldValue) {
        self.0.push((key, value));
    }

    /// look up a field by key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// iterate over all fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    /// number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RecordMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Fail with [AdminError::MalformedPayload] if `buf` is shorter than `size`
pub(crate) fn ensure_len(buf: &[u8], size: usize, record: &str) -> Result<()> {
    if buf.len() < size {
        return Err(AdminError::MalformedPayload(format!(
            "{record} needs {size} bytes, got {}",
            buf.len()
        )));
    }
    Ok(())
}

/// Declare a fixed size record together with its field table.
///
/// Each field is `name / "short": Type = offset`, where `Type` implements
/// [FieldType]. Generates `SIZE`, `FIELDS`, `decode` and `to_map`.
macro_rules! record_layout {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident: $size:literal {
            $(
                $(#[$field_meta:meta])*
                $field:ident / $short:literal : $ty:ty = $offset:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                #[doc = ""]
                #[doc = concat!("Short form: `", $short, "`, offset ", stringify!($offset))]
                pub $field: $ty,
            )*
        }

        impl $name {
            /// Size in bytes of the structure
            pub const SIZE: usize = $size;

            /// Field table in wire order
            pub const FIELDS: &'static [$crate::record::Field] = &[
                $(
                    $crate::record::Field {
                        name: stringify!($field),
                        short: $short,
                        offset: $offset,
                        width: <$ty as $crate::record::FieldType>::WIDTH,
                        encoding: <$ty as $crate::record::FieldType>::ENCODING,
                    },
                )*
            ];

            /// Decode from `buf`, which must hold at least [Self::SIZE] bytes
            pub fn decode(buf: &[u8]) -> $crate::Result<Self> {
                $crate::record::ensure_len(buf, Self::SIZE, stringify!($name))?;
                Ok(Self {
                    $(
                        $field: <$ty as $crate::record::FieldType>::decode(
                            stringify!($field),
                            &buf[$offset..$offset + <$ty as $crate::record::FieldType>::WIDTH],
                        ),
                    )*
                })
            }

            /// Flat key value view of the record
            pub fn to_map(&self, style: $crate::record::KeyStyle) -> $crate::record::RecordMap {
                let mut map = $crate::record::RecordMap::with_capacity(Self::FIELDS.len());
                $(
                    map.push(
                        style.pick(stringify!($field), $short),
                        $crate::record::FieldType::to_value(&self.$field),
                    );
                )*
                map
            }
        }

        $(
            static_assertions::const_assert!(
                $offset + <$ty as $crate::record::FieldType>::WIDTH <= $size
            );
        )*
    };
}
pub(crate) use record_layout;
