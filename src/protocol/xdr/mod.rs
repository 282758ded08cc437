//! The XDR (External Data Representation) module defines data structures and methods
//! for serializing/deserializing data according to RFC 1832 standard.
//!
//! XDR provides machine-independent data representation format,
//! which is critical for network protocols like NFS.
//!
//! Every wire type implements [`Serialize`] and/or [`Deserialize`]; the free
//! function [`deserialize`] is the usual entry point for reading a value out
//! of an RPC argument stream.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::cast::{FromPrimitive, ToPrimitive};

pub mod mount;
pub mod nfs3;
pub mod portmap;
pub mod rpc;

/// Type alias for the standard endianness used in XDR serialization (Big Endian).
pub type XDREndian = BigEndian;

/// Serializes the implementing type to the provided writer, per RFC 1832.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// Deserializes data from the provided reader into the implementing type.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Reads a `T` out of `src` by deserializing into its `Default` value.
///
/// This is the usual way procedure handlers pull typed arguments out of the
/// RPC call's argument stream: `let handle = deserialize::<nfs3::nfs_fh3>(input)?;`
pub fn deserialize<T: Default + Deserialize>(src: &mut impl Read) -> std::io::Result<T> {
    let mut t = T::default();
    t.deserialize(src)?;
    Ok(t)
}

fn invalid_enum_value(type_name: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("Invalid value for {type_name}"))
}

/// Marker trait for C-like enums that serialize as a 4-byte big endian
/// discriminant (RFC 1832 section 4.3). Implement with `impl SerializeEnum
/// for Type {}` directly, or via the [`SerializeEnum!`] macro - both forms
/// are equivalent and this module provides the blanket [`Serialize`] impl
/// either way.
pub trait SerializeEnum: Copy + ToPrimitive {}

/// Marker trait for C-like enums that deserialize from a 4-byte big endian
/// discriminant. See [`SerializeEnum`].
pub trait DeserializeEnum: FromPrimitive {}

impl<T: SerializeEnum> Serialize for T {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(self.to_u32().unwrap_or(0))
    }
}

impl<T: DeserializeEnum + Default> Deserialize for T {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let raw = src.read_u32::<XDREndian>()?;
        *self = T::from_u32(raw).ok_or_else(|| invalid_enum_value(std::any::type_name::<T>()))?;
        Ok(())
    }
}

/// Macro form of `impl SerializeEnum for $t {}`.
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl $crate::xdr::SerializeEnum for $t {}
    };
}

/// Macro form of `impl DeserializeEnum for $t {}`.
#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl $crate::xdr::DeserializeEnum for $t {}
    };
}

/// Serialization for boolean values.
///
/// Booleans are serialized as 4-byte big endian integers
/// where 0 represents false and any non-zero value represents true.
impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self as u32)
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()? > 0;
        Ok(())
    }
}

/// Serialization for 32-bit signed integers, as 4-byte big endian values.
impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XDREndian>(*self)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XDREndian>()?;
        Ok(())
    }
}

/// Serialization for 64-bit signed integers, as 8-byte big endian values.
impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XDREndian>(*self)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XDREndian>()?;
        Ok(())
    }
}

/// Serialization for 32-bit unsigned integers, as 4-byte big endian values.
impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XDREndian>(*self)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XDREndian>()?;
        Ok(())
    }
}

/// Serialization for 64-bit unsigned integers, as 8-byte big endian values.
impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XDREndian>(*self)
    }
}

impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XDREndian>()?;
        Ok(())
    }
}

/// Fixed-size byte arrays are serialized as their raw bytes, with no length
/// prefix and no padding (the caller is responsible for choosing an `N`
/// that is already 4-byte aligned, as every fixed-size opaque type in this
/// protocol does).
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)
    }
}

/// Variable-length data is serialized with a 4-byte length prefix,
/// followed by the actual data, and padded to a multiple of 4 bytes.
impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        let length = self.len() as u32;
        length.serialize(dest)?;
        dest.write_all(self)?;
        let pad = ((4 - length % 4) % 4) as usize;
        let zeros: [u8; 4] = [0, 0, 0, 0];
        if pad > 0 {
            dest.write_all(&zeros[..pad])?;
        }
        Ok(())
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)?;
        self.resize(length as usize, 0);
        src.read_exact(self)?;
        let pad = ((4 - length % 4) % 4) as usize;
        let mut zeros: [u8; 4] = [0, 0, 0, 0];
        src.read_exact(&mut zeros[..pad])?;
        Ok(())
    }
}

/// Vectors of 32-bit unsigned integers are serialized as a 4-byte length
/// prefix followed by that many 4-byte integers.
impl Serialize for Vec<u32> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        assert!(self.len() < u32::MAX as usize);
        let length = self.len() as u32;
        length.serialize(dest)?;
        for i in self {
            i.serialize(dest)?;
        }
        Ok(())
    }
}

impl Deserialize for Vec<u32> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<u32>(src)?;
        self.resize(length as usize, 0);
        for i in self.iter_mut() {
            *i = deserialize::<u32>(src)?;
        }
        Ok(())
    }
}

/// Serializes every named field of a struct in declaration order. The
/// struct must already implement `Default` (for the matching
/// [`DeserializeStruct!`] impl) since fields are deserialized in place.
#[macro_export]
macro_rules! SerializeStruct {
    ($t:ident, $($element:ident),* $(,)?) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $($crate::xdr::Serialize::serialize(&self.$element, dest)?;)*
                Ok(())
            }
        }
    };
}

/// Deserializes every named field of a struct in declaration order.
#[macro_export]
macro_rules! DeserializeStruct {
    ($t:ident, $($element:ident),* $(,)?) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $($crate::xdr::Deserialize::deserialize(&mut self.$element, src)?;)*
                Ok(())
            }
        }
    };
}

/// Serialization for XDR unions where a boolean discriminant selects between
/// a void (empty) case and a case containing a value of some type.
///
/// # Example
/// ```ignore
/// enum pre_op_attr {
///     Void,
///     attributes(wcc_attr),
/// }
/// SerializeBoolUnion!(pre_op_attr, attributes, wcc_attr);
/// DeserializeBoolUnion!(pre_op_attr, attributes, wcc_attr);
/// ```
#[macro_export]
macro_rules! SerializeBoolUnion {
    ($t:ident, $enumcase:ident, $enumtype:ty) => {
        impl $crate::xdr::Serialize for $t {
            fn serialize<W: std::io::Write>(&self, dest: &mut W) -> std::io::Result<()> {
                match self {
                    $t::Void => {
                        $crate::xdr::Serialize::serialize(&false, dest)?;
                    }
                    $t::$enumcase(v) => {
                        $crate::xdr::Serialize::serialize(&true, dest)?;
                        $crate::xdr::Serialize::serialize(v, dest)?;
                    }
                }
                Ok(())
            }
        }
    };
}

/// Deserialization for the boolean-discriminated union described in
/// [`SerializeBoolUnion!`].
#[macro_export]
macro_rules! DeserializeBoolUnion {
    ($t:ident, $enumcase:ident, $enumtype:ty) => {
        impl $crate::xdr::Deserialize for $t {
            fn deserialize<R: std::io::Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let mut present: bool = false;
                $crate::xdr::Deserialize::deserialize(&mut present, src)?;
                if present {
                    let mut v = <$enumtype>::default();
                    $crate::xdr::Deserialize::deserialize(&mut v, src)?;
                    *self = $t::$enumcase(v);
                } else {
                    *self = $t::Void;
                }
                Ok(())
            }
        }
    };
}

// Re-export the macros so `use super::*;`/`use crate::xdr::...` inside the
// submodules below sees them alongside the `Serialize`/`Deserialize` traits.
pub use crate::{
    DeserializeBoolUnion, DeserializeEnum, DeserializeStruct, SerializeBoolUnion, SerializeEnum,
    SerializeStruct,
};
