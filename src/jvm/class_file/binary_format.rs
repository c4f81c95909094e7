use super::{ClassId, ConstantId, ConstantIndices, ConstantPool, NameAndTypeId, Utf8Id};
use crate::jvm::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result};

/// Utility trait for serializing plain data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///   - most structures refer to constants, so they need the constant pool (see [`Encode`])
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Counterpart of [`Serialize`]
pub trait Deserialize: Sized {
    /// Deserialize construct from a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self>;
}

/// Serializing structures that refer to constants by their pool index
pub trait Encode: Sized {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W)
        -> std::result::Result<(), Error>;
}

/// Deserializing structures that refer to constants by their pool index
pub trait Decode: Sized {
    fn decode<R: ReadBytesExt>(pool: &ConstantPool, reader: &mut R)
        -> std::result::Result<Self, Error>;
}

macro_rules! primitive_binary_format {
    ($($typ:ty => $write:ident, $read:ident);* $(;)?) => {
        $(
            impl Serialize for $typ {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }

            impl Deserialize for $typ {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                    reader.$read::<BigEndian>()
                }
            }
        )*
    };
}

primitive_binary_format! {
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        reader.read_u8()
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Deserialize for i8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
        reader.read_i8()
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Encode> Encode for Vec<A> {
    fn encode<W: WriteBytesExt>(
        &self,
        indices: &ConstantIndices,
        writer: &mut W,
    ) -> std::result::Result<(), Error> {
        to_u16("sequence length", self.len())?.serialize(writer)?;
        for elem in self {
            elem.encode(indices, writer)?;
        }
        Ok(())
    }
}

impl<A: Decode> Decode for Vec<A> {
    fn decode<R: ReadBytesExt>(
        pool: &ConstantPool,
        reader: &mut R,
    ) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::decode(pool, reader)?);
        }
        Ok(elems)
    }
}

/// Constant handles are written as their index in the laid out pool
macro_rules! constant_binary_format {
    ($($typ:ty => $lookup:ident),*) => {
        $(
            impl Encode for $typ {
                fn encode<W: WriteBytesExt>(
                    &self,
                    indices: &ConstantIndices,
                    writer: &mut W,
                ) -> std::result::Result<(), Error> {
                    indices.index_of(*self)?.serialize(writer)?;
                    Ok(())
                }
            }

            impl Decode for $typ {
                fn decode<R: ReadBytesExt>(
                    pool: &ConstantPool,
                    reader: &mut R,
                ) -> std::result::Result<Self, Error> {
                    pool.$lookup(u16::deserialize(reader)?)
                }
            }
        )*
    };
}

constant_binary_format!(
    ConstantId => id_at,
    Utf8Id => utf8_at,
    ClassId => class_at,
    NameAndTypeId => name_and_type_at
);

/// Read exactly `len` bytes
///
/// The buffer grows as bytes arrive, so a corrupt length cannot trigger a huge allocation.
pub fn read_bytes<R: ReadBytesExt>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![];
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() == len {
        Ok(bytes)
    } else {
        Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
    }
}

/// Narrow a length or offset to the `u16` the class file stores it in
pub fn to_u16(what: &'static str, value: usize) -> std::result::Result<u16, Error> {
    u16::try_from(value).map_err(|_| Error::ValueOutOfRange {
        what,
        value: value as i64,
    })
}

/// Narrow a length to the `u32` the class file stores it in
pub fn to_u32(what: &'static str, value: usize) -> std::result::Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::ValueOutOfRange {
        what,
        value: value as i64,
    })
}
