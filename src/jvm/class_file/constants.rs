use super::{ConstantIndices, ConstantPool, Encode, Serialize};
use crate::jvm::Error;
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_POOL_TAG: AtomicU32 = AtomicU32::new(0);

/// Identity of a constant pool, unique within the process
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PoolTag(u32);

impl PoolTag {
    pub(super) fn fresh() -> PoolTag {
        PoolTag(NEXT_POOL_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle on a constant registered in a [`ConstantPool`]
///
/// This is not the index of the constant: indices are only decided when the pool is laid out (see
/// [`ConstantPool::resolve_indices`]). A handle is only meaningful for the pool that issued it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ConstantId {
    pool: PoolTag,
    slot: u32,
}

impl ConstantId {
    pub(super) fn new(pool: PoolTag, slot: usize) -> ConstantId {
        ConstantId {
            pool,
            slot: slot as u32,
        }
    }

    pub(super) fn pool(&self) -> PoolTag {
        self.pool
    }

    pub(super) fn slot(&self) -> usize {
        self.slot as usize
    }
}

macro_rules! typed_constant_id {
    ($($(#[$doc:meta])* $name:ident;)*) => {
        $(
            $(#[$doc])*
            #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
            pub struct $name(pub(super) ConstantId);

            impl From<$name> for ConstantId {
                fn from(id: $name) -> ConstantId {
                    id.0
                }
            }
        )*
    };
}

typed_constant_id! {
    /// Handle on a `CONSTANT_Utf8_info`
    Utf8Id;

    /// Handle on a `CONSTANT_Class_info`
    ClassId;

    /// Handle on a `CONSTANT_NameAndType_info`
    NameAndTypeId;
}

/// Constants as in the constant pool
///
/// Equality and hashing are structural. Since sub-constants are interned, comparing the handles of
/// two sub-constants from the same pool is the same as comparing the constants themselves.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConstantInfo {
    /// Constant string value
    ///
    /// Stored decoded, and only turned back into modified UTF-8 when written.
    Utf8(String),

    /// Constant string value holding unpaired surrogates
    ///
    /// Same tag as [`ConstantInfo::Utf8`]. Obfuscators emit these, and since they have no `String`
    /// form the UTF-16 code units are kept as-is.
    Utf16(Vec<u16>),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`, as raw IEEE 754 bits
    Float(u32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`, as raw IEEE 754 bits
    Double(u64),

    /// Class or an interface (or an array type, in descriptor form)
    Class(Utf8Id),

    /// Constant object of type `java.lang.String`
    String(Utf8Id),

    FieldRef {
        class: ClassId,
        name_and_type: NameAndTypeId,
    },

    MethodRef {
        class: ClassId,
        name_and_type: NameAndTypeId,
    },

    InterfaceMethodRef {
        class: ClassId,
        name_and_type: NameAndTypeId,
    },

    /// Name and a type (eg. for a field or a method)
    NameAndType { name: Utf8Id, descriptor: Utf8Id },

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        kind: HandleKind,

        /// Field reference for the field kinds, method or interface method reference otherwise
        reference: ConstantId,
    },

    /// Constant object of type `java.lang.invoke.MethodType`
    MethodType { descriptor: Utf8Id },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeId,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeId,
    },

    Module(Utf8Id),

    Package(Utf8Id),
}

impl ConstantInfo {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;

    /// Tag byte that starts the serialized constant
    pub fn tag(&self) -> u8 {
        match self {
            ConstantInfo::Utf8(_) | ConstantInfo::Utf16(_) => Self::UTF8,
            ConstantInfo::Integer(_) => Self::INTEGER,
            ConstantInfo::Float(_) => Self::FLOAT,
            ConstantInfo::Long(_) => Self::LONG,
            ConstantInfo::Double(_) => Self::DOUBLE,
            ConstantInfo::Class(_) => Self::CLASS,
            ConstantInfo::String(_) => Self::STRING,
            ConstantInfo::FieldRef { .. } => Self::FIELD_REF,
            ConstantInfo::MethodRef { .. } => Self::METHOD_REF,
            ConstantInfo::InterfaceMethodRef { .. } => Self::INTERFACE_METHOD_REF,
            ConstantInfo::NameAndType { .. } => Self::NAME_AND_TYPE,
            ConstantInfo::MethodHandle { .. } => Self::METHOD_HANDLE,
            ConstantInfo::MethodType { .. } => Self::METHOD_TYPE,
            ConstantInfo::Dynamic { .. } => Self::DYNAMIC,
            ConstantInfo::InvokeDynamic { .. } => Self::INVOKE_DYNAMIC,
            ConstantInfo::Module(_) => Self::MODULE,
            ConstantInfo::Package(_) => Self::PACKAGE,
        }
    }

    /// Handles of the constants this one refers to
    pub fn references(&self) -> Vec<ConstantId> {
        match self {
            ConstantInfo::Utf8(_)
            | ConstantInfo::Utf16(_)
            | ConstantInfo::Integer(_)
            | ConstantInfo::Float(_)
            | ConstantInfo::Long(_)
            | ConstantInfo::Double(_) => vec![],
            ConstantInfo::Class(name)
            | ConstantInfo::String(name)
            | ConstantInfo::MethodType { descriptor: name }
            | ConstantInfo::Module(name)
            | ConstantInfo::Package(name) => vec![name.0],
            ConstantInfo::FieldRef {
                class,
                name_and_type,
            }
            | ConstantInfo::MethodRef {
                class,
                name_and_type,
            }
            | ConstantInfo::InterfaceMethodRef {
                class,
                name_and_type,
            } => vec![class.0, name_and_type.0],
            ConstantInfo::NameAndType { name, descriptor } => vec![name.0, descriptor.0],
            ConstantInfo::MethodHandle { reference, .. } => vec![*reference],
            ConstantInfo::Dynamic { name_and_type, .. }
            | ConstantInfo::InvokeDynamic { name_and_type, .. } => vec![name_and_type.0],
        }
    }

    /// Copy of this constant whose references point at equivalent constants in `to`
    fn copy_references(&self, from: &ConstantPool, to: &mut ConstantPool) -> Result<Self, Error> {
        let copied = match self {
            ConstantInfo::Utf8(_)
            | ConstantInfo::Utf16(_)
            | ConstantInfo::Integer(_)
            | ConstantInfo::Float(_)
            | ConstantInfo::Long(_)
            | ConstantInfo::Double(_) => self.clone(),
            ConstantInfo::Class(name) => ConstantInfo::Class(name.copy_to(from, to)?),
            ConstantInfo::String(string) => ConstantInfo::String(string.copy_to(from, to)?),
            ConstantInfo::FieldRef {
                class,
                name_and_type,
            } => ConstantInfo::FieldRef {
                class: class.copy_to(from, to)?,
                name_and_type: name_and_type.copy_to(from, to)?,
            },
            ConstantInfo::MethodRef {
                class,
                name_and_type,
            } => ConstantInfo::MethodRef {
                class: class.copy_to(from, to)?,
                name_and_type: name_and_type.copy_to(from, to)?,
            },
            ConstantInfo::InterfaceMethodRef {
                class,
                name_and_type,
            } => ConstantInfo::InterfaceMethodRef {
                class: class.copy_to(from, to)?,
                name_and_type: name_and_type.copy_to(from, to)?,
            },
            ConstantInfo::NameAndType { name, descriptor } => ConstantInfo::NameAndType {
                name: name.copy_to(from, to)?,
                descriptor: descriptor.copy_to(from, to)?,
            },
            ConstantInfo::MethodHandle { kind, reference } => ConstantInfo::MethodHandle {
                kind: *kind,
                reference: reference.copy_to(from, to)?,
            },
            ConstantInfo::MethodType { descriptor } => ConstantInfo::MethodType {
                descriptor: descriptor.copy_to(from, to)?,
            },
            ConstantInfo::Dynamic {
                bootstrap_method,
                name_and_type,
            } => ConstantInfo::Dynamic {
                bootstrap_method: *bootstrap_method,
                name_and_type: name_and_type.copy_to(from, to)?,
            },
            ConstantInfo::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => ConstantInfo::InvokeDynamic {
                bootstrap_method: *bootstrap_method,
                name_and_type: name_and_type.copy_to(from, to)?,
            },
            ConstantInfo::Module(name) => ConstantInfo::Module(name.copy_to(from, to)?),
            ConstantInfo::Package(name) => ConstantInfo::Package(name.copy_to(from, to)?),
        };
        Ok(copied)
    }
}

/// Almost all constants have width 1, except for `Long` and `Double`. Quoting the JVM spec:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
/// >
/// > In retrospect, making 8-byte constants take two constant pool entries was a poor choice.
impl Width for ConstantInfo {
    fn width(&self) -> usize {
        match self {
            ConstantInfo::Long(_) | ConstantInfo::Double(_) => 2,
            _ => 1,
        }
    }
}

impl Encode for ConstantInfo {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.tag().serialize(writer)?;
        match self {
            ConstantInfo::Utf8(string) => {
                encode_utf8_body(&encode_modified_utf8(string), writer)?
            }
            ConstantInfo::Utf16(units) => {
                encode_utf8_body(&encode_modified_utf16(units.iter().copied()), writer)?
            }
            ConstantInfo::Integer(integer) => integer.serialize(writer)?,
            ConstantInfo::Float(bits) => bits.serialize(writer)?,
            ConstantInfo::Long(long) => long.serialize(writer)?,
            ConstantInfo::Double(bits) => bits.serialize(writer)?,
            ConstantInfo::Class(name)
            | ConstantInfo::String(name)
            | ConstantInfo::MethodType { descriptor: name }
            | ConstantInfo::Module(name)
            | ConstantInfo::Package(name) => indices.index_of(*name)?.serialize(writer)?,
            ConstantInfo::FieldRef {
                class,
                name_and_type,
            }
            | ConstantInfo::MethodRef {
                class,
                name_and_type,
            }
            | ConstantInfo::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                indices.index_of(*class)?.serialize(writer)?;
                indices.index_of(*name_and_type)?.serialize(writer)?;
            }
            ConstantInfo::NameAndType { name, descriptor } => {
                indices.index_of(*name)?.serialize(writer)?;
                indices.index_of(*descriptor)?.serialize(writer)?;
            }
            ConstantInfo::MethodHandle { kind, reference } => {
                (*kind as u8).serialize(writer)?;
                indices.index_of(*reference)?.serialize(writer)?;
            }
            ConstantInfo::Dynamic {
                bootstrap_method,
                name_and_type,
            }
            | ConstantInfo::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                bootstrap_method.serialize(writer)?;
                indices.index_of(*name_and_type)?.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Copying constants from one pool into another
///
/// Every constant the copied constant depends on is copied too, and all of them are interned in
/// the destination: copying something the destination already has returns the existing handle.
pub trait CopyConstant: Sized {
    fn copy_to(self, from: &ConstantPool, to: &mut ConstantPool) -> Result<Self, Error>;
}

impl CopyConstant for ConstantId {
    fn copy_to(self, from: &ConstantPool, to: &mut ConstantPool) -> Result<Self, Error> {
        let copied = from.constant(self)?.copy_references(from, to)?;
        to.add_constant(copied)
    }
}

macro_rules! copy_typed_constant_id {
    ($($name:ident),*) => {
        $(
            impl CopyConstant for $name {
                fn copy_to(self, from: &ConstantPool, to: &mut ConstantPool) -> Result<Self, Error> {
                    // Copies have the same kind as their source
                    self.0.copy_to(from, to).map($name)
                }
            }
        )*
    };
}

copy_typed_constant_id!(Utf8Id, ClassId, NameAndTypeId);

/// Kind of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[repr(u8)]
pub enum HandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl HandleKind {
    pub fn from_u8(kind: u8) -> Result<HandleKind, Error> {
        let kind = match kind {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => return Err(Error::InvalidHandleKind(other)),
        };
        Ok(kind)
    }

    /// Constant tags that the handle may reference
    pub(super) fn reference_tags(&self) -> &'static [u8] {
        match self {
            HandleKind::GetField
            | HandleKind::GetStatic
            | HandleKind::PutField
            | HandleKind::PutStatic => &[ConstantInfo::FIELD_REF],
            HandleKind::InvokeVirtual | HandleKind::NewInvokeSpecial => {
                &[ConstantInfo::METHOD_REF]
            }
            HandleKind::InvokeStatic | HandleKind::InvokeSpecial => {
                &[ConstantInfo::METHOD_REF, ConstantInfo::INTERFACE_METHOD_REF]
            }
            HandleKind::InvokeInterface => &[ConstantInfo::INTERFACE_METHOD_REF],
        }
    }
}

fn encode_utf8_body<W: WriteBytesExt>(buffer: &[u8], writer: &mut W) -> Result<(), Error> {
    let len = u16::try_from(buffer.len()).map_err(|_| Error::StringTooLong(buffer.len()))?;
    len.serialize(writer)?;
    writer.write_all(buffer)?;
    Ok(())
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// Working on UTF-16 code units takes care of the last point: each half of a surrogate pair gets
/// its own 3-byte form.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    encode_modified_utf16(string.encode_utf16())
}

/// Modified UTF-8 bytes for arbitrary UTF-16 code units, including unpaired surrogates
pub fn encode_modified_utf16(units: impl IntoIterator<Item = u16>) -> Vec<u8> {
    let units = units.into_iter();
    let mut buffer: Vec<u8> = Vec::with_capacity(units.size_hint().0);
    for unit in units {
        match unit {
            0x0001..=0x007F => buffer.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push((unit >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Returns `None` for malformed byte sequences, and for surrogates that do not pair up into a
/// supplementary character (those have no `String` representation, see
/// [`decode_modified_utf16`]).
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    String::from_utf16(&decode_modified_utf16(bytes)?).ok()
}

/// Inverse of [`encode_modified_utf16`]
///
/// Returns `None` for malformed byte sequences: stray continuation bytes, truncated forms, 4-byte
/// forms, plain `0x00`, and overlong forms other than the 2-byte null.
pub fn decode_modified_utf16(bytes: &[u8]) -> Option<Vec<u16>> {
    fn continuation(byte: Option<&u8>) -> Option<u16> {
        match byte {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Some((b & 0x3F) as u16),
            _ => None,
        }
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut bytes = bytes.iter();
    while let Some(&byte) = bytes.next() {
        let unit = match byte {
            0x01..=0x7F => byte as u16,
            0xC0..=0xDF => {
                let low = continuation(bytes.next())?;
                let unit = (byte as u16 & 0x1F) << 6 | low;
                if unit != 0 && unit < 0x80 {
                    return None;
                }
                unit
            }
            0xE0..=0xEF => {
                let mid = continuation(bytes.next())?;
                let low = continuation(bytes.next())?;
                let unit = (byte as u16 & 0x0F) << 12 | mid << 6 | low;
                if unit < 0x800 {
                    return None;
                }
                unit
            }
            _ => return None,
        };
        units.push(unit);
    }
    Some(units)
}
