use super::class_file::{Deserialize, Serialize};
use bitflags::bitflags;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Result;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on fields
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags on method parameters
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.24
    pub struct ParameterAccessFlags: u16 {
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
        const MANDATED = 0x8000;
    }
}

/// Flags are read with every bit kept, including bits that have no named flag, so that writing
/// them back reproduces the class file exactly.
macro_rules! flags_binary_format {
    ($($flags:ident),*) => {
        $(
            impl Serialize for $flags {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    self.bits().serialize(writer)
                }
            }

            impl Deserialize for $flags {
                fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self> {
                    let bits = u16::deserialize(reader)?;
                    // SAFETY: these flag types treat unnamed bits as valid (they only ever get
                    // written back out)
                    Ok(unsafe { $flags::from_bits_unchecked(bits) })
                }
            }
        )*
    };
}

flags_binary_format!(
    ClassAccessFlags,
    MethodAccessFlags,
    FieldAccessFlags,
    ParameterAccessFlags
);
