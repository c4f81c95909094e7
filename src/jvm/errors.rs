use super::class_file::ConstantId;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Underlying reader or writer failed (including a stream that ends too early)
    IoError(std::io::Error),

    /// Class file does not start with `0xCAFEBABE`
    BadMagic(u32),

    /// Bytes left over after the end of the class file
    TrailingBytes(usize),

    /// Constant pool entry at this index has an unknown tag
    InvalidConstantTag { index: u16, tag: u8 },

    /// `CONSTANT_Utf8_info` at this index is not valid modified UTF-8
    InvalidModifiedUtf8 { index: u16 },

    /// `CONSTANT_Utf8_info` holds unpaired surrogates, so it cannot be read as a `&str`
    UnpairedSurrogates(ConstantId),

    /// `CONSTANT_MethodHandle_info` has a reference kind outside 1-9
    InvalidHandleKind(u8),

    /// Constant pool index points at nothing, or at a constant of the wrong kind
    BadConstantReference { index: u16, expected: &'static str },

    /// An attribute decoder did not consume exactly the declared payload, or an attribute
    /// produced a different number of bytes than it declared
    AttributeLengthMismatch {
        name: String,
        declared: usize,
        actual: usize,
    },

    /// Annotation element value starts with an unknown tag
    InvalidElementTag(u8),

    /// Type descriptor could not be parsed
    BadDescriptor(String),

    /// Byte at this code address is not an opcode
    InvalidOpcode { address: u32, opcode: u8 },

    /// `wide` prefix applied to an opcode that has no wide form
    InvalidWideOpcode { address: u32, opcode: u8 },

    /// Operands of the instruction at this address run past the end of the code
    TruncatedInstruction { address: u32, opcode: u8 },

    /// `tableswitch` with `high < low` or `lookupswitch` with a negative pair count
    InvalidSwitch { address: u32 },

    /// No constant has this index (usually recoverable: the caller may treat it as absent)
    InvalidConstantIndex(u16),

    /// Value does not fit in the field that must hold it
    ValueOutOfRange { what: &'static str, value: i64 },

    /// Constant pool needs more slots than a `u16` count can describe
    ConstantPoolOverflow { slots: usize },

    /// Modified UTF-8 encoding of a string is longer than 65535 bytes
    StringTooLong(usize),

    /// Constant came from a class file, so its index is fixed and cannot be moved forward
    FixedConstantIndex(ConstantId),

    /// A location was still pending when it had to be written
    UnresolvedLocation(&'static str),

    /// Constant belongs to a different pool than the one being used (a bug in the caller: the
    /// constant should have been copied over with [`crate::jvm::class_file::CopyConstant`])
    ForeignConstant(ConstantId),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::BadMagic(magic) => write!(f, "bad class file magic {:#010x}", magic),
            Error::TrailingBytes(len) => write!(f, "{} bytes after the end of the class", len),
            Error::InvalidConstantTag { index, tag } => {
                write!(f, "constant #{} has invalid tag {}", index, tag)
            }
            Error::InvalidModifiedUtf8 { index } => {
                write!(f, "constant #{} is not valid modified UTF-8", index)
            }
            Error::UnpairedSurrogates(id) => {
                write!(f, "constant {:?} holds unpaired surrogates", id)
            }
            Error::InvalidHandleKind(kind) => write!(f, "invalid method handle kind {}", kind),
            Error::BadConstantReference { index, expected } => {
                write!(f, "constant #{} is not a valid {} constant", index, expected)
            }
            Error::AttributeLengthMismatch {
                name,
                declared,
                actual,
            } => write!(
                f,
                "attribute {} declares {} bytes but has {}",
                name, declared, actual
            ),
            Error::InvalidElementTag(tag) => {
                write!(f, "invalid annotation element tag {:?}", *tag as char)
            }
            Error::BadDescriptor(desc) => write!(f, "bad type descriptor {:?}", desc),
            Error::InvalidOpcode { address, opcode } => {
                write!(f, "invalid opcode {:#04x} at address {}", opcode, address)
            }
            Error::InvalidWideOpcode { address, opcode } => write!(
                f,
                "opcode {:#04x} at address {} has no wide form",
                opcode, address
            ),
            Error::TruncatedInstruction { address, opcode } => write!(
                f,
                "instruction {:#04x} at address {} runs past the end of the code",
                opcode, address
            ),
            Error::InvalidSwitch { address } => {
                write!(f, "malformed switch instruction at address {}", address)
            }
            Error::InvalidConstantIndex(index) => write!(f, "no constant at index {}", index),
            Error::ValueOutOfRange { what, value } => {
                write!(f, "value for {} out of valid range: {}", what, value)
            }
            Error::ConstantPoolOverflow { slots } => {
                write!(f, "constant pool needs {} slots (at most 65535)", slots)
            }
            Error::StringTooLong(len) => {
                write!(f, "encoded string is {} bytes (at most 65535)", len)
            }
            Error::FixedConstantIndex(id) => {
                write!(f, "constant {:?} was read from a class file and keeps its index", id)
            }
            Error::UnresolvedLocation(what) => write!(f, "location for {} is unresolved", what),
            Error::ForeignConstant(id) => {
                write!(f, "constant {:?} is not registered in this pool", id)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
