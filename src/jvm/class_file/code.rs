use super::{
    read_bytes, to_u32, Attribute, AttributeInfo, ClassId, ConstantIndices, ConstantPool, Decode,
    Deserialize, Encode, LineNumberTable, LocalVariableTable, Serialize,
};
use crate::jvm::code::{InstructionDecoder, LabelLayout};
use crate::jvm::{Error, Location};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Body of a method
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,

    /// Encoded bytecode instructions
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Code {
    /// Largest number of bytes in a code array
    pub const MAX_CODE_LENGTH: usize = 65535;

    pub fn length(&self) -> usize {
        let attributes: usize = self
            .attributes
            .iter()
            .map(|attribute| 6 + attribute.info.length())
            .sum();
        2 + 2 + 4 + self.code.len() + 2 + 8 * self.exception_table.len() + 2 + attributes
    }

    /// Walk the instructions of the code array
    pub fn instructions<'a>(&'a self, constants: &'a ConstantPool) -> InstructionDecoder<'a> {
        InstructionDecoder::new(&self.code, constants)
    }

    pub fn local_variable_table(&self) -> Option<&LocalVariableTable> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::LocalVariableTable(table) => Some(table),
            _ => None,
        })
    }

    pub fn line_number_table(&self) -> Option<&LineNumberTable> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::LineNumberTable(table) => Some(table),
            _ => None,
        })
    }

    /// Replace pending locations in the exception table and nested attributes
    pub fn resolve_labels(&mut self, layout: &LabelLayout) {
        for handler in &mut self.exception_table {
            handler.resolve_labels(layout);
        }
        for attribute in &mut self.attributes {
            attribute.info.resolve_labels(layout);
        }
    }
}

impl Encode for Code {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        if self.code.len() > Code::MAX_CODE_LENGTH {
            return Err(Error::ValueOutOfRange {
                what: "code length",
                value: self.code.len() as i64,
            });
        }
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        to_u32("code length", self.code.len())?.serialize(writer)?;
        writer.write_all(&self.code)?;
        self.exception_table.encode(indices, writer)?;
        self.attributes.encode(indices, writer)?;
        Ok(())
    }
}

impl Decode for Code {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let max_stack = u16::deserialize(reader)?;
        let max_locals = u16::deserialize(reader)?;
        let code_length = u32::deserialize(reader)?;
        let code = read_bytes(reader, code_length as usize)?;
        Ok(Code {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::decode(constants, reader)?,
            attributes: Vec::decode(constants, reader)?,
        })
    }
}

/// Entry in the exception table of a method body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start: Location,

    /// End of exception handler range (exclusive)
    pub end: Location,

    /// Start of the exception handler
    pub handler: Location,

    /// Class of exceptions caught, or `None` to catch everything (eg. for `finally`)
    pub catch_type: Option<ClassId>,
}

impl ExceptionHandler {
    pub fn resolve_labels(&mut self, layout: &LabelLayout) {
        self.start = layout.resolve(self.start);
        self.end = layout.resolve(self.end);
        self.handler = layout.resolve(self.handler);
    }
}

impl Encode for ExceptionHandler {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.start.to_u16("exception handler start")?.serialize(writer)?;
        self.end.to_u16("exception handler end")?.serialize(writer)?;
        self.handler.to_u16("exception handler")?.serialize(writer)?;
        match self.catch_type {
            None => 0u16.serialize(writer)?,
            Some(class) => class.encode(indices, writer)?,
        }
        Ok(())
    }
}

impl Decode for ExceptionHandler {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let start = Location::Fixed(u16::deserialize(reader)? as u32);
        let end = Location::Fixed(u16::deserialize(reader)? as u32);
        let handler = Location::Fixed(u16::deserialize(reader)? as u32);
        let catch_type = match u16::deserialize(reader)? {
            0 => None,
            index => Some(constants.class_at(index)?),
        };
        Ok(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
        })
    }
}
