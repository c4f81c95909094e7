use super::{
    Attribute, AttributeInfo, ConstantId, ConstantIndices, ConstantPool, Decode, Deserialize,
    Encode, Serialize, Utf8Id,
};
use crate::jvm::{Error, FieldAccessFlags, FieldType, ParseDescriptor};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug, Clone)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name: Utf8Id,
    pub descriptor: Utf8Id,
    pub attributes: Vec<Attribute>,
}

impl Field {
    /// Initial value of a `static final` field
    pub fn constant_value(&self) -> Option<ConstantId> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::ConstantValue(value) => Some(value.0),
            _ => None,
        })
    }

    pub fn field_type(&self, constants: &ConstantPool) -> Result<FieldType, Error> {
        FieldType::parse(constants.utf8(self.descriptor)?)
    }
}

impl Encode for Field {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.access_flags.serialize(writer)?;
        self.name.encode(indices, writer)?;
        self.descriptor.encode(indices, writer)?;
        self.attributes.encode(indices, writer)?;
        Ok(())
    }
}

impl Decode for Field {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Ok(Field {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name: Utf8Id::decode(constants, reader)?,
            descriptor: Utf8Id::decode(constants, reader)?,
            attributes: Vec::decode(constants, reader)?,
        })
    }
}
