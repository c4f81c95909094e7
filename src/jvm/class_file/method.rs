use super::{
    Attribute, AttributeInfo, Code, ConstantIndices, ConstantPool, Decode, Deserialize, Encode,
    Exceptions, Serialize, Utf8Id,
};
use crate::jvm::{Error, MethodAccessFlags, MethodDescriptor, ParseDescriptor};
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Method declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug, Clone)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: Utf8Id,
    pub descriptor: Utf8Id,
    pub attributes: Vec<Attribute>,
}

impl Method {
    /// Body of the method (absent for `abstract` and `native` methods)
    pub fn code(&self) -> Option<&Code> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn code_mut(&mut self) -> Option<&mut Code> {
        self.attributes
            .iter_mut()
            .find_map(|attribute| match &mut attribute.info {
                AttributeInfo::Code(code) => Some(code),
                _ => None,
            })
    }

    pub fn exceptions(&self) -> Option<&Exceptions> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::Exceptions(exceptions) => Some(exceptions),
            _ => None,
        })
    }

    pub fn parse_descriptor(&self, constants: &ConstantPool) -> Result<MethodDescriptor, Error> {
        MethodDescriptor::parse(constants.utf8(self.descriptor)?)
    }
}

impl Encode for Method {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.access_flags.serialize(writer)?;
        self.name.encode(indices, writer)?;
        self.descriptor.encode(indices, writer)?;
        self.attributes.encode(indices, writer)?;
        Ok(())
    }
}

impl Decode for Method {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Ok(Method {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name: Utf8Id::decode(constants, reader)?,
            descriptor: Utf8Id::decode(constants, reader)?,
            attributes: Vec::decode(constants, reader)?,
        })
    }
}
