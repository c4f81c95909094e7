use super::{
    Attribute, AttributeInfo, ClassId, ConstantPool, Decode, Deserialize, Encode, Field, Method,
    Serialize, Version,
};
use crate::jvm::{ClassAccessFlags, Error};
use byteorder::{ReadBytesExt, WriteBytesExt};
use log::debug;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassId,

    /// `None` only for `java/lang/Object`
    pub super_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header that goes at the front of the serialized class file
    pub const MAGIC: u32 = 0xCAFE_BABE;

    /// Parse a complete class file
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = bytes;
        let class = ClassFile::read_from(&mut reader)?;
        if reader.is_empty() {
            Ok(class)
        } else {
            Err(Error::TrailingBytes(reader.len()))
        }
    }

    pub fn read_from<R: ReadBytesExt>(reader: &mut R) -> Result<ClassFile, Error> {
        let magic = u32::deserialize(reader)?;
        if magic != ClassFile::MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let version = Version::deserialize(reader)?;
        let constants = ConstantPool::read_from(reader)?;
        let access_flags = ClassAccessFlags::deserialize(reader)?;
        let this_class = ClassId::decode(&constants, reader)?;
        let super_class = match u16::deserialize(reader)? {
            0 => None,
            index => Some(constants.class_at(index)?),
        };
        let interfaces = Vec::decode(&constants, reader)?;
        let fields: Vec<Field> = Vec::decode(&constants, reader)?;
        let methods: Vec<Method> = Vec::decode(&constants, reader)?;
        let attributes = Vec::decode(&constants, reader)?;

        debug!(
            "read class {} (version {}, {} fields, {} methods)",
            constants.class_name(this_class)?,
            version,
            fields.len(),
            methods.len()
        );

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Write the class file
    ///
    /// The class is fully encoded before anything reaches the writer, so a class that fails to
    /// encode leaves the writer untouched.
    pub fn write_to<W: WriteBytesExt>(&self, writer: &mut W) -> Result<(), Error> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        ClassFile::MAGIC.serialize(&mut bytes)?;
        self.version.serialize(&mut bytes)?;
        let indices = self.constants.write_to(&mut bytes)?;
        self.access_flags.serialize(&mut bytes)?;
        self.this_class.encode(&indices, &mut bytes)?;
        match self.super_class {
            None => 0u16.serialize(&mut bytes)?,
            Some(class) => class.encode(&indices, &mut bytes)?,
        }
        self.interfaces.encode(&indices, &mut bytes)?;
        self.fields.encode(&indices, &mut bytes)?;
        self.methods.encode(&indices, &mut bytes)?;
        self.attributes.encode(&indices, &mut bytes)?;
        Ok(bytes)
    }

    /// Internal name of this class (eg. `java/lang/String`)
    pub fn name(&self) -> Result<&str, Error> {
        self.constants.class_name(self.this_class)
    }

    pub fn source_file(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match &attribute.info {
            AttributeInfo::SourceFile(file) => self.constants.utf8(file.0).ok(),
            _ => None,
        })
    }
}
