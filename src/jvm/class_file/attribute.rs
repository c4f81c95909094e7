use super::{
    read_bytes, to_u32, ClassId, Code, ConstantId, ConstantIndices, ConstantInfo, ConstantPool, Decode,
    Deserialize, Encode, LocalVariableTable, RuntimeInvisibleAnnotations,
    RuntimeInvisibleParameterAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations, Serialize, Utf8Id,
};
use crate::jvm::code::LabelLayout;
use crate::jvm::{Error, Location, ParameterAccessFlags};
use byteorder::{ReadBytesExt, WriteBytesExt};
use log::{debug, warn};

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// All attributes are stored the same way: a name, a length, and a payload. The payload of
/// attributes this crate understands is decoded into an [`AttributeInfo`] variant, and any other
/// payload is kept as raw bytes to be written back unchanged.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: Utf8Id,
    pub info: AttributeInfo,
}

impl Attribute {
    /// Make an attribute, adding its name to the constant pool
    pub fn new<A: AttributeLike>(constants: &mut ConstantPool, attribute: A) -> Attribute {
        Attribute {
            name: constants.add_utf8(A::NAME),
            info: attribute.into_info(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AttributeInfo {
    Code(Code),
    Exceptions(Exceptions),
    LocalVariableTable(LocalVariableTable),
    LineNumberTable(LineNumberTable),
    ConstantValue(ConstantValue),
    SourceFile(SourceFile),
    Signature(Signature),
    BootstrapMethods(BootstrapMethods),
    MethodParameters(MethodParameters),
    RuntimeVisibleAnnotations(RuntimeVisibleAnnotations),
    RuntimeInvisibleAnnotations(RuntimeInvisibleAnnotations),
    RuntimeVisibleParameterAnnotations(RuntimeVisibleParameterAnnotations),
    RuntimeInvisibleParameterAnnotations(RuntimeInvisibleParameterAnnotations),

    /// Payload of an attribute that is not decoded
    ///
    /// Opaque payloads may hold constant pool indices, so they stay meaningful only as long as
    /// the pool keeps its layout.
    Unknown(Vec<u8>),
}

impl AttributeInfo {
    /// Name of the attribute, if it is one this crate decodes
    pub fn name(&self) -> Option<&'static str> {
        let name = match self {
            AttributeInfo::Code(_) => Code::NAME,
            AttributeInfo::Exceptions(_) => Exceptions::NAME,
            AttributeInfo::LocalVariableTable(_) => LocalVariableTable::NAME,
            AttributeInfo::LineNumberTable(_) => LineNumberTable::NAME,
            AttributeInfo::ConstantValue(_) => ConstantValue::NAME,
            AttributeInfo::SourceFile(_) => SourceFile::NAME,
            AttributeInfo::Signature(_) => Signature::NAME,
            AttributeInfo::BootstrapMethods(_) => BootstrapMethods::NAME,
            AttributeInfo::MethodParameters(_) => MethodParameters::NAME,
            AttributeInfo::RuntimeVisibleAnnotations(_) => RuntimeVisibleAnnotations::NAME,
            AttributeInfo::RuntimeInvisibleAnnotations(_) => RuntimeInvisibleAnnotations::NAME,
            AttributeInfo::RuntimeVisibleParameterAnnotations(_) => {
                RuntimeVisibleParameterAnnotations::NAME
            }
            AttributeInfo::RuntimeInvisibleParameterAnnotations(_) => {
                RuntimeInvisibleParameterAnnotations::NAME
            }
            AttributeInfo::Unknown(_) => return None,
        };
        Some(name)
    }

    /// Error for a payload whose size disagrees with the declared length
    fn length_mismatch(&self, declared: usize, actual: usize) -> Error {
        Error::AttributeLengthMismatch {
            name: self.name().unwrap_or("unknown").to_owned(),
            declared,
            actual,
        }
    }

    /// Length of the payload, as written in the attribute header
    pub fn length(&self) -> usize {
        match self {
            AttributeInfo::Code(code) => code.length(),
            AttributeInfo::Exceptions(exceptions) => exceptions.length(),
            AttributeInfo::LocalVariableTable(table) => table.length(),
            AttributeInfo::LineNumberTable(table) => table.length(),
            AttributeInfo::ConstantValue(value) => value.length(),
            AttributeInfo::SourceFile(file) => file.length(),
            AttributeInfo::Signature(signature) => signature.length(),
            AttributeInfo::BootstrapMethods(methods) => methods.length(),
            AttributeInfo::MethodParameters(parameters) => parameters.length(),
            AttributeInfo::RuntimeVisibleAnnotations(annotations) => annotations.length(),
            AttributeInfo::RuntimeInvisibleAnnotations(annotations) => annotations.length(),
            AttributeInfo::RuntimeVisibleParameterAnnotations(annotations) => annotations.length(),
            AttributeInfo::RuntimeInvisibleParameterAnnotations(annotations) => {
                annotations.length()
            }
            AttributeInfo::Unknown(bytes) => bytes.len(),
        }
    }

    /// Write the payload (without the attribute header)
    pub fn write_data<W: WriteBytesExt>(
        &self,
        indices: &ConstantIndices,
        writer: &mut W,
    ) -> Result<(), Error> {
        match self {
            AttributeInfo::Code(code) => code.encode(indices, writer),
            AttributeInfo::Exceptions(exceptions) => exceptions.encode(indices, writer),
            AttributeInfo::LocalVariableTable(table) => table.encode(indices, writer),
            AttributeInfo::LineNumberTable(table) => table.encode(indices, writer),
            AttributeInfo::ConstantValue(value) => value.encode(indices, writer),
            AttributeInfo::SourceFile(file) => file.encode(indices, writer),
            AttributeInfo::Signature(signature) => signature.encode(indices, writer),
            AttributeInfo::BootstrapMethods(methods) => methods.encode(indices, writer),
            AttributeInfo::MethodParameters(parameters) => parameters.encode(indices, writer),
            AttributeInfo::RuntimeVisibleAnnotations(annotations) => {
                annotations.encode(indices, writer)
            }
            AttributeInfo::RuntimeInvisibleAnnotations(annotations) => {
                annotations.encode(indices, writer)
            }
            AttributeInfo::RuntimeVisibleParameterAnnotations(annotations) => {
                annotations.encode(indices, writer)
            }
            AttributeInfo::RuntimeInvisibleParameterAnnotations(annotations) => {
                annotations.encode(indices, writer)
            }
            AttributeInfo::Unknown(bytes) => Ok(writer.write_all(bytes)?),
        }
    }

    /// Replace pending locations whose labels have been placed
    pub fn resolve_labels(&mut self, layout: &LabelLayout) {
        match self {
            AttributeInfo::Code(code) => code.resolve_labels(layout),
            AttributeInfo::LineNumberTable(table) => {
                for line_number in &mut table.0 {
                    line_number.start = layout.resolve(line_number.start);
                }
            }
            _ => (),
        }
    }
}

/// Attributes are all stored in the same way (see [`Attribute`]), but internally they represent
/// very different things. This trait is implemented by the things which can be turned into
/// attributes.
pub trait AttributeLike: Encode + Decode {
    /// Name of the attribute
    const NAME: &'static str;

    /// Number of bytes that [`Encode::encode`] will write
    fn length(&self) -> usize;

    fn into_info(self) -> AttributeInfo;
}

/// Decode a payload that must be consumed exactly
fn decode_payload<A: AttributeLike>(constants: &ConstantPool, data: &[u8]) -> Result<A, Error> {
    let mut reader = data;
    let attribute = A::decode(constants, &mut reader)?;
    if reader.is_empty() {
        Ok(attribute)
    } else {
        Err(Error::AttributeLengthMismatch {
            name: A::NAME.to_owned(),
            declared: data.len(),
            actual: data.len() - reader.len(),
        })
    }
}

impl Decode for Attribute {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let name = Utf8Id::decode(constants, reader)?;
        let length = u32::deserialize(reader)?;
        let data = read_bytes(reader, length as usize)?;

        let info = match constants.utf8(name)? {
            Code::NAME => decode_payload::<Code>(constants, &data)?.into_info(),
            Exceptions::NAME => decode_payload::<Exceptions>(constants, &data)?.into_info(),
            LocalVariableTable::NAME => {
                decode_payload::<LocalVariableTable>(constants, &data)?.into_info()
            }
            LineNumberTable::NAME => {
                decode_payload::<LineNumberTable>(constants, &data)?.into_info()
            }
            ConstantValue::NAME => decode_payload::<ConstantValue>(constants, &data)?.into_info(),
            SourceFile::NAME => decode_payload::<SourceFile>(constants, &data)?.into_info(),
            Signature::NAME => decode_payload::<Signature>(constants, &data)?.into_info(),
            BootstrapMethods::NAME => {
                decode_payload::<BootstrapMethods>(constants, &data)?.into_info()
            }
            MethodParameters::NAME => {
                decode_payload::<MethodParameters>(constants, &data)?.into_info()
            }
            RuntimeVisibleAnnotations::NAME => {
                decode_payload::<RuntimeVisibleAnnotations>(constants, &data)?.into_info()
            }
            RuntimeInvisibleAnnotations::NAME => {
                decode_payload::<RuntimeInvisibleAnnotations>(constants, &data)?.into_info()
            }
            RuntimeVisibleParameterAnnotations::NAME => {
                decode_payload::<RuntimeVisibleParameterAnnotations>(constants, &data)?.into_info()
            }
            RuntimeInvisibleParameterAnnotations::NAME => {
                decode_payload::<RuntimeInvisibleParameterAnnotations>(constants, &data)?
                    .into_info()
            }
            other => {
                debug!("keeping {} attribute opaque ({} bytes)", other, data.len());
                AttributeInfo::Unknown(data)
            }
        };

        Ok(Attribute { name, info })
    }
}

impl Encode for Attribute {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        let declared = self.info.length();
        let mut payload = Vec::with_capacity(declared);
        self.info.write_data(indices, &mut payload)?;
        if payload.len() != declared {
            return Err(self.info.length_mismatch(declared, payload.len()));
        }

        self.name.encode(indices, writer)?;
        to_u32("attribute length", declared)?.serialize(writer)?;
        writer.write_all(&payload)?;
        Ok(())
    }
}

macro_rules! attribute_like {
    ($typ:ident, $name:literal) => {
        impl AttributeLike for $typ {
            const NAME: &'static str = $name;

            fn length(&self) -> usize {
                $typ::length(self)
            }

            fn into_info(self) -> AttributeInfo {
                AttributeInfo::$typ(self)
            }
        }
    };
}

attribute_like!(Code, "Code");
attribute_like!(Exceptions, "Exceptions");
attribute_like!(LocalVariableTable, "LocalVariableTable");
attribute_like!(LineNumberTable, "LineNumberTable");
attribute_like!(ConstantValue, "ConstantValue");
attribute_like!(SourceFile, "SourceFile");
attribute_like!(Signature, "Signature");
attribute_like!(BootstrapMethods, "BootstrapMethods");
attribute_like!(MethodParameters, "MethodParameters");
attribute_like!(RuntimeVisibleAnnotations, "RuntimeVisibleAnnotations");
attribute_like!(RuntimeInvisibleAnnotations, "RuntimeInvisibleAnnotations");
attribute_like!(RuntimeVisibleParameterAnnotations, "RuntimeVisibleParameterAnnotations");
attribute_like!(RuntimeInvisibleParameterAnnotations, "RuntimeInvisibleParameterAnnotations");

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantValue(pub ConstantId);

impl ConstantValue {
    pub fn length(&self) -> usize {
        2
    }
}

impl Encode for ConstantValue {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.0.encode(indices, writer)
    }
}

impl Decode for ConstantValue {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let index = u16::deserialize(reader)?;
        let value = constants.id_at(index)?;
        match constants.constant(value)? {
            ConstantInfo::Integer(_)
            | ConstantInfo::Float(_)
            | ConstantInfo::Long(_)
            | ConstantInfo::Double(_)
            | ConstantInfo::String(_) => Ok(ConstantValue(value)),
            _ => Err(Error::BadConstantReference {
                index,
                expected: "constant value",
            }),
        }
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFile(pub Utf8Id);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.9
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub Utf8Id);

macro_rules! utf8_attribute {
    ($($typ:ident),*) => {
        $(
            impl $typ {
                pub fn length(&self) -> usize {
                    2
                }
            }

            impl Encode for $typ {
                fn encode<W: WriteBytesExt>(
                    &self,
                    indices: &ConstantIndices,
                    writer: &mut W,
                ) -> Result<(), Error> {
                    self.0.encode(indices, writer)
                }
            }

            impl Decode for $typ {
                fn decode<R: ReadBytesExt>(
                    constants: &ConstantPool,
                    reader: &mut R,
                ) -> Result<Self, Error> {
                    Utf8Id::decode(constants, reader).map($typ)
                }
            }
        )*
    };
}

utf8_attribute!(SourceFile, Signature);

/// Checked exceptions a method may throw
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exceptions(pub Vec<ClassId>);

impl Exceptions {
    pub fn length(&self) -> usize {
        2 + 2 * self.0.len()
    }
}

impl Encode for Exceptions {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.0.encode(indices, writer)
    }
}

impl Decode for Exceptions {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Vec::decode(constants, reader).map(Exceptions)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberTable(pub Vec<LineNumber>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    /// Start of the code for this line
    pub start: Location,
    pub line: u16,
}

impl LineNumberTable {
    pub fn length(&self) -> usize {
        2 + 4 * self.0.len()
    }
}

impl Encode for LineNumberTable {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.0.encode(indices, writer)
    }
}

impl Decode for LineNumberTable {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Vec::decode(constants, reader).map(LineNumberTable)
    }
}

impl Encode for LineNumber {
    fn encode<W: WriteBytesExt>(&self, _: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.start.to_u16("line number start")?.serialize(writer)?;
        self.line.serialize(writer)?;
        Ok(())
    }
}

impl Decode for LineNumber {
    fn decode<R: ReadBytesExt>(_: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Ok(LineNumber {
            start: Location::Fixed(u16::deserialize(reader)? as u32),
            line: u16::deserialize(reader)?,
        })
    }
}

/// Bootstrap methods for `invokedynamic` call sites and dynamic constants
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.23
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethods(pub Vec<BootstrapMethod>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_handle: ConstantId,
    pub arguments: Vec<ConstantId>,
}

impl BootstrapMethods {
    pub fn length(&self) -> usize {
        2 + self
            .0
            .iter()
            .map(|method| 4 + 2 * method.arguments.len())
            .sum::<usize>()
    }
}

impl Encode for BootstrapMethods {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.0.encode(indices, writer)
    }
}

impl Decode for BootstrapMethods {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Vec::decode(constants, reader).map(BootstrapMethods)
    }
}

impl Encode for BootstrapMethod {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.method_handle.encode(indices, writer)?;
        self.arguments.encode(indices, writer)?;
        Ok(())
    }
}

impl Decode for BootstrapMethod {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let index = u16::deserialize(reader)?;
        let method_handle = constants.id_at(index)?;
        if constants.constant(method_handle)?.tag() != ConstantInfo::METHOD_HANDLE {
            return Err(Error::BadConstantReference {
                index,
                expected: "MethodHandle",
            });
        }
        Ok(BootstrapMethod {
            method_handle,
            arguments: Vec::decode(constants, reader)?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.24
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameters(pub Vec<MethodParameter>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    /// `None` for a formal parameter with no name
    pub name: Option<Utf8Id>,
    pub access_flags: ParameterAccessFlags,
}

impl MethodParameters {
    pub fn length(&self) -> usize {
        1 + 4 * self.0.len()
    }
}

/// Unlike most tables, the parameter count is a single byte
impl Encode for MethodParameters {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        let count = u8::try_from(self.0.len()).map_err(|_| Error::ValueOutOfRange {
            what: "method parameter count",
            value: self.0.len() as i64,
        })?;
        count.serialize(writer)?;
        for parameter in &self.0 {
            match parameter.name {
                None => 0u16.serialize(writer)?,
                Some(name) => name.encode(indices, writer)?,
            }
            parameter.access_flags.serialize(writer)?;
        }
        Ok(())
    }
}

impl Decode for MethodParameters {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        let count = u8::deserialize(reader)?;
        let mut parameters = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let index = u16::deserialize(reader)?;
            let name = match index {
                0 => None,
                _ => match constants.utf8_at(index) {
                    Ok(name) => Some(name),
                    Err(err) => {
                        warn!("dropping method parameter name: {}", err);
                        None
                    }
                },
            };
            parameters.push(MethodParameter {
                name,
                access_flags: ParameterAccessFlags::deserialize(reader)?,
            });
        }
        Ok(MethodParameters(parameters))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{Annotation, ElementValue, ElementValuePair};

    fn round_trip(constants: &ConstantPool, attribute: &Attribute) -> Vec<u8> {
        let indices = constants.resolve_indices().unwrap();
        let mut bytes = vec![];
        attribute.encode(&indices, &mut bytes).unwrap();

        let decoded = Attribute::decode(constants, &mut &bytes[..]).unwrap();
        let mut again = vec![];
        decoded.encode(&indices, &mut again).unwrap();
        assert_eq!(bytes, again);
        bytes
    }

    #[test]
    fn unknown_attributes_survive() {
        let mut constants = ConstantPool::new();
        let attribute = Attribute {
            name: constants.add_utf8("com.example.Custom"),
            info: AttributeInfo::Unknown(vec![0xde, 0xad, 0xbe, 0xef]),
        };
        let bytes = round_trip(&constants, &attribute);
        assert_eq!(bytes, vec![0, 1, 0, 0, 0, 4, 0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn exceptions_and_source_file() {
        let mut constants = ConstantPool::new();
        let exceptions = vec![
            constants.add_class("java/io/IOException"),
            constants.add_class("java/lang/InterruptedException"),
        ];
        let exceptions = Attribute::new(&mut constants, Exceptions(exceptions));
        let source_file = constants.add_utf8("Foo.java");
        let source_file = Attribute::new(&mut constants, SourceFile(source_file));

        let bytes = round_trip(&constants, &exceptions);
        assert_eq!(bytes.len(), 6 + 6);
        assert_eq!(&bytes[6..], &[0, 2, 0, 2, 0, 4]);

        let bytes = round_trip(&constants, &source_file);
        assert_eq!(&bytes[2..], &[0, 0, 0, 2, 0, 6]);
    }

    #[test]
    fn leftover_payload_is_an_error() {
        let mut constants = ConstantPool::new();
        constants.add_utf8("SourceFile");
        constants.add_utf8("Foo.java");

        let bytes = [0, 1, 0, 0, 0, 3, 0, 2, 0];
        match Attribute::decode(&constants, &mut &bytes[..]) {
            Err(Error::AttributeLengthMismatch {
                name,
                declared: 3,
                actual: 2,
            }) => assert_eq!(name, "SourceFile"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn constant_value_must_be_loadable() {
        let mut constants = ConstantPool::new();
        constants.add_utf8("ConstantValue");
        let value = constants.add_long(7);
        let class = constants.add_class("Foo");
        let indices = constants.resolve_indices().unwrap();

        let attribute = Attribute::new(&mut constants, ConstantValue(value));
        round_trip(&constants, &attribute);

        let class_index = indices.index_of(class).unwrap() as u8;
        let bytes = [0, 1, 0, 0, 0, 2, 0, class_index];
        assert!(matches!(
            Attribute::decode(&constants, &mut &bytes[..]),
            Err(Error::BadConstantReference { .. })
        ));
    }

    #[test]
    fn line_numbers() {
        let mut constants = ConstantPool::new();
        let table = LineNumberTable(vec![
            LineNumber {
                start: Location::Fixed(0),
                line: 10,
            },
            LineNumber {
                start: Location::Fixed(7),
                line: 11,
            },
        ]);
        let attribute = Attribute::new(&mut constants, table);
        assert_eq!(attribute.info.length(), 10);
        let bytes = round_trip(&constants, &attribute);
        assert_eq!(&bytes[6..], &[0, 2, 0, 0, 0, 10, 0, 7, 0, 11]);
    }

    #[test]
    fn bootstrap_methods() {
        let mut constants = ConstantPool::new();
        let class = constants.add_class("java/lang/invoke/StringConcatFactory");
        let name_and_type = constants.add_name_and_type("makeConcatWithConstants", "()V");
        let method = constants.add_method_ref(class, name_and_type).unwrap();
        let handle = constants
            .add_method_handle(crate::jvm::class_file::HandleKind::InvokeStatic, method)
            .unwrap();
        let recipe = constants.add_string("\u{1}!");

        let methods = BootstrapMethods(vec![BootstrapMethod {
            method_handle: handle,
            arguments: vec![recipe],
        }]);
        let attribute = Attribute::new(&mut constants, methods);
        assert_eq!(attribute.info.length(), 8);
        round_trip(&constants, &attribute);
    }

    #[test]
    fn method_parameters() {
        let mut constants = ConstantPool::new();
        let name = constants.add_utf8("arg0");
        let parameters = MethodParameters(vec![
            MethodParameter {
                name: Some(name),
                access_flags: ParameterAccessFlags::FINAL,
            },
            MethodParameter {
                name: None,
                access_flags: ParameterAccessFlags::SYNTHETIC,
            },
        ]);
        let attribute = Attribute::new(&mut constants, parameters.clone());
        let bytes = round_trip(&constants, &attribute);
        assert_eq!(&bytes[6..], &[2, 0, 1, 0, 0x10, 0, 0, 0x10, 0]);

        match Attribute::decode(&constants, &mut &bytes[..]).unwrap().info {
            AttributeInfo::MethodParameters(decoded) => assert_eq!(decoded, parameters),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mismatches_name_the_attribute() {
        let info = AttributeInfo::LineNumberTable(LineNumberTable(vec![]));
        assert_eq!(info.name(), Some("LineNumberTable"));
        match info.length_mismatch(2, 6) {
            Error::AttributeLengthMismatch {
                name,
                declared: 2,
                actual: 6,
            } => assert_eq!(name, "LineNumberTable"),
            other => panic!("unexpected {:?}", other),
        }

        let info = AttributeInfo::Unknown(vec![]);
        assert_eq!(info.name(), None);
        assert!(matches!(
            info.length_mismatch(0, 1),
            Error::AttributeLengthMismatch { name, .. } if name == "unknown"
        ));
    }

    #[test]
    fn annotations_decode_by_name() {
        let mut constants = ConstantPool::new();
        let deprecated = Annotation {
            type_descriptor: constants.add_utf8("Ljava/lang/Deprecated;"),
            elements: vec![ElementValuePair {
                name: constants.add_utf8("since"),
                value: ElementValue::Constant {
                    tag: b's',
                    value: constants.add_utf8("9").into(),
                },
            }],
        };
        let visible = Attribute::new(
            &mut constants,
            RuntimeVisibleAnnotations(vec![deprecated.clone()]),
        );
        let parameters = Attribute::new(
            &mut constants,
            RuntimeVisibleParameterAnnotations(vec![vec![deprecated.clone()], vec![]]),
        );
        assert_eq!(visible.info.name(), Some("RuntimeVisibleAnnotations"));

        let bytes = round_trip(&constants, &visible);
        assert_eq!(&bytes[2..6], &[0, 0, 0, 11]);
        match Attribute::decode(&constants, &mut &bytes[..]).unwrap().info {
            AttributeInfo::RuntimeVisibleAnnotations(decoded) => {
                assert_eq!(decoded.0, vec![deprecated])
            }
            other => panic!("unexpected {:?}", other),
        }

        let bytes = round_trip(&constants, &parameters);
        assert!(matches!(
            Attribute::decode(&constants, &mut &bytes[..]).unwrap().info,
            AttributeInfo::RuntimeVisibleParameterAnnotations(decoded) if decoded.0.len() == 2
        ));
    }

    #[test]
    fn oversized_table_is_rejected() {
        let mut constants = ConstantPool::new();
        let name = constants.add_utf8("Exceptions");
        let class = constants.add_class("Foo");
        let indices = constants.resolve_indices().unwrap();

        let attribute = Attribute {
            name,
            info: AttributeInfo::Exceptions(Exceptions(vec![class; 70_000])),
        };
        assert!(matches!(
            attribute.encode(&indices, &mut vec![]),
            Err(Error::ValueOutOfRange { .. })
        ));
    }
}
