use super::{
    to_u16, ConstantId, ConstantIndices, ConstantInfo, ConstantPool, Decode, Deserialize, Encode,
    Serialize, Utf8Id,
};
use crate::jvm::Error;
use byteorder::{ReadBytesExt, WriteBytesExt};

/// Deepest nesting of annotations and arrays accepted when decoding
const MAX_NESTING: usize = 256;

/// Annotation on a class, field, method or parameter
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface (eg. `Ljava/lang/Deprecated;`)
    pub type_descriptor: Utf8Id,
    pub elements: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementValuePair {
    pub name: Utf8Id,
    pub value: ElementValue,
}

/// Value of an annotation element
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant, with its tag (one of `BCDFIJSZs`)
    ///
    /// `B`, `C`, `I`, `S` and `Z` point at an `Integer` constant and `s` at a `Utf8` one. The
    /// other tags name their own constant kind.
    Constant { tag: u8, value: ConstantId },

    /// Enum constant: descriptor of the enum type and simple name of the constant
    Enum {
        type_descriptor: Utf8Id,
        const_name: Utf8Id,
    },

    /// Class literal, as a return descriptor (`V` for `void.class`)
    Class(Utf8Id),

    Annotation(Annotation),

    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub const ENUM: u8 = b'e';
    pub const CLASS: u8 = b'c';
    pub const ANNOTATION: u8 = b'@';
    pub const ARRAY: u8 = b'[';

    /// Kind of constant a `Constant` element with this tag points at
    pub fn constant_tag(tag: u8) -> Option<u8> {
        match tag {
            b'B' | b'C' | b'I' | b'S' | b'Z' => Some(ConstantInfo::INTEGER),
            b'D' => Some(ConstantInfo::DOUBLE),
            b'F' => Some(ConstantInfo::FLOAT),
            b'J' => Some(ConstantInfo::LONG),
            b's' => Some(ConstantInfo::UTF8),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Constant { tag, .. } => *tag,
            ElementValue::Enum { .. } => Self::ENUM,
            ElementValue::Class(_) => Self::CLASS,
            ElementValue::Annotation(_) => Self::ANNOTATION,
            ElementValue::Array(_) => Self::ARRAY,
        }
    }

    /// Number of bytes, tag included
    pub fn length(&self) -> usize {
        1 + match self {
            ElementValue::Constant { .. } | ElementValue::Class(_) => 2,
            ElementValue::Enum { .. } => 4,
            ElementValue::Annotation(annotation) => annotation.length(),
            ElementValue::Array(values) => {
                2 + values.iter().map(ElementValue::length).sum::<usize>()
            }
        }
    }

    fn decode_nested<R: ReadBytesExt>(
        constants: &ConstantPool,
        reader: &mut R,
        depth: usize,
    ) -> Result<Self, Error> {
        if depth > MAX_NESTING {
            return Err(Error::ValueOutOfRange {
                what: "annotation nesting depth",
                value: depth as i64,
            });
        }
        let tag = u8::deserialize(reader)?;
        let value = match tag {
            Self::ENUM => ElementValue::Enum {
                type_descriptor: Utf8Id::decode(constants, reader)?,
                const_name: Utf8Id::decode(constants, reader)?,
            },
            Self::CLASS => ElementValue::Class(Utf8Id::decode(constants, reader)?),
            Self::ANNOTATION => {
                ElementValue::Annotation(Annotation::decode_nested(constants, reader, depth + 1)?)
            }
            Self::ARRAY => {
                let len = u16::deserialize(reader)?;
                let mut values = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    values.push(ElementValue::decode_nested(constants, reader, depth + 1)?);
                }
                ElementValue::Array(values)
            }
            _ => {
                let expected = Self::constant_tag(tag).ok_or(Error::InvalidElementTag(tag))?;
                let index = u16::deserialize(reader)?;
                let value = constants.id_at(index)?;
                if constants.constant(value)?.tag() != expected {
                    return Err(Error::BadConstantReference {
                        index,
                        expected: "element value constant",
                    });
                }
                ElementValue::Constant { tag, value }
            }
        };
        Ok(value)
    }
}

impl Encode for ElementValue {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.tag().serialize(writer)?;
        match self {
            ElementValue::Constant { value, .. } => value.encode(indices, writer),
            ElementValue::Enum {
                type_descriptor,
                const_name,
            } => {
                type_descriptor.encode(indices, writer)?;
                const_name.encode(indices, writer)
            }
            ElementValue::Class(class) => class.encode(indices, writer),
            ElementValue::Annotation(annotation) => annotation.encode(indices, writer),
            ElementValue::Array(values) => values.encode(indices, writer),
        }
    }
}

impl Decode for ElementValue {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        ElementValue::decode_nested(constants, reader, 0)
    }
}

impl Annotation {
    pub fn length(&self) -> usize {
        4 + self
            .elements
            .iter()
            .map(|pair| 2 + pair.value.length())
            .sum::<usize>()
    }

    fn decode_nested<R: ReadBytesExt>(
        constants: &ConstantPool,
        reader: &mut R,
        depth: usize,
    ) -> Result<Self, Error> {
        let type_descriptor = Utf8Id::decode(constants, reader)?;
        let len = u16::deserialize(reader)?;
        let mut elements = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elements.push(ElementValuePair {
                name: Utf8Id::decode(constants, reader)?,
                value: ElementValue::decode_nested(constants, reader, depth)?,
            });
        }
        Ok(Annotation {
            type_descriptor,
            elements,
        })
    }
}

impl Encode for Annotation {
    fn encode<W: WriteBytesExt>(&self, indices: &ConstantIndices, writer: &mut W) -> Result<(), Error> {
        self.type_descriptor.encode(indices, writer)?;
        to_u16("annotation element count", self.elements.len())?.serialize(writer)?;
        for pair in &self.elements {
            pair.name.encode(indices, writer)?;
            pair.value.encode(indices, writer)?;
        }
        Ok(())
    }
}

impl Decode for Annotation {
    fn decode<R: ReadBytesExt>(constants: &ConstantPool, reader: &mut R) -> Result<Self, Error> {
        Annotation::decode_nested(constants, reader, 0)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVisibleAnnotations(pub Vec<Annotation>);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.17
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvisibleAnnotations(pub Vec<Annotation>);

macro_rules! annotations_attribute {
    ($($typ:ident),*) => {
        $(
            impl $typ {
                pub fn length(&self) -> usize {
                    2 + self.0.iter().map(Annotation::length).sum::<usize>()
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
                    Vec::decode(constants, reader).map($typ)
                }
            }
        )*
    };
}

annotations_attribute!(RuntimeVisibleAnnotations, RuntimeInvisibleAnnotations);

/// Annotations of each formal parameter, in order
///
/// The number of entries may be smaller than the number of parameters in the descriptor (`javac`
/// leaves out synthetic and implicit parameters).
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.18
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVisibleParameterAnnotations(pub Vec<Vec<Annotation>>);

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.19
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInvisibleParameterAnnotations(pub Vec<Vec<Annotation>>);

/// Like `MethodParameters`, the parameter count is a single byte
macro_rules! parameter_annotations_attribute {
    ($($typ:ident),*) => {
        $(
            impl $typ {
                pub fn length(&self) -> usize {
                    1 + self
                        .0
                        .iter()
                        .map(|annotations| {
                            2 + annotations.iter().map(Annotation::length).sum::<usize>()
                        })
                        .sum::<usize>()
                }
            }

            impl Encode for $typ {
                fn encode<W: WriteBytesExt>(
                    &self,
                    indices: &ConstantIndices,
                    writer: &mut W,
                ) -> Result<(), Error> {
                    let count = u8::try_from(self.0.len()).map_err(|_| Error::ValueOutOfRange {
                        what: "annotated parameter count",
                        value: self.0.len() as i64,
                    })?;
                    count.serialize(writer)?;
                    for annotations in &self.0 {
                        annotations.encode(indices, writer)?;
                    }
                    Ok(())
                }
            }

            impl Decode for $typ {
                fn decode<R: ReadBytesExt>(
                    constants: &ConstantPool,
                    reader: &mut R,
                ) -> Result<Self, Error> {
                    let count = u8::deserialize(reader)?;
                    let mut parameters = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        parameters.push(Vec::decode(constants, reader)?);
                    }
                    Ok($typ(parameters))
                }
            }
        )*
    };
}

parameter_annotations_attribute!(
    RuntimeVisibleParameterAnnotations,
    RuntimeInvisibleParameterAnnotations
);
