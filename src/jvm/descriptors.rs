use super::Error;
use crate::util::Width;
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to their string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string, rejecting any leftover input
    fn parse(source: &str) -> Result<Self, Error> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)
            .ok_or_else(|| Error::BadDescriptor(source.to_owned()))?;
        match chars.next() {
            None => Ok(ret),
            Some(_) => Err(Error::BadDescriptor(source.to_owned())),
        }
    }

    /// Read the descriptor from a character buffer
    ///
    /// Returns `None` on malformed input, and may have consumed some of it.
    fn parse_from(source: &mut Peekable<Chars>) -> Option<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Option<Self> {
        let typ = match source.next()? {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        };
        Some(typ)
    }
}

/// Type of a field, array element, or local variable
///
/// Class names are kept in their internal form (`java/lang/String`), exactly as they appear
/// between the `L` and `;` of the descriptor.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn object(class_name: impl Into<String>) -> FieldType {
        FieldType::Object(class_name.into())
    }

    pub fn array(element_type: FieldType) -> FieldType {
        FieldType::Array(Box::new(element_type))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    /// Whether values of this type take two local variable slots (`long` and `double`)
    pub fn is_double_word(&self) -> bool {
        self.width() == 2
    }

    /// Descriptor string for this type
    pub fn to_descriptor(&self) -> String {
        self.render()
    }
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Object(_) | FieldType::Array(_) => 1,
        }
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Object(class_name) => {
                write_to.push('L');
                write_to.push_str(class_name);
                write_to.push(';');
            }
            FieldType::Array(element_type) => {
                write_to.push('[');
                element_type.render_to(write_to);
            }
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Option<Self> {
        match source.peek().copied()? {
            'L' => {
                source.next();
                let mut class_name = String::new();
                loop {
                    match source.next()? {
                        ';' if !class_name.is_empty() => return Some(FieldType::Object(class_name)),
                        ';' | '.' | '[' => return None,
                        c => class_name.push(c),
                    }
                }
            }
            '[' => {
                source.next();
                Some(FieldType::array(FieldType::parse_from(source)?))
            }
            _ => BaseType::parse_from(source).map(FieldType::Base),
        }
    }
}

/// Signature of a method
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` is for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Number of local variable slots taken by the parameters, which must be 255 or less for
    /// the method to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_len = if has_this_param { 1 } else { 0 };
        this_len + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Option<Self> {
        source.next_if_eq(&'(')?;

        let mut parameters = vec![];
        while source.next_if_eq(&')').is_none() {
            parameters.push(FieldType::parse_from(source)?);
        }

        let return_type = if source.next_if_eq(&'V').is_some() {
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Some(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn field_types() {
        assert_eq!(FieldType::parse("I").unwrap(), FieldType::int());
        assert_eq!(
            FieldType::parse("Ljava/lang/String;").unwrap(),
            FieldType::object("java/lang/String")
        );
        assert_eq!(
            FieldType::parse("[[J").unwrap(),
            FieldType::array(FieldType::array(FieldType::long()))
        );
        assert_eq!(
            FieldType::array(FieldType::object("Foo")).to_descriptor(),
            "[LFoo;"
        );
    }

    #[test]
    fn double_words() {
        assert!(FieldType::long().is_double_word());
        assert!(FieldType::double().is_double_word());
        assert!(!FieldType::int().is_double_word());
        assert!(!FieldType::array(FieldType::long()).is_double_word());
    }

    #[test]
    fn bad_field_types() {
        for bad in ["", "V", "L;", "Ljava/lang/String", "II", "[", "Q"] {
            match FieldType::parse(bad) {
                Err(Error::BadDescriptor(desc)) => assert_eq!(desc, bad),
                other => panic!("{:?} parsed as {:?}", bad, other),
            }
        }
    }

    #[test]
    fn method_descriptors() {
        let desc = MethodDescriptor::parse("(IJ[Ljava/lang/Object;D)V").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(desc.return_type, None);
        assert_eq!(desc.parameter_length(false), 6);
        assert_eq!(desc.parameter_length(true), 7);
        assert_eq!(desc.render(), "(IJ[Ljava/lang/Object;D)V");

        let desc = MethodDescriptor::parse("()Ljava/lang/String;").unwrap();
        assert_eq!(desc.return_type, Some(FieldType::object("java/lang/String")));

        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
    }
}
