use jclassfile::jvm::class_file::*;
use jclassfile::jvm::code::{flow, OpcodeCounter, Operands};
use jclassfile::jvm::*;

const GREETING: &str = "Hello,\u{0} world \u{1F600}";

/// Equivalent of
///
/// ```java
/// public class Hello {
///     static final int ANSWER = 42;
///
///     @Deprecated(since = "9")
///     public static void main(String[] args) {
///         System.out.println("Hello,\0 world 😀");
///         long unused = 1L << 40;
///     }
/// }
/// ```
fn hello_world() -> ClassFile {
    let mut constants = ConstantPool::new();
    let this_class = constants.add_class("Hello");
    let object = constants.add_class("java/lang/Object");
    let system = constants.add_class("java/lang/System");
    let out_type = constants.add_name_and_type("out", "Ljava/io/PrintStream;");
    let out = constants.add_field_ref(system, out_type).unwrap();
    let print_stream = constants.add_class("java/io/PrintStream");
    let println_type = constants.add_name_and_type("println", "(Ljava/lang/String;)V");
    let println = constants.add_method_ref(print_stream, println_type).unwrap();
    let greeting = constants.add_string(GREETING);
    let big = constants.add_long(1 << 40);
    let answer = constants.add_integer(42);

    let indices = constants.resolve_indices().unwrap();
    let [out_hi, out_lo] = indices.index_of(out).unwrap().to_be_bytes();
    let [println_hi, println_lo] = indices.index_of(println).unwrap().to_be_bytes();
    let [big_hi, big_lo] = indices.index_of(big).unwrap().to_be_bytes();
    let greeting = indices.index_of(greeting).unwrap() as u8;

    // 0: getstatic ; 3: ldc ; 5: invokevirtual ; 8: ldc2_w ; 11: lstore_1 ; 12: return
    let code = vec![
        0xb2, out_hi, out_lo, 0x12, greeting, 0xb6, println_hi, println_lo, 0x14, big_hi, big_lo,
        0x40, 0xb1,
    ];

    let mut locals = LocalVariableTableBuilder::new();
    locals.add_entry(
        &mut constants,
        LocalVariable {
            name: Some("args".to_owned()),
            variable_type: FieldType::array(FieldType::object("java/lang/String")),
            slot: 0,
            ranges: vec![LocationRange::new(0, 13)],
        },
    );
    locals.add_entry(
        &mut constants,
        LocalVariable {
            name: Some("unused".to_owned()),
            variable_type: FieldType::long(),
            slot: 1,
            ranges: vec![LocationRange::new(12, 13)],
        },
    );
    let locals = Attribute::new(&mut constants, locals.finalize());
    let lines = Attribute::new(
        &mut constants,
        LineNumberTable(vec![
            LineNumber {
                start: Location::Fixed(0),
                line: 5,
            },
            LineNumber {
                start: Location::Fixed(8),
                line: 6,
            },
        ]),
    );
    let throwable = constants.add_class("java/lang/Throwable");
    let code = Code {
        max_stack: 2,
        max_locals: 3,
        code,
        exception_table: vec![ExceptionHandler {
            start: Location::Fixed(0),
            end: Location::Fixed(8),
            handler: Location::Fixed(12),
            catch_type: Some(throwable),
        }],
        attributes: vec![lines, locals],
    };

    let args = constants.add_utf8("args");
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
    let main = Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        name: constants.add_utf8("main"),
        descriptor: constants.add_utf8("([Ljava/lang/String;)V"),
        attributes: vec![
            Attribute::new(&mut constants, code),
            Attribute::new(
                &mut constants,
                MethodParameters(vec![MethodParameter {
                    name: Some(args),
                    access_flags: ParameterAccessFlags::FINAL,
                }]),
            ),
            Attribute::new(&mut constants, RuntimeVisibleAnnotations(vec![deprecated])),
        ],
    };

    let field = Field {
        access_flags: FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        name: constants.add_utf8("ANSWER"),
        descriptor: constants.add_utf8("I"),
        attributes: vec![Attribute::new(&mut constants, ConstantValue(answer))],
    };

    let source_file = SourceFile(constants.add_utf8("Hello.java"));
    let attributes = vec![
        Attribute::new(&mut constants, source_file),
        Attribute {
            name: constants.add_utf8("org.example.Custom"),
            info: AttributeInfo::Unknown(vec![0xca, 0xfe, 0x00, 0x01]),
        },
    ];

    ClassFile {
        version: Version::JAVA8,
        constants,
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class: Some(object),
        interfaces: vec![],
        fields: vec![field],
        methods: vec![main],
        attributes,
    }
}

#[test]
fn whole_class_round_trip() {
    let bytes = hello_world().to_bytes().unwrap();
    assert_eq!(&bytes[..8], &[0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52]);

    let class = ClassFile::parse(&bytes).unwrap();
    assert_eq!(class.to_bytes().unwrap(), bytes);

    let mut written = vec![];
    class.write_to(&mut written).unwrap();
    assert_eq!(written, bytes);
}

#[test]
fn parsed_class_contents() {
    let bytes = hello_world().to_bytes().unwrap();
    let class = ClassFile::parse(&bytes).unwrap();
    let constants = &class.constants;

    assert_eq!(class.version, Version::JAVA8);
    assert_eq!(class.name().unwrap(), "Hello");
    assert_eq!(
        constants.class_name(class.super_class.unwrap()).unwrap(),
        "java/lang/Object"
    );
    assert_eq!(class.source_file(), Some("Hello.java"));

    let field = &class.fields[0];
    assert_eq!(field.field_type(constants).unwrap(), FieldType::int());
    let value = field.constant_value().unwrap();
    assert_eq!(constants.constant(value).unwrap(), &ConstantInfo::Integer(42));

    let method = &class.methods[0];
    let descriptor = method.parse_descriptor(constants).unwrap();
    assert_eq!(descriptor.return_type, None);
    assert_eq!(descriptor.parameter_length(false), 1);

    let annotation = method
        .attributes
        .iter()
        .find_map(|attribute| match &attribute.info {
            AttributeInfo::RuntimeVisibleAnnotations(annotations) => annotations.0.first(),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        constants.utf8(annotation.type_descriptor).unwrap(),
        "Ljava/lang/Deprecated;"
    );
    match annotation.elements[0].value {
        ElementValue::Constant { tag: b's', value } => {
            assert_eq!(constants.constant(value).unwrap(), &ConstantInfo::Utf8("9".to_owned()))
        }
        ref other => panic!("unexpected element {:?}", other),
    }

    let code = method.code().unwrap();
    let mnemonics: Vec<&str> = code
        .instructions(constants)
        .map(|insn| insn.unwrap().mnemonic())
        .collect();
    assert_eq!(
        mnemonics,
        vec!["getstatic", "ldc", "invokevirtual", "ldc2_w", "lstore_1", "return"]
    );

    // The string loaded by `ldc` survived modified UTF-8
    let ldc = code.instructions(constants).nth(1).unwrap().unwrap();
    let string = match ldc.operands {
        Operands::Constant {
            constant: Some(constant),
            ..
        } => constant,
        other => panic!("unexpected operands {:?}", other),
    };
    match constants.constant(string).unwrap() {
        ConstantInfo::String(utf8) => assert_eq!(constants.utf8(*utf8).unwrap(), GREETING),
        other => panic!("unexpected constant {:?}", other),
    }

    let locals = code.local_variable_table().unwrap();
    let unused = locals.lookup(2, 12).unwrap();
    assert_eq!(constants.utf8(unused.name).unwrap(), "unused");
    assert!(locals.lookup(1, 11).is_none());

    let lines = code.line_number_table().unwrap();
    assert_eq!(lines.0[1].start, Location::Fixed(8));

    let handler = code.exception_table[0];
    assert_eq!(
        constants.class_name(handler.catch_type.unwrap()).unwrap(),
        "java/lang/Throwable"
    );

    let custom = &class.attributes[1];
    assert_eq!(constants.utf8(custom.name).unwrap(), "org.example.Custom");
    assert!(matches!(
        &custom.info,
        AttributeInfo::Unknown(bytes) if bytes == &[0xca, 0xfe, 0x00, 0x01]
    ));
}

#[test]
fn instruction_boundaries() {
    let class = hello_world();
    let code = class.methods[0].code().unwrap();
    let starts = flow::instruction_starts(&code.code, &class.constants).unwrap();
    assert_eq!(starts.iter_set().collect::<Vec<_>>(), vec![0, 3, 5, 8, 11, 12]);
    assert!(flow::misaligned_handlers(code, &starts).is_empty());

    let mut counter = OpcodeCounter::new();
    counter.count_class(&class).unwrap();
    assert_eq!(counter.total(), 6);
}

#[test]
fn long_takes_two_slots() {
    let class = hello_world();
    let indices = class.constants.resolve_indices().unwrap();
    let (_, big, _) = class
        .constants
        .iter()
        .find(|(_, _, info)| matches!(info, ConstantInfo::Long(_)))
        .unwrap();
    let big = indices.index_of(big).unwrap();
    assert!(matches!(
        class.constants.get_constant(big + 1),
        Err(Error::InvalidConstantIndex(_))
    ));
    assert!(class.constants.get_constant(big + 2).is_ok());
}

#[test]
fn malformed_class_files() {
    let bytes = hello_world().to_bytes().unwrap();

    let mut bad_magic = bytes.clone();
    bad_magic[3] = 0xbf;
    assert!(matches!(
        ClassFile::parse(&bad_magic),
        Err(Error::BadMagic(0xcafe_babf))
    ));

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert!(matches!(
        ClassFile::parse(&trailing),
        Err(Error::TrailingBytes(1))
    ));

    assert!(matches!(
        ClassFile::parse(&bytes[..bytes.len() - 1]),
        Err(Error::IoError(_))
    ));
}

#[test]
fn copying_between_pools() {
    let class = hello_world();
    let mut other = ConstantPool::new();
    let print_stream = other.add_class("java/io/PrintStream");

    let (_, println, _) = class
        .constants
        .iter()
        .find(|(_, _, info)| matches!(info, ConstantInfo::MethodRef { .. }))
        .unwrap();
    let copied = println.copy_to(&class.constants, &mut other).unwrap();
    let before = other.len();
    assert_eq!(println.copy_to(&class.constants, &mut other).unwrap(), copied);
    assert_eq!(other.len(), before);

    match other.constant(copied).unwrap() {
        ConstantInfo::MethodRef { class, .. } => assert_eq!(*class, print_stream),
        info => panic!("unexpected constant {:?}", info),
    }

    // Ids of one pool are meaningless in another
    assert!(matches!(
        other.resolve_indices().unwrap().index_of(println),
        Err(Error::ForeignConstant(_))
    ));
}
