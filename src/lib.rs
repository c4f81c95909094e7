//! Read, inspect, and re-encode JVM class files
//!
//! The [`jvm::class_file`] module holds the binary model: a constant pool with structural
//! interning, attributes framed by name and length, and the raw class/field/method layout. The
//! [`jvm::code`] module walks method bytecode one instruction at a time.
//!
//! ```
//! use jclassfile::jvm::class_file::ConstantPool;
//!
//! let mut pool = ConstantPool::new();
//! let object = pool.add_class("java/lang/Object");
//! assert_eq!(object, pool.add_class("java/lang/Object"));
//!
//! let indices = pool.resolve_indices().unwrap();
//! assert_eq!(indices.index_of(object).unwrap(), 2);
//! ```

pub mod jvm;
pub mod util;
