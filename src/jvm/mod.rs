//! Model of JVM class files
//!
//! ### Reading and writing
//!
//! Reading a class file fills in a [`class_file::ConstantPool`] first, since every other structure
//! refers to constants by their index in the pool. Attributes are then decoded, resolving the
//! constants they mention through the pool, and method bodies can be walked with
//! [`code::InstructionDecoder`].
//!
//! Writing goes the other way: the pool lays out its entries and hands back a
//! [`class_file::ConstantIndices`] map, and only then can anything that mentions a constant be
//! written.
//!
//! ```
//! use jclassfile::jvm::class_file::ClassFile;
//! # fn check(bytes: &[u8]) -> Result<(), jclassfile::jvm::Error> {
//! let class = ClassFile::parse(bytes)?;
//! for method in &class.methods {
//!     if let Some(code) = method.code() {
//!         for insn in code.instructions(&class.constants) {
//!             let insn = insn?;
//!             println!("{:>5}: {}", insn.address, insn.mnemonic());
//!         }
//!     }
//! }
//!
//! let mut out = vec![];
//! class.write_to(&mut out)?;
//! assert_eq!(out, bytes);
//! # Ok(())
//! # }
//! ```
//!
//! ### Addresses
//!
//! Structures that point into a method's code (exception handlers, local variable ranges, line
//! numbers) hold a [`Location`] rather than a plain offset. Read code always has
//! [`Location::Fixed`] offsets, while code under construction may refer to a
//! [`code::Label`] that gets placed later by a [`code::LabelLayout`].

mod access_flags;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod location;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use location::*;
