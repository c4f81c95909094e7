//! Walking method bytecode
//!
//! [`InstructionDecoder`] turns a code array into a sequence of [`DecodedInstruction`]s, which
//! are enough to count opcodes, find branch targets, or check that the exception table lines up
//! with the instructions (see [`flow`]). Labels are for the other direction: structures that
//! refer to code which has not been laid out yet hold a [`Label`] until a [`LabelLayout`] fixes
//! its offset.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-6.html

mod counter;
mod decoder;
pub mod flow;
mod label;
pub mod opcodes;

pub use counter::*;
pub use decoder::*;
pub use label::*;
