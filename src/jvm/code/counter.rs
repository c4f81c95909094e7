use super::opcodes;
use super::DecodedInstruction;
use crate::jvm::class_file::{ClassFile, Code, ConstantPool};
use crate::jvm::Error;
use log::debug;
use std::fmt;

/// Histogram of opcodes across any number of method bodies
///
/// Wide forms are counted apart from their narrow counterparts and are listed after all of the
/// narrow opcodes.
#[derive(Clone)]
pub struct OpcodeCounter {
    counts: Vec<u64>,
}

impl OpcodeCounter {
    pub fn new() -> OpcodeCounter {
        OpcodeCounter {
            counts: vec![0; 512],
        }
    }

    pub fn count(&mut self, insn: &DecodedInstruction) {
        let slot = if insn.wide { 256 } else { 0 } + insn.opcode as usize;
        self.counts[slot] += 1;
    }

    pub fn count_code(&mut self, code: &Code, constants: &ConstantPool) -> Result<(), Error> {
        for insn in code.instructions(constants) {
            self.count(&insn?);
        }
        Ok(())
    }

    /// Count every method body of a class
    pub fn count_class(&mut self, class: &ClassFile) -> Result<(), Error> {
        for method in &class.methods {
            if let Some(code) = method.code() {
                self.count_code(code, &class.constants)?;
            }
        }
        debug!("counted opcodes of {}", class.name()?);
        Ok(())
    }

    /// How many times an opcode was seen
    pub fn get(&self, opcode: u8, wide: bool) -> u64 {
        self.counts[if wide { 256 } else { 0 } + opcode as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Non-zero counts, narrow opcodes first
    pub fn iter(&self) -> impl Iterator<Item = (u8, bool, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count != 0)
            .map(|(slot, count)| ((slot % 256) as u8, slot >= 256, *count))
    }
}

impl Default for OpcodeCounter {
    fn default() -> Self {
        OpcodeCounter::new()
    }
}

/// One line per opcode seen: `mnemonic<TAB>count`, with wide forms prefixed by `wide `
impl fmt::Display for OpcodeCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (opcode, wide, count) in self.iter() {
            if wide {
                write!(f, "wide ")?;
            }
            writeln!(f, "{}\t{}", opcodes::mnemonic(opcode), count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::InstructionDecoder;

    #[test]
    fn histogram() {
        let constants = ConstantPool::new();
        // iload_0 ; iinc 0, 1 ; wide iinc 0, 1 ; iload_0 ; ireturn
        let code = [0x1a, 0x84, 0, 1, 0xc4, 0x84, 0, 0, 0, 1, 0x1a, 0xac];

        let mut counter = OpcodeCounter::new();
        for insn in InstructionDecoder::new(&code, &constants) {
            counter.count(&insn.unwrap());
        }

        assert_eq!(counter.get(0x1a, false), 2);
        assert_eq!(counter.get(opcodes::IINC, false), 1);
        assert_eq!(counter.get(opcodes::IINC, true), 1);
        assert_eq!(counter.total(), 5);
        assert_eq!(
            counter.to_string(),
            "iload_0\t2\niinc\t1\nireturn\t1\nwide iinc\t1\n"
        );
    }

    #[test]
    fn code_attribute() {
        let constants = ConstantPool::new();
        let code = Code {
            max_stack: 0,
            max_locals: 0,
            code: vec![0x00, 0x00, 0xb1],
            exception_table: vec![],
            attributes: vec![],
        };
        let mut counter = OpcodeCounter::default();
        counter.count_code(&code, &constants).unwrap();
        assert_eq!(counter.to_string(), "nop\t2\nreturn\t1\n");

        let broken = Code {
            code: vec![0x00, 0xcc],
            ..code
        };
        assert!(counter.count_code(&broken, &constants).is_err());
    }
}
