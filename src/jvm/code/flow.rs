//! Per-address facts about a code array, kept in [`BitList`]s

use super::{opcodes, InstructionDecoder};
use crate::jvm::class_file::{Code, ConstantPool, ExceptionHandler};
use crate::jvm::Error;
use crate::util::BitList;

/// Addresses at which an instruction begins
pub fn instruction_starts(code: &[u8], constants: &ConstantPool) -> Result<BitList, Error> {
    let mut starts = BitList::new(code.len());
    for insn in InstructionDecoder::new(code, constants) {
        starts.set(insn?.address as usize);
    }
    Ok(starts)
}

/// Addresses that begin a basic block
///
/// These are the start of the code, every branch target, every instruction following a branch
/// or an instruction that does not fall through, and the bounds and entry points of exception
/// handlers. Addresses at or past the end of the code do not begin anything and are left out.
pub fn block_starts(code: &Code, constants: &ConstantPool) -> Result<BitList, Error> {
    let len = code.code.len();
    let mut blocks = BitList::new(len);
    let mark = |list: &mut BitList, address: u32| {
        if (address as usize) < len {
            list.set(address as usize);
        }
    };

    mark(&mut blocks, 0);
    for insn in code.instructions(constants) {
        let insn = insn?;
        let targets = insn.branch_targets();
        if !targets.is_empty() || opcodes::ends_block(insn.opcode) {
            mark(&mut blocks, insn.next_address());
        }
        for target in targets {
            mark(&mut blocks, target);
        }
    }

    let mut handlers = BitList::new(len);
    for handler in &code.exception_table {
        for location in [handler.start, handler.end, handler.handler] {
            if let Some(offset) = location.fixed() {
                mark(&mut handlers, offset);
            }
        }
    }
    blocks.or(&handlers);
    Ok(blocks)
}

/// Exception handlers whose addresses do not line up with instructions
///
/// `starts` is the result of [`instruction_starts`] for the same code. The end of a range may
/// also be the end of the code, and handlers that still have pending locations are reported.
pub fn misaligned_handlers<'a>(code: &'a Code, starts: &BitList) -> Vec<&'a ExceptionHandler> {
    let on_instruction = |offset: u32, may_end: bool| {
        starts.get(offset as usize) || (may_end && offset as usize == code.code.len())
    };
    code.exception_table
        .iter()
        .filter(|handler| {
            match (
                handler.start.fixed(),
                handler.end.fixed(),
                handler.handler.fixed(),
            ) {
                (Some(start), Some(end), Some(target)) => {
                    !(on_instruction(start, false)
                        && on_instruction(end, true)
                        && on_instruction(target, false))
                }
                _ => true,
            }
        })
        .collect()
}

/// Branch targets that land in the middle of an instruction (or past the end of the code), in
/// ascending order
pub fn stray_branch_targets(code: &[u8], constants: &ConstantPool) -> Result<Vec<u32>, Error> {
    let starts = instruction_starts(code, constants)?;
    let mut targets = BitList::new(code.len());
    let mut beyond: Vec<u32> = vec![];
    for insn in InstructionDecoder::new(code, constants) {
        for target in insn?.branch_targets() {
            if (target as usize) < code.len() {
                targets.set(target as usize);
            } else {
                beyond.push(target);
            }
        }
    }
    beyond.sort_unstable();
    beyond.dedup();

    let mut stray: Vec<u32> = targets
        .iter_set()
        .filter(|target| !starts.get(*target))
        .map(|target| target as u32)
        .collect();
    stray.extend(beyond);
    Ok(stray)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Location;

    fn code(bytes: Vec<u8>, exception_table: Vec<ExceptionHandler>) -> Code {
        Code {
            max_stack: 1,
            max_locals: 1,
            code: bytes,
            exception_table,
            attributes: vec![],
        }
    }

    fn handler(start: u32, end: u32, target: u32) -> ExceptionHandler {
        ExceptionHandler {
            start: Location::Fixed(start),
            end: Location::Fixed(end),
            handler: Location::Fixed(target),
            catch_type: None,
        }
    }

    // 0: iload_0 ; 1: ifeq +6 ; 4: iconst_1 ; 5: ireturn ; 6: nop ; 7: iconst_0 ; 8: ireturn
    const BRANCHY: [u8; 9] = [0x1a, 0x99, 0x00, 0x06, 0x04, 0xac, 0x00, 0x03, 0xac];

    #[test]
    fn starts() {
        let constants = ConstantPool::new();
        let starts = instruction_starts(&BRANCHY, &constants).unwrap();
        let set: Vec<usize> = starts.iter_set().collect();
        assert_eq!(set, vec![0, 1, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn blocks() {
        let constants = ConstantPool::new();
        let code = code(BRANCHY.to_vec(), vec![handler(4, 6, 6)]);
        let blocks = block_starts(&code, &constants).unwrap();
        let set: Vec<usize> = blocks.iter_set().collect();
        assert_eq!(set, vec![0, 4, 6, 7]);
    }

    #[test]
    fn handler_alignment() {
        let constants = ConstantPool::new();
        let aligned = handler(0, 9, 7);
        let middle = handler(2, 5, 6);
        let pending = ExceptionHandler {
            handler: Location::Pending(crate::jvm::code::Label::START.next()),
            ..aligned
        };
        let code = code(BRANCHY.to_vec(), vec![aligned, middle, pending]);

        let starts = instruction_starts(&code.code, &constants).unwrap();
        let misaligned = misaligned_handlers(&code, &starts);
        assert_eq!(misaligned, vec![&middle, &pending]);
    }

    #[test]
    fn stray_targets() {
        let constants = ConstantPool::new();
        assert!(stray_branch_targets(&BRANCHY, &constants).unwrap().is_empty());

        // goto +2 jumps into its own operand
        let code = [0xa7, 0x00, 0x02, 0xb1];
        assert_eq!(stray_branch_targets(&code, &constants).unwrap(), vec![2]);
    }

    #[test]
    fn targets_past_the_end() {
        let constants = ConstantPool::new();

        // 0: goto_w +0x7fffffff ; 5: goto -5 ; 8: return
        let bytes = vec![0xc8, 0x7f, 0xff, 0xff, 0xff, 0xa7, 0xff, 0xfb, 0xb1];
        assert_eq!(
            stray_branch_targets(&bytes, &constants).unwrap(),
            vec![0x7fff_ffff]
        );

        let code = code(bytes, vec![handler(0, 9, 8)]);
        let blocks = block_starts(&code, &constants).unwrap();
        assert_eq!(blocks.iter_set().collect::<Vec<_>>(), vec![0, 5, 8]);
        assert_eq!(blocks.capacity(), 32);
    }
}
