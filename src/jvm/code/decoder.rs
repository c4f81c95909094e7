use super::opcodes::{self, *};
use crate::jvm::class_file::{ConstantId, ConstantPool};
use crate::jvm::Error;
use byteorder::ReadBytesExt;
use log::trace;

/// Instruction found in a code array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Offset of the first byte (the `wide` prefix, if there is one)
    pub address: u32,

    /// Opcode of the instruction (for a wide instruction, the opcode after the prefix)
    pub opcode: u8,
    pub wide: bool,

    /// Number of bytes, including the `wide` prefix and any switch padding
    pub length: u32,
    pub operands: Operands,
}

/// Operands of an instruction, grouped by shape
///
/// Constant pool references keep the raw index alongside the constant it resolves to. Indices
/// that do not resolve (corrupt or foreign code) decode to `None` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    None,

    /// `ldc`, `ldc_w`, `ldc2_w`, field and method instructions, `new`, `anewarray`, `checkcast`,
    /// `instanceof`
    Constant {
        index: u16,
        constant: Option<ConstantId>,
    },
    InvokeInterface {
        index: u16,
        constant: Option<ConstantId>,
        count: u8,
    },

    /// The two trailing zero bytes are not kept
    InvokeDynamic {
        index: u16,
        constant: Option<ConstantId>,
    },
    MultiANewArray {
        index: u16,
        constant: Option<ConstantId>,
        dimensions: u8,
    },

    /// Loads, stores, and `ret`
    Local(u16),
    Increment { slot: u16, delta: i16 },

    /// Offset relative to the address of the instruction
    Branch(i32),

    /// `bipush` and `sipush`
    Immediate(i16),

    /// `newarray` element type
    ArrayType(u8),
    TableSwitch {
        default: i32,
        low: i32,
        high: i32,
        offsets: Vec<i32>,
    },
    LookupSwitch {
        default: i32,
        pairs: Vec<(i32, i32)>,
    },
}

impl DecodedInstruction {
    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode)
    }

    /// Address just past this instruction
    pub fn next_address(&self) -> u32 {
        self.address + self.length
    }

    /// Absolute addresses this instruction may jump to (not counting falling through)
    ///
    /// Offsets that would land before the start of the code are left out.
    pub fn branch_targets(&self) -> Vec<u32> {
        let offsets: Vec<i32> = match &self.operands {
            Operands::Branch(offset) => vec![*offset],
            Operands::TableSwitch {
                default, offsets, ..
            } => std::iter::once(*default).chain(offsets.iter().copied()).collect(),
            Operands::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, offset)| *offset))
                .collect(),
            _ => vec![],
        };
        offsets
            .into_iter()
            .filter_map(|offset| u32::try_from(self.address as i64 + offset as i64).ok())
            .collect()
    }
}

/// Forward-only walk over a code array
///
/// Iteration stops after the first error, since the decoder can no longer tell where the next
/// instruction starts.
pub struct InstructionDecoder<'a> {
    code: &'a [u8],
    constants: &'a ConstantPool,
    address: usize,
    failed: bool,
}

impl<'a> InstructionDecoder<'a> {
    pub fn new(code: &'a [u8], constants: &'a ConstantPool) -> InstructionDecoder<'a> {
        InstructionDecoder {
            code,
            constants,
            address: 0,
            failed: false,
        }
    }

    /// Address of the next instruction to be decoded
    pub fn address(&self) -> u32 {
        self.address as u32
    }

    fn decode_next(&self) -> Result<DecodedInstruction, Error> {
        let address = self.address as u32;
        let mut reader = OperandReader {
            bytes: &self.code[self.address..],
            address,
            opcode: self.code[self.address],
        };

        let mut opcode = reader.u8()?;
        let wide = opcode == WIDE;
        if wide {
            opcode = reader.u8()?;
            reader.opcode = opcode;
            if !opcodes::is_widenable(opcode) {
                return Err(Error::InvalidWideOpcode { address, opcode });
            }
        }
        if !opcodes::is_defined(opcode) {
            return Err(Error::InvalidOpcode { address, opcode });
        }

        let operands = match opcode {
            BIPUSH => Operands::Immediate(reader.u8()? as i8 as i16),
            SIPUSH => Operands::Immediate(reader.u16()? as i16),
            LDC => self.constant(reader.u8()? as u16),
            LDC_W | LDC2_W | GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                self.constant(reader.u16()?)
            }
            INVOKEINTERFACE => {
                let index = reader.u16()?;
                let count = reader.u8()?;
                reader.u8()?;
                Operands::InvokeInterface {
                    index,
                    constant: self.constants.id_at(index).ok(),
                    count,
                }
            }
            INVOKEDYNAMIC => {
                let index = reader.u16()?;
                reader.u16()?;
                Operands::InvokeDynamic {
                    index,
                    constant: self.constants.id_at(index).ok(),
                }
            }
            MULTIANEWARRAY => {
                let index = reader.u16()?;
                Operands::MultiANewArray {
                    index,
                    constant: self.constants.id_at(index).ok(),
                    dimensions: reader.u8()?,
                }
            }
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => {
                Operands::Local(if wide { reader.u16()? } else { reader.u8()? as u16 })
            }
            IINC if wide => Operands::Increment {
                slot: reader.u16()?,
                delta: reader.u16()? as i16,
            },
            IINC => Operands::Increment {
                slot: reader.u8()? as u16,
                delta: reader.u8()? as i8 as i16,
            },
            IFEQ..=JSR | IFNULL | IFNONNULL => Operands::Branch(reader.u16()? as i16 as i32),
            GOTO_W | JSR_W => Operands::Branch(reader.i32()?),
            NEWARRAY => Operands::ArrayType(reader.u8()?),
            TABLESWITCH => {
                reader.padding()?;
                let default = reader.i32()?;
                let low = reader.i32()?;
                let high = reader.i32()?;
                if high < low {
                    return Err(Error::InvalidSwitch { address });
                }
                let count = (high as i64 - low as i64 + 1) as usize;
                reader.ensure(count.saturating_mul(4))?;
                let offsets = (0..count)
                    .map(|_| reader.i32())
                    .collect::<Result<Vec<i32>, Error>>()?;
                Operands::TableSwitch {
                    default,
                    low,
                    high,
                    offsets,
                }
            }
            LOOKUPSWITCH => {
                reader.padding()?;
                let default = reader.i32()?;
                let npairs = reader.i32()?;
                if npairs < 0 {
                    return Err(Error::InvalidSwitch { address });
                }
                reader.ensure((npairs as usize).saturating_mul(8))?;
                let pairs = (0..npairs)
                    .map(|_| Ok((reader.i32()?, reader.i32()?)))
                    .collect::<Result<Vec<(i32, i32)>, Error>>()?;
                Operands::LookupSwitch { default, pairs }
            }
            _ => Operands::None,
        };

        let length = (self.code.len() - self.address - reader.bytes.len()) as u32;
        let insn = DecodedInstruction {
            address,
            opcode,
            wide,
            length,
            operands,
        };
        trace!("{:>5}: {} {:?}", address, insn.mnemonic(), insn.operands);
        Ok(insn)
    }

    fn constant(&self, index: u16) -> Operands {
        Operands::Constant {
            index,
            constant: self.constants.id_at(index).ok(),
        }
    }
}

impl<'a> Iterator for InstructionDecoder<'a> {
    type Item = Result<DecodedInstruction, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.address >= self.code.len() {
            return None;
        }
        match self.decode_next() {
            Ok(insn) => {
                self.address += insn.length as usize;
                Some(Ok(insn))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads the operands of one instruction, reporting a short read as a truncated instruction
struct OperandReader<'a> {
    bytes: &'a [u8],
    address: u32,
    opcode: u8,
}

impl<'a> OperandReader<'a> {
    fn truncated(&self) -> Error {
        Error::TruncatedInstruction {
            address: self.address,
            opcode: self.opcode,
        }
    }

    fn u8(&mut self) -> Result<u8, Error> {
        self.bytes.read_u8().map_err(|_| self.truncated())
    }

    fn u16(&mut self) -> Result<u16, Error> {
        self.bytes
            .read_u16::<byteorder::BigEndian>()
            .map_err(|_| self.truncated())
    }

    fn i32(&mut self) -> Result<i32, Error> {
        self.bytes
            .read_i32::<byteorder::BigEndian>()
            .map_err(|_| self.truncated())
    }

    /// Fail early if fewer than `len` bytes remain
    fn ensure(&self, len: usize) -> Result<(), Error> {
        if self.bytes.len() < len {
            Err(self.truncated())
        } else {
            Ok(())
        }
    }

    /// Skip to a 4-byte boundary relative to the start of the code array
    ///
    /// Called right after the opcode byte, so `address + 1` is the offset of the padding.
    fn padding(&mut self) -> Result<(), Error> {
        let padding = (4 - (self.address as usize + 1) % 4) % 4;
        self.ensure(padding)?;
        self.bytes = &self.bytes[padding..];
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode_all(code: &[u8], constants: &ConstantPool) -> Result<Vec<DecodedInstruction>, Error> {
        InstructionDecoder::new(code, constants).collect()
    }

    #[test]
    fn simple_shapes() {
        let mut constants = ConstantPool::new();
        let string = constants.add_string("hi");
        let class = constants.add_class("java/lang/Object");

        // ldc #2 ; new #4 ; bipush -2 ; sipush 300 ; iload 4 ; iinc 1, -1 ; newarray int ; return
        let code = [
            0x12, 2, 0xbb, 0, 4, 0x10, 0xfe, 0x11, 0x01, 0x2c, 0x15, 4, 0x84, 1, 0xff, 0xbc, 10,
            0xb1,
        ];
        let insns = decode_all(&code, &constants).unwrap();
        let addresses: Vec<u32> = insns.iter().map(|insn| insn.address).collect();
        assert_eq!(addresses, vec![0, 2, 5, 7, 10, 12, 15, 17]);

        assert_eq!(
            insns[0].operands,
            Operands::Constant {
                index: 2,
                constant: Some(string)
            }
        );
        assert_eq!(
            insns[1].operands,
            Operands::Constant {
                index: 4,
                constant: Some(class.into())
            }
        );
        assert_eq!(insns[2].operands, Operands::Immediate(-2));
        assert_eq!(insns[3].operands, Operands::Immediate(300));
        assert_eq!(insns[4].operands, Operands::Local(4));
        assert_eq!(insns[5].operands, Operands::Increment { slot: 1, delta: -1 });
        assert_eq!(insns[6].operands, Operands::ArrayType(10));
        assert_eq!(insns[7].mnemonic(), "return");
        assert_eq!(insns[7].operands, Operands::None);
    }

    #[test]
    fn unresolved_constant_is_none() {
        let constants = ConstantPool::new();
        let insns = decode_all(&[0x13, 0, 7, 0xb2, 0, 0], &constants).unwrap();
        assert_eq!(
            insns[0].operands,
            Operands::Constant {
                index: 7,
                constant: None
            }
        );
        assert_eq!(
            insns[1].operands,
            Operands::Constant {
                index: 0,
                constant: None
            }
        );
    }

    #[test]
    fn wide_iinc_is_six_bytes() {
        let constants = ConstantPool::new();
        let code = [0xc4, 0x84, 0x01, 0x00, 0xff, 0x9c, 0xc4, 0x15, 0x01, 0x02, 0xb1];
        let insns = decode_all(&code, &constants).unwrap();
        assert_eq!(insns.len(), 3);

        assert_eq!(insns[0].opcode, IINC);
        assert!(insns[0].wide);
        assert_eq!(insns[0].length, 6);
        assert_eq!(
            insns[0].operands,
            Operands::Increment {
                slot: 256,
                delta: -100
            }
        );

        assert_eq!(insns[1].address, 6);
        assert_eq!(insns[1].length, 4);
        assert_eq!(insns[1].operands, Operands::Local(258));
        assert_eq!(insns[2].address, 10);
    }

    #[test]
    fn wide_on_other_opcode() {
        let constants = ConstantPool::new();
        let mut decoder = InstructionDecoder::new(&[0x00, 0xc4, 0xa7, 0, 0], &constants);
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(
            decoder.next(),
            Some(Err(Error::InvalidWideOpcode {
                address: 1,
                opcode: 0xa7
            }))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn undefined_and_reserved_opcodes() {
        let constants = ConstantPool::new();
        let insns = decode_all(&[0xca, 0xfe, 0xff], &constants).unwrap();
        assert_eq!(insns.len(), 3);
        assert!(insns.iter().all(|insn| insn.length == 1));

        assert!(matches!(
            decode_all(&[0x00, 0xcb], &constants),
            Err(Error::InvalidOpcode {
                address: 1,
                opcode: 0xcb
            })
        ));
    }

    #[test]
    fn truncated_operands() {
        let constants = ConstantPool::new();
        assert!(matches!(
            decode_all(&[0x00, 0x11, 0x01], &constants),
            Err(Error::TruncatedInstruction {
                address: 1,
                opcode: SIPUSH
            })
        ));
        assert!(matches!(
            decode_all(&[0xc4], &constants),
            Err(Error::TruncatedInstruction { address: 0, .. })
        ));
        assert!(matches!(
            decode_all(&[0xc8, 0, 0, 0], &constants),
            Err(Error::TruncatedInstruction { address: 0, .. })
        ));
    }

    #[test]
    fn branches() {
        let constants = ConstantPool::new();
        // nop ; ifeq -1 ; goto_w +8 ; nop
        let code = [0x00, 0x99, 0xff, 0xff, 0xc8, 0, 0, 0, 8, 0x00];
        let insns = decode_all(&code, &constants).unwrap();
        assert_eq!(insns[1].operands, Operands::Branch(-1));
        assert_eq!(insns[1].branch_targets(), vec![0]);
        assert_eq!(insns[2].branch_targets(), vec![12]);
        assert_eq!(insns[2].next_address(), 9);

        // goto -5 at address 0 lands before the code
        let insns = decode_all(&[0xa7, 0xff, 0xfb], &constants).unwrap();
        assert!(insns[0].branch_targets().is_empty());
    }

    #[test]
    fn switch_alignment() {
        let constants = ConstantPool::new();

        // At address 1, the padding is 2 bytes
        let mut code = vec![0x00, 0xaa, 0, 0];
        code.extend_from_slice(&20i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&2i32.to_be_bytes());
        code.extend_from_slice(&12i32.to_be_bytes());
        code.extend_from_slice(&16i32.to_be_bytes());
        code.push(0xb1);

        let insns = decode_all(&code, &constants).unwrap();
        assert_eq!(insns[1].length, 1 + 2 + 12 + 8);
        assert_eq!(
            insns[1].operands,
            Operands::TableSwitch {
                default: 20,
                low: 1,
                high: 2,
                offsets: vec![12, 16]
            }
        );
        assert_eq!(insns[1].branch_targets(), vec![21, 13, 17]);
        assert_eq!(insns[2].address, 24);

        // At address 3, there is no padding
        let mut code = vec![0x00, 0x00, 0x00, 0xab];
        code.extend_from_slice(&9i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&(-3i32).to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes());
        let insns = decode_all(&code, &constants).unwrap();
        assert_eq!(insns[3].length, 1 + 8 + 8);
        assert_eq!(
            insns[3].operands,
            Operands::LookupSwitch {
                default: 9,
                pairs: vec![(-3, 5)]
            }
        );
    }

    #[test]
    fn bad_switches() {
        let constants = ConstantPool::new();

        let mut code = vec![0xaa, 0, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&5i32.to_be_bytes());
        code.extend_from_slice(&4i32.to_be_bytes());
        assert!(matches!(
            decode_all(&code, &constants),
            Err(Error::InvalidSwitch { address: 0 })
        ));

        let mut code = vec![0xab, 0, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            decode_all(&code, &constants),
            Err(Error::InvalidSwitch { address: 0 })
        ));

        // A huge table with nothing behind it
        let mut code = vec![0xaa, 0, 0, 0];
        code.extend_from_slice(&0i32.to_be_bytes());
        code.extend_from_slice(&i32::MIN.to_be_bytes());
        code.extend_from_slice(&i32::MAX.to_be_bytes());
        assert!(matches!(
            decode_all(&code, &constants),
            Err(Error::TruncatedInstruction { address: 0, .. })
        ));
    }

    #[test]
    fn invoke_shapes() {
        let mut constants = ConstantPool::new();
        let list = constants.add_class("java/util/List");
        let size = constants.add_name_and_type("size", "()I");
        let method = constants.add_interface_method_ref(list, size).unwrap();
        let indices = constants.resolve_indices().unwrap();
        let index = indices.index_of(method).unwrap();

        let code = [
            0xb9,
            (index >> 8) as u8,
            index as u8,
            1,
            0,
            0xba,
            0,
            9,
            0,
            0,
            0xc5,
            0,
            2,
            3,
        ];
        let insns = decode_all(&code, &constants).unwrap();
        assert_eq!(
            insns[0].operands,
            Operands::InvokeInterface {
                index,
                constant: Some(method),
                count: 1
            }
        );
        assert_eq!(insns[1].length, 5);
        assert_eq!(
            insns[1].operands,
            Operands::InvokeDynamic {
                index: 9,
                constant: None
            }
        );
        assert_eq!(insns[2].length, 4);
        assert!(matches!(
            insns[2].operands,
            Operands::MultiANewArray { dimensions: 3, .. }
        ));
    }
}
