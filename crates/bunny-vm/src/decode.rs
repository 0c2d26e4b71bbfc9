use bunny_core::{BunnyError, Result};

use crate::opcodes::{Instruction, Op};

/// Sequential reader over a finished word array.
///
/// Offset 0 is the max-stack word, so valid positions are `1..len`.
pub struct InstructionReader<C: AsRef<[u16]>> {
    code: C,
    pos: usize,
}

impl<C: AsRef<[u16]>> InstructionReader<C> {
    /// Reader positioned at the first instruction.
    pub fn new(code: C) -> Result<Self> {
        Self::at(code, 1)
    }

    /// Reader positioned at `pos`.
    pub fn at(code: C, pos: usize) -> Result<Self> {
        let mut reader = InstructionReader { code, pos: 1 };
        reader.seek(pos)?;
        Ok(reader)
    }

    pub fn max_stack(&self) -> usize {
        self.code.as_ref().first().copied().map_or(0, usize::from)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.code.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.len()
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        let len = self.len();
        if pos < 1 || pos >= len {
            return Err(BunnyError::decode(format!(
                "seek to {pos} outside code of length {len}"
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Decode and skip past one instruction, including the opcodes the
    /// compiler never emits. Used by the disassembler.
    pub fn next_raw(&mut self) -> Result<Instruction> {
        let code = self.code.as_ref();
        let Some(&word) = code.get(self.pos) else {
            return Err(BunnyError::decode(format!(
                "read past end of code at {}",
                self.pos
            )));
        };
        let op = Op::from_u16(word).ok_or_else(|| {
            BunnyError::decode(format!("unknown opcode {word} at {}", self.pos))
        })?;
        let operand = if op.info().nargs == 1 {
            match code.get(self.pos + 1) {
                Some(&w) => w,
                None => {
                    return Err(BunnyError::decode(format!(
                        "truncated {} at {}",
                        op.name(),
                        self.pos
                    )))
                }
            }
        } else {
            0
        };
        self.pos += 1 + op.info().nargs;
        Ok(Instruction::from_parts(op, operand))
    }

    /// Decode the next executable instruction.
    pub fn next(&mut self) -> Result<Instruction> {
        let at = self.pos;
        let instruction = self.next_raw()?;
        match instruction {
            Instruction::Nop | Instruction::Dup | Instruction::Label(_) | Instruction::Halt => {
                Err(BunnyError::invalid_state(format!(
                    "unexpected {} at {at}",
                    instruction.op().name()
                )))
            }
            other => Ok(other),
        }
    }
}
