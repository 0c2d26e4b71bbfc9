use bunny_core::{BunnyError, Result};
use hashbrown::HashMap;

use crate::opcodes::Instruction;

/// Assembles instructions into a flat word array.
///
/// Word 0 is reserved for the peak cumulative stack effect. Labels emit no
/// code; jumps to them are written with the label id as a placeholder and
/// resolved when [`BytecodeWriter::bytecode`] is called.
pub struct BytecodeWriter {
    code: Vec<u16>,
    stack_size: i32,
    max_stack: i32,
    labels: HashMap<u16, usize>,
    fixups: Vec<usize>,
}

impl BytecodeWriter {
    pub fn new() -> Self {
        BytecodeWriter {
            code: vec![0],
            stack_size: 0,
            max_stack: 0,
            labels: HashMap::new(),
            fixups: Vec::new(),
        }
    }

    pub fn write(&mut self, instruction: Instruction) {
        let op = instruction.op();
        self.stack_size += op.info().stack_effect;
        self.max_stack = self.max_stack.max(self.stack_size);

        match instruction {
            Instruction::Label(id) => {
                self.labels.insert(id, self.code.len());
            }
            Instruction::Jump(id) | Instruction::JumpIfNot(id) => {
                self.code.push(op as u16);
                self.fixups.push(self.code.len());
                self.code.push(id);
            }
            other => {
                self.code.push(op as u16);
                if let Some(operand) = other.operand() {
                    self.code.push(operand);
                }
            }
        }
    }

    pub fn write_all(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        for instruction in instructions {
            self.write(instruction);
        }
    }

    /// Current output offset, counting the max-stack word.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Resolve jump targets and return the finished words.
    pub fn bytecode(mut self) -> Result<Vec<u16>> {
        if self.code.len() > usize::from(u16::MAX) {
            return Err(BunnyError::resource_exhausted(format!(
                "function body of {} words does not fit 16-bit jump targets",
                self.code.len()
            )));
        }
        self.code[0] = u16::try_from(self.max_stack.max(0)).map_err(|_| {
            BunnyError::resource_exhausted(format!("stack depth {} too large", self.max_stack))
        })?;

        for &pos in &self.fixups {
            let id = self.code[pos];
            let target = self
                .labels
                .get(&id)
                .ok_or_else(|| BunnyError::invalid_state(format!("undefined label {id}")))?;
            // Bounded by the length check above.
            self.code[pos] = *target as u16;
        }
        Ok(self.code)
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::Op;

    #[test]
    fn test_empty_writer() {
        let code = BytecodeWriter::new().bytecode().unwrap();
        assert_eq!(code, vec![0]);
    }

    #[test]
    fn test_simple_sequence() {
        let mut w = BytecodeWriter::new();
        w.write_all([
            Instruction::Const(0),
            Instruction::Const(1),
            Instruction::Call(1),
            Instruction::Ret,
        ]);
        let code = w.bytecode().unwrap();
        assert_eq!(
            code,
            vec![
                2,
                Op::Const as u16,
                0,
                Op::Const as u16,
                1,
                Op::Call as u16,
                1,
                Op::Ret as u16,
            ]
        );
    }

    #[test]
    fn test_max_stack_tracks_peak_not_final() {
        let mut w = BytecodeWriter::new();
        w.write_all([
            Instruction::Const(0),
            Instruction::Const(0),
            Instruction::Const(0),
            Instruction::Pop,
            Instruction::Pop,
            Instruction::Const(0),
        ]);
        assert_eq!(w.bytecode().unwrap()[0], 3);
    }

    #[test]
    fn test_labels_emit_nothing() {
        let mut w = BytecodeWriter::new();
        w.write(Instruction::Label(0));
        w.write(Instruction::Ret);
        assert_eq!(w.bytecode().unwrap(), vec![0, Op::Ret as u16]);
    }

    #[test]
    fn test_forward_and_backward_jumps() {
        let mut w = BytecodeWriter::new();
        w.write(Instruction::Label(1)); // at 1
        w.write(Instruction::Const(0)); // 1..3
        w.write(Instruction::JumpIfNot(2)); // 3..5
        w.write(Instruction::Jump(1)); // 5..7
        w.write(Instruction::Label(2)); // at 7
        w.write(Instruction::Ret);
        let code = w.bytecode().unwrap();
        assert_eq!(code[3], Op::JumpIfNot as u16);
        assert_eq!(code[4], 7);
        assert_eq!(code[5], Op::Jump as u16);
        assert_eq!(code[6], 1);
    }

    #[test]
    fn test_undefined_label_is_internal_error() {
        let mut w = BytecodeWriter::new();
        w.write(Instruction::Jump(9));
        let err = w.bytecode().unwrap_err();
        assert!(err.is_internal());
    }
}
