/// Bytecode opcodes for the Bunny VM.
///
/// Stack-based, one 16-bit word per opcode. `call`, `label`, `jump`,
/// `jump_if_not` and `const` carry a single operand word.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop = 0,
    Dup = 1,
    Pop = 2,
    Ret = 3,
    Call = 4,       // u16 argc
    Label = 5,      // u16 label id (assembly only)
    Jump = 6,       // u16 target
    JumpIfNot = 7,  // u16 target (pops the test)
    Const = 8,      // u16 constant index
    Def = 9,
    Load = 10,
    Store = 11,
    Closure = 12,
    Halt = 13,
}

/// Static facts about an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub nargs: usize,
    pub stack_effect: i32,
}

impl Op {
    pub fn from_u16(word: u16) -> Option<Op> {
        Some(match word {
            0 => Op::Nop,
            1 => Op::Dup,
            2 => Op::Pop,
            3 => Op::Ret,
            4 => Op::Call,
            5 => Op::Label,
            6 => Op::Jump,
            7 => Op::JumpIfNot,
            8 => Op::Const,
            9 => Op::Def,
            10 => Op::Load,
            11 => Op::Store,
            12 => Op::Closure,
            13 => Op::Halt,
            _ => return None,
        })
    }

    pub fn info(self) -> OpInfo {
        let (nargs, stack_effect) = match self {
            Op::Nop => (0, 0),
            Op::Dup => (0, 1),
            Op::Pop => (0, -1),
            Op::Ret => (0, -1),
            Op::Call => (1, 0),
            Op::Label => (1, 0),
            Op::Jump => (1, 0),
            Op::JumpIfNot => (1, -1),
            Op::Const => (1, 1),
            Op::Def => (0, 0),
            Op::Load => (0, 0),
            Op::Store => (0, 0),
            Op::Closure => (0, 0),
            Op::Halt => (0, 0),
        };
        OpInfo {
            nargs,
            stack_effect,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Nop => "NOP",
            Op::Dup => "DUP",
            Op::Pop => "POP",
            Op::Ret => "RET",
            Op::Call => "CALL",
            Op::Label => "LABEL",
            Op::Jump => "JUMP",
            Op::JumpIfNot => "JUMP_IF_NOT",
            Op::Const => "CONST",
            Op::Def => "DEF",
            Op::Load => "LOAD",
            Op::Store => "STORE",
            Op::Closure => "CLOSURE",
            Op::Halt => "HALT",
        }
    }
}

/// A decoded (or about to be encoded) instruction with its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Dup,
    Pop,
    Ret,
    Call(u16),
    Label(u16),
    Jump(u16),
    JumpIfNot(u16),
    Const(u16),
    Def,
    Load,
    Store,
    Closure,
    Halt,
}

impl Instruction {
    pub fn op(&self) -> Op {
        match self {
            Instruction::Nop => Op::Nop,
            Instruction::Dup => Op::Dup,
            Instruction::Pop => Op::Pop,
            Instruction::Ret => Op::Ret,
            Instruction::Call(_) => Op::Call,
            Instruction::Label(_) => Op::Label,
            Instruction::Jump(_) => Op::Jump,
            Instruction::JumpIfNot(_) => Op::JumpIfNot,
            Instruction::Const(_) => Op::Const,
            Instruction::Def => Op::Def,
            Instruction::Load => Op::Load,
            Instruction::Store => Op::Store,
            Instruction::Closure => Op::Closure,
            Instruction::Halt => Op::Halt,
        }
    }

    pub fn operand(&self) -> Option<u16> {
        match *self {
            Instruction::Call(n)
            | Instruction::Label(n)
            | Instruction::Jump(n)
            | Instruction::JumpIfNot(n)
            | Instruction::Const(n) => Some(n),
            _ => None,
        }
    }

    /// Rebuild an instruction from an opcode and its operand word.
    pub fn from_parts(op: Op, operand: u16) -> Instruction {
        match op {
            Op::Nop => Instruction::Nop,
            Op::Dup => Instruction::Dup,
            Op::Pop => Instruction::Pop,
            Op::Ret => Instruction::Ret,
            Op::Call => Instruction::Call(operand),
            Op::Label => Instruction::Label(operand),
            Op::Jump => Instruction::Jump(operand),
            Op::JumpIfNot => Instruction::JumpIfNot(operand),
            Op::Const => Instruction::Const(operand),
            Op::Def => Instruction::Def,
            Op::Load => Instruction::Load,
            Op::Store => Instruction::Store,
            Op::Closure => Instruction::Closure,
            Op::Halt => Instruction::Halt,
        }
    }
}
