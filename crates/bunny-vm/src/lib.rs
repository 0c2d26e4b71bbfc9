pub mod compiler;
pub mod decode;
pub mod disasm;
pub mod opcodes;
pub mod stack;
pub mod vm;
pub mod writer;

pub use compiler::{compile_function, compile_thunk, macroexpand, SpecialForms};
pub use decode::InstructionReader;
pub use disasm::disassemble;
pub use opcodes::{Instruction, Op, OpInfo};
pub use vm::{Engine, EngineConfig};
pub use writer::BytecodeWriter;
