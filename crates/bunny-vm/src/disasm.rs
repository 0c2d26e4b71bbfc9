use std::fmt::Write;

use bunny_core::{Closure, Result, Value};

use crate::decode::InstructionReader;
use crate::opcodes::Instruction;

/// Produce a human-readable listing of a closure and, after it, every
/// closure in its constant pool.
pub fn disassemble(closure: &Closure) -> Result<String> {
    let mut out = String::new();
    write_closure(&mut out, closure)?;
    Ok(out)
}

fn write_closure(out: &mut String, closure: &Closure) -> Result<()> {
    let rest = if closure.variadic { " & rest" } else { "" };
    let _ = writeln!(
        out,
        "== {} ({} args{rest}) ==",
        closure.name, closure.n_positional
    );

    let mut reader = InstructionReader::new(closure.code.clone())?;
    let _ = writeln!(out, "max stack: {}", reader.max_stack());

    while !reader.at_end() {
        let pc = reader.position();
        let instruction = reader.next_raw()?;
        let name = instruction.op().name();
        match instruction {
            Instruction::Const(i) => {
                let comment = match closure.constants.get(usize::from(i)) {
                    Some(val) => val.to_string(),
                    None => "<out of range>".to_string(),
                };
                let _ = writeln!(out, "{pc:04}  {name:<12} {i:<5} ; {comment}");
            }
            Instruction::Jump(target) | Instruction::JumpIfNot(target) => {
                let _ = writeln!(out, "{pc:04}  {name:<12} -> {target:04}");
            }
            other => match other.operand() {
                Some(n) => {
                    let _ = writeln!(out, "{pc:04}  {name:<12} {n}");
                }
                None => {
                    let _ = writeln!(out, "{pc:04}  {name}");
                }
            },
        }
    }

    for constant in closure.constants.iter() {
        if let Value::Closure(inner) = constant {
            let _ = writeln!(out);
            write_closure(out, inner)?;
        }
    }
    Ok(())
}
