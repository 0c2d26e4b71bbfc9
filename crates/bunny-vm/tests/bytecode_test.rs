use std::collections::HashMap;

use bunny_vm::{BytecodeWriter, Instruction, InstructionReader};
use proptest::prelude::*;

const LABELS: u16 = 4;

fn instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        Just(Instruction::Pop),
        Just(Instruction::Ret),
        Just(Instruction::Def),
        Just(Instruction::Load),
        Just(Instruction::Store),
        Just(Instruction::Closure),
        (0u16..8).prop_map(Instruction::Call),
        (0u16..100).prop_map(Instruction::Const),
        (0..LABELS).prop_map(Instruction::Jump),
        (0..LABELS).prop_map(Instruction::JumpIfNot),
    ]
}

/// A random instruction stream with every label defined exactly once at a
/// random position.
fn program() -> impl Strategy<Value = Vec<Instruction>> {
    (
        prop::collection::vec(instruction(), 1..40),
        prop::collection::vec(any::<prop::sample::Index>(), LABELS as usize),
    )
        .prop_map(|(mut body, spots)| {
            for (id, spot) in spots.into_iter().enumerate() {
                let at = spot.index(body.len() + 1);
                body.insert(at, Instruction::Label(id as u16));
            }
            // A label at the very end would point past the code.
            body.push(Instruction::Ret);
            body
        })
}

fn label_positions(program: &[Instruction]) -> HashMap<u16, usize> {
    let mut positions = HashMap::new();
    let mut pc = 1;
    for instr in program {
        match instr {
            Instruction::Label(id) => {
                positions.insert(*id, pc);
            }
            other => pc += 1 + usize::from(other.operand().is_some()),
        }
    }
    positions
}

proptest! {
    #[test]
    fn write_then_decode_reproduces_program(program in program()) {
        let mut writer = BytecodeWriter::new();
        writer.write_all(program.iter().copied());
        let code = writer.bytecode().unwrap();

        let labels = label_positions(&program);
        let expected: Vec<Instruction> = program
            .iter()
            .filter(|i| !matches!(i, Instruction::Label(_)))
            .map(|i| match *i {
                Instruction::Jump(id) => Instruction::Jump(labels[&id] as u16),
                Instruction::JumpIfNot(id) => Instruction::JumpIfNot(labels[&id] as u16),
                other => other,
            })
            .collect();

        let mut reader = InstructionReader::new(code.as_slice()).unwrap();
        let mut decoded = Vec::new();
        while !reader.at_end() {
            decoded.push(reader.next().unwrap());
        }
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn max_stack_is_peak_cumulative_effect(program in program()) {
        let mut writer = BytecodeWriter::new();
        writer.write_all(program.iter().copied());
        let code = writer.bytecode().unwrap();

        let mut size = 0i32;
        let mut peak = 0i32;
        for instr in &program {
            size += instr.op().info().stack_effect;
            peak = peak.max(size);
        }
        prop_assert_eq!(i32::from(code[0]), peak);
    }

    #[test]
    fn decoder_never_panics(words in prop::collection::vec(any::<u16>(), 1..64), start in 0usize..64) {
        if let Ok(mut reader) = InstructionReader::at(words.as_slice(), start) {
            for _ in 0..words.len() {
                if reader.next().is_err() || reader.at_end() {
                    break;
                }
            }
        }
    }
}
