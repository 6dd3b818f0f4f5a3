//! Contract tests for the usm wire format
//!
//! Opcode numbering and field layouts are shared with every other producer
//! and consumer of usm bytecode and must stay fixed.

use bytecode_system::{Encoder, Opcode};
use isa::Target;
use num_bigint::BigInt;

#[test]
fn test_contract_opcode_numbering() {
    let expected: [(Opcode, u8); 20] = [
        (Opcode::Nil, 0),
        (Opcode::End, 1),
        (Opcode::Var, 2),
        (Opcode::Main, 5),
        (Opcode::If, 6),
        (Opcode::Break, 9),
        (Opcode::Define, 10),
        (Opcode::JumpTo, 12),
        (Opcode::Delete, 15),
        (Opcode::Modify, 20),
        (Opcode::Number, 21),
        (Opcode::String, 22),
        (Opcode::Bit, 23),
        (Opcode::Call, 27),
        (Opcode::Array, 30),
        (Opcode::Table, 35),
        (Opcode::Open, 44),
        (Opcode::Send, 47),
        (Opcode::Add, 48),
        (Opcode::Not, 59),
    ];
    for (op, byte) in expected {
        assert_eq!(op.byte(), byte, "{}", op.name());
        assert_eq!(Opcode::from_byte(byte), Some(op));
    }
    assert_eq!(Opcode::from_byte(60), None);
}

#[test]
fn test_contract_integer_fields_are_little_endian() {
    let mut e = Encoder::new();
    let g = e.get(core_types::Register(0x0102)).unwrap();
    assert_eq!(g, vec![Opcode::Get.byte(), 0x02, 0x01, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_contract_number_sign_in_length() {
    let mut e = Encoder::new();
    let positive = e.number(BigInt::from(256)).unwrap();
    let negative = e.number(BigInt::from(-256)).unwrap();
    assert_eq!(&positive[1..9], &2i64.to_le_bytes());
    assert_eq!(&negative[1..9], &(-2i64).to_le_bytes());
    assert_eq!(&positive[9..], &[1, 0]);
    assert_eq!(&negative[9..], &[1, 0]);
}

#[test]
fn test_contract_loop_without_condition() {
    let mut e = Encoder::new();
    e.loop_(None, &mut |t| t.break_()).unwrap();
    assert_eq!(
        e.as_bytes(),
        &[
            Opcode::Loop.byte(),
            Opcode::Nil.byte(),
            Opcode::Break.byte(),
            Opcode::End.byte()
        ]
    );
}
