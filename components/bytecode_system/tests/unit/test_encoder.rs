//! Tests for the Encoder backend

use bytecode_system::{Encoder, Opcode};
use core_types::{Kind, Label, Register};
use isa::Target;
use num_bigint::BigInt;

fn le(value: i64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

#[test]
fn test_hello_world_bytes() {
    let mut e = Encoder::new();
    e.main(&mut |t| {
        let text = t.string(b"Hello World\n")?;
        let sent = t.send(None, text)?;
        t.discard(sent)
    })
    .unwrap();

    let mut expected = vec![
        Opcode::Main.byte(),
        Opcode::Discard.byte(),
        Opcode::Send.byte(),
        Opcode::Nil.byte(),
        Opcode::String.byte(),
    ];
    expected.extend(le(12));
    expected.extend(b"Hello World\n");
    expected.push(Opcode::End.byte());

    assert_eq!(e.as_bytes(), expected.as_slice());
}

#[test]
fn test_negative_number_encoding() {
    let mut e = Encoder::new();
    let n = e.number(BigInt::from(-300)).unwrap();
    let mut expected = vec![Opcode::Number.byte()];
    expected.extend(le(-2));
    expected.extend([0x01, 0x2c]);
    assert_eq!(n, expected);
}

#[test]
fn test_zero_encoding() {
    let mut e = Encoder::new();
    let n = e.number(BigInt::from(0)).unwrap();
    let mut expected = vec![Opcode::Number.byte()];
    expected.extend(le(0));
    assert_eq!(n, expected);
}

#[test]
fn test_define_returns_label_after_body() {
    let mut e = Encoder::new();
    let mut inner = Label(0);
    let outer = e
        .define(0, &mut |t| {
            inner = t.define(1, &mut |t| t.return_(None))?;
            t.return_(None)
        })
        .unwrap();
    assert_eq!(inner, Label(1));
    assert_eq!(outer, Label(2));

    let mut expected = vec![Opcode::Define.byte()];
    expected.extend(le(0));
    expected.push(Opcode::Define.byte());
    expected.extend(le(1));
    expected.extend([Opcode::Return.byte(), Opcode::Nil.byte(), Opcode::End.byte()]);
    expected.extend([Opcode::Return.byte(), Opcode::Nil.byte(), Opcode::End.byte()]);
    assert_eq!(e.as_bytes(), expected.as_slice());
}

#[test]
fn test_if_writes_conditions_before_blocks() {
    let mut e = Encoder::new();
    let yes = e.bit(true).unwrap();
    let no = e.bit(false).unwrap();
    let mut body = |t: &mut Encoder| t.break_();
    let mut arm = |t: &mut Encoder| t.break_();
    let mut last = |t: &mut Encoder| t.break_();
    e.if_(
        no.clone(),
        &mut body,
        vec![isa::ElseIf::<Encoder>::new(yes, &mut arm)],
        Some(&mut last),
    )
    .unwrap();

    let mut expected = vec![Opcode::If.byte(), Opcode::Bit.byte(), 0];
    expected.extend(le(1));
    expected.extend([Opcode::Bit.byte(), 1]);
    expected.push(1);
    for _ in 0..3 {
        expected.extend([Opcode::Break.byte(), Opcode::End.byte()]);
    }
    assert_eq!(e.as_bytes(), expected.as_slice());
}

#[test]
fn test_each_allocates_index_then_value() {
    let mut e = Encoder::new();
    let list = e.array(vec![]).unwrap();
    let mut seen = Vec::new();
    e.each(list, &mut |t, index, value| {
        seen.push((index.clone(), value.clone()));
        t.discard(index)
    })
    .unwrap();

    let get = |r: i64| {
        let mut out = vec![Opcode::Get.byte()];
        out.extend(le(r));
        out
    };
    assert_eq!(seen, vec![(get(1), get(2))]);
    assert_eq!(e.var(list_of_one()).unwrap(), Register(3));
}

fn list_of_one() -> Vec<u8> {
    let mut e = Encoder::new();
    let one = e.number(BigInt::from(1)).unwrap();
    e.array(vec![one]).unwrap()
}

#[test]
fn test_delete_writes_kind_tag() {
    let mut e = Encoder::new();
    let s = e.string(b"").unwrap();
    e.delete(Kind::String, s).unwrap();
    assert_eq!(&e.as_bytes()[..3], &[Opcode::Delete.byte(), Opcode::String.byte(), Opcode::String.byte()]);
}

#[test]
fn test_call_record_layout() {
    let mut e = Encoder::new();
    let arg = e.bit(true).unwrap();
    let call = e.call(Label(3), vec![arg]).unwrap();
    let mut expected = vec![Opcode::Call.byte()];
    expected.extend(le(3));
    expected.extend(le(1));
    expected.extend([Opcode::Bit.byte(), 1]);
    assert_eq!(call, expected);
}

#[test]
fn test_reused_value_is_embedded_twice() {
    let mut e = Encoder::new();
    let one = e.number(BigInt::from(1)).unwrap();
    let sum = e.add(one.clone(), one.clone()).unwrap();
    assert_eq!(sum.len(), 1 + 2 * one.len());
}
