//! Tests for the Decoder

use bytecode_system::{decode, Decoder, Encoder, Opcode};
use core_types::{ErrorKind, Label, UsmError, UsmResult};
use isa::{Recorder, Target};
use num_bigint::BigInt;

fn hello() -> Vec<u8> {
    let mut e = Encoder::new();
    e.main(&mut |t| {
        let text = t.string(b"Hello World\n")?;
        let sent = t.send(None, text)?;
        t.discard(sent)
    })
    .unwrap();
    e.into_bytes()
}

fn listing(bytes: &[u8]) -> UsmResult<String> {
    let mut r = Recorder::new();
    decode(bytes, &mut r)?;
    Ok(r.listing())
}

#[test]
fn test_decode_hello_world() {
    assert_eq!(
        listing(&hello()).unwrap(),
        "main {\n  discard send(nil, \"Hello World\\n\")\n}\n"
    );
}

#[test]
fn test_empty_input_is_empty_program() {
    assert_eq!(listing(&[]).unwrap(), "");
}

#[test]
fn test_truncated_string_is_unexpected_eof() {
    let bytes = hello();
    let err = listing(&bytes[..10]).unwrap_err();
    assert!(matches!(err, UsmError::UnexpectedEof { .. }), "{}", err);
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_missing_end_is_unexpected_eof() {
    let bytes = hello();
    let err = listing(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, UsmError::UnexpectedEof { context: "block", .. }));
}

#[test]
fn test_unknown_opcode() {
    let err = listing(&[Opcode::Main.byte(), 200]).unwrap_err();
    assert!(matches!(
        err,
        UsmError::UnknownOpcode {
            opcode: 200,
            offset: 1
        }
    ));
}

#[test]
fn test_value_opcode_in_statement_position() {
    let err = listing(&[Opcode::Catch.byte()]).unwrap_err();
    assert!(matches!(
        err,
        UsmError::MisplacedOpcode {
            opcode: "Catch",
            offset: 0,
            ..
        }
    ));
}

#[test]
fn test_statement_opcode_in_value_position() {
    let err = listing(&[Opcode::Discard.byte(), Opcode::Break.byte()]).unwrap_err();
    assert!(matches!(
        err,
        UsmError::MisplacedOpcode { opcode: "Break", .. }
    ));
}

#[test]
fn test_nil_where_value_required() {
    let err = listing(&[Opcode::Discard.byte(), Opcode::Nil.byte()]).unwrap_err();
    assert!(err.is_decode());
}

#[test]
fn test_bad_bit_byte_is_malformed() {
    let err = listing(&[Opcode::Discard.byte(), Opcode::Bit.byte(), 7]).unwrap_err();
    assert!(matches!(err, UsmError::Malformed { offset: 2, .. }));
}

#[test]
fn test_negative_number_decodes() {
    let mut e = Encoder::new();
    let n = e.number(BigInt::from(-300)).unwrap();
    e.discard(n).unwrap();
    assert_eq!(listing(e.as_bytes()).unwrap(), "discard -300\n");
}

#[test]
fn test_offset_tracks_consumed_bytes() {
    let bytes = hello();
    let decoder = Decoder::new(bytes.as_slice());
    decoder.replay(&mut Recorder::new()).unwrap();
    assert_eq!(decoder.offset(), bytes.len() as u64);
}

#[test]
fn test_from_reader() {
    let bytes = hello();
    let decoder = Decoder::from_reader(std::io::Cursor::new(bytes));
    let mut r = Recorder::new();
    decoder.replay(&mut r).unwrap();
    assert_eq!(r.lines().len(), 3);
}

#[test]
fn test_round_trip_preserves_labels_and_registers() {
    fn program<T: Target>(t: &mut T) -> UsmResult<()> {
        let square = t.define(1, &mut |t| {
            let x = t.get(core_types::Register::argument(0))?;
            let y = t.mul(x.clone(), x)?;
            t.return_(Some(y))
        })?;
        t.main(&mut |t| {
            let three = t.number(BigInt::from(3))?;
            let r = t.var(three)?;
            let x = t.get(r)?;
            let sq = t.call(square, vec![x])?;
            let list = t.array(vec![sq])?;
            t.each(list, &mut |t, i, v| {
                let both = t.add(i, v)?;
                t.discard(both)
            })?;
            let cond = t.bit(true)?;
            t.loop_(Some(cond), &mut |t| t.break_())
        })
    }

    let mut direct = Recorder::new();
    program(&mut direct).unwrap();

    let mut e = Encoder::new();
    program(&mut e).unwrap();
    let mut replayed = Recorder::new();
    decode(e.as_bytes(), &mut replayed).unwrap();

    assert_eq!(direct, replayed);
    assert!(direct.listing().contains("var r1 = 3"));
    assert!(direct.listing().contains("each r2, r3 in [call L1(r1)]"));
}

/// Target that records nothing and drops the blocks it is given
struct Skipper;

impl Target for Skipper {
    type Value = ();

    fn main(&mut self, _body: isa::Block<'_, Self>) -> UsmResult<()> {
        Ok(())
    }
    fn define(&mut self, _: usize, body: isa::Block<'_, Self>) -> UsmResult<Label> {
        body(self)?;
        Ok(Label(1))
    }
    fn return_(&mut self, _: Option<()>) -> UsmResult<()> {
        Ok(())
    }
    fn jump_to(&mut self, _: Label, _: Vec<()>) -> UsmResult<()> {
        Ok(())
    }
    fn call(&mut self, _: Label, _: Vec<()>) -> UsmResult<()> {
        Ok(())
    }
    fn fork(&mut self, _: Label, _: Vec<()>) -> UsmResult<()> {
        Ok(())
    }
    fn bind(&mut self, _: Label) -> UsmResult<()> {
        Ok(())
    }
    fn if_(
        &mut self,
        _: (),
        _: isa::Block<'_, Self>,
        _: Vec<isa::ElseIf<'_, Self>>,
        _: Option<isa::Block<'_, Self>>,
    ) -> UsmResult<()> {
        Ok(())
    }
    fn loop_(&mut self, _: Option<()>, _: isa::Block<'_, Self>) -> UsmResult<()> {
        Ok(())
    }
    fn each(&mut self, _: (), _: isa::EachBody<'_, Self>) -> UsmResult<()> {
        Ok(())
    }
    fn break_(&mut self) -> UsmResult<()> {
        Ok(())
    }
    fn var(&mut self, _: ()) -> UsmResult<core_types::Register> {
        Ok(core_types::Register(1))
    }
    fn set(&mut self, _: core_types::Register, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn get(&mut self, _: core_types::Register) -> UsmResult<()> {
        Ok(())
    }
    fn discard(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn throw(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn catch(&mut self) -> UsmResult<()> {
        Ok(())
    }
    fn delete(&mut self, _: core_types::Kind, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn pointer(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn follow(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn change(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn alloc(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn array(&mut self, _: Vec<()>) -> UsmResult<()> {
        Ok(())
    }
    fn count(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn index(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn append(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn mutate(&mut self, _: (), _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn table(&mut self, _: Vec<((), ())>) -> UsmResult<()> {
        Ok(())
    }
    fn insert(&mut self, _: (), _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn remove(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn lookup(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn amount(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn number(&mut self, _: BigInt) -> UsmResult<()> {
        Ok(())
    }
    fn string(&mut self, _: &[u8]) -> UsmResult<()> {
        Ok(())
    }
    fn bit(&mut self, _: bool) -> UsmResult<()> {
        Ok(())
    }
    fn create(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn concat(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn equals(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn length(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn symbol(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn modify(&mut self, _: (), _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn open(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn stat(&mut self, _: Option<()>) -> UsmResult<()> {
        Ok(())
    }
    fn read(&mut self, _: Option<()>, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn send(&mut self, _: Option<()>, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn seek(&mut self, _: Option<()>, _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn add(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn sub(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn mul(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn div(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn mod_(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn pow(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn less(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn more(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn same(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn and(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn or(&mut self, _: (), _: ()) -> UsmResult<()> {
        Ok(())
    }
    fn not(&mut self, _: ()) -> UsmResult<()> {
        Ok(())
    }
}

#[test]
fn test_skipped_block_is_contract_violation() {
    let err = decode(&hello(), &mut Skipper).unwrap_err();
    assert!(matches!(err, UsmError::Contract(_)), "{}", err);
}

#[test]
fn test_skipped_if_blocks_are_contract_violation() {
    let mut e = Encoder::new();
    let c = e.bit(true).unwrap();
    let mut body = |t: &mut Encoder| t.break_();
    e.if_(c, &mut body, vec![], None).unwrap();
    let err = decode(e.as_bytes(), &mut Skipper).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Contract);
}
