//! Bytecode encoder backend
//!
//! Every statement is written straight into the output buffer as it is
//! called. Values are self-contained byte strings that get spliced into the
//! record of whatever consumes them, so the same value may be embedded more
//! than once.

use std::io::Write;

use core_types::{HandleAllocator, Kind, Label, Register, UsmResult};
use isa::{Block, EachBody, ElseIf, Target};
use num_bigint::BigInt;
use tracing::debug;

use crate::opcode::Opcode;
use crate::wire;

/// Serializes a program into the usm wire format
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
    handles: HandleAllocator,
}

impl Encoder {
    /// Create an empty encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Finish encoding and take the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write the encoded program to `writer`, returning the byte count
    pub fn write_to<W: Write>(&self, writer: &mut W) -> UsmResult<u64> {
        writer.write_all(&self.buffer)?;
        writer.flush()?;
        debug!(bytes = self.buffer.len(), "wrote encoded program");
        Ok(self.buffer.len() as u64)
    }

    fn op(&mut self, op: Opcode) {
        self.buffer.push(op.byte());
    }

    fn put(&mut self, value: Vec<u8>) {
        self.buffer.extend(value);
    }

    fn put_optional(&mut self, value: Option<Vec<u8>>) {
        match value {
            Some(value) => self.put(value),
            None => self.op(Opcode::Nil),
        }
    }

    fn block(&mut self, body: Block<'_, Self>) -> UsmResult<()> {
        body(self)?;
        self.op(Opcode::End);
        Ok(())
    }

    fn call_record(op: Opcode, label: Label, arguments: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![op.byte()];
        wire::put_i64(&mut out, label.0);
        wire::put_len(&mut out, arguments.len());
        arguments.into_iter().for_each(|argument| out.extend(argument));
        out
    }
}

fn compose<const N: usize>(op: Opcode, operands: [Vec<u8>; N]) -> Vec<u8> {
    let mut out = vec![op.byte()];
    for operand in operands {
        out.extend(operand);
    }
    out
}

fn optional(value: Option<Vec<u8>>) -> Vec<u8> {
    value.unwrap_or_else(|| vec![Opcode::Nil.byte()])
}

impl Target for Encoder {
    type Value = Vec<u8>;

    fn main(&mut self, body: Block<'_, Self>) -> UsmResult<()> {
        self.op(Opcode::Main);
        self.block(body)
    }

    fn define(&mut self, arguments: usize, body: Block<'_, Self>) -> UsmResult<Label> {
        self.op(Opcode::Define);
        wire::put_len(&mut self.buffer, arguments);
        self.block(body)?;
        Ok(self.handles.next_label())
    }

    fn return_(&mut self, result: Option<Vec<u8>>) -> UsmResult<()> {
        self.op(Opcode::Return);
        self.put_optional(result);
        Ok(())
    }

    fn jump_to(&mut self, label: Label, arguments: Vec<Vec<u8>>) -> UsmResult<()> {
        let record = Self::call_record(Opcode::JumpTo, label, arguments);
        self.put(record);
        Ok(())
    }

    fn call(&mut self, label: Label, arguments: Vec<Vec<u8>>) -> UsmResult<Vec<u8>> {
        Ok(Self::call_record(Opcode::Call, label, arguments))
    }

    fn fork(&mut self, label: Label, arguments: Vec<Vec<u8>>) -> UsmResult<Vec<u8>> {
        Ok(Self::call_record(Opcode::Fork, label, arguments))
    }

    fn bind(&mut self, label: Label) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::Bind.byte()];
        wire::put_i64(&mut out, label.0);
        Ok(out)
    }

    fn if_(
        &mut self,
        condition: Vec<u8>,
        body: Block<'_, Self>,
        chain: Vec<ElseIf<'_, Self>>,
        last: Option<Block<'_, Self>>,
    ) -> UsmResult<()> {
        // Conditions come first so a decoder can hand them all to the
        // target before any block is replayed.
        self.op(Opcode::If);
        self.put(condition);
        wire::put_len(&mut self.buffer, chain.len());
        let mut bodies = Vec::with_capacity(chain.len());
        for ElseIf { condition, body } in chain {
            self.put(condition);
            bodies.push(body);
        }
        self.buffer.push(u8::from(last.is_some()));
        self.block(body)?;
        for body in bodies {
            self.block(body)?;
        }
        if let Some(last) = last {
            self.block(last)?;
        }
        Ok(())
    }

    fn loop_(&mut self, condition: Option<Vec<u8>>, body: Block<'_, Self>) -> UsmResult<()> {
        self.op(Opcode::Loop);
        self.put_optional(condition);
        self.block(body)
    }

    fn each(&mut self, array: Vec<u8>, body: EachBody<'_, Self>) -> UsmResult<()> {
        self.op(Opcode::Each);
        self.put(array);
        let index = self.handles.next_register();
        let value = self.handles.next_register();
        let index = self.get(index)?;
        let value = self.get(value)?;
        body(self, index, value)?;
        self.op(Opcode::End);
        Ok(())
    }

    fn break_(&mut self) -> UsmResult<()> {
        self.op(Opcode::Break);
        Ok(())
    }

    fn var(&mut self, value: Vec<u8>) -> UsmResult<Register> {
        self.op(Opcode::Var);
        self.put(value);
        Ok(self.handles.next_register())
    }

    fn set(&mut self, register: Register, value: Vec<u8>) -> UsmResult<()> {
        self.op(Opcode::Set);
        wire::put_i64(&mut self.buffer, register.0);
        self.put(value);
        Ok(())
    }

    fn get(&mut self, register: Register) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::Get.byte()];
        wire::put_i64(&mut out, register.0);
        Ok(out)
    }

    fn discard(&mut self, value: Vec<u8>) -> UsmResult<()> {
        self.op(Opcode::Discard);
        self.put(value);
        Ok(())
    }

    fn throw(&mut self, value: Vec<u8>) -> UsmResult<()> {
        self.op(Opcode::Throw);
        self.put(value);
        Ok(())
    }

    fn catch(&mut self) -> UsmResult<Vec<u8>> {
        Ok(vec![Opcode::Catch.byte()])
    }

    fn delete(&mut self, kind: Kind, value: Vec<u8>) -> UsmResult<()> {
        self.op(Opcode::Delete);
        self.op(Opcode::for_kind(kind));
        self.put(value);
        Ok(())
    }

    fn pointer(&mut self, value: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Pointer, [value]))
    }

    fn follow(&mut self, pointer: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Follow, [pointer]))
    }

    fn change(&mut self, pointer: Vec<u8>, value: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Change, [pointer, value]);
        self.put(record);
        Ok(())
    }

    fn alloc(&mut self, size: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Alloc, [size]))
    }

    fn array(&mut self, elements: Vec<Vec<u8>>) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::Array.byte()];
        wire::put_len(&mut out, elements.len());
        elements.into_iter().for_each(|element| out.extend(element));
        Ok(out)
    }

    fn count(&mut self, array: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Count, [array]))
    }

    fn index(&mut self, array: Vec<u8>, index: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Index, [array, index]))
    }

    fn append(&mut self, array: Vec<u8>, value: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Append, [array, value]))
    }

    fn mutate(&mut self, array: Vec<u8>, index: Vec<u8>, value: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Mutate, [array, index, value]);
        self.put(record);
        Ok(())
    }

    fn table(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::Table.byte()];
        wire::put_len(&mut out, entries.len());
        for (key, value) in entries {
            out.extend(key);
            out.extend(value);
        }
        Ok(out)
    }

    fn insert(&mut self, table: Vec<u8>, key: Vec<u8>, value: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Insert, [table, key, value]);
        self.put(record);
        Ok(())
    }

    fn remove(&mut self, table: Vec<u8>, key: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Remove, [table, key]);
        self.put(record);
        Ok(())
    }

    fn lookup(&mut self, table: Vec<u8>, key: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Lookup, [table, key]))
    }

    fn amount(&mut self, table: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Amount, [table]))
    }

    fn number(&mut self, value: BigInt) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::Number.byte()];
        wire::put_number(&mut out, &value);
        Ok(out)
    }

    fn string(&mut self, bytes: &[u8]) -> UsmResult<Vec<u8>> {
        let mut out = vec![Opcode::String.byte()];
        wire::put_string(&mut out, bytes);
        Ok(out)
    }

    fn bit(&mut self, value: bool) -> UsmResult<Vec<u8>> {
        Ok(vec![Opcode::Bit.byte(), u8::from(value)])
    }

    fn create(&mut self, size: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Create, [size]))
    }

    fn concat(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Concat, [a, b]))
    }

    fn equals(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Equals, [a, b]))
    }

    fn length(&mut self, string: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Length, [string]))
    }

    fn symbol(&mut self, string: Vec<u8>, index: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Symbol, [string, index]))
    }

    fn modify(&mut self, string: Vec<u8>, index: Vec<u8>, value: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Modify, [string, index, value]);
        self.put(record);
        Ok(())
    }

    fn open(&mut self, uri: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Open, [uri]))
    }

    fn stat(&mut self, stream: Option<Vec<u8>>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Stat, [optional(stream)]))
    }

    fn read(&mut self, stream: Option<Vec<u8>>, buffer: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Read, [optional(stream), buffer]))
    }

    fn send(&mut self, stream: Option<Vec<u8>>, data: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Send, [optional(stream), data]))
    }

    fn seek(&mut self, stream: Option<Vec<u8>>, amount: Vec<u8>) -> UsmResult<()> {
        let record = compose(Opcode::Seek, [optional(stream), amount]);
        self.put(record);
        Ok(())
    }

    fn add(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Add, [a, b]))
    }

    fn sub(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Sub, [a, b]))
    }

    fn mul(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Mul, [a, b]))
    }

    fn div(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Div, [a, b]))
    }

    fn mod_(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Mod, [a, b]))
    }

    fn pow(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Pow, [a, b]))
    }

    fn less(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Less, [a, b]))
    }

    fn more(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::More, [a, b]))
    }

    fn same(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Same, [a, b]))
    }

    fn and(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::And, [a, b]))
    }

    fn or(&mut self, a: Vec<u8>, b: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Or, [a, b]))
    }

    fn not(&mut self, a: Vec<u8>) -> UsmResult<Vec<u8>> {
        Ok(compose(Opcode::Not, [a]))
    }
}
