//! Bytecode decoder
//!
//! Replays an encoded program against any [`Target`]. Blocks are handed to
//! the target as closures that pull their statements from the byte source
//! when invoked, so the target must materialize every block exactly once and
//! in argument order; a target that skips or reorders blocks is reported as
//! a contract violation.

use std::cell::{Cell, RefCell};
use std::io::{BufRead, BufReader, Read};

use core_types::{Label, Register, UsmError, UsmResult};
use isa::{Block, ElseIf, Target};
use tracing::trace;

use crate::opcode::Opcode;
use crate::wire;

/// Streaming bytecode reader
pub struct Decoder<R> {
    source: RefCell<R>,
    offset: Cell<u64>,
}

/// Tracks which of a statement's blocks the target has materialized
struct BlockOrder {
    operation: &'static str,
    next: Cell<usize>,
}

impl BlockOrder {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            next: Cell::new(0),
        }
    }

    fn enter(&self, index: usize) -> UsmResult<()> {
        let expected = self.next.get();
        if index != expected {
            return Err(UsmError::contract(format!(
                "{} block {} materialized while block {} was pending",
                self.operation, index, expected
            )));
        }
        self.next.set(index + 1);
        Ok(())
    }

    fn finish(&self, total: usize) -> UsmResult<()> {
        let seen = self.next.get();
        if seen != total {
            return Err(UsmError::contract(format!(
                "target materialized {} of {} {} blocks",
                seen, total, self.operation
            )));
        }
        Ok(())
    }
}

/// Decode a complete program held in memory
pub fn decode<T: Target>(bytes: &[u8], target: &mut T) -> UsmResult<()> {
    Decoder::new(bytes).replay(target)
}

impl<R: Read> Decoder<BufReader<R>> {
    /// Wrap an unbuffered reader
    pub fn from_reader(reader: R) -> Self {
        Decoder::new(BufReader::new(reader))
    }
}

impl<R: BufRead> Decoder<R> {
    /// Create a decoder over a buffered source
    pub fn new(source: R) -> Self {
        Self {
            source: RefCell::new(source),
            offset: Cell::new(0),
        }
    }

    /// Number of bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset.get()
    }

    /// Replay top-level statements until the source is exhausted.
    ///
    /// Running out of input between two top-level statements ends the
    /// program; running out anywhere else is an error.
    pub fn replay<T: Target>(&self, target: &mut T) -> UsmResult<()> {
        loop {
            let at = self.offset();
            let Some(byte) = self.next_byte()? else {
                return Ok(());
            };
            let op = self.opcode(byte, at)?;
            self.statement(op, at, target)?;
        }
    }

    fn next_byte(&self) -> UsmResult<Option<u8>> {
        let mut source = self.source.borrow_mut();
        let byte = match source.fill_buf()?.first() {
            Some(&byte) => byte,
            None => return Ok(None),
        };
        source.consume(1);
        self.offset.set(self.offset.get() + 1);
        Ok(Some(byte))
    }

    fn byte(&self, context: &'static str) -> UsmResult<u8> {
        self.next_byte()?.ok_or(UsmError::UnexpectedEof {
            offset: self.offset(),
            context,
        })
    }

    fn bytes(&self, len: u64, context: &'static str) -> UsmResult<Vec<u8>> {
        let mut out = Vec::new();
        let read = {
            let mut source = self.source.borrow_mut();
            (&mut *source).take(len).read_to_end(&mut out)?
        };
        self.offset.set(self.offset.get() + read as u64);
        if (read as u64) < len {
            return Err(UsmError::UnexpectedEof {
                offset: self.offset(),
                context,
            });
        }
        Ok(out)
    }

    fn int(&self, context: &'static str) -> UsmResult<i64> {
        let bytes = self.bytes(8, context)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(i64::from_le_bytes(raw))
    }

    fn len(&self, context: &'static str) -> UsmResult<usize> {
        let at = self.offset();
        let value = self.int(context)?;
        usize::try_from(value).map_err(|_| UsmError::Malformed {
            offset: at,
            reason: format!("negative {}: {}", context, value),
        })
    }

    fn flag(&self, context: &'static str) -> UsmResult<bool> {
        let at = self.offset();
        match self.byte(context)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(UsmError::Malformed {
                offset: at,
                reason: format!("{} must be 0 or 1, found {}", context, other),
            }),
        }
    }

    fn opcode(&self, byte: u8, offset: u64) -> UsmResult<Opcode> {
        Opcode::from_byte(byte).ok_or(UsmError::UnknownOpcode {
            opcode: byte,
            offset,
        })
    }

    fn block<T: Target>(&self, target: &mut T) -> UsmResult<()> {
        loop {
            let at = self.offset();
            let byte = self.byte("block")?;
            let op = self.opcode(byte, at)?;
            if op == Opcode::End {
                return Ok(());
            }
            self.statement(op, at, target)?;
        }
    }

    fn ordered_block<T: Target>(
        &self,
        target: &mut T,
        order: &BlockOrder,
        index: usize,
    ) -> UsmResult<()> {
        order.enter(index)?;
        self.block(target)
    }

    fn statement<T: Target>(&self, op: Opcode, at: u64, t: &mut T) -> UsmResult<()> {
        trace!(opcode = op.name(), offset = at, "decode statement");
        match op {
            Opcode::Var => {
                let value = self.value(t, "var value")?;
                t.var(value)?;
            }
            Opcode::Set => {
                let register = Register(self.int("register")?);
                let value = self.value(t, "set value")?;
                t.set(register, value)?;
            }
            Opcode::Discard => {
                let value = self.value(t, "discarded value")?;
                t.discard(value)?;
            }
            Opcode::Main => {
                let order = BlockOrder::new("main");
                t.main(&mut |t| self.ordered_block(t, &order, 0))?;
                order.finish(1)?;
            }
            Opcode::If => self.if_statement(t)?,
            Opcode::Loop => {
                let condition = self.optional_value(t, "loop condition")?;
                let order = BlockOrder::new("loop");
                t.loop_(condition, &mut |t| self.ordered_block(t, &order, 0))?;
                order.finish(1)?;
            }
            Opcode::Each => {
                let array = self.value(t, "each array")?;
                let order = BlockOrder::new("each");
                t.each(array, &mut |t, _, _| self.ordered_block(t, &order, 0))?;
                order.finish(1)?;
            }
            Opcode::Break => t.break_()?,
            Opcode::Define => {
                let arguments = self.len("argument count")?;
                let order = BlockOrder::new("define");
                t.define(arguments, &mut |t| self.ordered_block(t, &order, 0))?;
                order.finish(1)?;
            }
            Opcode::Return => {
                let result = self.optional_value(t, "return value")?;
                t.return_(result)?;
            }
            Opcode::JumpTo => {
                let (label, arguments) = self.call_operands(t)?;
                t.jump_to(label, arguments)?;
            }
            Opcode::Throw => {
                let value = self.value(t, "thrown value")?;
                t.throw(value)?;
            }
            Opcode::Seek => {
                let stream = self.optional_value(t, "seek stream")?;
                let amount = self.value(t, "seek amount")?;
                t.seek(stream, amount)?;
            }
            Opcode::Delete => {
                let tag_at = self.offset();
                let tag = self.byte("delete kind")?;
                let kind = Opcode::from_byte(tag)
                    .and_then(Opcode::kind)
                    .ok_or_else(|| UsmError::Malformed {
                        offset: tag_at,
                        reason: format!("{} is not a value kind tag", tag),
                    })?;
                let value = self.value(t, "deleted value")?;
                t.delete(kind, value)?;
            }
            Opcode::Change => {
                let (pointer, value) = self.pair(t, "change operand")?;
                t.change(pointer, value)?;
            }
            Opcode::Mutate => {
                let (array, index, value) = self.triple(t, "mutate operand")?;
                t.mutate(array, index, value)?;
            }
            Opcode::Insert => {
                let (table, key, value) = self.triple(t, "insert operand")?;
                t.insert(table, key, value)?;
            }
            Opcode::Remove => {
                let (table, key) = self.pair(t, "remove operand")?;
                t.remove(table, key)?;
            }
            Opcode::Modify => {
                let (string, index, value) = self.triple(t, "modify operand")?;
                t.modify(string, index, value)?;
            }
            _ => {
                return Err(UsmError::MisplacedOpcode {
                    opcode: op.name(),
                    offset: at,
                    context: "a statement",
                })
            }
        }
        Ok(())
    }

    fn if_statement<T: Target>(&self, t: &mut T) -> UsmResult<()> {
        let condition = self.value(t, "if condition")?;
        let arms = self.len("else-if count")?;
        let mut conditions = Vec::new();
        for _ in 0..arms {
            conditions.push(self.value(t, "else-if condition")?);
        }
        let has_last = self.flag("else flag")?;
        let total = 1 + arms + usize::from(has_last);

        let order = BlockOrder::new("if");
        let order = &order;
        let mut body = |t: &mut T| self.ordered_block(t, order, 0);
        let mut arm_bodies: Vec<_> = (0..arms)
            .map(|i| move |t: &mut T| self.ordered_block(t, order, i + 1))
            .collect();
        let mut else_body = |t: &mut T| self.ordered_block(t, order, total - 1);

        let chain: Vec<ElseIf<'_, T>> = conditions
            .into_iter()
            .zip(arm_bodies.iter_mut())
            .map(|(condition, body)| ElseIf::<T>::new(condition, body))
            .collect();
        let last = if has_last {
            Some(&mut else_body as Block<'_, T>)
        } else {
            None
        };
        t.if_(condition, &mut body, chain, last)?;
        order.finish(total)
    }

    fn call_operands<T: Target>(&self, t: &mut T) -> UsmResult<(Label, Vec<T::Value>)> {
        let label = Label(self.int("label")?);
        let count = self.len("argument count")?;
        let arguments = self.values(t, count, "call argument")?;
        Ok((label, arguments))
    }

    fn values<T: Target>(
        &self,
        t: &mut T,
        count: usize,
        context: &'static str,
    ) -> UsmResult<Vec<T::Value>> {
        // No preallocation: `count` comes straight from the input.
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(self.value(t, context)?);
        }
        Ok(out)
    }

    fn pair<T: Target>(
        &self,
        t: &mut T,
        context: &'static str,
    ) -> UsmResult<(T::Value, T::Value)> {
        let a = self.value(t, context)?;
        let b = self.value(t, context)?;
        Ok((a, b))
    }

    fn triple<T: Target>(
        &self,
        t: &mut T,
        context: &'static str,
    ) -> UsmResult<(T::Value, T::Value, T::Value)> {
        let a = self.value(t, context)?;
        let b = self.value(t, context)?;
        let c = self.value(t, context)?;
        Ok((a, b, c))
    }

    fn value<T: Target>(&self, t: &mut T, context: &'static str) -> UsmResult<T::Value> {
        let at = self.offset();
        self.optional_value(t, context)?
            .ok_or(UsmError::MisplacedOpcode {
                opcode: Opcode::Nil.name(),
                offset: at,
                context,
            })
    }

    fn optional_value<T: Target>(
        &self,
        t: &mut T,
        context: &'static str,
    ) -> UsmResult<Option<T::Value>> {
        let at = self.offset();
        let op = self.opcode(self.byte(context)?, at)?;
        if op == Opcode::Nil {
            return Ok(None);
        }
        if !op.is_value() {
            return Err(UsmError::MisplacedOpcode {
                opcode: op.name(),
                offset: at,
                context,
            });
        }
        trace!(opcode = op.name(), offset = at, "decode value");
        let value = match op {
            Opcode::Number => {
                let signed_len = self.int("number length")?;
                let magnitude = self.bytes(signed_len.unsigned_abs(), "number magnitude")?;
                t.number(wire::number_from_parts(signed_len, &magnitude))?
            }
            Opcode::String => {
                let len = self.len("string length")?;
                let bytes = self.bytes(len as u64, "string bytes")?;
                t.string(&bytes)?
            }
            Opcode::Bit => {
                let bit = self.flag("bit")?;
                t.bit(bit)?
            }
            Opcode::Get => t.get(Register(self.int("register")?))?,
            Opcode::Bind => t.bind(Label(self.int("label")?))?,
            Opcode::Catch => t.catch()?,
            Opcode::Call => {
                let (label, arguments) = self.call_operands(t)?;
                t.call(label, arguments)?
            }
            Opcode::Fork => {
                let (label, arguments) = self.call_operands(t)?;
                t.fork(label, arguments)?
            }
            Opcode::Pointer => {
                let value = self.value(t, "pointer target")?;
                t.pointer(value)?
            }
            Opcode::Array => {
                let count = self.len("array length")?;
                let elements = self.values(t, count, "array element")?;
                t.array(elements)?
            }
            Opcode::Alloc => {
                let size = self.value(t, "alloc size")?;
                t.alloc(size)?
            }
            Opcode::Count => {
                let array = self.value(t, "count operand")?;
                t.count(array)?
            }
            Opcode::Index => {
                let (array, index) = self.pair(t, "index operand")?;
                t.index(array, index)?
            }
            Opcode::Append => {
                let (array, value) = self.pair(t, "append operand")?;
                t.append(array, value)?
            }
            Opcode::Table => {
                let count = self.len("table size")?;
                let mut entries = Vec::new();
                for _ in 0..count {
                    entries.push(self.pair(t, "table entry")?);
                }
                t.table(entries)?
            }
            Opcode::Amount => {
                let table = self.value(t, "amount operand")?;
                t.amount(table)?
            }
            Opcode::Lookup => {
                let (table, key) = self.pair(t, "lookup operand")?;
                t.lookup(table, key)?
            }
            Opcode::Create => {
                let size = self.value(t, "create size")?;
                t.create(size)?
            }
            Opcode::Equals => {
                let (a, b) = self.pair(t, "equals operand")?;
                t.equals(a, b)?
            }
            Opcode::Length => {
                let string = self.value(t, "length operand")?;
                t.length(string)?
            }
            Opcode::Symbol => {
                let (string, index) = self.pair(t, "symbol operand")?;
                t.symbol(string, index)?
            }
            Opcode::Concat => {
                let (a, b) = self.pair(t, "concat operand")?;
                t.concat(a, b)?
            }
            Opcode::Follow => {
                let pointer = self.value(t, "follow operand")?;
                t.follow(pointer)?
            }
            Opcode::Open => {
                let uri = self.value(t, "open uri")?;
                t.open(uri)?
            }
            Opcode::Stat => {
                let stream = self.optional_value(t, "stat stream")?;
                t.stat(stream)?
            }
            Opcode::Read => {
                let stream = self.optional_value(t, "read stream")?;
                let buffer = self.value(t, "read buffer")?;
                t.read(stream, buffer)?
            }
            Opcode::Send => {
                let stream = self.optional_value(t, "send stream")?;
                let data = self.value(t, "send data")?;
                t.send(stream, data)?
            }
            Opcode::Not => {
                let a = self.value(t, "not operand")?;
                t.not(a)?
            }
            binary => {
                let (a, b) = self.pair(t, "operand")?;
                match binary {
                    Opcode::Add => t.add(a, b)?,
                    Opcode::Sub => t.sub(a, b)?,
                    Opcode::Mul => t.mul(a, b)?,
                    Opcode::Div => t.div(a, b)?,
                    Opcode::Mod => t.mod_(a, b)?,
                    Opcode::Pow => t.pow(a, b)?,
                    Opcode::Less => t.less(a, b)?,
                    Opcode::More => t.more(a, b)?,
                    Opcode::Same => t.same(a, b)?,
                    Opcode::And => t.and(a, b)?,
                    Opcode::Or => t.or(a, b)?,
                    _ => {
                        return Err(UsmError::MisplacedOpcode {
                            opcode: op.name(),
                            offset: at,
                            context,
                        })
                    }
                }
            }
        };
        Ok(Some(value))
    }
}
