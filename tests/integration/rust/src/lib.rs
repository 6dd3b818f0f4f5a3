//! Integration test suite for usm
//!
//! Programs here are written once, generically over [`Target`], and then
//! built against every backend so the tests can compare what each one sees.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use bytecode_system::{decode, Encoder};
use core_types::{Kind, Label, Register, UsmResult};
use interpreter::Interpreter;
use isa::{ElseIf, Recorder, Target};
use num_bigint::BigInt;

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use isa;
}

/// Output sink shared between a test and the interpreter writing to it
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    /// Everything written so far
    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A program builder usable with any backend
pub type Program<T> = fn(&mut T) -> UsmResult<()>;

/// Encode `program` to bytecode
pub fn encode(program: Program<Encoder>) -> UsmResult<Vec<u8>> {
    let mut encoder = Encoder::new();
    program(&mut encoder)?;
    Ok(encoder.into_bytes())
}

/// Decode `bytes` into a fresh interpreter, run it and return its output
pub fn run_bytes(bytes: &[u8]) -> UsmResult<Vec<u8>> {
    let out = Capture::default();
    let mut vm = Interpreter::new().with_output(out.clone());
    decode(bytes, &mut vm)?;
    vm.run()?;
    Ok(out.bytes())
}

/// Build `program` directly into an interpreter, run it and return its output
pub fn run_direct(program: Program<Interpreter>) -> UsmResult<Vec<u8>> {
    let out = Capture::default();
    let mut vm = Interpreter::new().with_output(out.clone());
    program(&mut vm)?;
    vm.run()?;
    Ok(out.bytes())
}

/// Listing of `program` built directly into a recorder
pub fn listing(program: Program<Recorder>) -> UsmResult<String> {
    let mut recorder = Recorder::new();
    program(&mut recorder)?;
    Ok(recorder.listing())
}

/// Listing of `bytes` replayed into a recorder
pub fn replayed_listing(bytes: &[u8]) -> UsmResult<String> {
    let mut recorder = Recorder::new();
    decode(bytes, &mut recorder)?;
    Ok(recorder.listing())
}

fn num<T: Target>(t: &mut T, value: i64) -> UsmResult<T::Value> {
    t.number(BigInt::from(value))
}

fn print<T: Target>(t: &mut T, text: &[u8]) -> UsmResult<()> {
    let text = t.string(text)?;
    let sent = t.send(None, text)?;
    t.discard(sent)
}

/// `Main( Discard( Send(nil, "Hello World\n") ) )`
pub fn hello<T: Target>(t: &mut T) -> UsmResult<()> {
    t.main(&mut |t| print(t, b"Hello World\n"))
}

/// `Main( JumpTo( Define(0, Discard( Send(nil, "Hi\n") )) ) )`
pub fn jump_to_define<T: Target>(t: &mut T) -> UsmResult<()> {
    t.main(&mut |t| {
        let greet = t.define(0, &mut |t| print(t, b"Hi\n"))?;
        t.jump_to(greet, vec![])
    })
}

/// A bare loop that prints once and breaks
pub fn loop_once<T: Target>(t: &mut T) -> UsmResult<()> {
    t.main(&mut |t| {
        t.loop_(None, &mut |t| {
            print(t, b"x")?;
            t.break_()
        })
    })
}

/// Recursion, iteration, tables and strings together.
///
/// Prints `6ab\nv\n`: factorial of 3 as a digit, each element of `[a, b]`,
/// then a table lookup.
pub fn showcase<T: Target>(t: &mut T) -> UsmResult<()> {
    // factorial(n, self)
    let factorial = t.define(2, &mut |t| {
        let n = t.get(Register::argument(0))?;
        let two = t.number(BigInt::from(2))?;
        let small = t.less(n, two)?;
        let mut base = |t: &mut T| {
            let one = t.number(BigInt::from(1))?;
            t.return_(Some(one))
        };
        t.if_(small, &mut base, vec![], None)?;
        let n = t.get(Register::argument(0))?;
        let me = t.get(Register::argument(1))?;
        let one = t.number(BigInt::from(1))?;
        let smaller = t.sub(n.clone(), one)?;
        let rest = t.call(Label::INDIRECT, vec![me.clone(), smaller, me])?;
        let product = t.mul(n, rest)?;
        t.return_(Some(product))
    })?;

    t.main(&mut |t| {
        let three = t.number(BigInt::from(3))?;
        let me = t.bind(factorial)?;
        let result = t.call(factorial, vec![three, me])?;
        let r = t.var(result)?;

        let one = t.number(BigInt::from(1))?;
        let digit = t.create(one)?;
        let d = t.var(digit)?;
        let target = t.get(d)?;
        let zero = t.number(BigInt::from(0))?;
        let ascii_zero = t.number(BigInt::from(48))?;
        let result = t.get(r)?;
        let code = t.add(ascii_zero, result)?;
        t.modify(target, zero, code)?;
        let digit = t.get(d)?;
        let sent = t.send(None, digit)?;
        t.discard(sent)?;

        let a = t.string(b"a")?;
        let b = t.string(b"b")?;
        let words = t.array(vec![a, b])?;
        t.each(words, &mut |t: &mut T, _index: T::Value, word: T::Value| {
            let sent = t.send(None, word)?;
            t.discard(sent)
        })?;
        print(t, b"\n")?;

        let key = t.string(b"k")?;
        let value = t.string(b"v\n")?;
        let table = t.table(vec![(key, value)])?;
        let m = t.var(table)?;
        let table = t.get(m)?;
        let key = t.string(b"k")?;
        let found = t.lookup(table, key)?;
        let sent = t.send(None, found)?;
        t.discard(sent)
    })
}

/// Every operation of the ISA at least once.
///
/// Prints `DFerr`: a byte built with `Modify`, a byte read back from a
/// fork, then a caught error.
pub fn every_opcode<T: Target>(t: &mut T) -> UsmResult<()> {
    let identity = t.define(1, &mut |t| {
        let x = t.get(Register::argument(0))?;
        t.return_(Some(x))
    })?;
    let child = t.define(0, &mut |t| print(t, b"F"))?;

    t.main(&mut |t| {
        // r = 1 + 2
        let one = num(t, 1)?;
        let r = t.var(one)?;
        let current = t.get(r)?;
        let two = num(t, 2)?;
        let sum = t.add(current, two)?;
        t.set(r, sum)?;

        // *p = *p - 1
        let current = t.get(r)?;
        let cell = t.pointer(current)?;
        let p = t.var(cell)?;
        let target = t.get(p)?;
        let cell = t.get(p)?;
        let seen = t.follow(cell)?;
        let one = num(t, 1)?;
        let less_one = t.sub(seen, one)?;
        t.change(target, less_one)?;

        // a = [*p, 0, 2 * 2]
        let two = num(t, 2)?;
        let list = t.alloc(two)?;
        let a = t.var(list)?;
        let list = t.get(a)?;
        let zero = num(t, 0)?;
        let cell = t.get(p)?;
        let seen = t.follow(cell)?;
        t.mutate(list, zero, seen)?;
        let list = t.get(a)?;
        let two = num(t, 2)?;
        let four = t.mul(two.clone(), two)?;
        let grown = t.append(list, four)?;
        t.discard(grown)?;
        let list = t.get(a)?;
        let size = t.count(list)?;
        t.discard(size)?;

        // m = {y: r}
        let x = t.string(b"x")?;
        let one = num(t, 1)?;
        let table = t.table(vec![(x, one)])?;
        let m = t.var(table)?;
        let table = t.get(m)?;
        let y = t.string(b"y")?;
        let current = t.get(r)?;
        t.insert(table, y, current)?;
        let table = t.get(m)?;
        let x = t.string(b"x")?;
        t.remove(table, x)?;
        let table = t.get(m)?;
        let y = t.string(b"y")?;
        let found = t.lookup(table, y)?;
        t.discard(found)?;

        // s = "D", from 2^6 + 9/2
        let one = num(t, 1)?;
        let buffer = t.create(one)?;
        let s = t.var(buffer)?;
        let target = t.get(s)?;
        let zero = num(t, 0)?;
        let two = num(t, 2)?;
        let six = num(t, 6)?;
        let high = t.pow(two, six)?;
        let nine = num(t, 9)?;
        let two = num(t, 2)?;
        let low = t.div(nine, two)?;
        let code = t.add(high, low)?;
        t.modify(target, zero, code)?;

        // a[2] > |m| picks the else-if arm
        let list = t.get(a)?;
        let two = num(t, 2)?;
        let last = t.index(list.clone(), two.clone())?;
        let table = t.get(m)?;
        let entries = t.amount(table)?;
        let smaller = t.less(last.clone(), entries.clone())?;
        let larger = t.more(last, entries)?;
        let mut never = |t: &mut T| print(t, b"less");
        let mut taken = |t: &mut T| {
            let text = t.get(s)?;
            let sent = t.send(None, text)?;
            t.discard(sent)
        };
        let mut otherwise = |t: &mut T| print(t, b"same");
        t.if_(
            smaller,
            &mut never,
            vec![ElseIf::<T>::new(larger, &mut taken)],
            Some(&mut otherwise),
        )?;

        // r += every element, then count down to a multiple of 5
        let list = t.get(a)?;
        t.each(list, &mut |t: &mut T, index: T::Value, value: T::Value| {
            t.discard(index)?;
            let current = t.get(r)?;
            let total = t.add(current, value)?;
            t.set(r, total)
        })?;
        let current = t.get(r)?;
        let five = num(t, 5)?;
        let remainder = t.mod_(current, five)?;
        let zero = num(t, 0)?;
        let aligned = t.same(remainder, zero)?;
        let unaligned = t.not(aligned)?;
        t.loop_(Some(unaligned), &mut |t| {
            let current = t.get(r)?;
            let one = num(t, 1)?;
            let next = t.sub(current, one)?;
            t.set(r, next)
        })?;
        t.loop_(None, &mut |t| t.break_())?;

        // string and logic queries
        let text = t.get(s)?;
        let x = t.string(b"x")?;
        let joined = t.concat(text, x)?;
        let expected = t.string(b"Dx")?;
        let matches = t.equals(joined, expected)?;
        let no = t.bit(false)?;
        let yes = t.bit(true)?;
        let either = t.or(no, yes)?;
        let both = t.and(either, matches)?;
        t.discard(both)?;
        let text = t.get(s)?;
        let length = t.length(text)?;
        let text = t.get(s)?;
        let zero = num(t, 0)?;
        let first = t.symbol(text, zero)?;
        let same = t.same(length, first)?;
        t.discard(same)?;

        // streams
        let uri = t.string(b"stdio:")?;
        let stdio = t.open(uri)?;
        t.discard(stdio)?;
        let forked = t.fork(child, vec![])?;
        let f = t.var(forked)?;
        let one = num(t, 1)?;
        let buffer = t.create(one)?;
        let b = t.var(buffer)?;
        let stream = t.get(f)?;
        let buffer = t.get(b)?;
        let got = t.read(Some(stream), buffer)?;
        t.discard(got)?;
        let stream = t.get(f)?;
        let zero = num(t, 0)?;
        t.seek(Some(stream), zero)?;
        let stream = t.get(f)?;
        let status = t.stat(Some(stream))?;
        t.discard(status)?;
        let status = t.stat(None)?;
        t.discard(status)?;
        let buffer = t.get(b)?;
        let sent = t.send(None, buffer)?;
        t.discard(sent)?;

        // error channel
        let err = t.string(b"err")?;
        t.throw(err)?;
        let caught = t.catch()?;
        let sent = t.send(None, caught)?;
        t.discard(sent)?;

        // calls
        let list = t.get(a)?;
        t.delete(Kind::Array, list)?;
        let current = t.get(r)?;
        t.jump_to(identity, vec![current])?;
        let one = num(t, 1)?;
        let result = t.call(identity, vec![one])?;
        t.discard(result)?;
        let function = t.bind(identity)?;
        let one = num(t, 1)?;
        let result = t.call(Label::INDIRECT, vec![function, one])?;
        t.discard(result)
    })
}
