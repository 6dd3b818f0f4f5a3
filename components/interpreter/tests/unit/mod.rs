//! Unit tests for the interpreter


use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use core_types::UsmResult;
use interpreter::{Expr, Interpreter, Value};
use isa::Target;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Output sink the test can read back after handing it to the interpreter
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
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

/// An interpreter writing into a fresh capture
pub fn captured() -> (Interpreter, Capture) {
    let out = Capture::default();
    (Interpreter::new().with_output(out.clone()), out)
}

/// Build `body` as `Main`, run it and return what it printed
pub fn run_main(body: &mut dyn FnMut(&mut Interpreter) -> UsmResult<()>) -> UsmResult<String> {
    let (mut vm, out) = captured();
    vm.main(body)?;
    vm.run()?;
    Ok(out.text())
}

/// Build `body` as a function of no arguments and return its result
pub fn eval(body: &mut dyn FnMut(&mut Interpreter) -> UsmResult<()>) -> UsmResult<Value> {
    let (mut vm, _) = captured();
    let label = vm.define(0, body)?;
    Ok(vm.invoke(label, vec![])?.unwrap_or(Value::Nil))
}

pub fn num(t: &mut Interpreter, value: i64) -> UsmResult<Expr> {
    t.number(BigInt::from(value))
}

pub fn int(value: &Value) -> i64 {
    value
        .as_number()
        .and_then(|n| n.to_i64())
        .unwrap_or_else(|| panic!("expected a number, got {:?}", value))
}

pub fn text(value: &Value) -> String {
    let bytes = value
        .to_bytes()
        .unwrap_or_else(|| panic!("expected a string, got {:?}", value));
    String::from_utf8(bytes).unwrap()
}

pub fn print(t: &mut Interpreter, message: &str) -> UsmResult<()> {
    let text = t.string(message.as_bytes())?;
    let sent = t.send(None, text)?;
    t.discard(sent)
}
