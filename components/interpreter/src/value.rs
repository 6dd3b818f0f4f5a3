//! Runtime values
//!
//! Composite values are reference-counted handles: every copy of an Array,
//! Table, String, Pointer or Stream refers to the same storage, so mutation
//! through one copy is visible through all of them. Reference cycles built
//! through Pointers or containers are never collected.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use core_types::{Kind, Label, UsmError, UsmResult};
use num_bigint::BigInt;
use num_traits::Zero;

use crate::stream::Stream;

/// Shared handle to mutable storage
pub type Shared<T> = Rc<RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// A value at run time
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Nil,
    /// Boolean
    Bit(bool),
    /// Arbitrary-precision integer
    Number(BigInt),
    /// Mutable byte buffer
    String(Shared<Vec<u8>>),
    /// Mutable sequence
    Array(Shared<Vec<Value>>),
    /// Mutable map keyed by string bytes
    Table(Shared<HashMap<Vec<u8>, Value>>),
    /// Mutable cell
    Pointer(Shared<Value>),
    /// I/O handle
    Stream(Shared<Stream>),
    /// Bound label
    Function(Label),
}

impl Value {
    /// A fresh String holding `bytes`
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Value::String(shared(bytes.into()))
    }

    /// A fresh Array holding `elements`
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(shared(elements))
    }

    /// A fresh Table holding `entries`
    pub fn table(entries: HashMap<Vec<u8>, Value>) -> Self {
        Value::Table(shared(entries))
    }

    /// A fresh Pointer to `value`
    pub fn pointer(value: Value) -> Self {
        Value::Pointer(shared(value))
    }

    /// Wrap a stream
    pub fn stream(stream: Stream) -> Self {
        Value::Stream(shared(stream))
    }

    /// A Number from anything convertible
    pub fn number(n: impl Into<BigInt>) -> Self {
        Value::Number(n.into())
    }

    /// The kind of this value, `None` for Nil
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Nil => None,
            Value::Bit(_) => Some(Kind::Bit),
            Value::Number(_) => Some(Kind::Number),
            Value::String(_) => Some(Kind::String),
            Value::Array(_) => Some(Kind::Array),
            Value::Table(_) => Some(Kind::Table),
            Value::Pointer(_) => Some(Kind::Pointer),
            Value::Stream(_) => Some(Kind::Stream),
            Value::Function(_) => Some(Kind::Function),
        }
    }

    /// Kind name used in type errors
    pub fn kind_name(&self) -> &'static str {
        self.kind().map(|kind| kind.name()).unwrap_or("nil")
    }

    /// Whether this is Nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Borrow the integer of a Number
    pub fn as_number(&self) -> Option<&BigInt> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The boolean of a Bit
    pub fn as_bit(&self) -> Option<bool> {
        match self {
            Value::Bit(b) => Some(*b),
            _ => None,
        }
    }

    /// Copy out the bytes of a String
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::String(s) => Some(s.borrow().clone()),
            _ => None,
        }
    }

    /// Bit, or a non-zero Number; Nil is false
    pub fn truthy(&self, operation: &'static str) -> UsmResult<bool> {
        match self {
            Value::Nil => Ok(false),
            Value::Bit(b) => Ok(*b),
            Value::Number(n) => Ok(!n.is_zero()),
            other => Err(mismatch(operation, Kind::Bit, other)),
        }
    }
}

/// Build a type error for `found`
pub fn mismatch(operation: &'static str, expected: Kind, found: &Value) -> UsmError {
    UsmError::TypeMismatch {
        operation,
        expected,
        found: found.kind_name(),
    }
}

/// Identity of shared storage, used to spot cycles
fn address<T>(storage: &Shared<T>) -> usize {
    Rc::as_ptr(storage) as *const () as usize
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Nested {
            value: self,
            path: &RefCell::new(Vec::new()),
        }
        .fmt(f)
    }
}

/// A value printed below the arrays in `path`
struct Nested<'v, 'p> {
    value: &'v Value,
    path: &'p RefCell<Vec<usize>>,
}

impl fmt::Debug for Nested<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Nil => write!(f, "Nil"),
            Value::Bit(b) => write!(f, "Bit({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s.borrow().escape_ascii().to_string()),
            Value::Array(a) => {
                let id = address(a);
                if self.path.borrow().contains(&id) {
                    return write!(f, "Array(<cycle>)");
                }
                self.path.borrow_mut().push(id);
                let items = a.borrow();
                let entries = items.iter().map(|value| Nested {
                    value,
                    path: self.path,
                });
                let result = write!(f, "Array(")
                    .and_then(|_| f.debug_list().entries(entries).finish())
                    .and_then(|_| write!(f, ")"));
                self.path.borrow_mut().pop();
                result
            }
            Value::Table(t) => write!(f, "Table(<{} entries>)", t.borrow().len()),
            Value::Pointer(_) => write!(f, "Pointer(..)"),
            Value::Stream(s) => write!(f, "Stream({})", s.borrow().describe()),
            Value::Function(label) => write!(f, "Function({})", label),
        }
    }
}

/// A value detached from any runtime, able to cross into a forked execution
#[derive(Debug, Clone, PartialEq)]
pub enum Portable {
    /// Nil
    Nil,
    /// Bit
    Bit(bool),
    /// Number
    Number(BigInt),
    /// String contents
    String(Vec<u8>),
    /// Array contents
    Array(Vec<Portable>),
    /// Table contents
    Table(Vec<(Vec<u8>, Portable)>),
    /// Bound label
    Function(Label),
}

impl Portable {
    /// Deep-copy a runtime value. Pointers and Streams are tied to the
    /// runtime that created them and cannot be copied, and neither can an
    /// Array or Table that contains itself.
    pub fn capture(value: &Value) -> UsmResult<Portable> {
        Portable::capture_below(value, &mut Vec::new())
    }

    fn capture_below(value: &Value, path: &mut Vec<usize>) -> UsmResult<Portable> {
        let id = match value {
            Value::Array(a) => Some(address(a)),
            Value::Table(t) => Some(address(t)),
            _ => None,
        };
        if let Some(id) = id {
            if path.contains(&id) {
                return Err(UsmError::contract(format!(
                    "a cyclic {} cannot be passed to a forked execution",
                    value.kind_name()
                )));
            }
            path.push(id);
        }
        let portable = Portable::copy(value, path);
        if id.is_some() {
            path.pop();
        }
        portable
    }

    fn copy(value: &Value, path: &mut Vec<usize>) -> UsmResult<Portable> {
        Ok(match value {
            Value::Nil => Portable::Nil,
            Value::Bit(b) => Portable::Bit(*b),
            Value::Number(n) => Portable::Number(n.clone()),
            Value::String(s) => Portable::String(s.borrow().clone()),
            Value::Array(a) => Portable::Array(
                a.borrow()
                    .iter()
                    .map(|item| Portable::capture_below(item, path))
                    .collect::<UsmResult<_>>()?,
            ),
            Value::Table(t) => Portable::Table(
                t.borrow()
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Portable::capture_below(v, path)?)))
                    .collect::<UsmResult<_>>()?,
            ),
            Value::Function(label) => Portable::Function(*label),
            Value::Pointer(_) | Value::Stream(_) => {
                return Err(UsmError::contract(format!(
                    "a {} cannot be passed to a forked execution",
                    value.kind_name()
                )))
            }
        })
    }

    /// Rebuild a runtime value with fresh storage
    pub fn into_value(self) -> Value {
        match self {
            Portable::Nil => Value::Nil,
            Portable::Bit(b) => Value::Bit(b),
            Portable::Number(n) => Value::Number(n),
            Portable::String(s) => Value::string(s),
            Portable::Array(a) => Value::array(a.into_iter().map(Portable::into_value).collect()),
            Portable::Table(t) => Value::table(
                t.into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect(),
            ),
            Portable::Function(label) => Value::Function(label),
        }
    }
}
