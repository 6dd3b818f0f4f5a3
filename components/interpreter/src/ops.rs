//! Arithmetic, comparison and logic on runtime values

use core_types::{Kind, UsmError, UsmResult};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::code::BinaryOp;
use crate::value::{mismatch, Value};

/// Borrow the integer of a Number operand
pub fn expect_number<'v>(operation: &'static str, value: &'v Value) -> UsmResult<&'v BigInt> {
    value
        .as_number()
        .ok_or_else(|| mismatch(operation, Kind::Number, value))
}

/// Convert a Number into a position inside a sequence of `length` items
pub fn to_index(operation: &'static str, index: &BigInt, length: usize) -> UsmResult<usize> {
    match index.to_usize() {
        Some(i) if i < length => Ok(i),
        _ => Err(UsmError::IndexOutOfRange {
            operation,
            index: index.to_string(),
            length,
        }),
    }
}

/// Convert a Number into an allocation size
pub fn to_size(operation: &'static str, size: &BigInt) -> UsmResult<usize> {
    size.to_usize().ok_or_else(|| {
        UsmError::contract(format!("{}: invalid size {}", operation, size))
    })
}

/// A vector of `size` copies of `fill`, failing instead of aborting when
/// the memory cannot be reserved
pub fn filled<T: Clone>(operation: &'static str, size: usize, fill: T) -> UsmResult<Vec<T>> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(size)
        .map_err(|_| UsmError::AllocationFailed { operation, size })?;
    items.resize(size, fill);
    Ok(items)
}

/// Low byte of the two's complement representation
pub fn low_byte(n: &BigInt) -> u8 {
    n.to_signed_bytes_le().first().copied().unwrap_or(0)
}

fn numbers<'v>(
    operation: &'static str,
    a: &'v Value,
    b: &'v Value,
) -> UsmResult<(&'v BigInt, &'v BigInt)> {
    Ok((expect_number(operation, a)?, expect_number(operation, b)?))
}

/// Apply a binary operator
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> UsmResult<Value> {
    let name = op.name();
    Ok(match op {
        BinaryOp::And => {
            let (x, y) = (a.truthy(name)?, b.truthy(name)?);
            Value::Bit(x && y)
        }
        BinaryOp::Or => {
            let (x, y) = (a.truthy(name)?, b.truthy(name)?);
            Value::Bit(x || y)
        }
        BinaryOp::Add => {
            let (x, y) = numbers(name, a, b)?;
            Value::Number(x + y)
        }
        BinaryOp::Sub => {
            let (x, y) = numbers(name, a, b)?;
            Value::Number(x - y)
        }
        BinaryOp::Mul => {
            let (x, y) = numbers(name, a, b)?;
            Value::Number(x * y)
        }
        BinaryOp::Div | BinaryOp::Mod => {
            let (x, y) = numbers(name, a, b)?;
            if y.is_zero() {
                return Err(UsmError::DivisionByZero);
            }
            // `/` and `%` on BigInt truncate toward zero.
            Value::Number(if op == BinaryOp::Div { x / y } else { x % y })
        }
        BinaryOp::Pow => {
            let (x, y) = numbers(name, a, b)?;
            Value::Number(pow(x, y)?)
        }
        BinaryOp::Less => {
            let (x, y) = numbers(name, a, b)?;
            Value::Bit(x < y)
        }
        BinaryOp::More => {
            let (x, y) = numbers(name, a, b)?;
            Value::Bit(x > y)
        }
        BinaryOp::Same => {
            let (x, y) = numbers(name, a, b)?;
            Value::Bit(x == y)
        }
    })
}

/// Integer power. A negative exponent truncates `1 / base^|e|` toward zero.
pub fn pow(base: &BigInt, exponent: &BigInt) -> UsmResult<BigInt> {
    if exponent.is_negative() {
        if base.is_zero() {
            return Err(UsmError::DivisionByZero);
        }
        if base.is_one() {
            return Ok(BigInt::one());
        }
        if *base == -BigInt::one() {
            return Ok(if exponent.is_even() {
                BigInt::one()
            } else {
                -BigInt::one()
            });
        }
        return Ok(BigInt::zero());
    }
    let e = exponent
        .to_u32()
        .ok_or_else(|| UsmError::contract(format!("Pow: exponent {} is too large", exponent)))?;
    Ok(base.pow(e))
}

/// Boolean negation
pub fn not(a: &Value) -> UsmResult<Value> {
    Ok(Value::Bit(!a.truthy("Not")?))
}
