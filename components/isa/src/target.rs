//! The `Target` trait: every operation of the machine.
//!
//! A backend either executes the calls (the interpreter), serializes them
//! (the bytecode encoder) or re-expresses them in some other form.
//!
//! Values are expressions. A value passed to two operations is evaluated by
//! both; bind it with [`Target::var`] to evaluate it once.
//!
//! Blocks are materialized by the backend, exactly once each and in
//! argument order (for `if_`: body, chain in order, then last). The bytecode
//! decoder relies on this to read nested blocks from a flat byte stream.

use core_types::{Kind, Label, Register, UsmResult};
use num_bigint::BigInt;

/// A deferred sequence of statements, materialized against a target
pub type Block<'a, T> = &'a mut dyn FnMut(&mut T) -> UsmResult<()>;

/// Body of an `each` loop, receiving the index and element values
pub type EachBody<'a, T> =
    &'a mut dyn FnMut(&mut T, <T as Target>::Value, <T as Target>::Value) -> UsmResult<()>;

/// One `else if` arm trailing an `if_`
pub struct ElseIf<'a, T: Target> {
    /// Condition, evaluated only if every earlier condition was false
    pub condition: T::Value,
    /// Body run when the condition is the first truthy one
    pub body: Block<'a, T>,
}

impl<'a, T: Target> ElseIf<'a, T> {
    /// Create a chain entry
    pub fn new(condition: T::Value, body: Block<'a, T>) -> Self {
        Self { condition, body }
    }
}

/// A usm backend.
///
/// Registers and labels must be allocated through
/// [`core_types::HandleAllocator`]: one register per `var`, two per `each`
/// (index then value, before the body), and one label per `define` after its
/// body has been materialized.
pub trait Target: Sized {
    /// Backend-private value representation
    type Value: Clone;

    // Structure

    /// Designate the entry point of the program
    fn main(&mut self, body: Block<'_, Self>) -> UsmResult<()>;

    /// Register a function body expecting `arguments` arguments
    fn define(&mut self, arguments: usize, body: Block<'_, Self>) -> UsmResult<Label>;

    /// Exit the active call, passing `result` (or nothing) to the caller
    fn return_(&mut self, result: Option<Self::Value>) -> UsmResult<()>;

    /// Call `label` and ignore any result.
    ///
    /// With [`Label::INDIRECT`] the first argument is a bound Function.
    fn jump_to(&mut self, label: Label, arguments: Vec<Self::Value>) -> UsmResult<()>;

    /// Call `label` and yield its result.
    ///
    /// With [`Label::INDIRECT`] the first argument is a bound Function.
    fn call(&mut self, label: Label, arguments: Vec<Self::Value>) -> UsmResult<Self::Value>;

    /// Run `label` in an independent execution connected by a Stream
    fn fork(&mut self, label: Label, arguments: Vec<Self::Value>) -> UsmResult<Self::Value>;

    /// Make `label` usable as a Function value
    fn bind(&mut self, label: Label) -> UsmResult<Self::Value>;

    // Control flow

    /// Run the first branch whose condition is truthy
    fn if_(
        &mut self,
        condition: Self::Value,
        body: Block<'_, Self>,
        chain: Vec<ElseIf<'_, Self>>,
        last: Option<Block<'_, Self>>,
    ) -> UsmResult<()>;

    /// Repeat `body` while `condition` is truthy, forever when `None`
    fn loop_(&mut self, condition: Option<Self::Value>, body: Block<'_, Self>) -> UsmResult<()>;

    /// Visit array elements in index order.
    ///
    /// Mutating the array from inside the body is undefined behavior.
    fn each(&mut self, array: Self::Value, body: EachBody<'_, Self>) -> UsmResult<()>;

    /// Leave the innermost loop
    fn break_(&mut self) -> UsmResult<()>;

    // Registers

    /// Bind a fresh register to `value`
    fn var(&mut self, value: Self::Value) -> UsmResult<Register>;

    /// Rebind an existing register
    fn set(&mut self, register: Register, value: Self::Value) -> UsmResult<()>;

    /// Read a register (negative registers read call arguments)
    fn get(&mut self, register: Register) -> UsmResult<Self::Value>;

    /// Evaluate a value as a statement
    fn discard(&mut self, value: Self::Value) -> UsmResult<()>;

    // Errors

    /// Push a value onto the error channel
    fn throw(&mut self, value: Self::Value) -> UsmResult<()>;

    /// Pop the most recent error, or nil when there is none
    fn catch(&mut self) -> UsmResult<Self::Value>;

    // Memory

    /// Release hint; a no-op under automatic memory management
    fn delete(&mut self, kind: Kind, value: Self::Value) -> UsmResult<()>;

    /// Create a shared cell holding `value`
    fn pointer(&mut self, value: Self::Value) -> UsmResult<Self::Value>;

    /// Read the value a pointer refers to
    fn follow(&mut self, pointer: Self::Value) -> UsmResult<Self::Value>;

    /// Replace the value a pointer refers to, visible to every holder
    fn change(&mut self, pointer: Self::Value, value: Self::Value) -> UsmResult<()>;

    // Arrays

    /// Create an array of `size` zero values
    fn alloc(&mut self, size: Self::Value) -> UsmResult<Self::Value>;

    /// Create an array holding `elements`
    fn array(&mut self, elements: Vec<Self::Value>) -> UsmResult<Self::Value>;

    /// Number of elements
    fn count(&mut self, array: Self::Value) -> UsmResult<Self::Value>;

    /// Element at a 0-based index
    fn index(&mut self, array: Self::Value, index: Self::Value) -> UsmResult<Self::Value>;

    /// Add an element at the end; callers must use the returned array
    fn append(&mut self, array: Self::Value, value: Self::Value) -> UsmResult<Self::Value>;

    /// Overwrite the element at a 0-based index
    fn mutate(&mut self, array: Self::Value, index: Self::Value, value: Self::Value)
        -> UsmResult<()>;

    // Tables

    /// Create a table from (String key, value) entries
    fn table(&mut self, entries: Vec<(Self::Value, Self::Value)>) -> UsmResult<Self::Value>;

    /// Set the value stored under `key`
    fn insert(&mut self, table: Self::Value, key: Self::Value, value: Self::Value)
        -> UsmResult<()>;

    /// Remove `key` from the table
    fn remove(&mut self, table: Self::Value, key: Self::Value) -> UsmResult<()>;

    /// Value stored under `key`, or nil
    fn lookup(&mut self, table: Self::Value, key: Self::Value) -> UsmResult<Self::Value>;

    /// Number of entries
    fn amount(&mut self, table: Self::Value) -> UsmResult<Self::Value>;

    // Literals

    /// A Number literal
    fn number(&mut self, value: BigInt) -> UsmResult<Self::Value>;

    /// A String literal
    fn string(&mut self, bytes: &[u8]) -> UsmResult<Self::Value>;

    /// A Bit literal
    fn bit(&mut self, value: bool) -> UsmResult<Self::Value>;

    // Strings

    /// A zero-filled string of `size` bytes
    fn create(&mut self, size: Self::Value) -> UsmResult<Self::Value>;

    /// A new string holding `a` followed by `b`
    fn concat(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Byte-wise equality
    fn equals(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Length in bytes
    fn length(&mut self, string: Self::Value) -> UsmResult<Self::Value>;

    /// Byte at `index` as a Number
    fn symbol(&mut self, string: Self::Value, index: Self::Value) -> UsmResult<Self::Value>;

    /// Write the low byte of `value` at `index`
    fn modify(&mut self, string: Self::Value, index: Self::Value, value: Self::Value)
        -> UsmResult<()>;

    // I/O. A `None` stream is the process's standard input/output.

    /// Open a stream from a platform-dependent URI
    fn open(&mut self, uri: Self::Value) -> UsmResult<Self::Value>;

    /// Platform-defined status of a stream
    fn stat(&mut self, stream: Option<Self::Value>) -> UsmResult<Self::Value>;

    /// Read into `buffer`, yielding the number of bytes read
    fn read(&mut self, stream: Option<Self::Value>, buffer: Self::Value)
        -> UsmResult<Self::Value>;

    /// Write `data`, yielding the number of bytes written
    fn send(&mut self, stream: Option<Self::Value>, data: Self::Value) -> UsmResult<Self::Value>;

    /// Discard `amount` bytes from a stream
    fn seek(&mut self, stream: Option<Self::Value>, amount: Self::Value) -> UsmResult<()>;

    // Arithmetic and logic

    /// a + b
    fn add(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// a - b
    fn sub(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// a * b
    fn mul(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// a / b, truncated toward zero
    fn div(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Remainder of truncated division; the sign follows `a`
    fn mod_(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// a raised to b
    fn pow(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: a < b
    fn less(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: a > b
    fn more(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: a == b
    fn same(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: a && b, both already evaluated
    fn and(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: a || b, both already evaluated
    fn or(&mut self, a: Self::Value, b: Self::Value) -> UsmResult<Self::Value>;

    /// Bit: !a
    fn not(&mut self, a: Self::Value) -> UsmResult<Self::Value>;
}
