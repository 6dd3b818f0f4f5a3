//! Register and label handles.

use std::fmt;

/// A local variable slot within the active call frame.
///
/// Positive ids are created by `Var` (and `Each`). Negative ids read the
/// arguments of the active call: `Register(-1)` is the first argument,
/// `Register(-2)` the second, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub i64);

impl Register {
    /// Register naming the `index`-th (0-based) argument of the active call
    pub fn argument(index: usize) -> Self {
        Register(-(index as i64) - 1)
    }

    /// Whether this register reads a call argument
    pub fn is_argument(&self) -> bool {
        self.0 < 0
    }

    /// Position in the argument list, if this is an argument register
    pub fn argument_index(&self) -> Option<usize> {
        if self.is_argument() {
            Some((-(self.0 + 1)) as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument_index() {
            Some(index) => write!(f, "arg{}", index),
            None => write!(f, "r{}", self.0),
        }
    }
}

/// Handle to a function body registered with `Define`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub i64);

impl Label {
    /// Sentinel: the first argument of the call is a bound Function value
    pub const INDIRECT: Label = Label(0);

    /// Whether this is the indirect-call sentinel
    pub fn is_indirect(&self) -> bool {
        self.0 == 0
    }

    /// Zero-based slot in a function table, for non-sentinel labels
    pub fn slot(&self) -> Option<usize> {
        if self.0 > 0 {
            Some((self.0 - 1) as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Monotonic numbering for registers and labels.
///
/// Every backend allocates through this type at the same points of the
/// contract (`Var`, `Each`, `Define`), which keeps the numbering identical
/// whether a program is authored directly or replayed from bytecode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleAllocator {
    registers: i64,
    labels: i64,
}

impl HandleAllocator {
    /// Create an allocator with nothing assigned yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next register, starting at 1
    pub fn next_register(&mut self) -> Register {
        self.registers += 1;
        Register(self.registers)
    }

    /// Assign the next label, starting at 1
    pub fn next_label(&mut self) -> Label {
        self.labels += 1;
        Label(self.labels)
    }

    /// Number of registers assigned so far
    pub fn register_count(&self) -> i64 {
        self.registers
    }

    /// Number of labels assigned so far
    pub fn label_count(&self) -> i64 {
        self.labels
    }
}
