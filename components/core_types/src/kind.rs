//! The value kinds of the machine.

use std::fmt;

/// One of the eight semantic value kinds.
///
/// A backend's value representation is private; `Kind` is what operations
/// such as `Delete` and diagnostics use to talk about a value's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Boolean
    Bit,
    /// Arbitrary-precision signed integer
    Number,
    /// Byte buffer
    String,
    /// Ordered sequence of values
    Array,
    /// Mapping from String to value
    Table,
    /// Shared mutable cell
    Pointer,
    /// External I/O handle
    Stream,
    /// Bound label
    Function,
}

impl Kind {
    /// All kinds, in declaration order
    pub const ALL: [Kind; 8] = [
        Kind::Bit,
        Kind::Number,
        Kind::String,
        Kind::Array,
        Kind::Table,
        Kind::Pointer,
        Kind::Stream,
        Kind::Function,
    ];

    /// Lowercase name used in diagnostics and listings
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bit => "bit",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Table => "table",
            Kind::Pointer => "pointer",
            Kind::Stream => "stream",
            Kind::Function => "function",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
