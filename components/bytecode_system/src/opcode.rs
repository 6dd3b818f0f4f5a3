//! Bytecode opcodes for the usm wire format
//!
//! One byte per operation of the ISA plus the `Nil` and `End` control tags.
//! The numbering is part of the wire format and must never change.

use core_types::Kind;

/// Every opcode byte of the wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Absent optional value
    Nil = 0,
    /// Terminates a block
    End,
    // Statements
    /// Bind a fresh register
    Var,
    /// Rebind a register
    Set,
    /// Evaluate a value as a statement
    Discard,
    /// Program entry point
    Main,
    /// Conditional with else-if chain
    If,
    /// Conditional or infinite loop
    Loop,
    /// Array iteration
    Each,
    /// Leave the innermost loop
    Break,
    /// Function definition
    Define,
    /// Leave the active call
    Return,
    /// Call ignoring the result
    JumpTo,
    /// Push onto the error channel
    Throw,
    /// Skip stream bytes
    Seek,
    /// Release hint
    Delete,
    /// Write through a pointer
    Change,
    /// Write an array element
    Mutate,
    /// Write a table entry
    Insert,
    /// Remove a table entry
    Remove,
    /// Write a string byte
    Modify,
    // Values
    /// Number literal
    Number,
    /// String literal
    String,
    /// Bit literal
    Bit,
    /// Read a register
    Get,
    /// Label as a Function value
    Bind,
    /// Pop the error channel
    Catch,
    /// Call yielding the result
    Call,
    /// Independent execution
    Fork,
    /// New shared cell
    Pointer,
    /// Array from elements
    Array,
    /// Array of zero values
    Alloc,
    /// Array length
    Count,
    /// Array element
    Index,
    /// Array push
    Append,
    /// Table from entries
    Table,
    /// Table size
    Amount,
    /// Table read
    Lookup,
    /// Zero-filled string
    Create,
    /// String equality
    Equals,
    /// String length
    Length,
    /// String byte
    Symbol,
    /// String concatenation
    Concat,
    /// Pointer read
    Follow,
    /// Open a stream
    Open,
    /// Stream status
    Stat,
    /// Read from a stream
    Read,
    /// Write to a stream
    Send,
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Truncated division
    Div,
    /// Truncated remainder
    Mod,
    /// Exponentiation
    Pow,
    /// Less-than
    Less,
    /// Greater-than
    More,
    /// Numeric equality
    Same,
    /// Boolean and
    And,
    /// Boolean or
    Or,
    /// Boolean not
    Not,
}

impl Opcode {
    /// Every opcode, indexed by its byte
    pub const ALL: [Opcode; 60] = [
        Opcode::Nil,
        Opcode::End,
        Opcode::Var,
        Opcode::Set,
        Opcode::Discard,
        Opcode::Main,
        Opcode::If,
        Opcode::Loop,
        Opcode::Each,
        Opcode::Break,
        Opcode::Define,
        Opcode::Return,
        Opcode::JumpTo,
        Opcode::Throw,
        Opcode::Seek,
        Opcode::Delete,
        Opcode::Change,
        Opcode::Mutate,
        Opcode::Insert,
        Opcode::Remove,
        Opcode::Modify,
        Opcode::Number,
        Opcode::String,
        Opcode::Bit,
        Opcode::Get,
        Opcode::Bind,
        Opcode::Catch,
        Opcode::Call,
        Opcode::Fork,
        Opcode::Pointer,
        Opcode::Array,
        Opcode::Alloc,
        Opcode::Count,
        Opcode::Index,
        Opcode::Append,
        Opcode::Table,
        Opcode::Amount,
        Opcode::Lookup,
        Opcode::Create,
        Opcode::Equals,
        Opcode::Length,
        Opcode::Symbol,
        Opcode::Concat,
        Opcode::Follow,
        Opcode::Open,
        Opcode::Stat,
        Opcode::Read,
        Opcode::Send,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Pow,
        Opcode::Less,
        Opcode::More,
        Opcode::Same,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
    ];

    const NAMES: [&'static str; 60] = [
        "Nil", "End", "Var", "Set", "Discard", "Main", "If", "Loop", "Each", "Break", "Define",
        "Return", "JumpTo", "Throw", "Seek", "Delete", "Change", "Mutate", "Insert", "Remove",
        "Modify", "Number", "String", "Bit", "Get", "Bind", "Catch", "Call", "Fork", "Pointer",
        "Array", "Alloc", "Count", "Index", "Append", "Table", "Amount", "Lookup", "Create",
        "Equals", "Length", "Symbol", "Concat", "Follow", "Open", "Stat", "Read", "Send", "Add",
        "Sub", "Mul", "Div", "Mod", "Pow", "Less", "More", "Same", "And", "Or", "Not",
    ];

    /// Decode an opcode byte
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// The opcode's byte
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Name used in diagnostics
    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    /// Whether this opcode starts a statement record
    pub fn is_statement(self) -> bool {
        (Opcode::Var as u8..=Opcode::Modify as u8).contains(&(self as u8))
    }

    /// Whether this opcode starts a value encoding
    pub fn is_value(self) -> bool {
        self as u8 >= Opcode::Number as u8
    }

    /// Tag written by `Delete` for a value kind
    pub fn for_kind(kind: Kind) -> Opcode {
        match kind {
            Kind::Bit => Opcode::Bit,
            Kind::Number => Opcode::Number,
            Kind::String => Opcode::String,
            Kind::Array => Opcode::Array,
            Kind::Table => Opcode::Table,
            Kind::Pointer => Opcode::Pointer,
            Kind::Stream => Opcode::Open,
            Kind::Function => Opcode::Bind,
        }
    }

    /// Inverse of [`Opcode::for_kind`]
    pub fn kind(self) -> Option<Kind> {
        Kind::ALL
            .iter()
            .copied()
            .find(|kind| Opcode::for_kind(*kind) == self)
    }
}
