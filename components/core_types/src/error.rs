//! Error types for decoding, contract violations and execution.
//!
//! ISA-level I/O failures are not represented here: a running program sees
//! those as ordinary values on its own error channel. Everything in this
//! module propagates to the host caller.

use crate::{Kind, Label, Register};
use thiserror::Error;

/// Broad classification of a [`UsmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated bytecode
    Decode,
    /// The program or a backend broke the ISA contract
    Contract,
    /// The backend does not implement the operation
    Unsupported,
    /// A fault while executing a program
    Runtime,
    /// Host I/O failed while writing output or spawning work
    Io,
}

/// Every failure reported to the host by a backend or the codec.
#[derive(Debug, Error)]
pub enum UsmError {
    /// The byte source ended in the middle of a value or block
    #[error("unexpected end of stream at byte {offset} while reading {context}")]
    UnexpectedEof {
        /// Byte offset where the source ran out
        offset: u64,
        /// What the decoder was reading
        context: &'static str,
    },

    /// A byte that is not part of the opcode enumeration
    #[error("unknown opcode {opcode} at byte {offset}")]
    UnknownOpcode {
        /// The offending byte
        opcode: u8,
        /// Byte offset of the opcode
        offset: u64,
    },

    /// A valid opcode in a position where it cannot appear
    #[error("opcode {opcode} at byte {offset} cannot start {context}")]
    MisplacedOpcode {
        /// Opcode name
        opcode: &'static str,
        /// Byte offset of the opcode
        offset: u64,
        /// What the decoder expected
        context: &'static str,
    },

    /// Structurally invalid payload (bad length, bad flag byte, ...)
    #[error("malformed bytecode at byte {offset}: {reason}")]
    Malformed {
        /// Byte offset of the payload
        offset: u64,
        /// Description of the problem
        reason: String,
    },

    /// The backend cannot perform the operation
    #[error("{backend} does not support {operation}")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// The program or backend broke the contract
    #[error("contract violation: {0}")]
    Contract(String),

    /// An operand had the wrong kind
    #[error("{operation} expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation name
        operation: &'static str,
        /// Kind the operation accepts
        expected: Kind,
        /// Kind (or `nil`) that was supplied
        found: &'static str,
    },

    /// A register read or written outside the scope that created it
    #[error("register {0} is not bound in the active scope")]
    UnboundRegister(Register),

    /// A call to a label that was never defined
    #[error("label {0} is not defined")]
    UndefinedLabel(Label),

    /// A call with the wrong number of arguments
    #[error("label {label} expects {expected} arguments, got {found}")]
    ArityMismatch {
        /// Callee
        label: Label,
        /// Declared argument count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// Array or string access past the end
    #[error("{operation}: index {index} out of range for length {length}")]
    IndexOutOfRange {
        /// Operation name
        operation: &'static str,
        /// Requested index
        index: String,
        /// Length of the sequence
        length: usize,
    },

    /// `Div` or `Mod` by zero
    #[error("division by zero")]
    DivisionByZero,

    /// `Alloc` or `Create` asked for more memory than can be reserved
    #[error("{operation}: cannot allocate {size} elements")]
    AllocationFailed {
        /// Operation name
        operation: &'static str,
        /// Requested element count
        size: usize,
    },

    /// Nested calls went deeper than the configured limit
    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    /// Writing encoded output or spawning an execution failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl UsmError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            UsmError::UnexpectedEof { .. }
            | UsmError::UnknownOpcode { .. }
            | UsmError::MisplacedOpcode { .. }
            | UsmError::Malformed { .. } => ErrorKind::Decode,
            UsmError::Unsupported { .. } => ErrorKind::Unsupported,
            UsmError::Contract(_) | UsmError::ArityMismatch { .. } => ErrorKind::Contract,
            UsmError::TypeMismatch { .. }
            | UsmError::UnboundRegister(_)
            | UsmError::UndefinedLabel(_)
            | UsmError::IndexOutOfRange { .. }
            | UsmError::DivisionByZero
            | UsmError::AllocationFailed { .. }
            | UsmError::CallDepthExceeded(_) => ErrorKind::Runtime,
            UsmError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this is a decode failure
    pub fn is_decode(&self) -> bool {
        self.kind() == ErrorKind::Decode
    }

    /// Shorthand for a contract violation
    pub fn contract(message: impl Into<String>) -> Self {
        UsmError::Contract(message.into())
    }
}

/// Result alias used across the workspace
pub type UsmResult<T> = Result<T, UsmError>;
