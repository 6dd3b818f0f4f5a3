//! Core types shared by every usm backend.
//!
//! This crate provides the handles and error types that the ISA contract,
//! the bytecode codec and the interpreter all agree on.
//!
//! # Overview
//!
//! - [`Register`] - Frame-local variable slot (negative ids name call arguments)
//! - [`Label`] - Handle to a defined function body
//! - [`HandleAllocator`] - Monotonic register/label numbering shared by all backends
//! - [`Kind`] - The eight value kinds of the machine
//! - [`UsmError`] - Every failure a backend or the codec can report
//!
//! # Examples
//!
//! ```
//! use core_types::{HandleAllocator, Label, Register};
//!
//! let mut handles = HandleAllocator::new();
//! assert_eq!(handles.next_register(), Register(1));
//! assert_eq!(handles.next_label(), Label(1));
//! assert!(Register::argument(0).is_argument());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handle;
mod kind;

pub use error::{ErrorKind, UsmError, UsmResult};
pub use handle::{HandleAllocator, Label, Register};
pub use kind::Kind;
