//! The usm instruction set contract
//!
//! This crate declares the operations every backend implements:
//! - [`Target`] - the abstract machine interface
//! - [`Block`], [`EachBody`], [`ElseIf`] - deferred bodies handed to a target
//! - [`Recorder`] - a backend that renders the call sequence as a listing
//!
//! # Example
//!
//! ```
//! use isa::{Recorder, Target};
//!
//! let mut t = Recorder::new();
//! t.main(&mut |t| {
//!     let text = t.string(b"Hello World\n")?;
//!     let sent = t.send(None, text)?;
//!     t.discard(sent)
//! })
//! .unwrap();
//!
//! assert_eq!(t.listing(), "main {\n  discard send(nil, \"Hello World\\n\")\n}\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod recorder;
pub mod target;

pub use recorder::Recorder;
pub use target::{Block, EachBody, ElseIf, Target};
