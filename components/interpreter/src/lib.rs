//! Runtime interpreter for usm programs
//!
//! This crate provides the only backend that actually executes a program:
//! - [`Interpreter`] implements [`isa::Target`] by compiling every call into
//!   an instruction arena ([`code`])
//! - [`Dispatcher`] runs that arena over an explicit stack of call scopes
//! - `Fork` runs a function on its own thread, connected to the parent
//!   through a [`stream::Stream`]
//!
//! # Example
//!
//! ```
//! use interpreter::Interpreter;
//! use isa::Target;
//! use num_bigint::BigInt;
//!
//! let mut vm = Interpreter::new();
//! let square = vm
//!     .define(1, &mut |t| {
//!         let x = t.get(core_types::Register::argument(0))?;
//!         let y = t.mul(x.clone(), x)?;
//!         t.return_(Some(y))
//!     })
//!     .unwrap();
//!
//! let result = vm
//!     .invoke(square, vec![interpreter::Value::number(12)])
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(result.as_number(), Some(&BigInt::from(144)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod code;
pub mod config;
pub mod dispatch;
pub mod fork;
mod lower;
pub mod ops;
pub mod stream;
pub mod value;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::{BlockFrame, FrameKind, Scope};
pub use code::{BinaryOp, BlockId, Expr, Function, Program, Stmt};
pub use config::RuntimeConfig;
pub use dispatch::Dispatcher;
pub use stream::{StdIo, Stream};
pub use value::{Portable, Value};
pub use vm::Interpreter;
