//! Bytecode system for the usm machine
//!
//! This crate defines the binary wire format of usm programs and provides
//! two pieces that sit on either side of it:
//!
//! - [`Encoder`], a [`isa::Target`] that serializes every call it receives
//! - [`Decoder`], which replays a byte stream against any other target
//!
//! Encoding a program and decoding it into a second target produces the same
//! sequence of target calls, with the same register and label numbering, as
//! authoring the program against that target directly.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{decode, Encoder};
//! use isa::{Recorder, Target};
//!
//! let mut encoder = Encoder::new();
//! encoder
//!     .main(&mut |t| {
//!         let text = t.string(b"Hello World\n")?;
//!         let sent = t.send(None, text)?;
//!         t.discard(sent)
//!     })
//!     .unwrap();
//! let bytes = encoder.into_bytes();
//!
//! let mut recorder = Recorder::new();
//! decode(&bytes, &mut recorder).unwrap();
//! assert_eq!(recorder.lines()[1], "  discard send(nil, \"Hello World\\n\")");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod opcode;
pub mod wire;

pub use decoder::{decode, Decoder};
pub use encoder::Encoder;
pub use opcode::Opcode;
