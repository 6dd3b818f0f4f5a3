//! Unit tests for bytecode_system

mod test_decoder;
mod test_encoder;
