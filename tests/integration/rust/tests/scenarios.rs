//! End-to-end scenarios: programs encoded to bytecode, decoded into the
//! interpreter and run.

use bytecode_system::Encoder;
use integration_tests::{
    encode, hello, jump_to_define, loop_once, replayed_listing, run_bytes, Program,
};

#[test]
fn test_hello_world() {
    let bytes = encode(hello).unwrap();
    let out = run_bytes(&bytes).unwrap();
    assert_eq!(out, b"Hello World\n");
    assert_eq!(out.len(), 12);
}

#[test]
fn test_define_runs_on_jump() {
    let bytes = encode(jump_to_define).unwrap();
    assert_eq!(run_bytes(&bytes).unwrap(), b"Hi\n");

    let listing = replayed_listing(&bytes).unwrap();
    assert!(listing.contains("define L1(0)"), "{}", listing);
    assert!(listing.contains("jump L1()"), "{}", listing);
}

#[test]
fn test_loop_with_break_runs_once() {
    let bytes = encode(loop_once).unwrap();
    assert_eq!(run_bytes(&bytes).unwrap(), b"x");
}

#[test]
fn test_truncated_program_fails_to_decode() {
    let programs: [Program<Encoder>; 3] = [hello, jump_to_define, loop_once];
    for program in programs {
        let bytes = encode(program).unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        let err = run_bytes(truncated).unwrap_err();
        assert!(err.is_decode(), "{}", err);
        assert!(replayed_listing(truncated).is_err());
    }
}
