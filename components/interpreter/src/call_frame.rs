//! Call scopes and block frames

use std::collections::HashMap;

use core_types::{Label, Register, UsmError, UsmResult};

use crate::code::BlockId;
use crate::value::{Shared, Value};

/// Why a block is on the frame stack and what happens when it runs out
#[derive(Debug, Clone)]
pub enum FrameKind {
    /// Function or `Main` body
    Body,
    /// Branch of an `If`
    Branch,
    /// Body of a `Loop`; `site` locates the `Loop` statement so its
    /// condition can be evaluated again
    Loop {
        /// Block and position of the `Loop` statement
        site: (BlockId, usize),
    },
    /// Body of an `Each`
    Each {
        /// The array being visited, read live
        items: Shared<Vec<Value>>,
        /// Index of the next element to bind
        next: usize,
        /// Register receiving the index
        index: Register,
        /// Register receiving the element
        value: Register,
    },
}

impl FrameKind {
    /// Whether `Break` stops at this frame
    pub fn is_loop(&self) -> bool {
        matches!(self, FrameKind::Loop { .. } | FrameKind::Each { .. })
    }
}

/// A block being executed
#[derive(Debug, Clone)]
pub struct BlockFrame {
    /// Block being executed
    pub block: BlockId,
    /// Next statement to execute
    pub pc: usize,
    /// Frame kind
    pub kind: FrameKind,
}

impl BlockFrame {
    /// Start `block` at its first statement
    pub fn new(block: BlockId, kind: FrameKind) -> Self {
        Self { block, pc: 0, kind }
    }
}

/// Storage of one active call
#[derive(Debug)]
pub struct Scope {
    /// Callee, `None` for `Main`
    pub label: Option<Label>,
    /// Locals bound by `Var` and `Each`
    pub registers: HashMap<Register, Value>,
    /// Call arguments, read through negative registers
    pub arguments: Vec<Value>,
    /// Blocks in progress, innermost last
    pub frames: Vec<BlockFrame>,
    /// Results of hoisted calls and saved operands
    pub temps: HashMap<usize, Value>,
    /// Temporary of the caller receiving this call's result
    pub return_to: Option<usize>,
    /// Value passed to `Return`
    pub result: Option<Value>,
}

impl Scope {
    /// A scope about to run `body`
    pub fn new(label: Option<Label>, body: BlockId, arguments: Vec<Value>) -> Self {
        Self {
            label,
            registers: HashMap::new(),
            arguments,
            frames: vec![BlockFrame::new(body, FrameKind::Body)],
            temps: HashMap::new(),
            return_to: None,
            result: None,
        }
    }

    /// Read a temporary written earlier in this call
    pub fn temp(&self, slot: usize) -> UsmResult<Value> {
        self.temps
            .get(&slot)
            .cloned()
            .ok_or_else(|| UsmError::contract(format!("temporary {} read before it was written", slot)))
    }

    /// Read a local or an argument
    pub fn get(&self, register: Register) -> UsmResult<Value> {
        let value = match register.argument_index() {
            Some(i) => self.arguments.get(i),
            None => self.registers.get(&register),
        };
        value.cloned().ok_or(UsmError::UnboundRegister(register))
    }

    /// Bind a local
    pub fn bind(&mut self, register: Register, value: Value) {
        self.registers.insert(register, value);
    }

    /// Rebind an existing local or argument
    pub fn set(&mut self, register: Register, value: Value) -> UsmResult<()> {
        let slot = match register.argument_index() {
            Some(i) => self.arguments.get_mut(i),
            None => self.registers.get_mut(&register),
        };
        match slot {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(UsmError::UnboundRegister(register)),
        }
    }

    /// Unwind to just outside the innermost loop
    pub fn break_loop(&mut self) -> UsmResult<()> {
        while let Some(frame) = self.frames.pop() {
            if frame.kind.is_loop() {
                return Ok(());
            }
            if matches!(frame.kind, FrameKind::Body) {
                break;
            }
        }
        Err(UsmError::contract("break outside of a loop"))
    }

    /// Stop executing this call
    pub fn finish(&mut self, result: Option<Value>) {
        self.result = result;
        self.frames.clear();
    }
}
