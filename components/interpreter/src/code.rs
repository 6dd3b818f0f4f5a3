//! Instruction arena
//!
//! A program is a flat list of blocks, each an ordered list of statement
//! descriptors. Blocks refer to each other by [`BlockId`], so nested control
//! flow is data the dispatcher walks rather than host-level recursion.
//!
//! Calls never appear inside a stored expression. [`Program::emit`] hoists
//! each one into a [`Stmt::Call`] that leaves its result in a temporary
//! slot of the calling scope.

use core_types::{Kind, Label, Register};
use num_bigint::BigInt;

/// Index of a block in [`Program::blocks`]
pub type BlockId = usize;

/// A compiled program
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Every block, in creation order
    pub blocks: Vec<Vec<Stmt>>,
    /// Defined functions; `Label(n)` lives at index `n - 1`
    pub functions: Vec<Function>,
    /// Body of `Main`, once designated
    pub entry: Option<BlockId>,
    /// Temporary slots handed out so far
    pub temps: usize,
}

/// A `Define`d function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Number of arguments the function takes
    pub arity: usize,
    /// Function body
    pub body: BlockId,
}

impl Program {
    /// Append an empty block
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(Vec::new());
        self.blocks.len() - 1
    }

    /// Look up a function by label
    pub fn function(&self, label: Label) -> Option<&Function> {
        label.slot().and_then(|slot| self.functions.get(slot))
    }

    /// Statement at `pc` in `block`
    pub fn statement(&self, block: BlockId, pc: usize) -> Option<&Stmt> {
        self.blocks.get(block).and_then(|stmts| stmts.get(pc))
    }
}

/// A statement descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Bind `register` in the active scope
    Var(Register, Expr),
    /// Rebind an existing register
    Set(Register, Expr),
    /// Evaluate for side effects
    Discard(Expr),
    /// First truthy branch wins
    If {
        /// Primary condition
        condition: Expr,
        /// Primary branch
        body: BlockId,
        /// `else if` arms in order
        chain: Vec<(Expr, BlockId)>,
        /// `else` branch
        last: Option<BlockId>,
    },
    /// Conditional or infinite loop
    Loop {
        /// Checked before every iteration; `None` loops forever
        condition: Option<Expr>,
        /// Loop body
        body: BlockId,
    },
    /// Iterate an array
    Each {
        /// Array expression, evaluated once
        array: Expr,
        /// Register receiving the index
        index: Register,
        /// Register receiving the element
        value: Register,
        /// Loop body
        body: BlockId,
    },
    /// Leave the innermost loop
    Break,
    /// Leave the active call
    Return(Option<Expr>),
    /// Call, discarding the result
    JumpTo(Label, Vec<Expr>),
    /// Push onto the error channel
    Throw(Expr),
    /// Skip stream bytes
    Seek(Option<Expr>, Expr),
    /// Release hint
    Delete(Kind, Expr),
    /// Pointer write
    Change(Expr, Expr),
    /// Array element write
    Mutate(Expr, Expr, Expr),
    /// Table write
    Insert(Expr, Expr, Expr),
    /// Table removal
    Remove(Expr, Expr),
    /// String byte write
    Modify(Expr, Expr, Expr),
    /// Evaluate into a temporary slot
    Eval(usize, Expr),
    /// Call `label` and store its result, or nil, in temporary `slot`
    Call {
        /// Temporary receiving the result
        slot: usize,
        /// Callee
        label: Label,
        /// Call-free argument expressions
        arguments: Vec<Expr>,
    },
}

/// Binary arithmetic and logic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// Truncated `/`
    Div,
    /// Truncated `%`
    Mod,
    /// Exponentiation
    Pow,
    /// `<`
    Less,
    /// `>`
    More,
    /// Numeric `==`
    Same,
    /// Boolean and
    And,
    /// Boolean or
    Or,
}

impl BinaryOp {
    /// Operator name for diagnostics
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            BinaryOp::Mod => "Mod",
            BinaryOp::Pow => "Pow",
            BinaryOp::Less => "Less",
            BinaryOp::More => "More",
            BinaryOp::Same => "Same",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
        }
    }
}

/// A value expression, evaluated every time it is used
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Expr {
    Number(BigInt),
    String(Vec<u8>),
    Bit(bool),
    Get(Register),
    Bind(Label),
    Catch,
    Call(Label, Vec<Expr>),
    Fork(Label, Vec<Expr>),
    Pointer(Box<Expr>),
    Follow(Box<Expr>),
    Alloc(Box<Expr>),
    Array(Vec<Expr>),
    Count(Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Append(Box<Expr>, Box<Expr>),
    Table(Vec<(Expr, Expr)>),
    Lookup(Box<Expr>, Box<Expr>),
    Amount(Box<Expr>),
    Create(Box<Expr>),
    Concat(Box<Expr>, Box<Expr>),
    Equals(Box<Expr>, Box<Expr>),
    Length(Box<Expr>),
    Symbol(Box<Expr>, Box<Expr>),
    Open(Box<Expr>),
    Stat(Option<Box<Expr>>),
    Read(Option<Box<Expr>>, Box<Expr>),
    Send(Option<Box<Expr>>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// Temporary slot of the active scope
    Temp(usize),
}

impl Expr {
    /// Whether evaluating this expression performs a call
    pub fn has_call(&self) -> bool {
        match self {
            Expr::Call(..) => true,
            Expr::Fork(_, arguments) | Expr::Array(arguments) => {
                arguments.iter().any(Expr::has_call)
            }
            Expr::Table(entries) => entries
                .iter()
                .any(|(key, value)| key.has_call() || value.has_call()),
            Expr::Pointer(a)
            | Expr::Follow(a)
            | Expr::Alloc(a)
            | Expr::Count(a)
            | Expr::Amount(a)
            | Expr::Create(a)
            | Expr::Length(a)
            | Expr::Open(a)
            | Expr::Not(a) => a.has_call(),
            Expr::Index(a, b)
            | Expr::Append(a, b)
            | Expr::Lookup(a, b)
            | Expr::Concat(a, b)
            | Expr::Equals(a, b)
            | Expr::Symbol(a, b)
            | Expr::Binary(_, a, b) => a.has_call() || b.has_call(),
            Expr::Stat(stream) => stream.as_ref().is_some_and(|s| s.has_call()),
            Expr::Read(stream, b) | Expr::Send(stream, b) => {
                stream.as_ref().is_some_and(|s| s.has_call()) || b.has_call()
            }
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Bit(_)
            | Expr::Get(_)
            | Expr::Bind(_)
            | Expr::Catch
            | Expr::Temp(_) => false,
        }
    }

    /// Whether the value does not depend on when it is evaluated
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Expr::Number(_) | Expr::String(_) | Expr::Bit(_) | Expr::Bind(_)
        )
    }

    /// Direct operands, in evaluation order
    pub fn operands_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Call(_, arguments) | Expr::Fork(_, arguments) | Expr::Array(arguments) => {
                arguments.iter_mut().collect()
            }
            Expr::Table(entries) => entries
                .iter_mut()
                .flat_map(|(key, value)| [key, value])
                .collect(),
            Expr::Pointer(a)
            | Expr::Follow(a)
            | Expr::Alloc(a)
            | Expr::Count(a)
            | Expr::Amount(a)
            | Expr::Create(a)
            | Expr::Length(a)
            | Expr::Open(a)
            | Expr::Not(a) => vec![&mut **a],
            Expr::Index(a, b)
            | Expr::Append(a, b)
            | Expr::Lookup(a, b)
            | Expr::Concat(a, b)
            | Expr::Equals(a, b)
            | Expr::Symbol(a, b)
            | Expr::Binary(_, a, b) => vec![&mut **a, &mut **b],
            Expr::Stat(stream) => stream.iter_mut().map(|s| &mut **s).collect(),
            Expr::Read(stream, b) | Expr::Send(stream, b) => {
                let mut operands: Vec<&mut Expr> = stream.iter_mut().map(|s| &mut **s).collect();
                operands.push(&mut **b);
                operands
            }
            Expr::Number(_)
            | Expr::String(_)
            | Expr::Bit(_)
            | Expr::Get(_)
            | Expr::Bind(_)
            | Expr::Catch
            | Expr::Temp(_) => Vec::new(),
        }
    }
}
