//! The interpreter backend
//!
//! [`Interpreter`] implements [`Target`] by compiling every call into the
//! instruction arena. Values are [`Expr`] descriptors, statements are
//! appended to the block currently being materialized, and nothing runs
//! until [`Interpreter::run`].

use std::io::{Read, Write};
use std::sync::Arc;

use core_types::{HandleAllocator, Kind, Label, Register, UsmError, UsmResult};
use isa::{Block, EachBody, ElseIf, Target};
use num_bigint::BigInt;
use tracing::debug;

use crate::code::{BinaryOp, BlockId, Expr, Function, Program, Stmt};
use crate::config::RuntimeConfig;
use crate::dispatch::Dispatcher;
use crate::stream::StdIo;
use crate::value::Value;

/// Executes usm programs
///
/// # Example
///
/// ```
/// use interpreter::Interpreter;
/// use isa::Target;
///
/// let mut vm = Interpreter::new().with_output(Vec::new());
/// vm.main(&mut |t| {
///     let text = t.string(b"hi")?;
///     let sent = t.send(None, text)?;
///     t.discard(sent)
/// })
/// .unwrap();
/// vm.run().unwrap();
/// ```
#[derive(Debug)]
pub struct Interpreter {
    program: Arc<Program>,
    handles: HandleAllocator,
    /// Block receiving statements, `None` outside `Main` and `Define`
    current: Option<BlockId>,
    config: RuntimeConfig,
    io: StdIo,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter wired to the process's stdin and stdout
    pub fn new() -> Self {
        Self {
            program: Arc::new(Program::default()),
            handles: HandleAllocator::new(),
            current: None,
            config: RuntimeConfig::default(),
            io: StdIo::process(),
        }
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the nil stream from `input`
    pub fn with_input(mut self, input: impl Read + 'static) -> Self {
        self.io.input = Box::new(input);
        self
    }

    /// Write the nil stream to `output`
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.io.output = Box::new(output);
        self
    }

    /// The compiled program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Execute `Main`
    pub fn run(&mut self) -> UsmResult<()> {
        debug!(
            blocks = self.program.blocks.len(),
            functions = self.program.functions.len(),
            "run"
        );
        let mut dispatcher =
            Dispatcher::new(Arc::clone(&self.program), &mut self.io, self.config.clone());
        dispatcher.run_main()
    }

    /// Call a defined function from the host.
    ///
    /// Forks started during the call are left running detached, since the
    /// result may be a Stream the host still reads from.
    pub fn invoke(&mut self, label: Label, arguments: Vec<Value>) -> UsmResult<Option<Value>> {
        let mut dispatcher =
            Dispatcher::new(Arc::clone(&self.program), &mut self.io, self.config.clone());
        dispatcher.invoke(label, arguments)
    }

    fn program_mut(&mut self) -> &mut Program {
        Arc::make_mut(&mut self.program)
    }

    fn emit(&mut self, stmt: Stmt) -> UsmResult<()> {
        let block = self
            .current
            .ok_or_else(|| UsmError::contract("statement outside of main or define"))?;
        self.program_mut().emit(block, stmt);
        Ok(())
    }

    /// Materialize `body` into a fresh block
    fn compile(&mut self, body: Block<'_, Self>) -> UsmResult<BlockId> {
        let block = self.program_mut().new_block();
        let enclosing = self.current.replace(block);
        let result = body(self);
        self.current = enclosing;
        result.map(|()| block)
    }

    fn binary(op: BinaryOp, a: Expr, b: Expr) -> UsmResult<Expr> {
        Ok(Expr::Binary(op, Box::new(a), Box::new(b)))
    }
}

impl Target for Interpreter {
    type Value = Expr;

    fn main(&mut self, body: Block<'_, Self>) -> UsmResult<()> {
        if self.program.entry.is_some() {
            return Err(UsmError::contract("main is already defined"));
        }
        let entry = self.compile(body)?;
        self.program_mut().entry = Some(entry);
        Ok(())
    }

    fn define(&mut self, arguments: usize, body: Block<'_, Self>) -> UsmResult<Label> {
        let body = self.compile(body)?;
        let label = self.handles.next_label();
        self.program_mut().functions.push(Function {
            arity: arguments,
            body,
        });
        debug!(%label, arity = arguments, "defined");
        Ok(label)
    }

    fn return_(&mut self, result: Option<Expr>) -> UsmResult<()> {
        self.emit(Stmt::Return(result))
    }

    fn jump_to(&mut self, label: Label, arguments: Vec<Expr>) -> UsmResult<()> {
        self.emit(Stmt::JumpTo(label, arguments))
    }

    fn call(&mut self, label: Label, arguments: Vec<Expr>) -> UsmResult<Expr> {
        Ok(Expr::Call(label, arguments))
    }

    fn fork(&mut self, label: Label, arguments: Vec<Expr>) -> UsmResult<Expr> {
        if !self.config.fork_enabled {
            return Err(UsmError::Unsupported {
                backend: "interpreter",
                operation: "Fork",
            });
        }
        Ok(Expr::Fork(label, arguments))
    }

    fn bind(&mut self, label: Label) -> UsmResult<Expr> {
        Ok(Expr::Bind(label))
    }

    fn if_(
        &mut self,
        condition: Expr,
        body: Block<'_, Self>,
        chain: Vec<ElseIf<'_, Self>>,
        last: Option<Block<'_, Self>>,
    ) -> UsmResult<()> {
        let body = self.compile(body)?;
        let mut arms = Vec::with_capacity(chain.len());
        for ElseIf { condition, body } in chain {
            arms.push((condition, self.compile(body)?));
        }
        let last = match last {
            Some(last) => Some(self.compile(last)?),
            None => None,
        };
        self.emit(Stmt::If {
            condition,
            body,
            chain: arms,
            last,
        })
    }

    fn loop_(&mut self, condition: Option<Expr>, body: Block<'_, Self>) -> UsmResult<()> {
        let body = self.compile(body)?;
        self.emit(Stmt::Loop { condition, body })
    }

    fn each(&mut self, array: Expr, body: EachBody<'_, Self>) -> UsmResult<()> {
        let index = self.handles.next_register();
        let value = self.handles.next_register();
        let body = self.compile(&mut |t| body(t, Expr::Get(index), Expr::Get(value)))?;
        self.emit(Stmt::Each {
            array,
            index,
            value,
            body,
        })
    }

    fn break_(&mut self) -> UsmResult<()> {
        self.emit(Stmt::Break)
    }

    fn var(&mut self, value: Expr) -> UsmResult<Register> {
        let register = self.handles.next_register();
        self.emit(Stmt::Var(register, value))?;
        Ok(register)
    }

    fn set(&mut self, register: Register, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Set(register, value))
    }

    fn get(&mut self, register: Register) -> UsmResult<Expr> {
        Ok(Expr::Get(register))
    }

    fn discard(&mut self, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Discard(value))
    }

    fn throw(&mut self, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Throw(value))
    }

    fn catch(&mut self) -> UsmResult<Expr> {
        Ok(Expr::Catch)
    }

    fn delete(&mut self, kind: Kind, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Delete(kind, value))
    }

    fn pointer(&mut self, value: Expr) -> UsmResult<Expr> {
        Ok(Expr::Pointer(Box::new(value)))
    }

    fn follow(&mut self, pointer: Expr) -> UsmResult<Expr> {
        Ok(Expr::Follow(Box::new(pointer)))
    }

    fn change(&mut self, pointer: Expr, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Change(pointer, value))
    }

    fn alloc(&mut self, size: Expr) -> UsmResult<Expr> {
        Ok(Expr::Alloc(Box::new(size)))
    }

    fn array(&mut self, elements: Vec<Expr>) -> UsmResult<Expr> {
        Ok(Expr::Array(elements))
    }

    fn count(&mut self, array: Expr) -> UsmResult<Expr> {
        Ok(Expr::Count(Box::new(array)))
    }

    fn index(&mut self, array: Expr, index: Expr) -> UsmResult<Expr> {
        Ok(Expr::Index(Box::new(array), Box::new(index)))
    }

    fn append(&mut self, array: Expr, value: Expr) -> UsmResult<Expr> {
        Ok(Expr::Append(Box::new(array), Box::new(value)))
    }

    fn mutate(&mut self, array: Expr, index: Expr, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Mutate(array, index, value))
    }

    fn table(&mut self, entries: Vec<(Expr, Expr)>) -> UsmResult<Expr> {
        Ok(Expr::Table(entries))
    }

    fn insert(&mut self, table: Expr, key: Expr, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Insert(table, key, value))
    }

    fn remove(&mut self, table: Expr, key: Expr) -> UsmResult<()> {
        self.emit(Stmt::Remove(table, key))
    }

    fn lookup(&mut self, table: Expr, key: Expr) -> UsmResult<Expr> {
        Ok(Expr::Lookup(Box::new(table), Box::new(key)))
    }

    fn amount(&mut self, table: Expr) -> UsmResult<Expr> {
        Ok(Expr::Amount(Box::new(table)))
    }

    fn number(&mut self, value: BigInt) -> UsmResult<Expr> {
        Ok(Expr::Number(value))
    }

    fn string(&mut self, bytes: &[u8]) -> UsmResult<Expr> {
        Ok(Expr::String(bytes.to_vec()))
    }

    fn bit(&mut self, value: bool) -> UsmResult<Expr> {
        Ok(Expr::Bit(value))
    }

    fn create(&mut self, size: Expr) -> UsmResult<Expr> {
        Ok(Expr::Create(Box::new(size)))
    }

    fn concat(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Ok(Expr::Concat(Box::new(a), Box::new(b)))
    }

    fn equals(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Ok(Expr::Equals(Box::new(a), Box::new(b)))
    }

    fn length(&mut self, string: Expr) -> UsmResult<Expr> {
        Ok(Expr::Length(Box::new(string)))
    }

    fn symbol(&mut self, string: Expr, index: Expr) -> UsmResult<Expr> {
        Ok(Expr::Symbol(Box::new(string), Box::new(index)))
    }

    fn modify(&mut self, string: Expr, index: Expr, value: Expr) -> UsmResult<()> {
        self.emit(Stmt::Modify(string, index, value))
    }

    fn open(&mut self, uri: Expr) -> UsmResult<Expr> {
        Ok(Expr::Open(Box::new(uri)))
    }

    fn stat(&mut self, stream: Option<Expr>) -> UsmResult<Expr> {
        Ok(Expr::Stat(stream.map(Box::new)))
    }

    fn read(&mut self, stream: Option<Expr>, buffer: Expr) -> UsmResult<Expr> {
        Ok(Expr::Read(stream.map(Box::new), Box::new(buffer)))
    }

    fn send(&mut self, stream: Option<Expr>, data: Expr) -> UsmResult<Expr> {
        Ok(Expr::Send(stream.map(Box::new), Box::new(data)))
    }

    fn seek(&mut self, stream: Option<Expr>, amount: Expr) -> UsmResult<()> {
        self.emit(Stmt::Seek(stream, amount))
    }

    fn add(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Add, a, b)
    }

    fn sub(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Sub, a, b)
    }

    fn mul(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Mul, a, b)
    }

    fn div(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Div, a, b)
    }

    fn mod_(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Mod, a, b)
    }

    fn pow(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Pow, a, b)
    }

    fn less(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Less, a, b)
    }

    fn more(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::More, a, b)
    }

    fn same(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Same, a, b)
    }

    fn and(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::And, a, b)
    }

    fn or(&mut self, a: Expr, b: Expr) -> UsmResult<Expr> {
        Self::binary(BinaryOp::Or, a, b)
    }

    fn not(&mut self, a: Expr) -> UsmResult<Expr> {
        Ok(Expr::Not(Box::new(a)))
    }
}
