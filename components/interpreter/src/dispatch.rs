//! Dispatch loop
//!
//! Executes a [`Program`] over an explicit stack of call [`Scope`]s, each
//! holding a stack of [`BlockFrame`]s. Control flow and calls only push and
//! pop frames and scopes, so call depth is bounded by
//! [`RuntimeConfig::max_call_depth`] rather than by the host stack.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use core_types::{Kind, Label, UsmError, UsmResult};
use tracing::{debug, trace, warn};

use crate::call_frame::{BlockFrame, FrameKind, Scope};
use crate::code::{BlockId, Expr, Function, Program, Stmt};
use crate::config::RuntimeConfig;
use crate::fork;
use crate::ops::{self, expect_number, to_index, to_size};
use crate::stream::{StdIo, Stream};
use crate::value::{mismatch, Portable, Shared, Value};

/// Executes one runtime instance
pub struct Dispatcher<'io> {
    /// Shared, immutable program
    program: Arc<Program>,
    /// Active calls, innermost last
    scopes: Vec<Scope>,
    /// Error channel used by `Throw`, `Catch` and failed I/O
    errors: Vec<Value>,
    /// Standard streams of this instance
    io: &'io mut StdIo,
    /// Forked executions started by this instance
    children: Vec<JoinHandle<()>>,
    config: RuntimeConfig,
}

impl<'io> Dispatcher<'io> {
    /// Create a dispatcher with empty scope and error stacks
    pub fn new(program: Arc<Program>, io: &'io mut StdIo, config: RuntimeConfig) -> Self {
        Self {
            program,
            scopes: Vec::with_capacity(16),
            errors: Vec::new(),
            io,
            children: Vec::new(),
            config,
        }
    }

    /// Run the program's `Main` to completion, then wait for every forked
    /// execution it started
    pub fn run_main(&mut self) -> UsmResult<()> {
        let entry = self
            .program
            .entry
            .ok_or_else(|| UsmError::contract("program has no main"))?;
        debug!(entry, "running main");
        self.scopes.push(Scope::new(None, entry, Vec::new()));
        self.run_until(0)?;
        if !self.errors.is_empty() {
            debug!(pending = self.errors.len(), "main finished with uncaught errors");
        }
        self.join_forks();
        Ok(())
    }

    /// Wait for every forked execution started so far.
    ///
    /// Streams still held on the error channel are dropped first so that
    /// children blocked reading their input see end of stream.
    pub fn join_forks(&mut self) {
        self.errors.clear();
        for child in self.children.drain(..) {
            let name = child.thread().name().map(str::to_string);
            if child.join().is_err() {
                warn!(thread = ?name, "forked execution panicked");
            }
        }
    }

    /// Call `label` with `arguments` and return its result
    pub fn invoke(&mut self, label: Label, arguments: Vec<Value>) -> UsmResult<Option<Value>> {
        let base = self.scopes.len();
        self.enter(label, arguments, None)?;
        self.run_until(base)
    }

    /// Values thrown and not yet caught, oldest first
    pub fn pending_errors(&self) -> &[Value] {
        &self.errors
    }

    /// Number of active calls
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn scope(&self) -> UsmResult<&Scope> {
        self.scopes
            .last()
            .ok_or_else(|| UsmError::contract("no active scope"))
    }

    fn scope_mut(&mut self) -> UsmResult<&mut Scope> {
        self.scopes
            .last_mut()
            .ok_or_else(|| UsmError::contract("no active scope"))
    }

    fn push_frame(&mut self, block: BlockId, kind: FrameKind) -> UsmResult<()> {
        self.scope_mut()?.frames.push(BlockFrame::new(block, kind));
        Ok(())
    }

    /// Run until the scope stack is back to `base` entries, returning the
    /// result of the last scope popped.
    fn run_until(&mut self, base: usize) -> UsmResult<Option<Value>> {
        let program = Arc::clone(&self.program);
        loop {
            let position = self.scope_mut()?.frames.last_mut().map(|frame| {
                let at = (frame.block, frame.pc);
                frame.pc += 1;
                at
            });
            match position {
                Some((block, pc)) => match program.statement(block, pc) {
                    Some(stmt) => {
                        trace!(block, pc, "dispatch");
                        self.execute(stmt, (block, pc))?;
                    }
                    None => self.end_of_block(&program)?,
                },
                None => {
                    let scope = self
                        .scopes
                        .pop()
                        .ok_or_else(|| UsmError::contract("no active scope"))?;
                    if let Some(label) = scope.label {
                        trace!(%label, "return");
                    }
                    if self.scopes.len() <= base {
                        return Ok(scope.result);
                    }
                    if let Some(slot) = scope.return_to {
                        let result = scope.result.unwrap_or(Value::Nil);
                        self.scope_mut()?.temps.insert(slot, result);
                    }
                }
            }
        }
    }

    fn end_of_block(&mut self, program: &Program) -> UsmResult<()> {
        let kind = match self.scope()?.frames.last() {
            Some(frame) => frame.kind.clone(),
            None => return Ok(()),
        };
        match kind {
            FrameKind::Body | FrameKind::Branch => {
                self.scope_mut()?.frames.pop();
            }
            FrameKind::Loop { site } => {
                let again = match program.statement(site.0, site.1) {
                    Some(Stmt::Loop {
                        condition: Some(condition),
                        ..
                    }) => self.eval(condition)?.truthy("Loop")?,
                    Some(Stmt::Loop {
                        condition: None, ..
                    }) => true,
                    _ => return Err(UsmError::contract("loop frame has no loop statement")),
                };
                let scope = self.scope_mut()?;
                if again {
                    if let Some(frame) = scope.frames.last_mut() {
                        frame.pc = 0;
                    }
                } else {
                    scope.frames.pop();
                }
            }
            FrameKind::Each { .. } => self.advance_each()?,
        }
        Ok(())
    }

    /// Bind the next element of the innermost `Each`, or leave it
    fn advance_each(&mut self) -> UsmResult<()> {
        let scope = self.scope_mut()?;
        let step = {
            let Some(frame) = scope.frames.last_mut() else {
                return Ok(());
            };
            match &mut frame.kind {
                FrameKind::Each {
                    items,
                    next,
                    index,
                    value,
                } => {
                    let element = items.borrow().get(*next).cloned();
                    let step = element.map(|element| (*next, *index, *value, element));
                    *next += 1;
                    frame.pc = 0;
                    step
                }
                _ => return Ok(()),
            }
        };
        match step {
            Some((i, index, value, element)) => {
                scope.bind(index, Value::number(i));
                scope.bind(value, element);
            }
            None => {
                scope.frames.pop();
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, site: (BlockId, usize)) -> UsmResult<()> {
        match stmt {
            Stmt::Var(register, value) => {
                let value = self.eval(value)?;
                self.scope_mut()?.bind(*register, value);
            }
            Stmt::Set(register, value) => {
                let value = self.eval(value)?;
                self.scope_mut()?.set(*register, value)?;
            }
            Stmt::Discard(value) => {
                self.eval(value)?;
            }
            Stmt::If {
                condition,
                body,
                chain,
                last,
            } => {
                let mut branch = None;
                if self.eval(condition)?.truthy("If")? {
                    branch = Some(*body);
                } else {
                    for (condition, body) in chain {
                        if self.eval(condition)?.truthy("If")? {
                            branch = Some(*body);
                            break;
                        }
                    }
                }
                if let Some(block) = branch.or(*last) {
                    self.push_frame(block, FrameKind::Branch)?;
                }
            }
            Stmt::Loop { condition, body } => {
                let enter = match condition {
                    Some(condition) => self.eval(condition)?.truthy("Loop")?,
                    None => true,
                };
                if enter {
                    self.push_frame(*body, FrameKind::Loop { site })?;
                }
            }
            Stmt::Each {
                array,
                index,
                value,
                body,
            } => {
                let items = self.eval_array("Each", array)?;
                self.push_frame(
                    *body,
                    FrameKind::Each {
                        items,
                        next: 0,
                        index: *index,
                        value: *value,
                    },
                )?;
                self.advance_each()?;
            }
            Stmt::Break => self.scope_mut()?.break_loop()?,
            Stmt::Return(result) => {
                let result = match result {
                    Some(result) => Some(self.eval(result)?),
                    None => None,
                };
                self.scope_mut()?.finish(result);
            }
            Stmt::JumpTo(label, arguments) => {
                let arguments = self.eval_all(arguments)?;
                self.enter(*label, arguments, None)?;
            }
            Stmt::Call {
                slot,
                label,
                arguments,
            } => {
                let arguments = self.eval_all(arguments)?;
                self.enter(*label, arguments, Some(*slot))?;
            }
            Stmt::Eval(slot, value) => {
                let value = self.eval(value)?;
                self.scope_mut()?.temps.insert(*slot, value);
            }
            Stmt::Throw(value) => {
                let value = self.eval(value)?;
                self.errors.push(value);
            }
            Stmt::Seek(stream, amount) => self.seek(stream.as_ref(), amount)?,
            Stmt::Delete(kind, value) => {
                let value = self.eval(value)?;
                trace!(%kind, found = value.kind_name(), "delete");
            }
            Stmt::Change(pointer, value) => {
                let pointer = self.eval(pointer)?;
                let value = self.eval(value)?;
                match pointer {
                    Value::Pointer(cell) => *cell.borrow_mut() = value,
                    other => return Err(mismatch("Change", Kind::Pointer, &other)),
                }
            }
            Stmt::Mutate(array, index, value) => {
                let items = self.eval_array("Mutate", array)?;
                let index = self.eval(index)?;
                let value = self.eval(value)?;
                let index = expect_number("Mutate", &index)?;
                let mut items = items.borrow_mut();
                let i = to_index("Mutate", index, items.len())?;
                items[i] = value;
            }
            Stmt::Insert(table, key, value) => {
                let table = self.eval_table("Insert", table)?;
                let key = self.eval_key("Insert", key)?;
                let value = self.eval(value)?;
                table.borrow_mut().insert(key, value);
            }
            Stmt::Remove(table, key) => {
                let table = self.eval_table("Remove", table)?;
                let key = self.eval_key("Remove", key)?;
                table.borrow_mut().remove(&key);
            }
            Stmt::Modify(string, index, value) => {
                let string = self.eval_string("Modify", string)?;
                let index = self.eval(index)?;
                let value = self.eval(value)?;
                let index = expect_number("Modify", &index)?;
                let byte = ops::low_byte(expect_number("Modify", &value)?);
                let mut bytes = string.borrow_mut();
                let i = to_index("Modify", index, bytes.len())?;
                bytes[i] = byte;
            }
        }
        Ok(())
    }

    fn resolve(&self, label: Label, arguments: &mut Vec<Value>) -> UsmResult<(Label, Function)> {
        let label = if label.is_indirect() {
            if arguments.is_empty() {
                return Err(UsmError::contract(
                    "indirect call without a function argument",
                ));
            }
            match arguments.remove(0) {
                Value::Function(target) if !target.is_indirect() => target,
                other => return Err(mismatch("Call", Kind::Function, &other)),
            }
        } else {
            label
        };
        let function = self
            .program
            .function(label)
            .cloned()
            .ok_or(UsmError::UndefinedLabel(label))?;
        if function.arity != arguments.len() {
            return Err(UsmError::ArityMismatch {
                label,
                expected: function.arity,
                found: arguments.len(),
            });
        }
        Ok((label, function))
    }

    /// Push a scope for `label`; the dispatch loop runs it and stores the
    /// result in the caller's temporary `return_to`, if any
    fn enter(
        &mut self,
        label: Label,
        mut arguments: Vec<Value>,
        return_to: Option<usize>,
    ) -> UsmResult<()> {
        let (label, function) = self.resolve(label, &mut arguments)?;
        if self.scopes.len() >= self.config.max_call_depth {
            return Err(UsmError::CallDepthExceeded(self.config.max_call_depth));
        }
        debug!(%label, arguments = arguments.len(), depth = self.scopes.len(), "call");
        let mut scope = Scope::new(Some(label), function.body, arguments);
        scope.return_to = return_to;
        self.scopes.push(scope);
        Ok(())
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> UsmResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_array(&mut self, operation: &'static str, expr: &Expr) -> UsmResult<Shared<Vec<Value>>> {
        match self.eval(expr)? {
            Value::Array(items) => Ok(items),
            other => Err(mismatch(operation, Kind::Array, &other)),
        }
    }

    fn eval_table(
        &mut self,
        operation: &'static str,
        expr: &Expr,
    ) -> UsmResult<Shared<HashMap<Vec<u8>, Value>>> {
        match self.eval(expr)? {
            Value::Table(table) => Ok(table),
            other => Err(mismatch(operation, Kind::Table, &other)),
        }
    }

    fn eval_string(&mut self, operation: &'static str, expr: &Expr) -> UsmResult<Shared<Vec<u8>>> {
        match self.eval(expr)? {
            Value::String(bytes) => Ok(bytes),
            other => Err(mismatch(operation, Kind::String, &other)),
        }
    }

    fn eval_key(&mut self, operation: &'static str, expr: &Expr) -> UsmResult<Vec<u8>> {
        match self.eval(expr)? {
            Value::String(bytes) => Ok(bytes.borrow().clone()),
            other => Err(UsmError::contract(format!(
                "{}: table keys must be strings, found {}",
                operation,
                other.kind_name()
            ))),
        }
    }

    fn eval_size(&mut self, operation: &'static str, expr: &Expr) -> UsmResult<usize> {
        let size = self.eval(expr)?;
        to_size(operation, expect_number(operation, &size)?)
    }

    fn eval_stream(
        &mut self,
        operation: &'static str,
        stream: Option<&Expr>,
    ) -> UsmResult<Option<Shared<Stream>>> {
        match stream {
            None => Ok(None),
            Some(expr) => match self.eval(expr)? {
                Value::Stream(stream) => Ok(Some(stream)),
                Value::Nil => Ok(None),
                other => Err(mismatch(operation, Kind::Stream, &other)),
            },
        }
    }

    /// Evaluate an expression
    pub fn eval(&mut self, expr: &Expr) -> UsmResult<Value> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(n.clone()),
            Expr::String(bytes) => Value::string(bytes.clone()),
            Expr::Bit(b) => Value::Bit(*b),
            Expr::Get(register) => self.scope()?.get(*register)?,
            Expr::Bind(label) => Value::Function(*label),
            Expr::Catch => self.errors.pop().unwrap_or(Value::Nil),
            Expr::Call(label, _) => {
                return Err(UsmError::contract(format!(
                    "call to {} was not hoisted out of its expression",
                    label
                )))
            }
            Expr::Temp(slot) => self.scope()?.temp(*slot)?,
            Expr::Fork(label, arguments) => {
                let arguments = self.eval_all(arguments)?;
                self.fork(*label, arguments)?
            }
            Expr::Pointer(value) => Value::pointer(self.eval(value)?),
            Expr::Follow(pointer) => match self.eval(pointer)? {
                Value::Pointer(cell) => cell.borrow().clone(),
                other => return Err(mismatch("Follow", Kind::Pointer, &other)),
            },
            Expr::Alloc(size) => {
                let size = self.eval_size("Alloc", size)?;
                Value::array(ops::filled("Alloc", size, Value::number(0))?)
            }
            Expr::Array(elements) => Value::array(self.eval_all(elements)?),
            Expr::Count(array) => {
                let items = self.eval_array("Count", array)?;
                let count = items.borrow().len();
                Value::number(count)
            }
            Expr::Index(array, index) => {
                let items = self.eval_array("Index", array)?;
                let index = self.eval(index)?;
                let index = expect_number("Index", &index)?;
                let items = items.borrow();
                items[to_index("Index", index, items.len())?].clone()
            }
            Expr::Append(array, value) => {
                let items = self.eval_array("Append", array)?;
                let value = self.eval(value)?;
                items.borrow_mut().push(value);
                Value::Array(items)
            }
            Expr::Table(entries) => {
                let mut table = HashMap::new();
                for (key, value) in entries {
                    let key = self.eval_key("Table", key)?;
                    let value = self.eval(value)?;
                    table.insert(key, value);
                }
                Value::table(table)
            }
            Expr::Lookup(table, key) => {
                let table = self.eval_table("Lookup", table)?;
                let key = self.eval_key("Lookup", key)?;
                let found = table.borrow().get(&key).cloned();
                found.unwrap_or(Value::Nil)
            }
            Expr::Amount(table) => {
                let table = self.eval_table("Amount", table)?;
                let amount = table.borrow().len();
                Value::number(amount)
            }
            Expr::Create(size) => {
                let size = self.eval_size("Create", size)?;
                Value::string(ops::filled("Create", size, 0u8)?)
            }
            Expr::Concat(a, b) => {
                let a = self.eval_string("Concat", a)?;
                let b = self.eval_string("Concat", b)?;
                let mut joined = a.borrow().clone();
                joined.extend_from_slice(&b.borrow());
                Value::string(joined)
            }
            Expr::Equals(a, b) => {
                let a = self.eval_string("Equals", a)?;
                let b = self.eval_string("Equals", b)?;
                let same = *a.borrow() == *b.borrow();
                Value::Bit(same)
            }
            Expr::Length(string) => {
                let bytes = self.eval_string("Length", string)?;
                let length = bytes.borrow().len();
                Value::number(length)
            }
            Expr::Symbol(string, index) => {
                let bytes = self.eval_string("Symbol", string)?;
                let index = self.eval(index)?;
                let index = expect_number("Symbol", &index)?;
                let bytes = bytes.borrow();
                Value::number(bytes[to_index("Symbol", index, bytes.len())?])
            }
            Expr::Open(uri) => self.open(uri)?,
            Expr::Stat(stream) => self.stat(stream.as_deref())?,
            Expr::Read(stream, buffer) => self.read(stream.as_deref(), buffer)?,
            Expr::Send(stream, data) => self.send(stream.as_deref(), data)?,
            Expr::Binary(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                ops::binary(*op, &a, &b)?
            }
            Expr::Not(a) => ops::not(&self.eval(a)?)?,
        })
    }

    fn fork(&mut self, label: Label, mut arguments: Vec<Value>) -> UsmResult<Value> {
        if !self.config.fork_enabled {
            return Err(UsmError::Unsupported {
                backend: "interpreter",
                operation: "Fork",
            });
        }
        let (label, _) = self.resolve(label, &mut arguments)?;
        let arguments = arguments
            .iter()
            .map(Portable::capture)
            .collect::<UsmResult<Vec<_>>>()?;
        debug!(%label, arguments = arguments.len(), "fork");
        let (stream, child) = fork::spawn(
            Arc::clone(&self.program),
            self.config.clone(),
            label,
            arguments,
        )?;
        self.children.push(child);
        Ok(Value::stream(Stream::Fork(stream)))
    }

    /// Record an ISA-level I/O failure on the error channel
    fn fail(&mut self, operation: &'static str, message: String) {
        warn!(operation, %message, "stream operation failed");
        self.errors.push(Value::string(message));
    }

    fn with_reader<T>(
        &mut self,
        stream: Option<&Shared<Stream>>,
        f: impl FnOnce(&mut dyn Read) -> io::Result<T>,
    ) -> io::Result<T> {
        let Some(stream) = stream else {
            return f(&mut *self.io.input);
        };
        let mut stream = stream.borrow_mut();
        match &mut *stream {
            Stream::Stdio => f(&mut *self.io.input),
            Stream::File(file) => f(file),
            Stream::Fork(child) => f(&mut child.reader),
        }
    }

    fn with_writer<T>(
        &mut self,
        stream: Option<&Shared<Stream>>,
        f: impl FnOnce(&mut dyn Write) -> io::Result<T>,
    ) -> io::Result<T> {
        let Some(stream) = stream else {
            return f(&mut *self.io.output);
        };
        let mut stream = stream.borrow_mut();
        match &mut *stream {
            Stream::Stdio => f(&mut *self.io.output),
            Stream::File(file) => f(file),
            Stream::Fork(child) => f(&mut child.writer),
        }
    }

    fn open(&mut self, uri: &Expr) -> UsmResult<Value> {
        let uri = self.eval_string("Open", uri)?;
        let uri = String::from_utf8_lossy(&uri.borrow()).into_owned();
        match Stream::open(&uri) {
            Ok(stream) => {
                debug!(%uri, kind = stream.describe(), "opened stream");
                Ok(Value::stream(stream))
            }
            Err(err) => {
                self.fail("Open", format!("{}: {}", uri, err));
                Ok(Value::Nil)
            }
        }
    }

    fn stat(&mut self, stream: Option<&Expr>) -> UsmResult<Value> {
        let Some(stream) = self.eval_stream("Stat", stream)? else {
            return Ok(Value::string("stdio"));
        };
        let status = match &*stream.borrow() {
            Stream::File(file) => file.metadata().map(|meta| meta.len().to_string()),
            other => Ok(other.describe().to_string()),
        };
        match status {
            Ok(status) => Ok(Value::string(status)),
            Err(err) => {
                self.fail("Stat", err.to_string());
                Ok(Value::string(""))
            }
        }
    }

    fn read(&mut self, stream: Option<&Expr>, buffer: &Expr) -> UsmResult<Value> {
        let stream = self.eval_stream("Read", stream)?;
        let buffer = self.eval_string("Read", buffer)?;
        let mut bytes = buffer.borrow_mut();
        let result = self.with_reader(stream.as_ref(), |reader| reader.read(&mut bytes[..]));
        let wanted = bytes.len();
        drop(bytes);
        match result {
            Ok(0) if wanted > 0 => {
                self.fail("Read", "end of stream".to_string());
                Ok(Value::number(0))
            }
            Ok(n) => Ok(Value::number(n)),
            Err(err) => {
                self.fail("Read", err.to_string());
                Ok(Value::number(0))
            }
        }
    }

    fn send(&mut self, stream: Option<&Expr>, data: &Expr) -> UsmResult<Value> {
        let stream = self.eval_stream("Send", stream)?;
        let data = self.eval_string("Send", data)?;
        let bytes = data.borrow().clone();
        let result = self.with_writer(stream.as_ref(), |writer| {
            writer.write_all(&bytes)?;
            writer.flush()?;
            Ok(bytes.len())
        });
        match result {
            Ok(n) => Ok(Value::number(n)),
            Err(err) => {
                self.fail("Send", err.to_string());
                Ok(Value::number(0))
            }
        }
    }

    fn seek(&mut self, stream: Option<&Expr>, amount: &Expr) -> UsmResult<()> {
        let stream = self.eval_stream("Seek", stream)?;
        let amount = self.eval_size("Seek", amount)? as u64;
        let result = self.with_reader(stream.as_ref(), |reader| {
            io::copy(&mut Read::take(reader, amount), &mut io::sink())
        });
        match result {
            Ok(skipped) if skipped < amount => self.fail("Seek", "end of stream".to_string()),
            Ok(_) => {}
            Err(err) => self.fail("Seek", err.to_string()),
        }
        Ok(())
    }
}
