//! A backend that records the call sequence as an indented listing.
//!
//! Values are rendered as text, statements become lines. Two programs
//! authored through the same calls produce the same listing, which makes the
//! recorder the reference for round-trip checks of other backends.

use crate::target::{Block, EachBody, ElseIf, Target};
use core_types::{HandleAllocator, Kind, Label, Register, UsmResult};
use num_bigint::BigInt;

/// Records every statement it receives as a line of text
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recorder {
    /// One entry per statement or block delimiter
    lines: Vec<String>,
    /// Current block depth
    depth: usize,
    /// Register and label numbering
    handles: HandleAllocator,
}

impl Recorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded lines, each already indented
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The full listing, two spaces per block level
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn line(&mut self, text: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.depth), text));
    }

    fn nested(&mut self, body: Block<'_, Self>) -> UsmResult<()> {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn list(values: &[String]) -> String {
        values.join(", ")
    }

    fn stream(stream: &Option<String>) -> &str {
        stream.as_deref().unwrap_or("nil")
    }
}

impl Target for Recorder {
    type Value = String;

    fn main(&mut self, body: Block<'_, Self>) -> UsmResult<()> {
        self.line("main {".to_string());
        self.nested(body)?;
        self.line("}".to_string());
        Ok(())
    }

    fn define(&mut self, arguments: usize, body: Block<'_, Self>) -> UsmResult<Label> {
        let header = self.lines.len();
        self.line(String::new());
        self.nested(body)?;
        self.line("}".to_string());
        let label = self.handles.next_label();
        self.lines[header] = format!(
            "{}define {}({}) {{",
            "  ".repeat(self.depth),
            label,
            arguments
        );
        Ok(label)
    }

    fn return_(&mut self, result: Option<String>) -> UsmResult<()> {
        match result {
            Some(value) => self.line(format!("return {}", value)),
            None => self.line("return".to_string()),
        }
        Ok(())
    }

    fn jump_to(&mut self, label: Label, arguments: Vec<String>) -> UsmResult<()> {
        self.line(format!("jump {}({})", label, Self::list(&arguments)));
        Ok(())
    }

    fn call(&mut self, label: Label, arguments: Vec<String>) -> UsmResult<String> {
        Ok(format!("call {}({})", label, Self::list(&arguments)))
    }

    fn fork(&mut self, label: Label, arguments: Vec<String>) -> UsmResult<String> {
        Ok(format!("fork {}({})", label, Self::list(&arguments)))
    }

    fn bind(&mut self, label: Label) -> UsmResult<String> {
        Ok(format!("&{}", label))
    }

    fn if_(
        &mut self,
        condition: String,
        body: Block<'_, Self>,
        chain: Vec<ElseIf<'_, Self>>,
        last: Option<Block<'_, Self>>,
    ) -> UsmResult<()> {
        self.line(format!("if {} {{", condition));
        self.nested(body)?;
        for entry in chain {
            self.line(format!("}} else if {} {{", entry.condition));
            self.nested(entry.body)?;
        }
        if let Some(last) = last {
            self.line("} else {".to_string());
            self.nested(last)?;
        }
        self.line("}".to_string());
        Ok(())
    }

    fn loop_(&mut self, condition: Option<String>, body: Block<'_, Self>) -> UsmResult<()> {
        match condition {
            Some(condition) => self.line(format!("loop while {} {{", condition)),
            None => self.line("loop {".to_string()),
        }
        self.nested(body)?;
        self.line("}".to_string());
        Ok(())
    }

    fn each(&mut self, array: String, body: EachBody<'_, Self>) -> UsmResult<()> {
        let index = self.handles.next_register();
        let value = self.handles.next_register();
        self.line(format!("each {}, {} in {} {{", index, value, array));
        self.depth += 1;
        let result = body(self, index.to_string(), value.to_string());
        self.depth -= 1;
        result?;
        self.line("}".to_string());
        Ok(())
    }

    fn break_(&mut self) -> UsmResult<()> {
        self.line("break".to_string());
        Ok(())
    }

    fn var(&mut self, value: String) -> UsmResult<Register> {
        let register = self.handles.next_register();
        self.line(format!("var {} = {}", register, value));
        Ok(register)
    }

    fn set(&mut self, register: Register, value: String) -> UsmResult<()> {
        self.line(format!("set {} = {}", register, value));
        Ok(())
    }

    fn get(&mut self, register: Register) -> UsmResult<String> {
        Ok(register.to_string())
    }

    fn discard(&mut self, value: String) -> UsmResult<()> {
        self.line(format!("discard {}", value));
        Ok(())
    }

    fn throw(&mut self, value: String) -> UsmResult<()> {
        self.line(format!("throw {}", value));
        Ok(())
    }

    fn catch(&mut self) -> UsmResult<String> {
        Ok("catch()".to_string())
    }

    fn delete(&mut self, kind: Kind, value: String) -> UsmResult<()> {
        self.line(format!("delete {} {}", kind, value));
        Ok(())
    }

    fn pointer(&mut self, value: String) -> UsmResult<String> {
        Ok(format!("pointer({})", value))
    }

    fn follow(&mut self, pointer: String) -> UsmResult<String> {
        Ok(format!("follow({})", pointer))
    }

    fn change(&mut self, pointer: String, value: String) -> UsmResult<()> {
        self.line(format!("change {} = {}", pointer, value));
        Ok(())
    }

    fn alloc(&mut self, size: String) -> UsmResult<String> {
        Ok(format!("alloc({})", size))
    }

    fn array(&mut self, elements: Vec<String>) -> UsmResult<String> {
        Ok(format!("[{}]", Self::list(&elements)))
    }

    fn count(&mut self, array: String) -> UsmResult<String> {
        Ok(format!("count({})", array))
    }

    fn index(&mut self, array: String, index: String) -> UsmResult<String> {
        Ok(format!("{}[{}]", array, index))
    }

    fn append(&mut self, array: String, value: String) -> UsmResult<String> {
        Ok(format!("append({}, {})", array, value))
    }

    fn mutate(&mut self, array: String, index: String, value: String) -> UsmResult<()> {
        self.line(format!("mutate {}[{}] = {}", array, index, value));
        Ok(())
    }

    fn table(&mut self, entries: Vec<(String, String)>) -> UsmResult<String> {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect();
        Ok(format!("{{{}}}", Self::list(&entries)))
    }

    fn insert(&mut self, table: String, key: String, value: String) -> UsmResult<()> {
        self.line(format!("insert {}[{}] = {}", table, key, value));
        Ok(())
    }

    fn remove(&mut self, table: String, key: String) -> UsmResult<()> {
        self.line(format!("remove {}[{}]", table, key));
        Ok(())
    }

    fn lookup(&mut self, table: String, key: String) -> UsmResult<String> {
        Ok(format!("lookup({}, {})", table, key))
    }

    fn amount(&mut self, table: String) -> UsmResult<String> {
        Ok(format!("amount({})", table))
    }

    fn number(&mut self, value: BigInt) -> UsmResult<String> {
        Ok(value.to_string())
    }

    fn string(&mut self, bytes: &[u8]) -> UsmResult<String> {
        Ok(format!("\"{}\"", bytes.escape_ascii()))
    }

    fn bit(&mut self, value: bool) -> UsmResult<String> {
        Ok(value.to_string())
    }

    fn create(&mut self, size: String) -> UsmResult<String> {
        Ok(format!("create({})", size))
    }

    fn concat(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("concat({}, {})", a, b))
    }

    fn equals(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("equals({}, {})", a, b))
    }

    fn length(&mut self, string: String) -> UsmResult<String> {
        Ok(format!("length({})", string))
    }

    fn symbol(&mut self, string: String, index: String) -> UsmResult<String> {
        Ok(format!("symbol({}, {})", string, index))
    }

    fn modify(&mut self, string: String, index: String, value: String) -> UsmResult<()> {
        self.line(format!("modify {}[{}] = {}", string, index, value));
        Ok(())
    }

    fn open(&mut self, uri: String) -> UsmResult<String> {
        Ok(format!("open({})", uri))
    }

    fn stat(&mut self, stream: Option<String>) -> UsmResult<String> {
        Ok(format!("stat({})", Self::stream(&stream)))
    }

    fn read(&mut self, stream: Option<String>, buffer: String) -> UsmResult<String> {
        Ok(format!("read({}, {})", Self::stream(&stream), buffer))
    }

    fn send(&mut self, stream: Option<String>, data: String) -> UsmResult<String> {
        Ok(format!("send({}, {})", Self::stream(&stream), data))
    }

    fn seek(&mut self, stream: Option<String>, amount: String) -> UsmResult<()> {
        self.line(format!("seek {} by {}", Self::stream(&stream), amount));
        Ok(())
    }

    fn add(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} + {})", a, b))
    }

    fn sub(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} - {})", a, b))
    }

    fn mul(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} * {})", a, b))
    }

    fn div(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} / {})", a, b))
    }

    fn mod_(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} % {})", a, b))
    }

    fn pow(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} ** {})", a, b))
    }

    fn less(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} < {})", a, b))
    }

    fn more(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} > {})", a, b))
    }

    fn same(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} == {})", a, b))
    }

    fn and(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} && {})", a, b))
    }

    fn or(&mut self, a: String, b: String) -> UsmResult<String> {
        Ok(format!("({} || {})", a, b))
    }

    fn not(&mut self, a: String) -> UsmResult<String> {
        Ok(format!("!{}", a))
    }
}
