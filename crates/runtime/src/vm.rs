//! The stack-based bytecode virtual machine: a flat value stack, a stack
//! of call frames (one per in-flight function call), a globals table, and
//! the interner/heap the compiler filled in while producing the function
//! being run.

use std::io::{self, Write};
use std::rc::Rc;

use lox_core::{Heap, Interner, Obj, ObjFunction, OpCode, Table, Value};
use tracing::trace;

use crate::native;

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * 256;

/// The outcome of running a program, handed back across the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

struct CallFrame {
    function: Rc<ObjFunction>,
    ip: usize,
    /// Index into `VM::stack` where this call's locals (including slot 0,
    /// the callee itself) begin.
    slot_base: usize,
}

pub struct Vm {
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: Table,
    interner: Interner,
    heap: Heap,
    /// Where `print` statements write. Real stdout outside of tests; an
    /// in-memory buffer in tests that need to assert on printed output.
    output: Box<dyn Write>,
    /// Where compile/runtime error reports write. Real stderr outside of
    /// tests, same as `output`.
    errors: Box<dyn Write>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Builds a `Vm` that writes `print` output to `output` instead of
    /// stdout, so callers can capture and assert on it. Error reports
    /// still go to real stderr.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self::with_writers(output, Box::new(io::stderr()))
    }

    /// Builds a `Vm` with both its `print` output and its compile/runtime
    /// error reports redirected, so callers can capture and assert on
    /// either stream independently of the real process stdout/stderr.
    pub fn with_writers(output: Box<dyn Write>, errors: Box<dyn Write>) -> Self {
        let mut globals = Table::new();
        let mut interner = Interner::new();
        let mut heap = Heap::new();
        native::install(&mut globals, &mut interner, &mut heap);

        Vm {
            frames: Vec::with_capacity(FRAMES_MAX),
            stack: Vec::with_capacity(STACK_MAX),
            globals,
            interner,
            heap,
            output,
            errors,
        }
    }

    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let function = match lox_compiler::compile(source, &mut self.interner, &mut self.heap) {
            Ok(function) => function,
            Err(()) => return InterpretResult::CompileError,
        };

        self.stack.clear();
        self.frames.clear();

        self.stack.push(Value::Obj(Obj::Function(function.clone())));
        if let Err(message) = self.call(function, 0) {
            writeln!(self.errors, "{message}").expect("write to error sink");
            return InterpretResult::RuntimeError;
        }

        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(message) => {
                writeln!(self.errors, "{message}").expect("write to error sink");
                InterpretResult::RuntimeError
            }
        }
    }

    fn run(&mut self) -> Result<(), String> {
        loop {
            if tracing::enabled!(tracing::Level::TRACE) {
                self.trace_stack();
                self.trace_instruction();
            }

            let byte = self.read_byte();
            let op = OpCode::try_from(byte)
                .map_err(|b| self.runtime_error(&format!("Unknown opcode {b}.")))?;

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.current_frame().slot_base;
                    self.push(self.stack[base + slot].clone());
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.current_frame().slot_base;
                    self.stack[base + slot] = self.peek(0).clone();
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string()?;
                    let value = self.peek(0).clone();
                    self.globals.set(name, value);
                    self.pop();
                }
                OpCode::GetGlobal => {
                    let name = self.read_string()?;
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value);
                        }
                        None => {
                            return Err(self.runtime_error(&format!(
                                "Undefined variable '{}'.",
                                name.chars
                            )));
                        }
                    }
                }
                OpCode::SetGlobal => {
                    let name = self.read_string()?;
                    let value = self.peek(0).clone();
                    if self.globals.set(name.clone(), value) {
                        self.globals.delete(&name);
                        return Err(self
                            .runtime_error(&format!("Undefined variable '{}'.", name.chars)));
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.number_binary(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.number_binary(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.number_binary(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.number_binary(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.number_binary(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    if !self.peek(0).is_number() {
                        return Err(self.runtime_error("Operand must be a number."));
                    }
                    let n = self.pop().as_number().unwrap();
                    self.push(Value::Number(-n));
                }
                OpCode::Print => {
                    let value = self.pop();
                    writeln!(self.output, "{value}").expect("write to output sink");
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.current_frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if self.peek(0).is_falsey() {
                        self.current_frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.current_frame_mut().ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize).clone();
                    self.call_value(callee, arg_count)
                        .map_err(|message| self.runtime_error(&message))?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("a frame always exists while running");
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.slot_base);
                    self.push(result);
                }
            }
        }
    }

    // ---- call plumbing ---------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), String> {
        match callee {
            Value::Obj(Obj::Function(function)) => self.call(function, arg_count),
            Value::Obj(Obj::Native(native)) => {
                if arg_count != native.arity {
                    return Err(format!(
                        "Expected {} arguments but got {}.",
                        native.arity, arg_count
                    ));
                }
                let start = self.stack.len() - arg_count as usize;
                let result = (native.func)(&self.stack[start..])?;
                self.stack.truncate(start - 1);
                self.push(result);
                Ok(())
            }
            _ => Err("Can only call functions and classes.".to_string()),
        }
    }

    fn call(&mut self, function: Rc<ObjFunction>, arg_count: u8) -> Result<(), String> {
        if arg_count != function.arity {
            return Err(format!(
                "Expected {} arguments but got {}.",
                function.arity, arg_count
            ));
        }
        if self.frames.len() == FRAMES_MAX {
            return Err("Stack overflow.".to_string());
        }
        let slot_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame {
            function,
            ip: 0,
            slot_base,
        });
        Ok(())
    }

    fn add(&mut self) -> Result<(), String> {
        let b = self.peek(0).clone();
        let a = self.peek(1).clone();
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(a + b));
                Ok(())
            }
            _ => match (a.as_string(), b.as_string()) {
                (Some(a), Some(b)) => {
                    let joined = format!("{}{}", a.chars, b.chars);
                    self.pop();
                    self.pop();
                    let interned = self.interner.take_string(&mut self.heap, joined);
                    self.push(Value::Obj(Obj::String(interned)));
                    Ok(())
                }
                _ => Err(self.runtime_error("Operands must be two numbers or two strings.")),
            },
        }
    }

    fn number_binary(&mut self, op: impl Fn(f64, f64) -> Value) -> Result<(), String> {
        if !self.peek(0).is_number() || !self.peek(1).is_number() {
            return Err(self.runtime_error("Operands must be numbers."));
        }
        let b = self.pop().as_number().unwrap();
        let a = self.pop().as_number().unwrap();
        self.push(op(a, b));
        Ok(())
    }

    // ---- stack and frame access -------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow indicates a compiler bug")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn current_frame(&self) -> &CallFrame {
        self.frames.last().expect("a frame always exists while running")
    }

    fn current_frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("a frame always exists while running")
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.current_frame_mut();
        let byte = frame.function.chunk.read_byte(frame.ip);
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.current_frame_mut();
        let value = frame.function.chunk.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.current_frame().function.chunk.constants()[idx as usize].clone()
    }

    fn read_string(&mut self) -> Result<Rc<lox_core::ObjString>, String> {
        match self.read_constant() {
            Value::Obj(Obj::String(s)) => Ok(s),
            other => Err(self.runtime_error(&format!(
                "Expected a string constant, found {}.",
                other.type_name()
            ))),
        }
    }

    // ---- diagnostics -----------------------------------------------------

    fn runtime_error(&self, message: &str) -> String {
        let mut report = String::new();
        report.push_str(message);
        for frame in self.frames.iter().rev() {
            report.push('\n');
            let instruction = frame.ip.saturating_sub(1);
            let line = frame.function.chunk.line_at(instruction);
            match &frame.function.name {
                Some(name) => report.push_str(&format!("[line {line}] in {}()", name.chars)),
                None => report.push_str(&format!("[line {line}] in script")),
            }
        }
        report
    }

    fn trace_stack(&self) {
        let rendered: Vec<String> = self.stack.iter().map(|v| format!("[ {v} ]")).collect();
        trace!(stack = %rendered.join(""), "stack");
    }

    fn trace_instruction(&self) {
        let frame = self.current_frame();
        let (text, _) = lox_core::disassemble_instruction(&frame.function.chunk, frame.ip);
        trace!(%text, "instruction");
    }
}
