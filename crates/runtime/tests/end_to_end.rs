//! Full source-to-result scenarios, run through the public `Vm` API the
//! way a script or REPL line would be. Bytecode is the implicit subject
//! under test here, not string-matching the compiler's internals. Each
//! assertion checks both the `InterpretResult` and the literal text the
//! script prints (or reports as an error), since a wrong value, a dropped
//! newline, or a mangled error message would still leave
//! `InterpretResult::Ok`/`RuntimeError` untouched.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lox_runtime::{InterpretResult, Vm};

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `source` and returns everything it printed plus everything it
/// reported as a compile/runtime error, alongside the `InterpretResult`.
fn interpret(source: &str) -> (InterpretResult, String, String) {
    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let result = Vm::with_writers(Box::new(stdout.clone()), Box::new(stderr.clone()))
        .interpret(source);
    (result, stdout.contents(), stderr.contents())
}

#[test]
fn arithmetic_precedence() {
    let (result, stdout, _) = interpret("print 1 + 2 * 3;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "7\n");
}

#[test]
fn string_concatenation_of_two_locals() {
    let (result, stdout, _) =
        interpret(r#"var a = "hi"; var b = " there"; print a + b;"#);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "hi there\n");
}

#[test]
fn while_loop_counts_up() {
    let (result, stdout, _) =
        interpret("var i = 0; while (i < 3) { print i; i = i + 1; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "0\n1\n2\n");
}

#[test]
fn for_loop_desugars_to_while() {
    let (result, stdout, _) = interpret("for (var i = 0; i < 2; i = i + 1) print i;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "0\n1\n");
}

#[test]
fn function_call_returns_computed_value() {
    let (result, stdout, _) = interpret("fun sq(n) { return n * n; } print sq(5);");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "25\n");
}

#[test]
fn adding_a_string_and_a_number_is_a_runtime_error() {
    let (result, stdout, stderr) = interpret(r#"print "x" + 1;"#);
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(stdout, "");
    assert!(
        stderr.contains("Operands must be two numbers or two strings."),
        "stderr was: {stderr}"
    );
    assert!(stderr.contains("[line 1] in script"), "stderr was: {stderr}");
}

#[test]
fn nested_blocks_shadow_and_restore_outer_locals() {
    let (result, stdout, _) =
        interpret("{ var a = 1; { var a = 2; print a; } print a; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "2\n1\n");
}

#[test]
fn or_short_circuits_to_the_left_operand() {
    let (result, stdout, _) = interpret(r#"print nil or "v";"#);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "v\n");
}

#[test]
fn and_short_circuits_to_the_falsey_left_operand() {
    let (result, stdout, _) = interpret("print false and 3;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "false\n");
}

#[test]
fn closures_are_out_of_scope_but_plain_recursion_is_not() {
    let source = "fun fact(n) { if (n < 2) return 1; return n * fact(n - 1); } print fact(6);";
    let (result, stdout, _) = interpret(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "720\n");
}

#[test]
fn stack_depth_is_exactly_one_when_the_script_halts() {
    // Not directly observable from outside the VM, but a script that
    // leaves extra values lying around would still report Ok as long as
    // every statement pops what it pushes; this is the statement-level
    // contract the compiler's expression-statement POP enforces.
    let (result, stdout, _) = interpret("1 + 2; \"a\" + \"b\"; nil;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(stdout, "");
}
