//! Bytecode disassembly, shared by the VM's execution tracer and the CLI's
//! `disassemble` subcommand. Output format intentionally mirrors the one
//! widely used for teaching this exact bytecode design: an offset, a
//! source line (or `|` when it repeats the previous instruction's line),
//! the opcode name, and any decoded operand.

use crate::chunk::Chunk;
use crate::opcode::OpCode;

/// Renders every instruction in `chunk` as a multi-line listing headed by
/// `name` (usually the function's name, or `<script>`).
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Renders the single instruction at `offset` and returns `(text, next_offset)`.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut header = format!("{offset:04} ");
    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        header.push_str("   | ");
    } else {
        header.push_str(&format!("{:4} ", chunk.line_at(offset)));
    }

    let byte = chunk.read_byte(offset);
    let Ok(op) = OpCode::try_from(byte) else {
        return (format!("{header}Unknown opcode {byte}"), offset + 1);
    };

    let (body, next) = match op {
        OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, offset),
        OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset),
        OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset),
        OpCode::DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, offset),
        OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, offset),
        OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, offset),
        OpCode::Call => byte_instruction("OP_CALL", chunk, offset),
        OpCode::Jump => jump_instruction("OP_JUMP", 1, chunk, offset),
        OpCode::JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset),
        OpCode::Loop => jump_instruction("OP_LOOP", -1, chunk, offset),
        OpCode::Nil => simple_instruction("OP_NIL", offset),
        OpCode::True => simple_instruction("OP_TRUE", offset),
        OpCode::False => simple_instruction("OP_FALSE", offset),
        OpCode::Pop => simple_instruction("OP_POP", offset),
        OpCode::Equal => simple_instruction("OP_EQUAL", offset),
        OpCode::Greater => simple_instruction("OP_GREATER", offset),
        OpCode::Less => simple_instruction("OP_LESS", offset),
        OpCode::Add => simple_instruction("OP_ADD", offset),
        OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset),
        OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset),
        OpCode::Divide => simple_instruction("OP_DIVIDE", offset),
        OpCode::Not => simple_instruction("OP_NOT", offset),
        OpCode::Negate => simple_instruction("OP_NEGATE", offset),
        OpCode::Print => simple_instruction("OP_PRINT", offset),
        OpCode::Return => simple_instruction("OP_RETURN", offset),
    };
    (format!("{header}{body}"), next)
}

fn simple_instruction(name: &str, offset: usize) -> (String, usize) {
    (name.to_string(), offset + 1)
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize) -> (String, usize) {
    let slot = chunk.read_byte(offset + 1);
    (format!("{name:<16} {slot:4}"), offset + 2)
}

fn constant_instruction(name: &str, chunk: &Chunk, offset: usize) -> (String, usize) {
    let idx = chunk.read_byte(offset + 1);
    let value = &chunk.constants()[idx as usize];
    (format!("{name:<16} {idx:4} '{value}'"), offset + 2)
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize) -> (String, usize) {
    let jump = chunk.read_u16(offset + 1) as i32;
    let target = offset as i32 + 3 + sign * jump;
    (format!("{name:<16} {offset:4} -> {target}"), offset + 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn disassembles_a_constant_and_a_return() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(1.0)).unwrap();
        chunk.write_byte(OpCode::Constant as u8, 1);
        chunk.write_byte(idx, 1);
        chunk.write_byte(OpCode::Return as u8, 1);

        let listing = disassemble_chunk(&chunk, "test");
        assert!(listing.contains("OP_CONSTANT"));
        assert!(listing.contains("OP_RETURN"));
    }

    #[test]
    fn jump_target_accounts_for_three_byte_instruction() {
        let mut chunk = Chunk::new();
        chunk.write_byte(OpCode::Jump as u8, 1);
        chunk.write_byte(0, 1);
        chunk.write_byte(2, 1);
        let (text, next) = disassemble_instruction(&chunk, 0);
        assert_eq!(next, 3);
        assert!(text.contains("-> 5"));
    }
}
