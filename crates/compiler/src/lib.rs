//! Lox Compiler: scanner + single-pass Pratt compiler.
//!
//! `compile` turns source text directly into bytecode with no
//! intermediate AST: the scanner hands tokens to the compiler on demand,
//! and the compiler emits bytes into a `Chunk` as it recognizes each
//! grammar production.

mod compiler;
mod precedence;
mod scanner;
mod token;

pub use compiler::compile;
pub use scanner::Scanner;
pub use token::{Token, TokenKind};
