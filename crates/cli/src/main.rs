//! `loxc`: run a Lox script, disassemble one without running it, or drop
//! into an interactive REPL when given no arguments.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lox_core::{Heap, Interner};
use lox_runtime::{InterpretResult, Vm};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;
const EX_IOERR: u8 = 74;

#[derive(Parser)]
#[command(name = "loxc", version, about = "Lox bytecode compiler and virtual machine")]
struct Cli {
    /// Script to run. Omit to start the interactive REPL.
    path: Option<PathBuf>,

    /// Log every executed instruction and the value stack before it runs.
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a script and print its disassembled bytecode instead of running it.
    Disassemble { path: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.trace);

    let code = match cli.command {
        Some(Command::Disassemble { path }) => run_disassemble(&path),
        None => match cli.path {
            Some(path) => run_file(&path),
            None => run_repl(),
        },
    };
    ExitCode::from(code)
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn run_file(path: &Path) -> u8 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not open file \"{}\": {err}", path.display());
            return EX_IOERR;
        }
    };

    match Vm::new().interpret(&source) {
        InterpretResult::Ok => 0,
        InterpretResult::CompileError => EX_DATAERR,
        InterpretResult::RuntimeError => EX_SOFTWARE,
    }
}

fn run_disassemble(path: &Path) -> u8 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not open file \"{}\": {err}", path.display());
            return EX_IOERR;
        }
    };

    let mut interner = Interner::new();
    let mut heap = Heap::new();
    match lox_compiler::compile(&source, &mut interner, &mut heap) {
        Ok(function) => {
            print!("{}", lox_core::disassemble_chunk(&function.chunk, "<script>"));
            0
        }
        Err(()) => EX_DATAERR,
    }
}

fn run_repl() -> u8 {
    let mut vm = Vm::new();
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");
    let history_path = history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                vm.interpret(&line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error reading input: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
    0
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lox_history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn runs_a_script_file_to_completion() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "print 1 + 1;").unwrap();
        assert_eq!(run_file(file.path()), 0);
    }

    #[test]
    fn reports_compile_error_exit_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "print ;").unwrap();
        assert_eq!(run_file(file.path()), EX_DATAERR);
    }

    #[test]
    fn reports_runtime_error_exit_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "print undefined_name;").unwrap();
        assert_eq!(run_file(file.path()), EX_SOFTWARE);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert_eq!(run_file(Path::new("/no/such/file.lox")), EX_IOERR);
    }

    #[test]
    fn disassemble_prints_bytecode_listing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "print 1 + 2;").unwrap();
        assert_eq!(run_disassemble(file.path()), 0);
    }
}
