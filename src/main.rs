// plume - A small scripting language with a bytecode virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use plume_vm::{CompiledProgram, Interpreter, VmOptions, bytecode, compile_source};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: plume [OPTIONS] <FILE>";

/// sysexits(3) codes
const EX_DATAERR: u8 = 65;
const EX_CANTCREAT: u8 = 73;
const EX_NOINPUT: u8 = 74;

#[derive(Parser)]
#[command(name = "plume")]
#[command(about = "Run a Plume script or compiled program")]
#[command(version)]
struct Cli {
    /// Source file (.plm) or compiled program (.plmb)
    file: PathBuf,

    /// Print the listing of every compiled function and exit
    #[arg(long)]
    disassemble: bool,

    /// Write the compiled program to PATH and exit
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,

    /// Print the full machine state before every instruction
    #[arg(long)]
    step: bool,

    /// More logging on stderr (-v debug, -vv trace); overrides PLUME_LOG
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let bytes = match fs::read(&cli.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading '{}': {}", cli.file.display(), e);
            eprintln!("{}", USAGE);
            return ExitCode::from(EX_NOINPUT);
        }
    };

    let program = match load(&cli.file, bytes) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EX_DATAERR);
        }
    };

    if cli.disassemble {
        print!("{}", program.disassemble_all());
        return ExitCode::SUCCESS;
    }

    if let Some(path) = &cli.emit {
        return match fs::write(path, bytecode::encode(&program)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error writing '{}': {}", path.display(), e);
                ExitCode::from(EX_CANTCREAT)
            }
        };
    }

    run(&program, cli.step)
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("PLUME_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Decode a compiled program, or compile source text.
fn load(path: &Path, bytes: Vec<u8>) -> Result<CompiledProgram, String> {
    if bytecode::is_compiled(&bytes) {
        debug!(path = %path.display(), "loading compiled program");
        return bytecode::decode(&bytes).map_err(|e| format!("Error in '{}': {}", path.display(), e));
    }

    let source = String::from_utf8(bytes)
        .map_err(|_| format!("Error in '{}': source is not valid UTF-8", path.display()))?;
    compile_source(&source).map_err(|e| format!("Error in '{}':\n{}", path.display(), e))
}

/// Execute against stdin/stdout. A fatal error has already been dumped to
/// stdout by the time it gets here.
fn run(program: &CompiledProgram, step: bool) -> ExitCode {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let options = VmOptions {
        step,
        ..VmOptions::default()
    };

    let result = Interpreter::with_options(&mut out, &mut input, options).run_program(program);
    if let Err(e) = out.flush() {
        error!(error = %e, "could not flush stdout");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}
