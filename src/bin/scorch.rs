// Scorch CLI - Command Line Interface
// Usage: scorch [FILE] [OPTIONS]

use clap::Parser;
use colored::*;
use std::fs;
use std::path::PathBuf;
use tracing::Level;

use scorch_core::ast::Program;
use scorch_core::{compile, CompilerSettings, ScriptContext};

/// Scorch - compile parsed search scripts to instruction chunks
#[derive(Parser)]
#[command(name = "scorch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile parsed search scripts to instruction chunks", long_about = None)]
struct Cli {
    /// Parsed program as JSON
    file: PathBuf,

    /// Script context (parameters, return type, functions) as JSON
    #[arg(short = 'c', long = "context")]
    context: Option<PathBuf>,

    /// Compiler option as name=value (repeatable)
    #[arg(short = 's', long = "set")]
    set: Vec<String>,

    /// Original script text, for error excerpts
    #[arg(long = "source")]
    source: Option<PathBuf>,

    /// Check for errors without printing the chunk
    #[arg(long = "check")]
    check: bool,

    /// Log compile stages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let mut settings = CompilerSettings::new();
    for assignment in &cli.set {
        settings.apply(assignment).map_err(|e| format!("{} {}", "error:".red().bold(), e))?;
    }

    let context = match &cli.context {
        Some(path) => {
            let text = read(path)?;
            serde_json::from_str::<ScriptContext>(&text)
                .map_err(|e| format!("Error parsing context '{}': {}", path.display(), e))?
        }
        None => ScriptContext::default(),
    };

    let text = read(&cli.file)?;
    let mut program: Program = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing program '{}': {}", cli.file.display(), e))?;
    if let Some(path) = &cli.source {
        program = program.with_source(read(path)?);
    }

    let name = cli
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "script".to_string());

    let script = compile(name, program, &context, &settings).map_err(|e| e.format())?;

    if cli.check {
        println!("{} No errors found in {}", "✓".green(), cli.file.display());
    } else {
        print!("{}", script.disassemble());
    }
    Ok(())
}

fn read(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Error reading file '{}': {}", path.display(), e))
}
