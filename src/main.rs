//! Culebra CLI
//!
//! Main entry point for the `culebra` command.

use clap::{Parser as ClapParser, Subcommand};
use culebra::{Environment, Interpreter, Parser, RunError, SourceFile, Value, prelude};
use miette::{IntoDiagnostic, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(ClapParser)]
#[command(name = "culebra")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "The culebra scripting language interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a culebra program
    Run {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the parsed AST before running
        #[arg(long)]
        show_ast: bool,

        /// Maximum evaluation depth
        #[arg(long, default_value_t = culebra::interp::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Maximum expression nesting accepted by the parser
        #[arg(long, default_value_t = culebra::parser::DEFAULT_MAX_NESTING)]
        max_nesting: usize,
    },

    /// Parse a culebra program without running it
    Check {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Show the parsed AST
        #[arg(long)]
        show_ast: bool,
    },

    /// Start the interactive REPL
    Repl,

    /// Show information about the interpreter
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("culebra=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            input,
            show_ast,
            max_depth,
            max_nesting,
        } => run(&input, show_ast, max_depth, max_nesting),

        Commands::Check { input, show_ast } => check(&input, show_ast),

        Commands::Repl => repl(),

        Commands::Info => info(),
    }
}

fn read_source(input: &Path) -> Result<String> {
    std::fs::read_to_string(input)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("failed to read {}", input.display())))
}

fn run(input: &Path, show_ast: bool, max_depth: usize, max_nesting: usize) -> Result<()> {
    tracing::info!("Running {:?}", input);

    let source = read_source(input)?;
    let path = input.to_string_lossy();
    let parser = Parser::new().with_max_nesting(max_nesting);

    let ast = parser
        .parse(&source)
        .map_err(|e| RunError::parse(&SourceFile::new(&*path, source.as_str()), e))?;

    if show_ast {
        println!("{}", serde_json::to_string_pretty(&ast).into_diagnostic()?);
    }

    let env = Environment::new();
    prelude::install_stdout(&env);
    let mut interpreter = Interpreter::new().with_max_depth(max_depth);
    let result = interpreter
        .interpret(&ast, &env)
        .map_err(RunError::from)?;

    // Only print non-unit results
    if !matches!(result, Value::Unit) {
        println!("{}", result);
    }
    Ok(())
}

fn check(input: &Path, show_ast: bool) -> Result<()> {
    tracing::info!("Checking {:?}", input);

    let source = read_source(input)?;
    let file = SourceFile::new(input.to_string_lossy(), source.as_str());
    let ast = Parser::new()
        .parse(&source)
        .map_err(|e| RunError::parse(&file, e))?;

    if show_ast {
        println!("{}", serde_json::to_string_pretty(&ast).into_diagnostic()?);
    }

    println!("Parsed successfully: {}", input.display());
    Ok(())
}

fn repl() -> Result<()> {
    println!("Culebra REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for help, :quit to exit");
    println!();

    let mut editor = DefaultEditor::new().into_diagnostic()?;
    let parser = Parser::new();
    let env = Environment::new();
    prelude::install_stdout(&env);
    let mut interpreter = Interpreter::new();

    loop {
        let line = match editor.readline("culebra> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).into_diagnostic(),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        editor.add_history_entry(trimmed).into_diagnostic()?;

        match trimmed {
            ":quit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :help, :h    Show this help");
                println!("  :quit, :q    Exit the REPL");
                println!();
                println!("Bindings persist between lines.");
            }
            _ => match culebra::run_with(&mut interpreter, &parser, "<repl>", &env, trimmed) {
                Ok(Value::Unit) => {}
                Ok(value) => println!("{}", value),
                Err(e) => eprintln!("{:?}", miette::Report::new(e)),
            },
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn info() -> Result<()> {
    println!("Culebra Interpreter");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Values:");
    println!("  - 64-bit integers, booleans, strings with ${{...}} interpolation");
    println!("  - Arrays and objects shared by reference");
    println!("  - First-class closures with `self` recursion");
    println!();
    println!("Limits:");
    println!(
        "  - Evaluation depth: {}",
        culebra::interp::DEFAULT_MAX_DEPTH
    );
    println!(
        "  - Parser nesting: {}",
        culebra::parser::DEFAULT_MAX_NESTING
    );

    Ok(())
}
