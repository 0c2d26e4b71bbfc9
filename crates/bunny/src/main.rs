use std::path::PathBuf;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use bunny::{Interpreter, InterpreterBuilder};

#[derive(Parser)]
#[command(name = "bunny", about = "Bunny: a small Lisp compiled to bytecode")]
struct Cli {
    /// File to execute
    file: Option<String>,

    /// Evaluate an expression
    #[arg(short, long)]
    eval: Option<String>,

    /// Print the bytecode for an expression instead of running it
    #[arg(long, value_name = "EXPR")]
    disasm: Option<String>,

    /// Start without the prelude
    #[arg(long)]
    no_prelude: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let mut interpreter = match InterpreterBuilder::new()
        .with_prelude(!cli.no_prelude)
        .build()
    {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("Error loading prelude: {e}");
            std::process::exit(1);
        }
    };

    if let Some(expr) = &cli.disasm {
        match interpreter.disassemble(expr) {
            Ok(listing) => print!("{listing}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(expr) = &cli.eval {
        match interpreter.eval_str(expr) {
            Ok(val) => {
                if !val.is_nil() {
                    println!("{val}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(file) = &cli.file {
        if let Err(e) = interpreter.eval_file(file) {
            eprintln!("Error in {file}: {e}");
            std::process::exit(1);
        }
        return;
    }

    repl(interpreter);
}

/// Install a subscriber only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn repl(mut interpreter: Interpreter) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: failed to create editor: {e}");
            std::process::exit(1);
        }
    };
    let history_path = dirs_path().join("history.txt");
    let _ = rl.load_history(&history_path);

    println!("Bunny v{}", env!("CARGO_PKG_VERSION"));
    println!("Type ,help for help, ,quit to exit\n");

    let mut buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = if in_multiline { "  ... " } else { "bunny> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline {
                    match trimmed {
                        ",quit" | ",exit" | ",q" => break,
                        ",help" | ",h" => {
                            print_help();
                            continue;
                        }
                        ",env" => {
                            print_env(&interpreter);
                            continue;
                        }
                        _ => {}
                    }
                }

                if in_multiline {
                    buffer.push('\n');
                    buffer.push_str(&line);
                } else {
                    buffer = line.clone();
                }

                if !is_balanced(&buffer) {
                    in_multiline = true;
                    continue;
                }

                in_multiline = false;
                let input = buffer.trim().to_string();
                buffer.clear();

                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&input);

                match interpreter.eval_str(&input) {
                    Ok(val) => println!("{val}"),
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    buffer.clear();
                    in_multiline = false;
                    println!("^C");
                    continue;
                }
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(dirs_path());
    let _ = rl.save_history(&history_path);
    println!("Goodbye!");
}

/// True once every `(` outside a string and comment has been closed.
fn is_balanced(input: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut in_comment = false;
    for ch in input.chars() {
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            ';' => in_comment = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_string
}

fn print_help() {
    println!("Bunny REPL Commands:");
    println!("  ,quit / ,q    Exit the REPL");
    println!("  ,help / ,h    Show this help");
    println!("  ,env          Show defined variables");
    println!();
    println!("Special Forms:");
    println!("  fn, quote, if, def, set!");
    println!();
    println!("Prelude Macros:");
    println!("  defmacro, defn, do, let, letfn, or, and, when");
}

fn print_env(interpreter: &Interpreter) {
    let bindings = interpreter.user_bindings();
    if bindings.is_empty() {
        println!("(no user-defined bindings)");
    } else {
        for (name, val) in bindings {
            println!("  {name} = {val}");
        }
    }
}

fn dirs_path() -> PathBuf {
    dirs_home().join(".bunny")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(+ 1 2)"));
        assert!(!is_balanced("(def x"));
        assert!(is_balanced("(print \"(\")"));
        assert!(!is_balanced("(foo ; )\n"));
        assert!(is_balanced(""));
    }
}
