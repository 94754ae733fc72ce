mod highlighter;

use clap::Parser;
use highlighter::CHelper;
use minic::config::{
    self, HELP_TEXT, HISTORY_FILE, PROMPT, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE,
};
use minic::{interpret_with, Interpreter, InterpreterOptions, RunOutcome};
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use std::path::PathBuf;
use std::process::ExitCode;

/// C interpreter with an interactive REPL
#[derive(Parser, Debug)]
#[command(name = "minic")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking interpreter for a practical subset of C")]
#[command(long_about = "Runs C programs directly from source, or evaluates \
C fragments interactively against a persistent context")]
struct CliArgs {
    /// Source file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Text to serve as the program's standard input (for getchar)
    #[arg(long = "stdin", value_name = "TEXT")]
    stdin_text: Option<String>,

    /// Report never-freed malloc allocations as leak warnings
    #[arg(long = "strict")]
    strict: bool,

    /// Simulated heap limit in bytes
    #[arg(long = "heap-size", value_name = "BYTES", default_value_t = config::DEFAULT_HEAP_BYTES)]
    heap_size: usize,

    /// Print the run outcome as JSON instead of plain text
    #[arg(long = "json")]
    json: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let options = InterpreterOptions {
        strict_leaks: args.strict,
        max_heap_bytes: args.heap_size,
    };

    if let Some(script) = &args.script {
        return run_script(script, &args, &options);
    }
    run_repl(options)
}

/// Script mode: run the file and propagate the program's exit code.
fn run_script(path: &PathBuf, args: &CliArgs, options: &InterpreterOptions) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = interpret_with(&source, args.stdin_text.as_deref(), options, None);
    report(&outcome, args.json);
    // Truncated to a byte, as process exit statuses are.
    ExitCode::from(outcome.exit_code as u8)
}

fn report(outcome: &RunOutcome, json: bool) {
    if json {
        match serde_json::to_string_pretty(outcome) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => eprintln!("Cannot serialise outcome: {}", e),
        }
        return;
    }
    print!("{}", outcome.stdout);
    for diagnostic in &outcome.diagnostics {
        eprintln!("{}", diagnostic);
    }
}

/// Interactive mode: a persistent context fed one fragment per line.
fn run_repl(options: InterpreterOptions) -> ExitCode {
    let strict = options.strict_leaks;
    let mut interpreter = Interpreter::new(options);

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<CHelper, rustyline::history::DefaultHistory> =
        match Editor::with_config(config) {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("Failed to initialize REPL: {}", e);
                return ExitCode::FAILURE;
            }
        };
    rl.set_helper(Some(CHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line {
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    ":help" => {
                        println!("{}", HELP_TEXT);
                        continue;
                    }
                    ":reset" => {
                        interpreter.reset();
                        println!("Context reset.");
                        continue;
                    }
                    ":clear" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    _ => {}
                }

                let step = interpreter.repl_step(line);
                print!("{}", step.stdout_delta);
                if let Some(value) = &step.value {
                    println!("=> {}", value);
                }
                for diagnostic in &step.diagnostics {
                    eprintln!("{}", diagnostic);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if strict {
        for warning in interpreter.leaks() {
            eprintln!("{}", warning);
        }
    }
    let _ = rl.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}
