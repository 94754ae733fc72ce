// ABOUTME: Library surface: one-shot interpretation and the persistent REPL context

pub mod ast;
pub mod builtins;
pub mod config;
pub mod env;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod memory;
pub mod parser;
pub mod value;

use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use config::InterpreterOptions;
pub use error::{Diagnostic, DiagnosticKind};

use eval::Interp;

/// Result of a one-shot interpretation: the exit code, everything the
/// program wrote, and zero or more diagnostics (at most one error, plus
/// any leak warnings in strict mode).
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Result of one REPL fragment: output since the previous step, the
/// rendered value of a bare expression, and any diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub stdout_delta: String,
    pub value: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Cooperative cancellation for a run. The evaluator polls it at
/// statement boundaries and loop iterations; a cancelled run fails with
/// an `Interrupted` diagnostic and releases all of its resources.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn flag(&self) -> &Arc<AtomicBool> {
        &self.0
    }
}

/// Interprets a complete C source text with default options.
pub fn interpret(source: &str, stdin_text: Option<&str>) -> RunOutcome {
    interpret_with(source, stdin_text, &InterpreterOptions::default(), None)
}

/// Interprets a complete C source text.
///
/// The source is lexed and parsed as a translation unit; all functions
/// are registered, globals are initialised in order, and `main` (if
/// defined) supplies the exit code. Without a `main`, globals are set up
/// and the exit code is 0.
pub fn interpret_with(
    source: &str,
    stdin_text: Option<&str>,
    options: &InterpreterOptions,
    cancel: Option<&CancelToken>,
) -> RunOutcome {
    let tokens = match lexer::tokenize(source) {
        Ok(tokens) => tokens,
        Err(e) => return RunOutcome {
            exit_code: 1,
            stdout: String::new(),
            diagnostics: vec![e.into()],
        },
    };
    let program = match parser::parse_program(tokens) {
        Ok(program) => program,
        Err(e) => return RunOutcome {
            exit_code: 1,
            stdout: String::new(),
            diagnostics: vec![e.into()],
        },
    };
    let mut interp = Interp::new(options.max_heap_bytes, stdin_text);
    match interp.run_program(&program, cancel.map(CancelToken::flag)) {
        Ok(exit) => {
            let mut diagnostics = Vec::new();
            if options.strict_leaks {
                diagnostics.extend(leak_warnings(&interp));
            }
            RunOutcome {
                exit_code: exit.unwrap_or(0),
                stdout: interp.io.stdout,
                diagnostics,
            }
        }
        Err(e) => RunOutcome {
            exit_code: 1,
            stdout: interp.io.stdout,
            diagnostics: vec![e.into()],
        },
    }
}

/// Reads a source file and interprets it.
pub fn interpret_file(path: &Path) -> std::io::Result<RunOutcome> {
    let source = std::fs::read_to_string(path)?;
    Ok(interpret(&source, None))
}

fn leak_warnings(interp: &Interp) -> Vec<Diagnostic> {
    interp
        .mem
        .leaked()
        .into_iter()
        .map(|(_, alloc)| Diagnostic {
            kind: DiagnosticKind::LeakWarning,
            message: format!("{} bytes allocated here were never freed", alloc.size),
            line: alloc.line,
            column: alloc.col,
        })
        .collect()
}

/// A persistent interpretation context for the interactive mode.
///
/// Fragments are parsed permissively (declarations, statements, function
/// definitions, or bare expressions) and executed against the same heap
/// and environment. A failing fragment rolls the context back; output
/// already written stays written.
pub struct Interpreter {
    interp: Interp,
    options: InterpreterOptions,
}

impl Interpreter {
    pub fn new(options: InterpreterOptions) -> Self {
        let interp = Interp::new(options.max_heap_bytes, None);
        Interpreter { interp, options }
    }

    /// Discards every definition and allocation.
    pub fn reset(&mut self) {
        self.interp = Interp::new(self.options.max_heap_bytes, None);
    }

    /// Parses and executes one fragment against the persistent context.
    pub fn repl_step(&mut self, fragment: &str) -> StepOutcome {
        let tokens = match lexer::tokenize(fragment) {
            Ok(tokens) => tokens,
            Err(e) => return StepOutcome {
                stdout_delta: String::new(),
                value: None,
                diagnostics: vec![e.into()],
            },
        };
        let forms = match parser::parse_fragment(tokens) {
            Ok(forms) => forms,
            Err(e) => return StepOutcome {
                stdout_delta: String::new(),
                value: None,
                diagnostics: vec![e.into()],
            },
        };
        // Snapshot for rollback; stdout is intentionally not part of it.
        let mem = self.interp.mem.clone();
        let env = self.interp.env.clone();
        let stdin = self.interp.io.stdin.clone();
        match self.interp.run_fragment(&forms, None) {
            Ok(value) => StepOutcome {
                stdout_delta: self.interp.io.take_stdout(),
                value: value.map(|v| v.to_string()),
                diagnostics: Vec::new(),
            },
            Err(e) => {
                self.interp.mem = mem;
                self.interp.env = env;
                self.interp.io.stdin = stdin;
                StepOutcome {
                    stdout_delta: self.interp.io.take_stdout(),
                    value: None,
                    diagnostics: vec![e.into()],
                }
            }
        }
    }

    /// Leak warnings for the context's current heap, strict mode or not.
    pub fn leaks(&self) -> Vec<Diagnostic> {
        leak_warnings(&self.interp)
    }
}
