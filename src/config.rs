// ABOUTME: Configuration and constants for the interpreter
// This module contains version info, REPL banners, and interpreter limits

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "minic v1.0";
pub const WELCOME_SUBTITLE: &str = "A tree-walking interpreter for a practical subset of C";
pub const WELCOME_FOOTER: &str = "Type :help for commands, :quit to exit.";

pub const PROMPT: &str = "minic> ";
pub const HISTORY_FILE: &str = ".minic_history";

/// Default cap on the simulated heap, shared by stack storage, string
/// literals, and malloc.
pub const DEFAULT_HEAP_BYTES: usize = 16 * 1024 * 1024;

/// Knobs for one interpretation context.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Report never-freed malloc allocations as `LeakWarning`s.
    pub strict_leaks: bool,
    /// Upper bound on the simulated heap; allocation past it fails.
    pub max_heap_bytes: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            strict_leaks: false,
            max_heap_bytes: DEFAULT_HEAP_BYTES,
        }
    }
}

pub const HELP_TEXT: &str = r#"
Available commands:
  :quit or :exit       - Exit the REPL
  :help                - Show this help message
  :reset               - Discard all definitions and start fresh
  :clear               - Clear the screen

Anything else is interpreted as C: declarations, statements, function
definitions, or a bare expression (its value is echoed back).

Builtins: printf strlen strcpy strcmp malloc free realloc
          putchar getchar abs atoi
"#;
