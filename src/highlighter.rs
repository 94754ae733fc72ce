// ABOUTME: Syntax highlighter for the REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for C syntax elements while preserving display width

use rustyline::highlight::{CmdKind, Highlighter};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_TYPE: &str = "\x1b[1;34m"; // Bold blue
const COLOR_BUILTIN: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

const TYPES: [&str; 4] = ["int", "float", "char", "void"];

const KEYWORDS: [&str; 9] = [
    "if", "else", "for", "while", "do", "return", "break", "continue", "sizeof",
];

const BUILTINS: [&str; 11] = [
    "printf", "strlen", "strcpy", "strcmp", "malloc", "free", "realloc", "putchar", "getchar",
    "abs", "atoi",
];

/// Rustyline helper for the C REPL.
#[derive(Completer, Helper, Hinter, Validator)]
pub struct CHelper;

impl CHelper {
    pub fn new() -> Self {
        CHelper
    }
}

impl Default for CHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for CHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn paint(out: &mut String, color: &str, text: &str) {
    out.push_str(color);
    out.push_str(text);
    out.push_str(COLOR_RESET);
}

fn highlight_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Line comment runs to the end.
            '/' if chars.get(i + 1) == Some(&'/') => {
                let rest: String = chars[i..].iter().collect();
                paint(&mut out, COLOR_COMMENT, &rest);
                break;
            }
            '"' | '\'' => {
                let quote = chars[i];
                let start = i;
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 2;
                        continue;
                    }
                    if chars[i] == quote {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                paint(&mut out, COLOR_STRING, &text);
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' )
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                paint(&mut out, COLOR_NUMBER, &text);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if TYPES.contains(&word.as_str()) {
                    paint(&mut out, COLOR_TYPE, &word);
                } else if KEYWORDS.contains(&word.as_str()) {
                    paint(&mut out, COLOR_KEYWORD, &word);
                } else if BUILTINS.contains(&word.as_str()) {
                    paint(&mut out, COLOR_BUILTIN, &word);
                } else {
                    out.push_str(&word);
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_punctuation_is_untouched() {
        assert_eq!(highlight_line("(){};"), "(){};");
    }

    #[test]
    fn test_keywords_and_types_are_colored() {
        let out = highlight_line("int x");
        assert!(out.starts_with(COLOR_TYPE));
        assert!(out.contains("int"));
        let out = highlight_line("return x");
        assert!(out.starts_with(COLOR_KEYWORD));
    }

    #[test]
    fn test_builtin_names_are_colored() {
        let out = highlight_line("printf");
        assert!(out.starts_with(COLOR_BUILTIN));
    }

    #[test]
    fn test_string_with_escape_stays_intact() {
        let out = highlight_line(r#"x = "a\"b";"#);
        assert!(out.contains(r#""a\"b""#));
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let out = highlight_line("x; // int y");
        let comment_at = out.find(COLOR_COMMENT).unwrap();
        assert!(out[comment_at..].contains("// int y"));
    }
}
