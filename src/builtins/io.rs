//! Formatted and character I/O: printf, putchar, getchar
//!
//! The printf formatter is implemented here rather than delegated to the
//! host, so conversions behave identically on every platform. Supported:
//! conversions `%d %i %u %o %x %X %c %s %f %e %g %%`, flags `- + space 0 #`,
//! width and precision (including `*`), and the `l` length modifier, which
//! is accepted and ignored because all integers are 64-bit internally.

use super::{at, check_arity, int_arg, pointer_arg, RunIo};
use crate::ast::Pos;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::memory::Memory;
use crate::value::Value;

/// Writes the rendered format string to the run's stdout and returns the
/// number of characters written.
pub fn printf(
    args: &[Value],
    pos: Pos,
    mem: &mut Memory,
    run_io: &mut RunIo,
) -> Result<Value, RuntimeError> {
    if args.is_empty() {
        return Err(RuntimeError::arity_error("printf", 1, 0, pos.line, pos.col));
    }
    let fmt_addr = pointer_arg("printf", args, 0, pos)?;
    let fmt = mem.read_c_string(fmt_addr).map_err(|k| at(k, pos))?;
    let rendered = render(&fmt, &args[1..], mem, pos)?;
    run_io.stdout.push_str(&rendered);
    Ok(Value::Int(rendered.len() as i64))
}

/// Writes one byte and returns it.
pub fn putchar(args: &[Value], pos: Pos, run_io: &mut RunIo) -> Result<Value, RuntimeError> {
    check_arity("putchar", 1, args, pos)?;
    let byte = int_arg("putchar", args, 0, pos)? as u8;
    run_io.stdout.push(byte as char);
    Ok(Value::Int(byte as i64))
}

/// Reads one byte from the run's stdin, or -1 at end of input.
pub fn getchar(args: &[Value], pos: Pos, run_io: &mut RunIo) -> Result<Value, RuntimeError> {
    check_arity("getchar", 0, args, pos)?;
    Ok(Value::Int(
        run_io.stdin.pop_front().map(|b| b as i64).unwrap_or(-1),
    ))
}

// ============================================================================
// Format machinery
// ============================================================================

#[derive(Debug, Default, Clone)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

struct ArgCursor<'a> {
    values: &'a [Value],
    next: usize,
    pos: Pos,
}

impl<'a> ArgCursor<'a> {
    fn take(&mut self) -> Result<&'a Value, RuntimeError> {
        let value = self.values.get(self.next).ok_or_else(|| {
            RuntimeError::arity_error(
                "printf",
                self.next + 1,
                self.values.len(),
                self.pos.line,
                self.pos.col,
            )
        })?;
        self.next += 1;
        Ok(value)
    }

    fn take_int(&mut self, what: &str) -> Result<i64, RuntimeError> {
        let value = self.take()?;
        value.as_int().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::TypeMismatch(format!(
                    "printf: {} expects an integer, got {}",
                    what,
                    value.type_name()
                )),
                self.pos.line,
                self.pos.col,
            )
        })
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(
            RuntimeErrorKind::TypeMismatch(message.into()),
            self.pos.line,
            self.pos.col,
        )
    }
}

fn render(fmt: &[u8], values: &[Value], mem: &Memory, pos: Pos) -> Result<String, RuntimeError> {
    let mut out = String::new();
    let mut args = ArgCursor {
        values,
        next: 0,
        pos,
    };
    let mut i = 0;
    while i < fmt.len() {
        if fmt[i] != b'%' {
            out.push(fmt[i] as char);
            i += 1;
            continue;
        }
        i += 1;
        let mut spec = Spec::default();

        // Flags, in any order and combination.
        while i < fmt.len() {
            match fmt[i] {
                b'-' => spec.minus = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'0' => spec.zero = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }

        // Width: digits or `*` (a negative `*` width means left-justify).
        if i < fmt.len() && fmt[i] == b'*' {
            i += 1;
            let w = args.take_int("'*' width")?;
            if w < 0 {
                spec.minus = true;
                spec.width = Some(-w as usize);
            } else {
                spec.width = Some(w as usize);
            }
        } else {
            let mut width = None;
            while i < fmt.len() && fmt[i].is_ascii_digit() {
                width = Some(width.unwrap_or(0) * 10 + (fmt[i] - b'0') as usize);
                i += 1;
            }
            spec.width = width;
        }

        // Precision: `.` then digits or `*` (negative means "none given").
        if i < fmt.len() && fmt[i] == b'.' {
            i += 1;
            if i < fmt.len() && fmt[i] == b'*' {
                i += 1;
                let p = args.take_int("'*' precision")?;
                spec.precision = if p < 0 { None } else { Some(p as usize) };
            } else {
                let mut precision = 0;
                while i < fmt.len() && fmt[i].is_ascii_digit() {
                    precision = precision * 10 + (fmt[i] - b'0') as usize;
                    i += 1;
                }
                spec.precision = Some(precision);
            }
        }

        // Length modifier: all integers are 64-bit already.
        while i < fmt.len() && fmt[i] == b'l' {
            i += 1;
        }

        if i >= fmt.len() {
            return Err(args.error("printf: format string ends inside a conversion"));
        }
        let conv = fmt[i];
        i += 1;

        let piece = match conv {
            b'%' => "%".to_string(),
            b'd' | b'i' => format_signed(&spec, args.take_int("%d")?),
            b'u' => format_unsigned(&spec, args.take_int("%u")? as u64, 10, false),
            b'o' => format_unsigned(&spec, args.take_int("%o")? as u64, 8, false),
            b'x' => format_unsigned(&spec, args.take_int("%x")? as u64, 16, false),
            b'X' => format_unsigned(&spec, args.take_int("%X")? as u64, 16, true),
            b'c' => pad_text(&spec, &((args.take_int("%c")? as u8) as char).to_string()),
            b's' => {
                let value = args.take()?;
                let addr = match value {
                    Value::Pointer { addr, .. } => *addr,
                    other => {
                        return Err(args.error(format!(
                            "printf: %s expects a pointer, got {}",
                            other.type_name()
                        )))
                    }
                };
                let mut bytes = mem.read_c_string(addr).map_err(|k| at(k, pos))?;
                if let Some(p) = spec.precision {
                    bytes.truncate(p);
                }
                let text: String = bytes.iter().map(|&b| b as char).collect();
                pad_text(&spec, &text)
            }
            b'f' => format_fixed(&spec, float_conversion_arg(&mut args, "%f")?),
            b'e' => format_exponential(&spec, float_conversion_arg(&mut args, "%e")?),
            b'g' => format_general(&spec, float_conversion_arg(&mut args, "%g")?),
            other => {
                return Err(args.error(format!(
                    "printf: unknown conversion specifier '%{}'",
                    other as char
                )))
            }
        };
        out.push_str(&piece);
    }
    Ok(out)
}

fn float_conversion_arg(args: &mut ArgCursor<'_>, what: &str) -> Result<f64, RuntimeError> {
    let value = args.take()?;
    value.as_float().ok_or_else(|| {
        args.error(format!(
            "printf: {} expects a number, got {}",
            what,
            value.type_name()
        ))
    })
}

fn sign_str(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

/// Width padding around an already-rendered number. `head` carries the
/// sign and any base prefix so zero fill lands after them.
fn pad_number(spec: &Spec, head: &str, body: &str) -> String {
    let content = head.len() + body.len();
    match spec.width {
        Some(w) if w > content => {
            let fill = w - content;
            if spec.minus {
                format!("{}{}{}", head, body, " ".repeat(fill))
            } else if spec.zero && spec.precision.is_none() {
                format!("{}{}{}", head, "0".repeat(fill), body)
            } else {
                format!("{}{}{}", " ".repeat(fill), head, body)
            }
        }
        _ => format!("{}{}", head, body),
    }
}

fn pad_text(spec: &Spec, text: &str) -> String {
    match spec.width {
        Some(w) if w > text.len() => {
            let fill = " ".repeat(w - text.len());
            if spec.minus {
                format!("{}{}", text, fill)
            } else {
                format!("{}{}", fill, text)
            }
        }
        _ => text.to_string(),
    }
}

/// Applies an integer precision: minimum digit count, and the C oddity
/// that a zero value with zero precision prints nothing.
fn apply_precision(spec: &Spec, digits: String) -> String {
    match spec.precision {
        Some(0) if digits == "0" => String::new(),
        Some(p) if digits.len() < p => format!("{}{}", "0".repeat(p - digits.len()), digits),
        _ => digits,
    }
}

fn to_radix(mut n: u64, base: u64, upper: bool) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let table: &[u8; 16] = if upper {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(table[(n % base) as usize]);
        n /= base;
    }
    buf.reverse();
    buf.iter().map(|&b| b as char).collect()
}

fn format_signed(spec: &Spec, value: i64) -> String {
    let digits = apply_precision(spec, value.unsigned_abs().to_string());
    pad_number(spec, sign_str(spec, value < 0), &digits)
}

fn format_unsigned(spec: &Spec, value: u64, base: u64, upper: bool) -> String {
    let mut digits = apply_precision(spec, to_radix(value, base, upper));
    let mut head = String::new();
    if spec.alt {
        match base {
            8 if !digits.starts_with('0') => digits.insert(0, '0'),
            16 if value != 0 => head.push_str(if upper { "0X" } else { "0x" }),
            _ => {}
        }
    }
    pad_number(spec, &head, &digits)
}

fn format_fixed(spec: &Spec, value: f64) -> String {
    let precision = spec.precision.unwrap_or(6);
    let mut body = format!("{:.*}", precision, value.abs());
    if spec.alt && precision == 0 {
        body.push('.');
    }
    pad_float(spec, sign_str(spec, value.is_sign_negative()), &body)
}

/// `%e` with a C-style two-digit, signed exponent.
fn format_exponential(spec: &Spec, value: f64) -> String {
    let precision = spec.precision.unwrap_or(6);
    let body = exponential_body(value.abs(), precision, spec.alt);
    pad_float(spec, sign_str(spec, value.is_sign_negative()), &body)
}

fn exponential_body(magnitude: f64, precision: usize, alt: bool) -> String {
    let raw = format!("{:.*e}", precision, magnitude);
    let (mantissa, exponent) = raw.split_once('e').expect("exponential format contains 'e'");
    let exp: i32 = exponent.parse().expect("exponent is an integer");
    let mut mantissa = mantissa.to_string();
    if alt && precision == 0 {
        mantissa.push('.');
    }
    format!(
        "{}e{}{:02}",
        mantissa,
        if exp < 0 { '-' } else { '+' },
        exp.abs()
    )
}

/// `%g`: `%e` for exponents below -4 or at/above the precision, `%f`
/// otherwise, then trailing zeros dropped unless `#` keeps them.
fn format_general(spec: &Spec, value: f64) -> String {
    let precision = spec.precision.unwrap_or(6).max(1);
    let magnitude = value.abs();
    let exp = decimal_exponent(magnitude);
    let mut body = if exp >= -4 && (exp as i64) < precision as i64 {
        let frac_digits = (precision as i64 - 1 - exp as i64).max(0) as usize;
        format!("{:.*}", frac_digits, magnitude)
    } else {
        exponential_body(magnitude, precision - 1, spec.alt)
    };
    if !spec.alt {
        body = strip_trailing_zeros(body);
    }
    pad_float(spec, sign_str(spec, value.is_sign_negative()), &body)
}

fn decimal_exponent(magnitude: f64) -> i32 {
    if magnitude == 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let raw = format!("{:e}", magnitude);
    raw.split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0)
}

fn strip_trailing_zeros(body: String) -> String {
    match body.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
            format!("{}e{}", mantissa, exponent)
        }
        Some(_) => body,
        None if body.contains('.') => body
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string(),
        None => body,
    }
}

/// Zero-fill for floats is legal even with a precision, unlike integers.
fn pad_float(spec: &Spec, head: &str, body: &str) -> String {
    let content = head.len() + body.len();
    match spec.width {
        Some(w) if w > content => {
            let fill = w - content;
            if spec.minus {
                format!("{}{}{}", head, body, " ".repeat(fill))
            } else if spec.zero {
                format!("{}{}{}", head, "0".repeat(fill), body)
            } else {
                format!("{}{}{}", " ".repeat(fill), head, body)
            }
        }
        _ => format!("{}{}", head, body),
    }
}
