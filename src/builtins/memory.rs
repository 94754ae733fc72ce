//! Heap management: malloc, free, realloc
//!
//! - `malloc(n)`: pointer to `char`, or null for `n == 0`
//! - `free(p)`: no-op on null, `InvalidFree`/`DoubleFree` otherwise misused
//! - `realloc(p, n)`: fresh allocation carrying `min(old, n)` bytes

use super::{at, check_arity, int_arg, pointer_arg};
use crate::ast::Pos;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::memory::{AllocKind, Memory, NULL};
use crate::value::{Type, Value};

fn char_pointer(addr: usize) -> Value {
    Value::Pointer {
        addr,
        pointee: Type::Char,
    }
}

fn size_arg(function: &str, args: &[Value], index: usize, pos: Pos) -> Result<usize, RuntimeError> {
    let n = int_arg(function, args, index, pos)?;
    if n < 0 {
        return Err(RuntimeError::new(
            RuntimeErrorKind::TypeMismatch(format!("{}: negative size {}", function, n)),
            pos.line,
            pos.col,
        ));
    }
    Ok(n as usize)
}

pub fn malloc(args: &[Value], pos: Pos, mem: &mut Memory) -> Result<Value, RuntimeError> {
    check_arity("malloc", 1, args, pos)?;
    let nbytes = size_arg("malloc", args, 0, pos)?;
    if nbytes == 0 {
        return Ok(char_pointer(NULL));
    }
    let addr = mem
        .allocate(nbytes, AllocKind::Heap, pos.line, pos.col)
        .map_err(|k| at(k, pos))?;
    Ok(char_pointer(addr))
}

pub fn free(args: &[Value], pos: Pos, mem: &mut Memory) -> Result<Value, RuntimeError> {
    check_arity("free", 1, args, pos)?;
    let addr = pointer_arg("free", args, 0, pos)?;
    if addr == NULL {
        return Ok(Value::Void);
    }
    mem.free(addr).map_err(|k| at(k, pos))?;
    Ok(Value::Void)
}

pub fn realloc(args: &[Value], pos: Pos, mem: &mut Memory) -> Result<Value, RuntimeError> {
    check_arity("realloc", 2, args, pos)?;
    let addr = pointer_arg("realloc", args, 0, pos)?;
    let nbytes = size_arg("realloc", args, 1, pos)?;
    if nbytes == 0 {
        if addr != NULL {
            mem.free(addr).map_err(|k| at(k, pos))?;
        }
        return Ok(char_pointer(NULL));
    }
    let new_addr = mem
        .reallocate(addr, nbytes, pos.line, pos.col)
        .map_err(|k| at(k, pos))?;
    Ok(char_pointer(new_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new(1, 1)
    }

    #[test]
    fn test_malloc_zero_returns_null() {
        let mut mem = Memory::new(1 << 20);
        assert_eq!(
            malloc(&[Value::Int(0)], pos(), &mut mem).unwrap(),
            char_pointer(NULL)
        );
    }

    #[test]
    fn test_malloc_free_cycle() {
        let mut mem = Memory::new(1 << 20);
        let p = malloc(&[Value::Int(16)], pos(), &mut mem).unwrap();
        let addr = match &p {
            Value::Pointer { addr, .. } => *addr,
            other => panic!("expected pointer, got {:?}", other),
        };
        assert!(mem.allocation(addr).unwrap().live);
        free(&[p.clone()], pos(), &mut mem).unwrap();
        assert!(!mem.allocation(addr).unwrap().live);
        let err = free(&[p], pos(), &mut mem).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::DoubleFree(_)));
    }

    #[test]
    fn test_free_null_is_a_no_op() {
        let mut mem = Memory::new(1 << 20);
        assert_eq!(
            free(&[char_pointer(NULL)], pos(), &mut mem).unwrap(),
            Value::Void
        );
    }

    #[test]
    fn test_realloc_null_behaves_as_malloc() {
        let mut mem = Memory::new(1 << 20);
        let p = realloc(&[char_pointer(NULL), Value::Int(8)], pos(), &mut mem).unwrap();
        assert!(matches!(p, Value::Pointer { addr, .. } if addr != NULL));
    }

    #[test]
    fn test_realloc_preserves_written_prefix() {
        let mut mem = Memory::new(1 << 20);
        let p = malloc(&[Value::Int(4)], pos(), &mut mem).unwrap();
        let addr = match &p {
            Value::Pointer { addr, .. } => *addr,
            other => panic!("expected pointer, got {:?}", other),
        };
        for i in 0..4 {
            mem.write_byte(addr + i, i as u8 + 1).unwrap();
        }
        let q = realloc(&[p, Value::Int(16)], pos(), &mut mem).unwrap();
        let new_addr = match &q {
            Value::Pointer { addr, .. } => *addr,
            other => panic!("expected pointer, got {:?}", other),
        };
        for i in 0..4 {
            assert_eq!(mem.read_byte(new_addr + i).unwrap(), i as u8 + 1);
        }
    }

    #[test]
    fn test_realloc_to_zero_frees() {
        let mut mem = Memory::new(1 << 20);
        let p = malloc(&[Value::Int(4)], pos(), &mut mem).unwrap();
        let addr = match &p {
            Value::Pointer { addr, .. } => *addr,
            other => panic!("expected pointer, got {:?}", other),
        };
        let q = realloc(&[p, Value::Int(0)], pos(), &mut mem).unwrap();
        assert_eq!(q, char_pointer(NULL));
        assert!(!mem.allocation(addr).unwrap().live);
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let mut mem = Memory::new(1 << 20);
        let err = malloc(&[Value::Int(-1)], pos(), &mut mem).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::TypeMismatch(_)));
    }
}
