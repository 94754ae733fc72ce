// ABOUTME: Type and value representations for interpreted C programs

use crate::error::RuntimeErrorKind;
use std::fmt;

/// The closed set of C types the interpreter models. No user-defined types.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Char,
    Void,
    Pointer(Box<Type>),
    Array(Box<Type>, usize),
    Function { params: Vec<Type>, ret: Box<Type> },
}

impl Type {
    /// Fixed, platform-independent sizes: char=1, int=4, float=4, pointer=8.
    pub fn size_of(&self) -> usize {
        match self {
            Type::Char => 1,
            Type::Int => 4,
            Type::Float => 4,
            Type::Void => 0,
            Type::Pointer(_) => 8,
            Type::Array(elem, n) => elem.size_of() * n,
            Type::Function { .. } => 8,
        }
    }

    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    /// Array-to-pointer decay at the type level.
    pub fn decayed(self) -> Type {
        match self {
            Type::Array(elem, _) => Type::Pointer(elem),
            other => other,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Float | Type::Char | Type::Pointer(_)
        )
    }

    /// The zero value a declared-but-uninitialised object reads back as.
    pub fn zero_value(&self) -> Value {
        match self {
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Char => Value::Char(0),
            Type::Pointer(t) => Value::Pointer {
                addr: 0,
                pointee: (**t).clone(),
            },
            _ => Value::Void,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Char => write!(f, "char"),
            Type::Void => write!(f, "void"),
            Type::Pointer(t) => write!(f, "{}*", t),
            Type::Array(t, n) => write!(f, "{}[{}]", t, n),
            Type::Function { params, ret } => {
                write!(f, "{}(", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Runtime values. Integers are 64-bit internally and truncated to the
/// declared width on store; floats are f64 internally and truncated to
/// f32 bits on store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Char(u8),
    /// `(address, pointee type)` into the simulated heap; address 0 is null.
    Pointer { addr: usize, pointee: Type },
    /// `(address, element type, length)`; decays to a pointer in rvalue
    /// contexts except under `sizeof` and `&`.
    Array { addr: usize, elem: Type, len: usize },
    Void,
}

impl Value {
    pub fn type_name(&self) -> String {
        self.c_type().to_string()
    }

    /// The C type this value carries.
    pub fn c_type(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Char(_) => Type::Char,
            Value::Pointer { pointee, .. } => Type::Pointer(Box::new(pointee.clone())),
            Value::Array { elem, len, .. } => Type::Array(Box::new(elem.clone()), *len),
            Value::Void => Type::Void,
        }
    }

    /// C truth: nonzero scalar. Arrays decay before this is asked.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Char(c) => *c != 0,
            Value::Pointer { addr, .. } => *addr != 0,
            Value::Array { .. } => true,
            Value::Void => false,
        }
    }

    /// Numeric view as i64, truncating floats toward zero.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Char(c) => Some(*c as i64),
            Value::Float(x) => Some(*x as i64),
            _ => None,
        }
    }

    /// Numeric view as f64.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Char(c) => Some(*c as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Implicit conversion to `target`, as applied by assignment, argument
    /// passing, `return`, and casts. Fails where C would reject the pair.
    pub fn convert(&self, target: &Type) -> Result<Value, RuntimeErrorKind> {
        let mismatch = || {
            RuntimeErrorKind::TypeMismatch(format!(
                "cannot convert {} to {}",
                self.type_name(),
                target
            ))
        };
        match target {
            Type::Int => match self {
                // Pointer-to-int round-trips the simulated address.
                Value::Pointer { addr, .. } => Ok(Value::Int(*addr as i64)),
                _ => self.as_int().map(Value::Int).ok_or_else(mismatch),
            },
            Type::Float => self.as_float().map(Value::Float).ok_or_else(mismatch),
            Type::Char => self
                .as_int()
                .map(|n| Value::Char(n as u8))
                .ok_or_else(mismatch),
            Type::Pointer(pointee) => match self {
                // Any pointer converts to any pointer type; the pointee
                // retags, the address is unchanged.
                Value::Pointer { addr, .. } => Ok(Value::Pointer {
                    addr: *addr,
                    pointee: (**pointee).clone(),
                }),
                Value::Array { addr, .. } => Ok(Value::Pointer {
                    addr: *addr,
                    pointee: (**pointee).clone(),
                }),
                // Only the null constant converts from integer.
                Value::Int(0) => Ok(Value::Pointer {
                    addr: 0,
                    pointee: (**pointee).clone(),
                }),
                _ => Err(mismatch()),
            },
            Type::Void => Ok(Value::Void),
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Char(c) => {
                let c = *c as char;
                if c.is_ascii_graphic() || c == ' ' {
                    write!(f, "'{}'", c)
                } else {
                    write!(f, "'\\x{:02x}'", c as u32)
                }
            }
            Value::Pointer { addr: 0, .. } => write!(f, "(nil)"),
            Value::Pointer { addr, .. } => write!(f, "{:#x}", addr),
            Value::Array { elem, len, .. } => write!(f, "<{}[{}]>", elem, len),
            Value::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_are_fixed() {
        assert_eq!(Type::Char.size_of(), 1);
        assert_eq!(Type::Int.size_of(), 4);
        assert_eq!(Type::Float.size_of(), 4);
        assert_eq!(Type::Int.pointer_to().size_of(), 8);
        assert_eq!(Type::Array(Box::new(Type::Int), 5).size_of(), 20);
        assert_eq!(
            Type::Array(Box::new(Type::Array(Box::new(Type::Char), 3)), 2).size_of(),
            6
        );
    }

    #[test]
    fn test_sizeof_pointer_is_always_eight() {
        let nested = Type::Array(Box::new(Type::Float), 16).pointer_to();
        assert_eq!(nested.size_of(), 8);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::Int.pointer_to().to_string(), "int*");
        assert_eq!(Type::Array(Box::new(Type::Char), 8).to_string(), "char[8]");
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Pointer { addr: 0, pointee: Type::Char }.is_truthy());
        assert!(Value::Pointer { addr: 64, pointee: Type::Char }.is_truthy());
    }

    #[test]
    fn test_convert_truncates_on_narrowing() {
        let v = Value::Int(0x1_0000_0041);
        match v.convert(&Type::Char) {
            Ok(Value::Char(c)) => assert_eq!(c, 0x41),
            other => panic!("expected Char, got {:?}", other),
        }

        let f = Value::Float(3.9);
        assert_eq!(f.convert(&Type::Int), Ok(Value::Int(3)));
    }

    #[test]
    fn test_convert_null_constant_to_pointer() {
        let null = Value::Int(0).convert(&Type::Char.pointer_to()).unwrap();
        assert_eq!(null, Value::Pointer { addr: 0, pointee: Type::Char });

        let nonzero = Value::Int(7).convert(&Type::Char.pointer_to());
        assert!(nonzero.is_err());
    }

    #[test]
    fn test_pointer_retags_across_pointer_types() {
        let p = Value::Pointer { addr: 128, pointee: Type::Char };
        match p.convert(&Type::Int.pointer_to()) {
            Ok(Value::Pointer { addr, pointee }) => {
                assert_eq!(addr, 128);
                assert_eq!(pointee, Type::Int);
            }
            other => panic!("expected pointer, got {:?}", other),
        }
    }
}
