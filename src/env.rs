// ABOUTME: Lexical scopes, call frames, and the global function table

use crate::ast::FunctionDef;
use crate::builtins::Builtin;
use crate::error::RuntimeErrorKind;
use crate::value::Type;
use std::collections::HashMap;
use std::rc::Rc;

/// A declared name: its type and where its storage lives.
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub addr: usize,
}

/// An entry in the global function table. Builtins are first-class entries
/// distinguished by the tag; the evaluator branches once per call.
#[derive(Debug, Clone)]
pub enum FunctionEntry {
    User(Rc<FunctionDef>),
    Builtin(Builtin),
}

#[derive(Debug, Clone, Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
    /// Addresses of this scope's locals, released when the scope dies.
    owned: Vec<usize>,
}

/// One activation record: a stack of scopes plus the declared return type.
#[derive(Debug, Clone)]
pub struct Frame {
    scopes: Vec<Scope>,
    pub ret: Type,
}

impl Frame {
    fn new(ret: Type) -> Self {
        Frame {
            scopes: vec![Scope::default()],
            ret,
        }
    }
}

/// The environment: a global frame that lives for the whole run, and a
/// stack of call frames rooted at it. Lookups walk the current frame's
/// scopes inside-out and then the globals; callers never see their
/// caller's locals.
#[derive(Debug, Clone)]
pub struct Env {
    global: Frame,
    frames: Vec<Frame>,
    functions: HashMap<String, FunctionEntry>,
}

impl Env {
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        for builtin in Builtin::ALL {
            functions.insert(builtin.name().to_string(), FunctionEntry::Builtin(builtin));
        }
        Env {
            global: Frame::new(Type::Void),
            frames: Vec::new(),
            functions,
        }
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.global)
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().unwrap_or(&mut self.global)
    }

    /// Declares a name in the innermost scope. Shadowing an outer scope is
    /// fine; redeclaring within the same scope is not.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        addr: usize,
    ) -> Result<(), RuntimeErrorKind> {
        let scope = self
            .current_frame_mut()
            .scopes
            .last_mut()
            .expect("a frame always has at least one scope");
        if scope.bindings.contains_key(name) {
            return Err(RuntimeErrorKind::Redeclaration(name.to_string()));
        }
        scope.owned.push(addr);
        scope.bindings.insert(name.to_string(), Binding { ty, addr });
        Ok(())
    }

    /// Innermost match in the current frame, then the globals.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        for scope in self.current_frame().scopes.iter().rev() {
            if let Some(binding) = scope.bindings.get(name) {
                return Some(binding);
            }
        }
        if !self.frames.is_empty() {
            for scope in self.global.scopes.iter().rev() {
                if let Some(binding) = scope.bindings.get(name) {
                    return Some(binding);
                }
            }
        }
        None
    }

    pub fn push_scope(&mut self) {
        self.current_frame_mut().scopes.push(Scope::default());
    }

    /// Pops the innermost scope, returning the storage it owned.
    pub fn pop_scope(&mut self) -> Vec<usize> {
        let frame = self.current_frame_mut();
        debug_assert!(frame.scopes.len() > 1, "popping a frame's root scope");
        frame.scopes.pop().map(|s| s.owned).unwrap_or_default()
    }

    pub fn push_frame(&mut self, ret: Type) {
        self.frames.push(Frame::new(ret));
    }

    /// Pops the current call frame, returning all storage it owned.
    pub fn pop_frame(&mut self) -> Vec<usize> {
        self.frames
            .pop()
            .map(|f| f.scopes.into_iter().flat_map(|s| s.owned).collect())
            .unwrap_or_default()
    }

    /// The declared return type of the function being executed, if any.
    pub fn return_type(&self) -> Option<&Type> {
        self.frames.last().map(|f| &f.ret)
    }

    pub fn define_function(&mut self, def: FunctionDef) -> Result<(), RuntimeErrorKind> {
        if self.functions.contains_key(&def.name) {
            return Err(RuntimeErrorKind::Redeclaration(def.name.clone()));
        }
        self.functions
            .insert(def.name.clone(), FunctionEntry::User(Rc::new(def)));
        Ok(())
    }

    /// Function lookup resolves in the global function table only.
    pub fn lookup_function(&self, name: &str) -> Option<FunctionEntry> {
        self.functions.get(name).cloned()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
