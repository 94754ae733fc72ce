// ABOUTME: Tree-walking evaluator executing the AST against env and memory

use crate::ast::{
    BinOp, Declarator, Expr, ForInit, Initializer, Item, Pos, PostfixOp, Program, ReplForm, Stmt,
    UnOp,
};
use crate::builtins::{Builtin, RunIo};
use crate::env::{Env, FunctionEntry};
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::memory::{AllocKind, Memory, NULL};
use crate::value::{Type, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Statement outcome. `Break`/`Continue` are consumed by the enclosing
/// loop; `Return` by the enclosing call. Reaching the top of a function
/// body with a loop signal is `StrayControlFlow`.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break(Pos),
    Continue(Pos),
    Return(Value),
}

/// A storage location paired with the type stored there.
#[derive(Debug, Clone)]
struct Place {
    addr: usize,
    ty: Type,
}

/// One interpretation context: simulated heap, environment, and I/O.
/// Owned exclusively; concurrent interpretations use independent contexts.
#[derive(Debug, Clone)]
pub struct Interp {
    pub mem: Memory,
    pub env: Env,
    pub io: RunIo,
}

impl Interp {
    pub fn new(heap_limit: usize, stdin_text: Option<&str>) -> Self {
        Interp {
            mem: Memory::new(heap_limit),
            env: Env::new(),
            io: RunIo::new(stdin_text),
        }
    }

    /// Registers every function first (mutual recursion needs the whole
    /// table), then initialises globals in order, then runs `main` if it
    /// exists. Returns `main`'s value as the exit code.
    pub fn run_program(
        &mut self,
        program: &Program,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Option<i32>, RuntimeError> {
        let mut main_pos = None;
        for item in &program.items {
            if let Item::Function(def) = item {
                if def.name == "main" {
                    main_pos = Some(def.pos);
                }
                self.env
                    .define_function(def.clone())
                    .map_err(|k| err(k, def.pos))?;
            }
        }
        for item in &program.items {
            if let Item::Globals(decl) = item {
                for d in &decl.declarators {
                    self.exec_declarator(d, cancel)?;
                }
            }
        }
        match main_pos {
            Some(pos) => {
                let value = self.call_function("main", Vec::new(), pos, cancel)?;
                Ok(Some(value.as_int().unwrap_or(0) as i32))
            }
            None => Ok(None),
        }
    }

    /// Permissive top-level execution for the REPL. Returns the value of
    /// the fragment's final expression statement, if any.
    pub fn run_fragment(
        &mut self,
        forms: &[ReplForm],
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Option<Value>, RuntimeError> {
        let mut last = None;
        for form in forms {
            last = None;
            match form {
                ReplForm::Item(Item::Function(def)) => {
                    self.env
                        .define_function(def.clone())
                        .map_err(|k| err(k, def.pos))?;
                }
                ReplForm::Item(Item::Globals(decl)) => {
                    for d in &decl.declarators {
                        self.exec_declarator(d, cancel)?;
                    }
                }
                ReplForm::Stmt(Stmt::Expr(e, _)) => {
                    self.check_cancel(e.pos(), cancel)?;
                    let value = self.rvalue(e, cancel)?;
                    last = Some(value);
                }
                ReplForm::Stmt(stmt) => match self.eval_stmt(stmt, cancel)? {
                    Flow::Normal => {}
                    Flow::Break(pos) => {
                        return Err(err(RuntimeErrorKind::StrayControlFlow("break"), pos))
                    }
                    Flow::Continue(pos) => {
                        return Err(err(RuntimeErrorKind::StrayControlFlow("continue"), pos))
                    }
                    Flow::Return(_) => unreachable!("return outside a frame is rejected"),
                },
            }
        }
        Ok(last)
    }

    fn check_cancel(
        &self,
        pos: Pos,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<(), RuntimeError> {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(err(RuntimeErrorKind::Interrupted, pos));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn eval_stmt(
        &mut self,
        stmt: &Stmt,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Flow, RuntimeError> {
        // Cancellation is honoured at statement boundaries only.
        self.check_cancel(stmt.pos(), cancel)?;
        match stmt {
            Stmt::Empty(_) => Ok(Flow::Normal),
            Stmt::Expr(e, _) => {
                self.eval_expr(e, cancel)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(decl) => {
                for d in &decl.declarators {
                    self.exec_declarator(d, cancel)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts, _) => {
                self.env.push_scope();
                let result = self.exec_stmts(stmts, cancel);
                for addr in self.env.pop_scope() {
                    self.mem.release(addr);
                }
                result
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                if self.rvalue(cond, cancel)?.is_truthy() {
                    self.eval_stmt(then, cancel)
                } else if let Some(otherwise) = otherwise {
                    self.eval_stmt(otherwise, cancel)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body, pos } => {
                loop {
                    self.check_cancel(*pos, cancel)?;
                    if !self.rvalue(cond, cancel)?.is_truthy() {
                        break;
                    }
                    match self.eval_stmt(body, cancel)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond, pos } => {
                loop {
                    self.check_cancel(*pos, cancel)?;
                    match self.eval_stmt(body, cancel)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    if !self.rvalue(cond, cancel)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                pos,
            } => {
                // The init declaration gets its own scope around the loop.
                self.env.push_scope();
                let result = self.eval_for(init, cond, step, body, *pos, cancel);
                for addr in self.env.pop_scope() {
                    self.mem.release(addr);
                }
                result
            }
            Stmt::Return(value, pos) => {
                let ret = match self.env.return_type() {
                    Some(ret) => ret.clone(),
                    None => return Err(err(RuntimeErrorKind::StrayControlFlow("return"), *pos)),
                };
                let value = match value {
                    Some(e) => {
                        let v = self.rvalue(e, cancel)?;
                        v.convert(&ret).map_err(|k| err(k, e.pos()))?
                    }
                    None => ret.zero_value(),
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break(pos) => Ok(Flow::Break(*pos)),
            Stmt::Continue(pos) => Ok(Flow::Continue(*pos)),
        }
    }

    fn exec_stmts(
        &mut self,
        stmts: &[Stmt],
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.eval_stmt(stmt, cancel)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_for(
        &mut self,
        init: &Option<Box<ForInit>>,
        cond: &Option<Expr>,
        step: &Option<Expr>,
        body: &Stmt,
        pos: Pos,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Flow, RuntimeError> {
        match init.as_deref() {
            Some(ForInit::Decl(decl)) => {
                for d in &decl.declarators {
                    self.exec_declarator(d, cancel)?;
                }
            }
            Some(ForInit::Expr(e)) => {
                self.eval_expr(e, cancel)?;
            }
            None => {}
        }
        loop {
            self.check_cancel(pos, cancel)?;
            if let Some(cond) = cond {
                if !self.rvalue(cond, cancel)?.is_truthy() {
                    break;
                }
            }
            match self.eval_stmt(body, cancel)? {
                Flow::Normal | Flow::Continue(_) => {}
                Flow::Break(_) => break,
                ret @ Flow::Return(_) => return Ok(ret),
            }
            if let Some(step) = step {
                self.eval_expr(step, cancel)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn exec_declarator(
        &mut self,
        d: &Declarator,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<(), RuntimeError> {
        if matches!(d.ty, Type::Void) {
            return Err(err(
                RuntimeErrorKind::TypeMismatch(format!(
                    "cannot declare '{}' with type void",
                    d.name
                )),
                d.pos,
            ));
        }
        let addr = self
            .mem
            .allocate(d.ty.size_of(), AllocKind::Stack, d.pos.line, d.pos.col)
            .map_err(|k| err(k, d.pos))?;
        if let Err(kind) = self.env.declare(&d.name, d.ty.clone(), addr) {
            self.mem.release(addr);
            return Err(err(kind, d.pos));
        }
        match &d.init {
            // Storage is zero-filled on allocation, so an uninitialised
            // local reads as zero.
            None => Ok(()),
            Some(Initializer::Expr(e)) => {
                let value = self.rvalue(e, cancel)?;
                self.mem
                    .store(addr, &d.ty, &value)
                    .map_err(|k| err(k, e.pos()))
            }
            Some(list @ Initializer::List(..)) => self.init_object(addr, &d.ty, list, cancel),
        }
    }

    fn init_object(
        &mut self,
        addr: usize,
        ty: &Type,
        init: &Initializer,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<(), RuntimeError> {
        match (ty, init) {
            (Type::Array(elem, len), Initializer::List(items, pos)) => {
                if items.len() > *len {
                    return Err(err(
                        RuntimeErrorKind::InitializerOverflow {
                            given: items.len(),
                            len: *len,
                        },
                        *pos,
                    ));
                }
                // Missing tail elements stay zero.
                for (i, item) in items.iter().enumerate() {
                    self.init_object(addr + i * elem.size_of(), elem, item, cancel)?;
                }
                Ok(())
            }
            (Type::Array(..), Initializer::Expr(e)) => Err(err(
                RuntimeErrorKind::TypeMismatch(
                    "array elements of this dimension need a brace initializer".to_string(),
                ),
                e.pos(),
            )),
            // A scalar accepts `{ expr }`, as in C.
            (_, Initializer::List(items, pos)) => {
                if items.len() != 1 {
                    return Err(err(
                        RuntimeErrorKind::TypeMismatch(format!(
                            "scalar initializer takes one expression, got {}",
                            items.len()
                        )),
                        *pos,
                    ));
                }
                self.init_object(addr, ty, &items[0], cancel)
            }
            (_, Initializer::Expr(e)) => {
                let value = self.rvalue(e, cancel)?;
                self.mem
                    .store(addr, ty, &value)
                    .map_err(|k| err(k, e.pos()))
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Rvalue evaluation: like `eval_expr`, plus array-to-pointer decay.
    fn rvalue(
        &mut self,
        e: &Expr,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Value, RuntimeError> {
        Ok(decay(self.eval_expr(e, cancel)?))
    }

    fn eval_expr(
        &mut self,
        e: &Expr,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Value, RuntimeError> {
        match e {
            Expr::IntLit(n, _) => Ok(Value::Int(*n)),
            Expr::FloatLit(x, _) => Ok(Value::Float(*x)),
            Expr::CharLit(c, _) => Ok(Value::Char(*c)),
            Expr::StrLit(s, pos) => {
                let addr = self.mem.intern_string(s).map_err(|k| err(k, *pos))?;
                Ok(Value::Pointer {
                    addr,
                    pointee: Type::Char,
                })
            }
            Expr::Ident(name, pos) => {
                let binding = self
                    .env
                    .lookup(name)
                    .ok_or_else(|| err(RuntimeErrorKind::Undeclared(name.clone()), *pos))?
                    .clone();
                self.mem
                    .load(binding.addr, &binding.ty)
                    .map_err(|k| err(k, *pos))
            }
            Expr::Unary { op, operand, pos } => self.eval_unary(*op, operand, *pos, cancel),
            Expr::Postfix { op, operand, pos } => {
                let place = self.lvalue(operand, cancel)?;
                let old = self
                    .mem
                    .load(place.addr, &place.ty)
                    .map_err(|k| err(k, *pos))?;
                let delta = if *op == PostfixOp::Inc { 1 } else { -1 };
                let new = step_value(&old, delta, *pos)?;
                self.mem
                    .store(place.addr, &place.ty, &new)
                    .map_err(|k| err(k, *pos))?;
                Ok(old)
            }
            Expr::Binary { op, lhs, rhs, pos } => match op {
                BinOp::LogicalAnd => {
                    let l = self.rvalue(lhs, cancel)?;
                    if !l.is_truthy() {
                        return Ok(Value::Int(0));
                    }
                    let r = self.rvalue(rhs, cancel)?;
                    Ok(Value::Int(r.is_truthy() as i64))
                }
                BinOp::LogicalOr => {
                    let l = self.rvalue(lhs, cancel)?;
                    if l.is_truthy() {
                        return Ok(Value::Int(1));
                    }
                    let r = self.rvalue(rhs, cancel)?;
                    Ok(Value::Int(r.is_truthy() as i64))
                }
                _ => {
                    let l = self.rvalue(lhs, cancel)?;
                    let r = self.rvalue(rhs, cancel)?;
                    binary_op(*op, &l, &r, *pos)
                }
            },
            Expr::Assign {
                op,
                target,
                value,
                pos,
            } => {
                let place = self.lvalue(target, cancel)?;
                let mut rhs = self.rvalue(value, cancel)?;
                if let Some(op) = op {
                    let current = self
                        .mem
                        .load(place.addr, &place.ty)
                        .map_err(|k| err(k, *pos))?;
                    rhs = binary_op(*op, &decay(current), &rhs, *pos)?;
                }
                self.mem
                    .store(place.addr, &place.ty, &rhs)
                    .map_err(|k| err(k, *pos))?;
                // The value of the assignment is the stored (converted) one.
                self.mem
                    .load(place.addr, &place.ty)
                    .map_err(|k| err(k, *pos))
            }
            Expr::Index { base, index, pos } => {
                let place = self.index_place(base, index, *pos, cancel)?;
                self.mem
                    .load(place.addr, &place.ty)
                    .map_err(|k| err(k, *pos))
            }
            Expr::Call { callee, args, pos } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.rvalue(arg, cancel)?);
                }
                self.call_function(callee, values, *pos, cancel)
            }
            Expr::Cast { ty, operand, pos } => {
                let value = self.rvalue(operand, cancel)?;
                value.convert(ty).map_err(|k| err(k, *pos))
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
                ..
            } => {
                if self.rvalue(cond, cancel)?.is_truthy() {
                    self.eval_expr(then, cancel)
                } else {
                    self.eval_expr(otherwise, cancel)
                }
            }
            // sizeof computes the operand's type without evaluating it.
            Expr::SizeofExpr(operand, _) => {
                let ty = self.type_of(operand)?;
                Ok(Value::Int(ty.size_of() as i64))
            }
            Expr::SizeofType(ty, _) => Ok(Value::Int(ty.size_of() as i64)),
        }
    }

    fn eval_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        pos: Pos,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Value, RuntimeError> {
        match op {
            UnOp::Plus => match self.rvalue(operand, cancel)? {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Char(c) => Ok(Value::Int(c as i64)),
                Value::Float(x) => Ok(Value::Float(x)),
                other => Err(RuntimeError::type_error("a number", &other, pos.line, pos.col)),
            },
            UnOp::Neg => match self.rvalue(operand, cancel)? {
                Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                Value::Char(c) => Ok(Value::Int(-(c as i64))),
                Value::Float(x) => Ok(Value::Float(-x)),
                other => Err(RuntimeError::type_error("a number", &other, pos.line, pos.col)),
            },
            UnOp::Not => {
                let v = self.rvalue(operand, cancel)?;
                Ok(Value::Int(!v.is_truthy() as i64))
            }
            UnOp::BitNot => match self.rvalue(operand, cancel)? {
                Value::Int(n) => Ok(Value::Int(!n)),
                Value::Char(c) => Ok(Value::Int(!(c as i64))),
                other => Err(RuntimeError::type_error("an integer", &other, pos.line, pos.col)),
            },
            UnOp::PreInc | UnOp::PreDec => {
                let place = self.lvalue(operand, cancel)?;
                let old = self
                    .mem
                    .load(place.addr, &place.ty)
                    .map_err(|k| err(k, pos))?;
                let delta = if op == UnOp::PreInc { 1 } else { -1 };
                let new = step_value(&old, delta, pos)?;
                self.mem
                    .store(place.addr, &place.ty, &new)
                    .map_err(|k| err(k, pos))?;
                self.mem
                    .load(place.addr, &place.ty)
                    .map_err(|k| err(k, pos))
            }
            UnOp::Deref => {
                let v = self.rvalue(operand, cancel)?;
                match v {
                    Value::Pointer { addr: NULL, .. } => {
                        Err(err(RuntimeErrorKind::NullDereference, pos))
                    }
                    Value::Pointer { addr, pointee } => {
                        self.mem.load(addr, &pointee).map_err(|k| err(k, pos))
                    }
                    other => Err(RuntimeError::type_error(
                        "a pointer",
                        &other,
                        pos.line,
                        pos.col,
                    )),
                }
            }
            UnOp::AddrOf => {
                let place = self.lvalue(operand, cancel)?;
                Ok(Value::Pointer {
                    addr: place.addr,
                    pointee: place.ty,
                })
            }
        }
    }

    /// Lvalue evaluation: identifiers, `*p`, and `a[i]` designate storage.
    fn lvalue(
        &mut self,
        e: &Expr,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Place, RuntimeError> {
        match e {
            Expr::Ident(name, pos) => {
                let binding = self
                    .env
                    .lookup(name)
                    .ok_or_else(|| err(RuntimeErrorKind::Undeclared(name.clone()), *pos))?;
                Ok(Place {
                    addr: binding.addr,
                    ty: binding.ty.clone(),
                })
            }
            Expr::Unary {
                op: UnOp::Deref,
                operand,
                pos,
            } => {
                let v = self.rvalue(operand, cancel)?;
                match v {
                    Value::Pointer { addr: NULL, .. } => {
                        Err(err(RuntimeErrorKind::NullDereference, *pos))
                    }
                    Value::Pointer { addr, pointee } => Ok(Place { addr, ty: pointee }),
                    other => Err(RuntimeError::type_error(
                        "a pointer",
                        &other,
                        pos.line,
                        pos.col,
                    )),
                }
            }
            Expr::Index { base, index, pos } => self.index_place(base, index, *pos, cancel),
            other => Err(err(
                RuntimeErrorKind::TypeMismatch("expression is not an lvalue".to_string()),
                other.pos(),
            )),
        }
    }

    /// `a[i]` over an array handle (bounds-checked) or a pointer (range
    /// checked at access time).
    fn index_place(
        &mut self,
        base: &Expr,
        index: &Expr,
        pos: Pos,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Place, RuntimeError> {
        let base_value = self.eval_expr(base, cancel)?;
        let idx = self
            .rvalue(index, cancel)?
            .as_int()
            .ok_or_else(|| {
                err(
                    RuntimeErrorKind::TypeMismatch("array index must be an integer".to_string()),
                    pos,
                )
            })?;
        match base_value {
            Value::Array { addr, elem, len } => {
                if idx < 0 || idx as usize >= len {
                    return Err(err(
                        RuntimeErrorKind::IndexOutOfBounds { index: idx, len },
                        pos,
                    ));
                }
                Ok(Place {
                    addr: addr + idx as usize * elem.size_of(),
                    ty: elem,
                })
            }
            Value::Pointer { addr: NULL, .. } => Err(err(RuntimeErrorKind::NullDereference, pos)),
            Value::Pointer { addr, pointee } => {
                let target = addr as i64 + idx * pointee.size_of() as i64;
                if target < 0 {
                    return Err(err(
                        RuntimeErrorKind::SegFault(format!(
                            "pointer index {} underflows the address space",
                            idx
                        )),
                        pos,
                    ));
                }
                Ok(Place {
                    addr: target as usize,
                    ty: pointee,
                })
            }
            other => Err(RuntimeError::type_error(
                "an array or pointer",
                &other,
                pos.line,
                pos.col,
            )),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call protocol: arguments are already evaluated left to right; a
    /// fresh frame rooted at the globals receives the converted values.
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
        pos: Pos,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Value, RuntimeError> {
        let entry = match self.env.lookup_function(name) {
            Some(entry) => entry,
            None if self.env.lookup(name).is_some() => {
                return Err(err(RuntimeErrorKind::NotAFunction(name.to_string()), pos))
            }
            None => return Err(err(RuntimeErrorKind::Undeclared(name.to_string()), pos)),
        };
        match entry {
            FunctionEntry::Builtin(builtin) => builtin.call(&args, pos, &mut self.mem, &mut self.io),
            FunctionEntry::User(def) => {
                if args.len() != def.params.len() {
                    return Err(RuntimeError::arity_error(
                        name,
                        def.params.len(),
                        args.len(),
                        pos.line,
                        pos.col,
                    ));
                }
                self.env.push_frame(def.ret.clone());
                let result = self.run_call_body(&def, args, cancel);
                for addr in self.env.pop_frame() {
                    self.mem.release(addr);
                }
                let flow = result?;
                match flow {
                    Flow::Return(value) => Ok(value),
                    // Falling off the end returns the zero of the return
                    // type (0 for int-returning functions, void otherwise).
                    Flow::Normal => Ok(def.ret.zero_value()),
                    Flow::Break(p) => Err(err(RuntimeErrorKind::StrayControlFlow("break"), p)),
                    Flow::Continue(p) => {
                        Err(err(RuntimeErrorKind::StrayControlFlow("continue"), p))
                    }
                }
            }
        }
    }

    fn run_call_body(
        &mut self,
        def: &crate::ast::FunctionDef,
        args: Vec<Value>,
        cancel: Option<&Arc<AtomicBool>>,
    ) -> Result<Flow, RuntimeError> {
        for (param, arg) in def.params.iter().zip(args) {
            let addr = self
                .mem
                .allocate(
                    param.ty.size_of(),
                    AllocKind::Stack,
                    param.pos.line,
                    param.pos.col,
                )
                .map_err(|k| err(k, param.pos))?;
            self.mem
                .store(addr, &param.ty, &arg)
                .map_err(|k| err(k, param.pos))?;
            self.env
                .declare(&param.name, param.ty.clone(), addr)
                .map_err(|k| err(k, param.pos))?;
        }
        self.exec_stmts(&def.body, cancel)
    }

    // ========================================================================
    // Static-ish typing for sizeof
    // ========================================================================

    /// The type an expression would evaluate to, without evaluating it.
    /// `sizeof` must not run its operand's side effects.
    fn type_of(&self, e: &Expr) -> Result<Type, RuntimeError> {
        match e {
            Expr::IntLit(..) => Ok(Type::Int),
            Expr::FloatLit(..) => Ok(Type::Float),
            Expr::CharLit(..) => Ok(Type::Char),
            Expr::StrLit(s, _) => Ok(Type::Array(Box::new(Type::Char), s.len() + 1)),
            Expr::Ident(name, pos) => self
                .env
                .lookup(name)
                .map(|b| b.ty.clone())
                .ok_or_else(|| err(RuntimeErrorKind::Undeclared(name.clone()), *pos)),
            Expr::Unary { op, operand, pos } => match op {
                UnOp::Not => Ok(Type::Int),
                UnOp::Plus | UnOp::Neg | UnOp::BitNot => Ok(promote(self.type_of(operand)?)),
                UnOp::PreInc | UnOp::PreDec => self.type_of(operand),
                UnOp::AddrOf => Ok(self.type_of(operand)?.pointer_to()),
                UnOp::Deref => match self.type_of(operand)?.decayed() {
                    Type::Pointer(t) => Ok(*t),
                    other => Err(err(
                        RuntimeErrorKind::TypeMismatch(format!(
                            "cannot dereference a value of type {}",
                            other
                        )),
                        *pos,
                    )),
                },
            },
            Expr::Postfix { operand, .. } => self.type_of(operand),
            Expr::Binary { op, lhs, rhs, .. } => match op {
                BinOp::Eq
                | BinOp::Ne
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge
                | BinOp::LogicalAnd
                | BinOp::LogicalOr => Ok(Type::Int),
                _ => {
                    let l = self.type_of(lhs)?.decayed();
                    let r = self.type_of(rhs)?.decayed();
                    Ok(combine(l, r))
                }
            },
            Expr::Assign { target, .. } => self.type_of(target),
            Expr::Index { base, pos, .. } => match self.type_of(base)?.decayed() {
                Type::Pointer(t) => Ok(*t),
                other => Err(err(
                    RuntimeErrorKind::TypeMismatch(format!(
                        "cannot index a value of type {}",
                        other
                    )),
                    *pos,
                )),
            },
            Expr::Call { callee, pos, .. } => match self.env.lookup_function(callee) {
                Some(FunctionEntry::User(def)) => Ok(def.ret.clone()),
                Some(FunctionEntry::Builtin(b)) => Ok(builtin_return_type(b)),
                None => Err(err(RuntimeErrorKind::Undeclared(callee.clone()), *pos)),
            },
            Expr::Cast { ty, .. } => Ok(ty.clone()),
            Expr::Ternary { then, .. } => self.type_of(then),
            Expr::SizeofExpr(..) | Expr::SizeofType(..) => Ok(Type::Int),
        }
    }
}

fn builtin_return_type(b: Builtin) -> Type {
    match b {
        Builtin::Strcpy | Builtin::Malloc | Builtin::Realloc => Type::Char.pointer_to(),
        Builtin::Free => Type::Void,
        _ => Type::Int,
    }
}

fn promote(ty: Type) -> Type {
    match ty {
        Type::Char => Type::Int,
        other => other,
    }
}

fn combine(l: Type, r: Type) -> Type {
    if matches!(l, Type::Pointer(_)) {
        return l;
    }
    if matches!(r, Type::Pointer(_)) {
        return r;
    }
    if l == Type::Float || r == Type::Float {
        Type::Float
    } else {
        Type::Int
    }
}

fn err(kind: RuntimeErrorKind, pos: Pos) -> RuntimeError {
    RuntimeError::new(kind, pos.line, pos.col)
}

fn decay(v: Value) -> Value {
    match v {
        Value::Array { addr, elem, .. } => Value::Pointer {
            addr,
            pointee: elem,
        },
        other => other,
    }
}

/// `++`/`--` stepping: numbers move by one, pointers by one pointee.
fn step_value(v: &Value, delta: i64, pos: Pos) -> Result<Value, RuntimeError> {
    match v {
        Value::Int(n) => Ok(Value::Int(n.wrapping_add(delta))),
        Value::Char(c) => Ok(Value::Int(*c as i64 + delta)),
        Value::Float(x) => Ok(Value::Float(x + delta as f64)),
        Value::Pointer { addr, pointee } => {
            let target = *addr as i64 + delta * pointee.size_of() as i64;
            if target < 0 {
                return Err(err(
                    RuntimeErrorKind::SegFault("pointer arithmetic underflow".to_string()),
                    pos,
                ));
            }
            Ok(Value::Pointer {
                addr: target as usize,
                pointee: pointee.clone(),
            })
        }
        other => Err(RuntimeError::type_error(
            "a number or pointer",
            other,
            pos.line,
            pos.col,
        )),
    }
}

/// Binary operators over decayed rvalues, with the promotion rules of the
/// value model: int/char arithmetic in i64, any float operand promotes
/// both sides, pointer arithmetic scales by the pointee size.
fn binary_op(op: BinOp, lhs: &Value, rhs: &Value, pos: Pos) -> Result<Value, RuntimeError> {
    use BinOp::*;
    match op {
        Add => match (lhs, rhs) {
            (Value::Pointer { addr, pointee }, _) if as_strict_int(rhs).is_some() => {
                pointer_offset(*addr, pointee, as_strict_int(rhs).expect("checked"), pos)
            }
            (_, Value::Pointer { addr, pointee }) if as_strict_int(lhs).is_some() => {
                pointer_offset(*addr, pointee, as_strict_int(lhs).expect("checked"), pos)
            }
            _ => numeric_op(op, lhs, rhs, pos),
        },
        Sub => match (lhs, rhs) {
            (Value::Pointer { addr, pointee }, _) if as_strict_int(rhs).is_some() => {
                pointer_offset(*addr, pointee, -as_strict_int(rhs).expect("checked"), pos)
            }
            (
                Value::Pointer {
                    addr: a,
                    pointee: ta,
                },
                Value::Pointer {
                    addr: b,
                    pointee: tb,
                },
            ) => {
                let size = ta.size_of() as i64;
                if ta != tb || size == 0 {
                    return Err(RuntimeError::bad_operands(
                        "-",
                        &ta.clone().pointer_to(),
                        &tb.clone().pointer_to(),
                        pos.line,
                        pos.col,
                    ));
                }
                Ok(Value::Int((*a as i64 - *b as i64) / size))
            }
            _ => numeric_op(op, lhs, rhs, pos),
        },
        Eq | Ne | Lt | Le | Gt | Ge => comparison_op(op, lhs, rhs, pos),
        Mul | Div => numeric_op(op, lhs, rhs, pos),
        Rem | BitAnd | BitOr | BitXor | Shl | Shr => integer_op(op, lhs, rhs, pos),
        LogicalAnd | LogicalOr => unreachable!("short-circuit operators are handled earlier"),
    }
}

fn pointer_offset(addr: usize, pointee: &Type, count: i64, pos: Pos) -> Result<Value, RuntimeError> {
    let target = addr as i64 + count * pointee.size_of() as i64;
    if target < 0 {
        return Err(err(
            RuntimeErrorKind::SegFault("pointer arithmetic underflow".to_string()),
            pos,
        ));
    }
    Ok(Value::Pointer {
        addr: target as usize,
        pointee: pointee.clone(),
    })
}

fn numeric_op(op: BinOp, lhs: &Value, rhs: &Value, pos: Pos) -> Result<Value, RuntimeError> {
    let float = matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_));
    if float {
        let (l, r) = match (lhs.as_float(), rhs.as_float()) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                return Err(RuntimeError::bad_operands(
                    op.symbol(),
                    &lhs.c_type(),
                    &rhs.c_type(),
                    pos.line,
                    pos.col,
                ))
            }
        };
        let result = match op {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => l / r,
            _ => unreachable!("numeric_op only handles arithmetic"),
        };
        return Ok(Value::Float(result));
    }
    let (l, r) = match (lhs.as_int(), rhs.as_int()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(RuntimeError::bad_operands(
                op.symbol(),
                &lhs.c_type(),
                &rhs.c_type(),
                pos.line,
                pos.col,
            ))
        }
    };
    let result = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div => {
            if r == 0 {
                return Err(err(RuntimeErrorKind::DivisionByZero, pos));
            }
            l.wrapping_div(r)
        }
        _ => unreachable!("numeric_op only handles arithmetic"),
    };
    Ok(Value::Int(result))
}

fn integer_op(op: BinOp, lhs: &Value, rhs: &Value, pos: Pos) -> Result<Value, RuntimeError> {
    let (l, r) = match (as_strict_int(lhs), as_strict_int(rhs)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(RuntimeError::bad_operands(
                op.symbol(),
                &lhs.c_type(),
                &rhs.c_type(),
                pos.line,
                pos.col,
            ))
        }
    };
    let result = match op {
        BinOp::Rem => {
            if r == 0 {
                return Err(err(RuntimeErrorKind::DivisionByZero, pos));
            }
            l.wrapping_rem(r)
        }
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::Shl | BinOp::Shr => {
            if !(0..64).contains(&r) {
                return Err(err(RuntimeErrorKind::ShiftOutOfRange(r), pos));
            }
            if op == BinOp::Shl {
                l.wrapping_shl(r as u32)
            } else {
                l.wrapping_shr(r as u32)
            }
        }
        _ => unreachable!("integer_op only handles integer operators"),
    };
    Ok(Value::Int(result))
}

/// Integer operands for `% & | ^ << >>`: floats are not silently truncated
/// here, unlike assignment conversions.
fn as_strict_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(n) => Some(*n),
        Value::Char(c) => Some(*c as i64),
        _ => None,
    }
}

fn comparison_op(op: BinOp, lhs: &Value, rhs: &Value, pos: Pos) -> Result<Value, RuntimeError> {
    use std::cmp::Ordering as Ord_;
    let ordering = match (lhs, rhs) {
        (Value::Pointer { addr: a, .. }, Value::Pointer { addr: b, .. }) => a.cmp(b),
        (Value::Pointer { addr, .. }, _) if rhs.as_int().is_some() => {
            (*addr as i64).cmp(&rhs.as_int().expect("checked"))
        }
        (_, Value::Pointer { addr, .. }) if lhs.as_int().is_some() => {
            lhs.as_int().expect("checked").cmp(&(*addr as i64))
        }
        _ => {
            let float = matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_));
            if float {
                match (lhs.as_float(), rhs.as_float()) {
                    (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ord_::Greater),
                    _ => {
                        return Err(RuntimeError::bad_operands(
                            op.symbol(),
                            &lhs.c_type(),
                            &rhs.c_type(),
                            pos.line,
                            pos.col,
                        ))
                    }
                }
            } else {
                match (lhs.as_int(), rhs.as_int()) {
                    (Some(l), Some(r)) => l.cmp(&r),
                    _ => {
                        return Err(RuntimeError::bad_operands(
                            op.symbol(),
                            &lhs.c_type(),
                            &rhs.c_type(),
                            pos.line,
                            pos.col,
                        ))
                    }
                }
            }
        }
    };
    let truth = match op {
        BinOp::Eq => ordering == Ord_::Equal,
        BinOp::Ne => ordering != Ord_::Equal,
        BinOp::Lt => ordering == Ord_::Less,
        BinOp::Le => ordering != Ord_::Greater,
        BinOp::Gt => ordering == Ord_::Greater,
        BinOp::Ge => ordering != Ord_::Less,
        _ => unreachable!("comparison_op only handles comparisons"),
    };
    Ok(Value::Int(truth as i64))
}
