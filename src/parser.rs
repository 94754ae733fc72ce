// ABOUTME: Recursive-descent parser with precedence climbing for expressions

use crate::ast::{
    BinOp, Declaration, Declarator, Expr, ForInit, FunctionDef, Initializer, Item, Param, Pos,
    PostfixOp, Program, ReplForm, Stmt, UnOp,
};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::value::Type;

/// Binding powers for the infix operators, lowest to tightest. Left
/// associativity is right = left + 1; the sole right-associative operators
/// (assignment, ternary) are handled outside the climbing loop.
mod bp {
    pub const MIN: u8 = 0;
    pub const LOGICAL_OR: u8 = 2;
    pub const LOGICAL_AND: u8 = 4;
    pub const BIT_OR: u8 = 6;
    pub const BIT_XOR: u8 = 8;
    pub const BIT_AND: u8 = 10;
    pub const EQUALITY: u8 = 12;
    pub const RELATIONAL: u8 = 14;
    pub const SHIFT: u8 = 16;
    pub const ADDITIVE: u8 = 18;
    pub const MULTIPLICATIVE: u8 = 20;
}

/// Parses a whole translation unit: function definitions and globals.
pub fn parse_program(tokens: Vec<Token>) -> Result<Program, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut items = Vec::new();
    while !parser.at_eof() {
        items.push(parser.item()?);
    }
    Ok(Program { items })
}

/// Permissive top-level mode for the REPL: accepts items and also bare
/// statements or expressions (the trailing `;` may be omitted on the last
/// expression of a fragment).
pub fn parse_fragment(tokens: Vec<Token>) -> Result<Vec<ReplForm>, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut forms = Vec::new();
    while !parser.at_eof() {
        forms.push(parser.repl_form()?);
    }
    Ok(forms)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof)
        ));
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn here(&self) -> Pos {
        Pos::new(self.peek().line, self.peek().col)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == &kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.to_string()))
        }
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError::new(token.line, token.col, expected, token.kind.to_string())
    }

    // ========================================================================
    // Items and declarations
    // ========================================================================

    fn item(&mut self) -> Result<Item, ParseError> {
        let pos = self.here();
        let base = self.type_specifier()?;
        let (ty, name, name_pos) = self.declarator_core(&base)?;
        if self.peek_kind() == &TokenKind::LParen {
            return Ok(Item::Function(self.function_def(ty, name, pos)?));
        }
        let decl = self.declaration_tail(base, ty, name, name_pos, pos)?;
        Ok(Item::Globals(decl))
    }

    fn type_specifier(&mut self) -> Result<Type, ParseError> {
        let ty = match self.peek_kind() {
            TokenKind::KwInt => Type::Int,
            TokenKind::KwFloat => Type::Float,
            TokenKind::KwChar => Type::Char,
            TokenKind::KwVoid => Type::Void,
            _ => return Err(self.unexpected("type specifier")),
        };
        self.advance();
        Ok(ty)
    }

    /// `*`-prefix and name of a declarator. One level of indirection only.
    fn declarator_core(&mut self, base: &Type) -> Result<(Type, String, Pos), ParseError> {
        let mut ty = base.clone();
        if self.eat(&TokenKind::Star) {
            if self.peek_kind() == &TokenKind::Star {
                return Err(self.unexpected("identifier (one level of indirection is supported)"));
            }
            ty = ty.pointer_to();
        }
        let pos = self.here();
        let name = self.identifier()?;
        Ok((ty, name, pos))
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `[N]` suffixes, innermost dimension last.
    fn array_dims(&mut self) -> Result<Vec<usize>, ParseError> {
        let mut dims = Vec::new();
        while self.eat(&TokenKind::LBracket) {
            let len = match self.peek_kind() {
                TokenKind::IntLit(n) if *n > 0 => *n as usize,
                _ => return Err(self.unexpected("positive integer array length")),
            };
            self.advance();
            self.expect(TokenKind::RBracket)?;
            dims.push(len);
        }
        Ok(dims)
    }

    fn apply_dims(ty: Type, dims: &[usize]) -> Type {
        dims.iter()
            .rev()
            .fold(ty, |inner, &n| Type::Array(Box::new(inner), n))
    }

    /// The rest of a variable declaration, after the first declarator's
    /// core has been consumed.
    fn declaration_tail(
        &mut self,
        base: Type,
        first_ty: Type,
        first_name: String,
        first_pos: Pos,
        pos: Pos,
    ) -> Result<Declaration, ParseError> {
        let mut declarators = Vec::new();
        declarators.push(self.finish_declarator(first_ty, first_name, first_pos)?);
        while self.eat(&TokenKind::Comma) {
            let (ty, name, name_pos) = self.declarator_core(&base)?;
            declarators.push(self.finish_declarator(ty, name, name_pos)?);
        }
        self.expect(TokenKind::Semi)?;
        Ok(Declaration { declarators, pos })
    }

    fn finish_declarator(
        &mut self,
        ty: Type,
        name: String,
        pos: Pos,
    ) -> Result<Declarator, ParseError> {
        let dims = self.array_dims()?;
        let ty = Self::apply_dims(ty, &dims);
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.initializer()?)
        } else {
            None
        };
        Ok(Declarator {
            name,
            ty,
            init,
            pos,
        })
    }

    fn initializer(&mut self) -> Result<Initializer, ParseError> {
        if self.peek_kind() != &TokenKind::LBrace {
            return Ok(Initializer::Expr(self.expr()?));
        }
        let pos = self.here();
        self.advance();
        let mut items = Vec::new();
        if !self.eat(&TokenKind::RBrace) {
            loop {
                items.push(self.initializer()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                // Trailing comma before the closing brace is allowed.
                if self.peek_kind() == &TokenKind::RBrace {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        }
        Ok(Initializer::List(items, pos))
    }

    fn declaration(&mut self) -> Result<Declaration, ParseError> {
        let pos = self.here();
        let base = self.type_specifier()?;
        let (ty, name, name_pos) = self.declarator_core(&base)?;
        self.declaration_tail(base, ty, name, name_pos, pos)
    }

    // ========================================================================
    // Function definitions
    // ========================================================================

    fn function_def(
        &mut self,
        ret: Type,
        name: String,
        pos: Pos,
    ) -> Result<FunctionDef, ParseError> {
        self.expect(TokenKind::LParen)?;
        let params = self.param_list()?;
        let body = self.block_body()?;
        Ok(FunctionDef {
            name,
            ret,
            params,
            body,
            pos,
        })
    }

    fn param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        if self.eat(&TokenKind::RParen) {
            return Ok(Vec::new());
        }
        if self.peek_kind() == &TokenKind::KwVoid && self.peek_at(1) == &TokenKind::RParen {
            self.advance();
            self.advance();
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            params.push(self.param()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    /// One parameter. An array declarator adjusts to a pointer, as in C:
    /// `int a[]` and `int a[8]` both declare `int *a`, and `int m[2][3]`
    /// declares a pointer to `int[3]`.
    fn param(&mut self) -> Result<Param, ParseError> {
        let base = self.type_specifier()?;
        let (mut ty, name, pos) = self.declarator_core(&base)?;
        if self.eat(&TokenKind::LBracket) {
            // Leading dimension may be empty; it is discarded either way.
            if let TokenKind::IntLit(n) = self.peek_kind() {
                if *n > 0 {
                    self.advance();
                }
            }
            self.expect(TokenKind::RBracket)?;
            let inner_dims = self.array_dims()?;
            ty = Self::apply_dims(ty, &inner_dims).pointer_to();
        }
        Ok(Param { ty, name, pos })
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.stmt()?);
        }
        Ok(stmts)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        let pos = self.here();
        if self.peek_kind().is_type_specifier() {
            return Ok(Stmt::Decl(self.declaration()?));
        }
        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.block_body()?, pos)),
            TokenKind::KwIf => self.if_stmt(pos),
            TokenKind::KwWhile => self.while_stmt(pos),
            TokenKind::KwDo => self.do_while_stmt(pos),
            TokenKind::KwFor => self.for_stmt(pos),
            TokenKind::KwReturn => {
                self.advance();
                let value = if self.peek_kind() == &TokenKind::Semi {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return(value, pos))
            }
            TokenKind::KwBreak => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Break(pos))
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Continue(pos))
            }
            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::Empty(pos))
            }
            _ => {
                let expr = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Expr(expr, pos))
            }
        }
    }

    fn if_stmt(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let then = Box::new(self.stmt()?);
        let otherwise = if self.eat(&TokenKind::KwElse) {
            Some(Box::new(self.stmt()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            pos,
        })
    }

    fn while_stmt(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.stmt()?);
        Ok(Stmt::While { cond, body, pos })
    }

    fn do_while_stmt(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        self.advance();
        let body = Box::new(self.stmt()?);
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::DoWhile { body, cond, pos })
    }

    fn for_stmt(&mut self, pos: Pos) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let init = if self.eat(&TokenKind::Semi) {
            None
        } else if self.peek_kind().is_type_specifier() {
            // The declaration consumes its own ';'.
            Some(Box::new(ForInit::Decl(self.declaration()?)))
        } else {
            let expr = self.expr()?;
            self.expect(TokenKind::Semi)?;
            Some(Box::new(ForInit::Expr(expr)))
        };
        let cond = if self.peek_kind() == &TokenKind::Semi {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(TokenKind::Semi)?;
        let step = if self.peek_kind() == &TokenKind::RParen {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.stmt()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            pos,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.ternary()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            TokenKind::StarAssign => Some(BinOp::Mul),
            TokenKind::SlashAssign => Some(BinOp::Div),
            TokenKind::PercentAssign => Some(BinOp::Rem),
            _ => return Ok(lhs),
        };
        let pos = self.here();
        self.advance();
        // Right-associative: a = b = c is a = (b = c).
        let value = self.expr()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(lhs),
            value: Box::new(value),
            pos,
        })
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.binary(bp::MIN)?;
        if self.peek_kind() != &TokenKind::Question {
            return Ok(cond);
        }
        let pos = self.here();
        self.advance();
        let then = self.expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
            pos,
        })
    }

    fn infix_binding_power(kind: &TokenKind) -> Option<(u8, BinOp)> {
        let entry = match kind {
            TokenKind::OrOr => (bp::LOGICAL_OR, BinOp::LogicalOr),
            TokenKind::AndAnd => (bp::LOGICAL_AND, BinOp::LogicalAnd),
            TokenKind::Pipe => (bp::BIT_OR, BinOp::BitOr),
            TokenKind::Caret => (bp::BIT_XOR, BinOp::BitXor),
            TokenKind::Amp => (bp::BIT_AND, BinOp::BitAnd),
            TokenKind::Eq => (bp::EQUALITY, BinOp::Eq),
            TokenKind::Ne => (bp::EQUALITY, BinOp::Ne),
            TokenKind::Lt => (bp::RELATIONAL, BinOp::Lt),
            TokenKind::Le => (bp::RELATIONAL, BinOp::Le),
            TokenKind::Gt => (bp::RELATIONAL, BinOp::Gt),
            TokenKind::Ge => (bp::RELATIONAL, BinOp::Ge),
            TokenKind::Shl => (bp::SHIFT, BinOp::Shl),
            TokenKind::Shr => (bp::SHIFT, BinOp::Shr),
            TokenKind::Plus => (bp::ADDITIVE, BinOp::Add),
            TokenKind::Minus => (bp::ADDITIVE, BinOp::Sub),
            TokenKind::Star => (bp::MULTIPLICATIVE, BinOp::Mul),
            TokenKind::Slash => (bp::MULTIPLICATIVE, BinOp::Div),
            TokenKind::Percent => (bp::MULTIPLICATIVE, BinOp::Rem),
            _ => return None,
        };
        Some(entry)
    }

    fn binary(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while let Some((l_bp, op)) = Self::infix_binding_power(self.peek_kind()) {
            if l_bp < min_bp {
                break;
            }
            let pos = self.here();
            self.advance();
            let rhs = self.binary(l_bp + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.here();
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::Amp => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, operand, pos });
        }
        if self.peek_kind() == &TokenKind::KwSizeof {
            return self.sizeof_expr(pos);
        }
        if self.peek_kind() == &TokenKind::LParen && self.peek_at(1).is_type_specifier() {
            self.advance();
            let ty = self.type_name()?;
            self.expect(TokenKind::RParen)?;
            let operand = Box::new(self.unary()?);
            return Ok(Expr::Cast { ty, operand, pos });
        }
        self.postfix()
    }

    /// A type name in a cast or `sizeof`: specifier, optional `*`, and
    /// optional array dimensions (for `sizeof(int[4])`).
    fn type_name(&mut self) -> Result<Type, ParseError> {
        let mut ty = self.type_specifier()?;
        if self.eat(&TokenKind::Star) {
            if self.peek_kind() == &TokenKind::Star {
                return Err(self.unexpected("')' (one level of indirection is supported)"));
            }
            ty = ty.pointer_to();
        }
        let dims = self.array_dims()?;
        Ok(Self::apply_dims(ty, &dims))
    }

    fn sizeof_expr(&mut self, pos: Pos) -> Result<Expr, ParseError> {
        self.advance();
        if self.peek_kind() == &TokenKind::LParen && self.peek_at(1).is_type_specifier() {
            self.advance();
            let ty = self.type_name()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::SizeofType(ty, pos));
        }
        let operand = Box::new(self.unary()?);
        Ok(Expr::SizeofExpr(operand, pos))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let callee = match &expr {
                        Expr::Ident(name, _) => name.clone(),
                        _ => return Err(self.unexpected("'[' or operator (only named functions are callable)")),
                    };
                    let pos = expr.pos();
                    self.advance();
                    let args = self.argument_list()?;
                    expr = Expr::Call { callee, args, pos };
                }
                TokenKind::LBracket => {
                    let pos = self.here();
                    self.advance();
                    let index = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                TokenKind::PlusPlus => {
                    let pos = self.here();
                    self.advance();
                    expr = Expr::Postfix {
                        op: PostfixOp::Inc,
                        operand: Box::new(expr),
                        pos,
                    };
                }
                TokenKind::MinusMinus => {
                    let pos = self.here();
                    self.advance();
                    expr = Expr::Postfix {
                        op: PostfixOp::Dec,
                        operand: Box::new(expr),
                        pos,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn argument_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.here();
        let expr = match self.peek_kind().clone() {
            TokenKind::IntLit(n) => {
                self.advance();
                Expr::IntLit(n, pos)
            }
            TokenKind::FloatLit(x) => {
                self.advance();
                Expr::FloatLit(x, pos)
            }
            TokenKind::CharLit(c) => {
                self.advance();
                Expr::CharLit(c, pos)
            }
            TokenKind::StrLit(s) => {
                self.advance();
                Expr::StrLit(s, pos)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Expr::Ident(name, pos)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(expr)
    }

    // ========================================================================
    // REPL fragments
    // ========================================================================

    fn repl_form(&mut self) -> Result<ReplForm, ParseError> {
        if self.peek_kind().is_type_specifier() {
            let pos = self.here();
            let base = self.type_specifier()?;
            let (ty, name, name_pos) = self.declarator_core(&base)?;
            if self.peek_kind() == &TokenKind::LParen {
                let def = self.function_def(ty, name, pos)?;
                return Ok(ReplForm::Item(Item::Function(def)));
            }
            let decl = self.declaration_tail(base, ty, name, name_pos, pos)?;
            return Ok(ReplForm::Stmt(Stmt::Decl(decl)));
        }
        match self.peek_kind() {
            TokenKind::LBrace
            | TokenKind::KwIf
            | TokenKind::KwWhile
            | TokenKind::KwDo
            | TokenKind::KwFor
            | TokenKind::KwReturn
            | TokenKind::KwBreak
            | TokenKind::KwContinue
            | TokenKind::Semi => Ok(ReplForm::Stmt(self.stmt()?)),
            _ => {
                let pos = self.here();
                let expr = self.expr()?;
                // The final expression of a fragment may omit its ';'.
                if !self.eat(&TokenKind::Semi) && !self.at_eof() {
                    return Err(self.unexpected("';'"));
                }
                Ok(ReplForm::Stmt(Stmt::Expr(expr, pos)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn program(source: &str) -> Program {
        parse_program(tokenize(source).unwrap()).unwrap()
    }

    fn expr_of(source: &str) -> Expr {
        let wrapped = format!("int main() {{ {}; }}", source);
        let prog = program(&wrapped);
        match &prog.items[0] {
            Item::Function(f) => match &f.body[0] {
                Stmt::Expr(e, _) => e.clone(),
                other => panic!("expected expression statement, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        match expr_of("a + b * c") {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected addition at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_deref_of_postfix_increment() {
        // *p++ is *(p++)
        match expr_of("*p++") {
            Expr::Unary { op: UnOp::Deref, operand, .. } => {
                assert!(matches!(*operand, Expr::Postfix { op: PostfixOp::Inc, .. }));
            }
            other => panic!("expected deref at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        match expr_of("a = b = c") {
            Expr::Assign { value, .. } => {
                assert!(matches!(*value, Expr::Assign { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_relational_chains_left() {
        // a < b == c is (a < b) == c
        match expr_of("a < b == c") {
            Expr::Binary { op: BinOp::Eq, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { op: BinOp::Lt, .. }));
            }
            other => panic!("expected equality at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_shift_binds_tighter_than_relational() {
        match expr_of("a < b << c") {
            Expr::Binary { op: BinOp::Lt, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Shl, .. }));
            }
            other => panic!("expected '<' at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_ternary_nests_rightward() {
        match expr_of("a ? b : c ? d : e") {
            Expr::Ternary { otherwise, .. } => {
                assert!(matches!(*otherwise, Expr::Ternary { .. }));
            }
            other => panic!("expected ternary, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        match expr_of("x += 2") {
            Expr::Assign { op: Some(BinOp::Add), .. } => {}
            other => panic!("expected compound assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_cast_and_sizeof() {
        assert!(matches!(
            expr_of("(float)x"),
            Expr::Cast { ty: Type::Float, .. }
        ));
        assert!(matches!(
            expr_of("sizeof(int)"),
            Expr::SizeofType(Type::Int, _)
        ));
        assert!(matches!(expr_of("sizeof x"), Expr::SizeofExpr(_, _)));
        assert!(matches!(expr_of("sizeof(x)"), Expr::SizeofExpr(_, _)));
    }

    #[test]
    fn test_declarator_forms() {
        let prog = program("int x, *p, a[3], m[2][3];");
        let decl = match &prog.items[0] {
            Item::Globals(d) => d,
            other => panic!("expected globals, got {:?}", other),
        };
        let types: Vec<&Type> = decl.declarators.iter().map(|d| &d.ty).collect();
        assert_eq!(types[0], &Type::Int);
        assert_eq!(types[1], &Type::Int.pointer_to());
        assert_eq!(types[2], &Type::Array(Box::new(Type::Int), 3));
        assert_eq!(
            types[3],
            &Type::Array(Box::new(Type::Array(Box::new(Type::Int), 3)), 2)
        );
    }

    #[test]
    fn test_nested_initializer() {
        let prog = program("int m[2][2] = {{1, 2}, {3, 4}};");
        let decl = match &prog.items[0] {
            Item::Globals(d) => d,
            other => panic!("expected globals, got {:?}", other),
        };
        match &decl.declarators[0].init {
            Some(Initializer::List(items, _)) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], Initializer::List(_, _)));
            }
            other => panic!("expected list initializer, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_level_pointer_is_rejected() {
        let err = parse_program(tokenize("int **p;").unwrap()).unwrap_err();
        assert!(err.expected.contains("one level of indirection"));
    }

    #[test]
    fn test_array_parameter_adjusts_to_pointer() {
        let prog = program("int sum(int a[], int n) { return 0; }");
        let f = match &prog.items[0] {
            Item::Function(f) => f,
            other => panic!("expected function, got {:?}", other),
        };
        assert_eq!(f.params[0].ty, Type::Int.pointer_to());
    }

    #[test]
    fn test_void_parameter_list() {
        let prog = program("int main(void) { return 0; }");
        let f = match &prog.items[0] {
            Item::Function(f) => f,
            other => panic!("expected function, got {:?}", other),
        };
        assert!(f.params.is_empty());
    }

    #[test]
    fn test_dangling_else_binds_to_nearest_if() {
        let prog = program("int main() { if (a) if (b) x = 1; else x = 2; }");
        let f = match &prog.items[0] {
            Item::Function(f) => f,
            other => panic!("expected function, got {:?}", other),
        };
        match &f.body[0] {
            Stmt::If { otherwise: None, then, .. } => {
                assert!(matches!(**then, Stmt::If { otherwise: Some(_), .. }));
            }
            other => panic!("expected outer if without else, got {:?}", other),
        }
    }

    #[test]
    fn test_for_with_declaration_init() {
        let prog = program("int main() { for (int i = 0; i < 3; i++) x += i; }");
        let f = match &prog.items[0] {
            Item::Function(f) => f,
            other => panic!("expected function, got {:?}", other),
        };
        match &f.body[0] {
            Stmt::For { init: Some(init), cond: Some(_), step: Some(_), .. } => {
                assert!(matches!(**init, ForInit::Decl(_)));
            }
            other => panic!("expected for statement, got {:?}", other),
        }
    }

    #[test]
    fn test_first_error_is_surfaced() {
        let err = parse_program(tokenize("int main() { int x = ; }").unwrap()).unwrap_err();
        assert_eq!(err.expected, "expression");
        assert_eq!(err.found, "';'");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_program(tokenize("int main() { x = 1 }").unwrap()).unwrap_err();
        assert_eq!(err.expected, "';'");
    }

    #[test]
    fn test_fragment_allows_bare_expression() {
        let forms = parse_fragment(tokenize("1 + 2").unwrap()).unwrap();
        assert_eq!(forms.len(), 1);
        assert!(matches!(forms[0], ReplForm::Stmt(Stmt::Expr(_, _))));
    }

    #[test]
    fn test_fragment_accepts_function_then_statement() {
        let forms =
            parse_fragment(tokenize("int twice(int n) { return 2 * n; } twice(21)").unwrap())
                .unwrap();
        assert_eq!(forms.len(), 2);
        assert!(matches!(forms[0], ReplForm::Item(Item::Function(_))));
    }

    #[test]
    fn test_do_while_requires_trailing_semicolon() {
        let err =
            parse_program(tokenize("int main() { do x++; while (x < 3) }").unwrap()).unwrap_err();
        assert_eq!(err.expected, "';'");
    }
}
