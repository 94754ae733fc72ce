// ABOUTME: Lexer turning C source text into a fully materialised token stream

use crate::error::LexError;
use std::fmt;

/// Token kinds. Literals carry their decoded value, identifiers their name.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwInt,
    KwFloat,
    KwChar,
    KwVoid,
    KwIf,
    KwElse,
    KwFor,
    KwWhile,
    KwDo,
    KwReturn,
    KwBreak,
    KwContinue,
    KwSizeof,

    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    CharLit(u8),
    StrLit(String),

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Tilde,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,
    Arrow,
    Question,
    Colon,
    Semi,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    pub fn is_type_specifier(&self) -> bool {
        matches!(
            self,
            TokenKind::KwInt | TokenKind::KwFloat | TokenKind::KwChar | TokenKind::KwVoid
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::IntLit(n) => write!(f, "integer literal {}", n),
            TokenKind::FloatLit(x) => write!(f, "float literal {}", x),
            TokenKind::CharLit(c) => write!(f, "character literal '{}'", *c as char),
            TokenKind::StrLit(s) => write!(f, "string literal \"{}\"", s),
            TokenKind::Eof => write!(f, "end of input"),
            other => write!(f, "'{}'", other.lexeme()),
        }
    }
}

impl TokenKind {
    /// The spelling of a fixed token, used in messages and `Display`.
    fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::KwInt => "int",
            TokenKind::KwFloat => "float",
            TokenKind::KwChar => "char",
            TokenKind::KwVoid => "void",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwFor => "for",
            TokenKind::KwWhile => "while",
            TokenKind::KwDo => "do",
            TokenKind::KwReturn => "return",
            TokenKind::KwBreak => "break",
            TokenKind::KwContinue => "continue",
            TokenKind::KwSizeof => "sizeof",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::Tilde => "~",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Arrow => "->",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            _ => "",
        }
    }
}

/// A token with its source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

/// Tokenises an entire source string. The result always ends with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, col) = (self.line, self.col);
            if self.at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line,
                    col,
                });
                return Ok(tokens);
            }
            let start = self.pos;
            let kind = self.next_kind()?;
            let text: String = self.chars[start..self.pos].iter().collect();
            tokens.push(Token {
                kind,
                text,
                line,
                col,
            });
        }
    }

    fn current(&self) -> char {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.current();
        if self.pos < self.chars.len() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.current() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError::new(self.line, self.col, message)
    }

    /// Skips whitespace and both comment forms.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            while self.current().is_whitespace() {
                self.advance();
            }
            if self.current() == '/' && self.peek(1) == '/' {
                while !self.at_end() && self.current() != '\n' {
                    self.advance();
                }
                continue;
            }
            if self.current() == '/' && self.peek(1) == '*' {
                let (line, col) = (self.line, self.col);
                self.advance();
                self.advance();
                loop {
                    if self.at_end() {
                        return Err(LexError::new(line, col, "unterminated block comment"));
                    }
                    if self.current() == '*' && self.peek(1) == '/' {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            return Ok(());
        }
    }

    fn next_kind(&mut self) -> Result<TokenKind, LexError> {
        let c = self.current();
        if c.is_ascii_digit() || (c == '.' && self.peek(1).is_ascii_digit()) {
            return self.number();
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.identifier_or_keyword());
        }
        match c {
            '\'' => self.char_literal(),
            '"' => self.string_literal(),
            _ => self.operator(),
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while self.current().is_ascii_alphanumeric() || self.current() == '_' {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "int" => TokenKind::KwInt,
            "float" => TokenKind::KwFloat,
            "char" => TokenKind::KwChar,
            "void" => TokenKind::KwVoid,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "for" => TokenKind::KwFor,
            "while" => TokenKind::KwWhile,
            "do" => TokenKind::KwDo,
            "return" => TokenKind::KwReturn,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "sizeof" => TokenKind::KwSizeof,
            _ => TokenKind::Ident(word),
        }
    }

    /// Decimal, hex (`0x`), and octal (leading `0`) integers; floats with a
    /// decimal point and/or exponent.
    fn number(&mut self) -> Result<TokenKind, LexError> {
        let (line, col) = (self.line, self.col);

        if self.current() == '0' && matches!(self.peek(1), 'x' | 'X') {
            self.advance();
            self.advance();
            let start = self.pos;
            while self.current().is_ascii_hexdigit() {
                self.advance();
            }
            if self.pos == start {
                return Err(LexError::new(line, col, "hex literal without digits"));
            }
            let digits: String = self.chars[start..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .map(TokenKind::IntLit)
                .map_err(|_| LexError::new(line, col, "integer literal too large"));
        }

        let start = self.pos;
        while self.current().is_ascii_digit() {
            self.advance();
        }
        let mut is_float = false;
        if self.current() == '.' {
            is_float = true;
            self.advance();
            while self.current().is_ascii_digit() {
                self.advance();
            }
        }
        if matches!(self.current(), 'e' | 'E') {
            is_float = true;
            self.advance();
            if matches!(self.current(), '+' | '-') {
                self.advance();
            }
            let exp_start = self.pos;
            while self.current().is_ascii_digit() {
                self.advance();
            }
            if self.pos == exp_start {
                return Err(LexError::new(line, col, "exponent without digits"));
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            return text
                .parse::<f64>()
                .map(TokenKind::FloatLit)
                .map_err(|_| LexError::new(line, col, format!("malformed float literal '{}'", text)));
        }
        if text.len() > 1 && text.starts_with('0') {
            if text[1..].bytes().any(|b| !(b'0'..=b'7').contains(&b)) {
                return Err(LexError::new(
                    line,
                    col,
                    format!("invalid digit in octal literal '{}'", text),
                ));
            }
            return i64::from_str_radix(&text[1..], 8)
                .map(TokenKind::IntLit)
                .map_err(|_| LexError::new(line, col, "integer literal too large"));
        }
        text.parse::<i64>()
            .map(TokenKind::IntLit)
            .map_err(|_| LexError::new(line, col, "integer literal too large"))
    }

    fn escape(&mut self) -> Result<u8, LexError> {
        let c = self.advance();
        match c {
            'n' => Ok(b'\n'),
            't' => Ok(b'\t'),
            '\\' => Ok(b'\\'),
            '\'' => Ok(b'\''),
            '"' => Ok(b'"'),
            '0' => Ok(0),
            _ => Err(self.error(format!("unknown escape sequence '\\{}'", c))),
        }
    }

    fn char_literal(&mut self) -> Result<TokenKind, LexError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // opening quote
        let byte = match self.current() {
            '\0' | '\n' => return Err(LexError::new(line, col, "unterminated character literal")),
            '\'' => return Err(LexError::new(line, col, "empty character literal")),
            '\\' => {
                self.advance();
                self.escape()?
            }
            c => {
                if !c.is_ascii() {
                    return Err(self.error(format!("non-ASCII character literal '{}'", c)));
                }
                self.advance();
                c as u8
            }
        };
        if !self.match_char('\'') {
            return Err(LexError::new(line, col, "unterminated character literal"));
        }
        Ok(TokenKind::CharLit(byte))
    }

    fn string_literal(&mut self) -> Result<TokenKind, LexError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.current() {
                '\0' | '\n' => return Err(LexError::new(line, col, "unterminated string literal")),
                '"' => {
                    self.advance();
                    // Escapes are byte escapes, so the buffer is ASCII here.
                    return Ok(TokenKind::StrLit(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    ));
                }
                '\\' => {
                    self.advance();
                    bytes.push(self.escape()?);
                }
                c => {
                    if !c.is_ascii() {
                        return Err(self.error(format!("non-ASCII character '{}' in string", c)));
                    }
                    self.advance();
                    bytes.push(c as u8);
                }
            }
        }
    }

    /// Multi-character operators first (maximal munch), then single.
    fn operator(&mut self) -> Result<TokenKind, LexError> {
        let c = self.advance();
        let kind = match c {
            '+' => {
                if self.match_char('+') {
                    TokenKind::PlusPlus
                } else if self.match_char('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_char('-') {
                    TokenKind::MinusMinus
                } else if self.match_char('=') {
                    TokenKind::MinusAssign
                } else if self.match_char('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_char('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_char('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.match_char('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.match_char('<') {
                    TokenKind::Shl
                } else if self.match_char('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('>') {
                    TokenKind::Shr
                } else if self.match_char('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::OrOr
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            other => {
                return Err(LexError::new(
                    self.line,
                    self.col.saturating_sub(1),
                    format!("unrecognised character '{}'", other),
                ))
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("int x while whilex _y"),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident("x".to_string()),
                TokenKind::KwWhile,
                TokenKind::Ident("whilex".to_string()),
                TokenKind::Ident("_y".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_bases() {
        assert_eq!(
            kinds("10 0x1F 017 0"),
            vec![
                TokenKind::IntLit(10),
                TokenKind::IntLit(31),
                TokenKind::IntLit(15),
                TokenKind::IntLit(0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bad_octal_digit() {
        let err = tokenize("09").unwrap_err();
        assert!(err.message.contains("octal"));
    }

    #[test]
    fn test_float_forms() {
        assert_eq!(
            kinds("1.5 .25 2e3 1.5e-2"),
            vec![
                TokenKind::FloatLit(1.5),
                TokenKind::FloatLit(0.25),
                TokenKind::FloatLit(2000.0),
                TokenKind::FloatLit(0.015),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_char_literals_and_escapes() {
        assert_eq!(
            kinds(r"'a' '\n' '\0' '\\'"),
            vec![
                TokenKind::CharLit(b'a'),
                TokenKind::CharLit(b'\n'),
                TokenKind::CharLit(0),
                TokenKind::CharLit(b'\\'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\"c""#),
            vec![TokenKind::StrLit("a\tb\"c".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"abc").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_maximal_munch_operators() {
        assert_eq!(
            kinds("a+++b <<= != -> >= %="),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::PlusPlus,
                TokenKind::Plus,
                TokenKind::Ident("b".to_string()),
                TokenKind::Shl,
                TokenKind::Assign,
                TokenKind::Ne,
                TokenKind::Arrow,
                TokenKind::Ge,
                TokenKind::PercentAssign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let src = "int a; // trailing\n/* block\n spanning */ int b;";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident("a".to_string()),
                TokenKind::Semi,
                TokenKind::KwInt,
                TokenKind::Ident("b".to_string()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment_position() {
        let err = tokenize("int a;\n/* oops").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.col, 1);
        assert!(err.message.contains("unterminated block comment"));
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("int\n  x;").unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
        assert_eq!((tokens[2].line, tokens[2].col), (2, 4));
    }

    #[test]
    fn test_unrecognised_character() {
        let err = tokenize("int @;").unwrap_err();
        assert!(err.message.contains('@'));
    }

    #[test]
    fn test_token_text_is_source_lexeme() {
        let tokens = tokenize("0x1F foo").unwrap();
        assert_eq!(tokens[0].text, "0x1F");
        assert_eq!(tokens[1].text, "foo");
    }
}
