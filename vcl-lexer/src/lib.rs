use logos::Logos;
use std::collections::VecDeque;
use std::ops::Range;

/// Numeric constants are split into int/float by the presence of a dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Float(f32),
}

#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
pub enum LexErrorKind {
    #[default]
    #[error("invalid character")]
    InvalidCharacter,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("numeric constant contains more than one `.`")]
    NumericTooManyDots,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} at {span:?}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Range<usize>,
}

fn lex_number(lex: &mut logos::Lexer<TokenKind>) -> Result<Number, LexErrorKind> {
    let slice = lex.slice();
    let dots = slice.bytes().filter(|&b| b == b'.').count();
    match dots {
        0 => slice
            .parse::<i32>()
            .map(Number::Int)
            .map_err(|_| LexErrorKind::InvalidCharacter),
        1 => slice
            .parse::<f32>()
            .map(Number::Float)
            .map_err(|_| LexErrorKind::InvalidCharacter),
        _ => Err(LexErrorKind::NumericTooManyDots),
    }
}

fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn reject_unterminated_string(
    _lex: &mut logos::Lexer<TokenKind>,
) -> Result<(), LexErrorKind> {
    Err(LexErrorKind::UnterminatedString)
}

/// Token kinds for the VCL language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum TokenKind {
    // Keywords
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("struct")]
    Struct,
    #[token("typename")]
    Typename,

    // Type names
    #[token("float")]
    Float,
    #[token("bool")]
    Bool,
    #[token("int")]
    Int,
    #[token("void")]
    Void,
    #[token("vfloat")]
    VFloat,
    #[token("vbool")]
    VBool,
    #[token("vint")]
    VInt,
    #[token("array")]
    Array,
    #[token("span")]
    Span,

    // Qualifiers
    #[token("const")]
    Const,
    #[token("in")]
    In,
    #[token("out")]
    Out,

    // Two-character operators before their one-character prefixes
    #[token(">=")]
    GreaterEqual,
    #[token("<=")]
    LessEqual,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    // Operators
    #[token(".")]
    Dot,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token(">")]
    Greater,
    #[token("<")]
    Less,
    #[token("!")]
    Not,
    #[token("=")]
    Assign,

    // Punctuation
    #[token(";")]
    Semicolon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("@")]
    At,

    // Literals
    #[regex(r"[0-9][0-9.]*", lex_number)]
    Number(Number),

    #[regex(r#""([^"\\\n]|\\.)*""#, lex_string, priority = 10)]
    StringLiteral(String),

    // A quote that never closes on its line
    #[regex(r#""([^"\\\n]|\\.)*"#, reject_unterminated_string)]
    UnterminatedString,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Synthesized by the token stream past the end of input. The NUL
    /// pattern never occurs in text sources.
    #[token("\0")]
    EndOfFile,
}

impl TokenKind {
    /// Source rendering used by error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("`{}`", name),
            TokenKind::Number(Number::Int(v)) => format!("`{}`", v),
            TokenKind::Number(Number::Float(v)) => format!("`{}`", v),
            TokenKind::StringLiteral(s) => format!("`\"{}\"`", s),
            TokenKind::EndOfFile => "end of file".to_string(),
            other => format!("`{}`", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Struct => "struct",
            TokenKind::Typename => "typename",
            TokenKind::Float => "float",
            TokenKind::Bool => "bool",
            TokenKind::Int => "int",
            TokenKind::Void => "void",
            TokenKind::VFloat => "vfloat",
            TokenKind::VBool => "vbool",
            TokenKind::VInt => "vint",
            TokenKind::Array => "array",
            TokenKind::Span => "span",
            TokenKind::Const => "const",
            TokenKind::In => "in",
            TokenKind::Out => "out",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LessEqual => "<=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "!=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Dot => ".",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Greater => ">",
            TokenKind::Less => "<",
            TokenKind::Not => "!",
            TokenKind::Assign => "=",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::At => "@",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Lazy token cursor with arbitrary lookahead and a bounded backtracking
/// stack. While no save point is outstanding, `advance` trims the internal
/// buffer so memory stays amortised O(1).
pub struct TokenStream<'source> {
    inner: logos::Lexer<'source, TokenKind>,
    buffer: VecDeque<Token>,
    cursor: usize,
    save_points: Vec<usize>,
    end: usize,
}

impl<'source> TokenStream<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            buffer: VecDeque::new(),
            cursor: 0,
            save_points: Vec::new(),
            end: source.len(),
        }
    }

    fn fill_to(&mut self, index: usize) -> Result<(), LexError> {
        while self.buffer.len() <= index {
            match self.inner.next() {
                Some(Ok(kind)) => {
                    self.buffer.push_back(Token {
                        kind,
                        span: self.inner.span(),
                    });
                }
                Some(Err(kind)) => {
                    return Err(LexError {
                        kind,
                        span: self.inner.span(),
                    })
                }
                None => self.buffer.push_back(Token {
                    kind: TokenKind::EndOfFile,
                    span: self.end..self.end,
                }),
            }
        }
        Ok(())
    }

    /// Token `n` positions ahead of the cursor (0 = current).
    pub fn peek_n(&mut self, n: usize) -> Result<&Token, LexError> {
        self.fill_to(self.cursor + n)?;
        Ok(&self.buffer[self.cursor + n])
    }

    pub fn peek(&mut self) -> Result<&Token, LexError> {
        self.peek_n(0)
    }

    /// Return the current token and move past it.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.fill_to(self.cursor)?;
        let token = self.buffer[self.cursor].clone();
        if token.kind != TokenKind::EndOfFile {
            self.cursor += 1;
            if self.save_points.is_empty() {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
            }
        }
        Ok(token)
    }

    /// Push the current position on the backtracking stack.
    pub fn save(&mut self) {
        self.save_points.push(self.cursor);
    }

    /// Rewind to the most recent save point.
    pub fn restore(&mut self) {
        if let Some(cursor) = self.save_points.pop() {
            self.cursor = cursor;
        }
    }

    /// Discard the most recent save point, keeping the current position.
    pub fn commit(&mut self) {
        self.save_points.pop();
        if self.save_points.is_empty() {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut stream = TokenStream::new(source);
        let mut out = Vec::new();
        loop {
            let token = stream.next_token().expect("lex");
            if token.kind == TokenKind::EndOfFile {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn keywords_and_types() {
        assert_eq!(
            kinds("return if else while for break struct typename"),
            vec![
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::For,
                TokenKind::Break,
                TokenKind::Struct,
                TokenKind::Typename,
            ]
        );
        assert_eq!(
            kinds("float vfloat vint span const in out"),
            vec![
                TokenKind::Float,
                TokenKind::VFloat,
                TokenKind::VInt,
                TokenKind::Span,
                TokenKind::Const,
                TokenKind::In,
                TokenKind::Out,
            ]
        );
    }

    #[test]
    fn punctuators_are_greedy() {
        assert_eq!(
            kinds("++ + >= > == = && &"),
            vec![
                TokenKind::PlusPlus,
                TokenKind::Plus,
                TokenKind::GreaterEqual,
                TokenKind::Greater,
                TokenKind::EqualEqual,
                TokenKind::Assign,
                TokenKind::AndAnd,
            ]
        );
    }

    #[test]
    fn invalid_ampersand() {
        // `&` alone is not an operator
        let mut stream = TokenStream::new("a & b");
        assert!(stream.next_token().is_ok());
        let err = loop {
            match stream.next_token() {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert_eq!(err.kind, LexErrorKind::InvalidCharacter);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("42 3.5 0.25"),
            vec![
                TokenKind::Number(Number::Int(42)),
                TokenKind::Number(Number::Float(3.5)),
                TokenKind::Number(Number::Float(0.25)),
            ]
        );
    }

    #[test]
    fn numeric_too_many_dots() {
        let mut stream = TokenStream::new("1.2.3");
        let err = stream.next_token().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::NumericTooManyDots);
    }

    #[test]
    fn string_literals() {
        assert_eq!(
            kinds(r#"@import "lib/math.vcl";"#),
            vec![
                TokenKind::At,
                TokenKind::Ident("import".to_string()),
                TokenKind::StringLiteral("lib/math.vcl".to_string()),
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut stream = TokenStream::new("\"abc");
        let err = stream.next_token().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // line\n/* block\n */ b"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ident("b".to_string()),
            ]
        );
    }

    #[test]
    fn save_restore_commit() {
        let mut stream = TokenStream::new("a b c");
        stream.save();
        assert_eq!(
            stream.next_token().unwrap().kind,
            TokenKind::Ident("a".to_string())
        );
        assert_eq!(
            stream.next_token().unwrap().kind,
            TokenKind::Ident("b".to_string())
        );
        stream.restore();
        assert_eq!(
            stream.next_token().unwrap().kind,
            TokenKind::Ident("a".to_string())
        );
        stream.save();
        assert_eq!(
            stream.next_token().unwrap().kind,
            TokenKind::Ident("b".to_string())
        );
        stream.commit();
        assert_eq!(
            stream.next_token().unwrap().kind,
            TokenKind::Ident("c".to_string())
        );
    }

    #[test]
    fn eof_repeats() {
        let mut stream = TokenStream::new("");
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::EndOfFile);
        assert_eq!(stream.next_token().unwrap().kind, TokenKind::EndOfFile);
    }
}
