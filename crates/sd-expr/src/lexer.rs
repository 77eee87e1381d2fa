use logos::Logos;
use std::fmt;

/// Source span as a byte range.
pub type Span = std::ops::Range<usize>;

/// Token type for the expression language.
///
/// Spelling variants collapse here: `or`/`||` both lex to [`Token::Or`],
/// `not`/`!` to [`Token::Not`]. The legacy `=` equality keeps its own
/// token so the compiler can warn on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Left parenthesis `(`.
    LParen,
    /// Right parenthesis `)`.
    RParen,
    /// Argument separator `,`.
    Comma,
    /// `or` or `||`.
    Or,
    /// `and` or `&&`.
    And,
    /// `not` or `!`.
    Not,
    /// `==`.
    EqEq,
    /// `=` accepted as equality; flagged by `compile`.
    LegacyEq,
    /// `!=`.
    Ne,
    /// `>=`.
    Ge,
    /// `<=`.
    Le,
    /// `>`.
    Gt,
    /// `<`.
    Lt,
    /// `+`.
    Plus,
    /// `-` (binary minus or unary negation; the parser decides).
    Minus,
    /// `*`.
    Star,
    /// `/`.
    Slash,
    /// `true` or `True`.
    True,
    /// `false` or `False`.
    False,
    /// Unsigned decimal literal. A leading sign is always lexed as
    /// [`Token::Minus`] and handled as unary negation.
    Number(f64),
    /// Single- or double-quoted string literal, no escape processing.
    Str(String),
    /// Identifier `[A-Za-z_][A-Za-z0-9_]*`.
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Or => write!(f, "or"),
            Token::And => write!(f, "and"),
            Token::Not => write!(f, "not"),
            Token::EqEq => write!(f, "=="),
            Token::LegacyEq => write!(f, "="),
            Token::Ne => write!(f, "!="),
            Token::Ge => write!(f, ">="),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(name) => write!(f, "{name}"),
        }
    }
}

/// Internal logos token, borrowing from source to avoid allocations
/// during lexing. Converted to owned `Token` after lexing.
#[derive(Logos, Debug)]
#[logos(skip r"[ \t\r\n]+")]
enum RawToken {
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token(",")]
    Comma,

    #[token("or")]
    #[token("||")]
    Or,

    #[token("and")]
    #[token("&&")]
    And,

    #[token("not")]
    #[token("!")]
    Not,

    #[token("==")]
    EqEq,

    #[token("=")]
    LegacyEq,

    #[token("!=")]
    Ne,

    #[token(">=")]
    Ge,

    #[token("<=")]
    Le,

    #[token(">")]
    Gt,

    #[token("<")]
    Lt,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("true")]
    #[token("True")]
    True,

    #[token("false")]
    #[token("False")]
    False,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    #[regex(r#""[^"\n]*""#)]
    DoubleQuoted,

    #[regex(r"'[^'\n]*'")]
    SingleQuoted,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

/// A lexer error with source location.
#[derive(Debug, Clone)]
pub struct LexError {
    /// Byte range of the erroneous input in the source.
    pub span: Span,
    /// Human-readable description of the lexer error.
    pub message: String,
}

/// Lex an expression into a sequence of `(Token, Span)` pairs.
///
/// Returns the token stream and any lexer errors. Lexing continues past
/// errors to collect as many tokens as possible.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(raw) => {
                let token = match raw {
                    RawToken::LParen => Token::LParen,
                    RawToken::RParen => Token::RParen,
                    RawToken::Comma => Token::Comma,
                    RawToken::Or => Token::Or,
                    RawToken::And => Token::And,
                    RawToken::Not => Token::Not,
                    RawToken::EqEq => Token::EqEq,
                    RawToken::LegacyEq => Token::LegacyEq,
                    RawToken::Ne => Token::Ne,
                    RawToken::Ge => Token::Ge,
                    RawToken::Le => Token::Le,
                    RawToken::Gt => Token::Gt,
                    RawToken::Lt => Token::Lt,
                    RawToken::Plus => Token::Plus,
                    RawToken::Minus => Token::Minus,
                    RawToken::Star => Token::Star,
                    RawToken::Slash => Token::Slash,
                    RawToken::True => Token::True,
                    RawToken::False => Token::False,
                    RawToken::Number => match lexer.slice().parse::<f64>() {
                        Ok(n) => Token::Number(n),
                        Err(_) => {
                            errors.push(LexError {
                                span: span.clone(),
                                message: format!("invalid number literal: {}", lexer.slice()),
                            });
                            continue;
                        }
                    },
                    RawToken::DoubleQuoted | RawToken::SingleQuoted => {
                        let slice = lexer.slice();
                        Token::Str(slice[1..slice.len() - 1].to_string())
                    }
                    RawToken::Ident => Token::Ident(lexer.slice().to_string()),
                };
                tokens.push((token, span));
            }
            Err(()) => {
                errors.push(LexError {
                    span: span.clone(),
                    message: format!("unexpected character: {:?}", &source[span.clone()]),
                });
            }
        }
    }

    (tokens, errors)
}
