use logos::Logos;

use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::ops::Range;


/// Token codes handed to the parser. Every code is negative so that positive
/// values stay free for extension tokens.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Eof = -1,

    // functions
    Extern = -2,

    // datatypes
    Int = -3,
    Float = -4,
    String = -5,

    // data
    Identifier = -6,
    Number = -7,

    // misc
    Operator = -8,
    AssignmentOperator = -9,

    // punctuation
    OpenCurly = -10,
    CloseCurly = -11,
    OpenRound = -12,
    CloseRound = -13,
    EndStatement = -14,
    Comma = -15,
    Return = -16,

    // error codes
    EmptyLexer = -2000,
    NoMatch = -2001,
    MalformedNumber = -2002,
    UnsupportedChar = -2003,
}

impl Token {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            Token::EmptyLexer | Token::NoMatch | Token::MalformedNumber | Token::UnsupportedChar
        )
    }

    /// Tokens after which the scanner can never produce anything else.
    pub fn is_terminal(self) -> bool {
        matches!(self, Token::Eof | Token::EmptyLexer)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Eof => "end of file",
            Token::Extern => "'extern'",
            Token::Int => "'int'",
            Token::Float => "'float'",
            Token::String => "'string'",
            Token::Identifier => "identifier",
            Token::Number => "number",
            Token::Operator => "operator",
            Token::AssignmentOperator => "'='",
            Token::OpenCurly => "'{'",
            Token::CloseCurly => "'}'",
            Token::OpenRound => "'('",
            Token::CloseRound => "')'",
            Token::EndStatement => "';'",
            Token::Comma => "','",
            Token::Return => "'return'",
            Token::EmptyLexer => "uninitialized input",
            Token::NoMatch => "unmatched input",
            Token::MalformedNumber => "malformed number",
            Token::UnsupportedChar => "unsupported character",
        };
        write!(f, "{}", s)
    }
}

pub static KEYWORDS: phf::Map<&'static str, Token> = phf::phf_map! {
    "int" => Token::Int,
    "float" => Token::Float,
    "string" => Token::String,
    "extern" => Token::Extern,
    "return" => Token::Return,
    "+" => Token::Operator,
    "-" => Token::Operator,
    "*" => Token::Operator,
    "/" => Token::Operator,
    "<" => Token::Operator,
    "=" => Token::AssignmentOperator,
    "{" => Token::OpenCurly,
    "}" => Token::CloseCurly,
    "(" => Token::OpenRound,
    ")" => Token::CloseRound,
    ";" => Token::EndStatement,
    "," => Token::Comma,
};

/// A numeric literal, tagged by the numeric token kind it was lexed as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Float(f32),
}

impl Number {
    /// The datatype keyword token matching this literal.
    pub fn token(self) -> Token {
        match self {
            Number::Int(_) => Token::Int,
            Number::Float(_) => Token::Float,
        }
    }

    /// Parses the text matched by the numeric pattern. `None` means the
    /// literal is malformed: more than one dot, a lone dot, or out of range.
    pub fn parse(text: &str) -> Option<Number> {
        match text.matches('.').count() {
            0 => text.parse::<i32>().ok().map(Number::Int),
            1 => text.parse::<f32>().ok().map(Number::Float),
            _ => None,
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(fl) => write!(f, "{:?}", fl),
        }
    }
}

/// The raw lexemes recognized by the scanner, in priority order. The
/// patterns are disjoint so the first (and only) match wins.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\f]+")]
enum Lexeme {
    /// Identifiers and keywords. A trailing `*` marks a pointer type.
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*\*?")]
    Word,

    #[regex(r"[0-9.]+")]
    Digits,

    #[regex(r"[(){}+\-*/<=;,]")]
    Punct,

    #[regex(r"\r\n|\r|\n")]
    Newline,
}

/// A scanned token that has not become the current token yet.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedToken {
    pub token: Token,
    pub identifier: String,
    pub value: Option<Number>,
    pub line: u32,
    pub span: Range<usize>,
}

impl BufferedToken {
    fn without_value(token: Token, text: &str, line: u32, span: Range<usize>) -> Self {
        BufferedToken {
            token,
            identifier: text.to_string(),
            value: None,
            line,
            span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    EmptyInput,
    NoMatch,
    MalformedNumber,
    UnsupportedCharacter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub text: String,
    pub line: u32,
    pub span: Range<usize>,
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            LexErrorKind::EmptyInput => write!(f, "lexer has no input"),
            LexErrorKind::NoMatch => write!(f, "no token matches '{}'", self.text),
            LexErrorKind::MalformedNumber => write!(f, "malformed number '{}'", self.text),
            LexErrorKind::UnsupportedCharacter => {
                write!(f, "unsupported character '{}'", self.text)
            }
        }
    }
}

/// Pull-based scanner with a bounded lookahead queue.
///
/// A `Lexer` lives for one compilation unit. It starts uninitialized (every
/// advance yields [`Token::EmptyLexer`]) until [`Lexer::init_from_str`] hands
/// it the source text.
pub struct Lexer<'src> {
    /// The current token.
    pub token: Token,
    /// Matched text of the current token.
    pub identifier: String,
    /// Payload of the current token when it is [`Token::Number`].
    pub value: Option<Number>,
    /// Line of the current token, starting at 1.
    pub line: u32,
    pub span: Range<usize>,

    scanner: Option<logos::Lexer<'src, Lexeme>>,
    scan_line: u32,
    lookahead: VecDeque<BufferedToken>,
}

impl Default for Lexer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'src> Lexer<'src> {
    pub fn new() -> Self {
        Lexer {
            token: Token::Eof,
            identifier: String::new(),
            value: None,
            line: 1,
            span: 0..0,
            scanner: None,
            scan_line: 1,
            lookahead: VecDeque::new(),
        }
    }

    pub fn with_source(source: &'src str) -> Self {
        let mut lexer = Self::new();
        lexer.init_from_str(source);
        lexer
    }

    /// Points the lexer at a new source buffer, dropping any buffered state.
    pub fn init_from_str(&mut self, source: &'src str) {
        self.scanner = Some(Lexeme::lexer(source));
        self.token = Token::Eof;
        self.identifier.clear();
        self.value = None;
        self.line = 1;
        self.span = 0..0;
        self.scan_line = 1;
        self.lookahead.clear();
    }

    /// Moves to the next token, draining the lookahead queue first.
    pub fn advance(&mut self) -> Token {
        let next = match self.lookahead.pop_front() {
            Some(buffered) => buffered,
            None => self.scan(),
        };

        self.token = next.token;
        self.identifier = next.identifier;
        self.value = next.value;
        self.line = next.line;
        self.span = next.span;
        self.token
    }

    /// Buffers tokens until `count` of them are queued ahead of the current
    /// one. Returns false when end of input shows up within those `count`.
    pub fn look_ahead(&mut self, count: usize) -> bool {
        while self.lookahead.len() < count {
            if self.lookahead.back().is_some_and(|t| t.token.is_terminal()) {
                break;
            }
            let buffered = self.scan();
            self.lookahead.push_back(buffered);
        }

        self.lookahead.len() >= count
            && self
                .lookahead
                .iter()
                .take(count)
                .all(|t| !t.token.is_terminal())
    }

    /// A buffered token, `0` being the one right after the current token.
    pub fn peek(&self, index: usize) -> Option<&BufferedToken> {
        self.lookahead.get(index)
    }

    pub fn buffered(&self) -> usize {
        self.lookahead.len()
    }

    /// The current token as a typed error, if it is one of the sentinels.
    pub fn error(&self) -> Option<LexError> {
        let kind = match self.token {
            Token::EmptyLexer => LexErrorKind::EmptyInput,
            Token::NoMatch => LexErrorKind::NoMatch,
            Token::MalformedNumber => LexErrorKind::MalformedNumber,
            Token::UnsupportedChar => LexErrorKind::UnsupportedCharacter,
            _ => return None,
        };

        Some(LexError {
            kind,
            text: self.identifier.clone(),
            line: self.line,
            span: self.span.clone(),
        })
    }

    fn scan(&mut self) -> BufferedToken {
        let Some(scanner) = self.scanner.as_mut() else {
            return BufferedToken::without_value(Token::EmptyLexer, "", self.scan_line, 0..0);
        };

        loop {
            let Some(result) = scanner.next() else {
                let end = scanner.source().len();
                return BufferedToken::without_value(Token::Eof, "", self.scan_line, end..end);
            };

            let text = scanner.slice();
            let span = scanner.span();

            let token = match result {
                Ok(Lexeme::Newline) => {
                    self.scan_line += 1;
                    continue;
                }
                Ok(Lexeme::Word) => KEYWORDS.get(text).copied().unwrap_or(Token::Identifier),
                Ok(Lexeme::Punct) => KEYWORDS.get(text).copied().unwrap_or(Token::NoMatch),
                Ok(Lexeme::Digits) => match Number::parse(text) {
                    Some(number) => {
                        return BufferedToken {
                            token: Token::Number,
                            identifier: text.to_string(),
                            value: Some(number),
                            line: self.scan_line,
                            span,
                        };
                    }
                    None => Token::MalformedNumber,
                },
                Err(()) => Token::UnsupportedChar,
            };

            return BufferedToken::without_value(token, text, self.scan_line, span);
        }
    }
}
