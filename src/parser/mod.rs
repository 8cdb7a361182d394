pub mod expression;
pub mod function;


use crate::ast::ASTNode;
use crate::lexer::{LexErrorKind, Lexer, Token};

use ariadne::{Color, ColorGenerator, Fmt, Label, Report, ReportKind, Source};

use std::fmt::{self, Display, Formatter};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Lexical(LexErrorKind),
    UnexpectedToken,
    UnsupportedType,
}

impl ParseErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ParseErrorKind::Lexical(_) => "lexical",
            ParseErrorKind::UnexpectedToken => "syntax",
            ParseErrorKind::UnsupportedType => "unsupported type",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: u32,
    pub span: Range<usize>,
    pub note: Option<String>,
}

impl ParseError {
    fn with_note(mut self, note: String) -> Self {
        self.note.get_or_insert(note);
        self
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    file: String,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, file: impl Into<String>) -> Self {
        let mut lexer = Lexer::with_source(source);
        lexer.advance();

        Parser {
            lexer,
            file: file.into(),
            errors: vec![],
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Parses every top level item. Items with syntax errors are skipped
    /// and the errors are kept for [`Parser::report_errors`].
    pub fn parse_program(&mut self) -> Vec<ASTNode> {
        let mut tree = vec![];

        loop {
            let item = match self.current() {
                Token::Eof | Token::EmptyLexer => break,
                Token::Extern => self.parse_extern().map(ASTNode::Extern),
                Token::Int | Token::Float | Token::String => {
                    self.parse_function().map(ASTNode::Function)
                }
                _ => Err(self.unexpected("'extern' or a function definition")),
            };

            match item {
                Ok(node) => tree.push(node),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }

        tree
    }

    /// Prints every syntax error. Returns true if there was any.
    pub fn report_errors(&self, source: &str) -> bool {
        let source = Source::from(source.to_string());

        for error in &self.errors {
            let mut report = Report::build(ReportKind::Error, (self.file.clone(), error.span.clone()))
                .with_code(error.kind.code())
                .with_message(&error.message)
                .with_label(
                    Label::new((self.file.clone(), error.span.clone()))
                        .with_message(format!(
                            "{} on line {}",
                            error.kind.code().fg(Color::BrightRed),
                            error.line
                        ))
                        .with_color(ColorGenerator::new().next()),
                );

            if let Some(note) = &error.note {
                report = report.with_note(note);
            }

            let _ = report.finish().eprint((self.file.clone(), source.clone()));
        }

        !self.errors.is_empty()
    }

    fn current(&self) -> Token {
        self.lexer.token
    }

    fn bump(&mut self) -> Token {
        self.lexer.advance()
    }

    /// Consumes the current token if it is `token`, returning its span.
    fn expect(&mut self, token: Token) -> ParseResult<Range<usize>> {
        if self.current() != token {
            return Err(self.unexpected(&token.to_string()));
        }
        let span = self.lexer.span.clone();
        self.bump();
        Ok(span)
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Range<usize>)> {
        if self.current() != Token::Identifier {
            return Err(self.unexpected("an identifier"));
        }
        let name = self.lexer.identifier.clone();
        let span = self.lexer.span.clone();
        self.bump();
        Ok((name, span))
    }

    /// An error for the current token. Lexer sentinels turn into lexical
    /// errors, anything else is reported as out of place.
    fn unexpected(&self, expected: &str) -> ParseError {
        if let Some(lex) = self.lexer.error() {
            return ParseError {
                kind: ParseErrorKind::Lexical(lex.kind),
                message: lex.to_string(),
                line: lex.line,
                span: lex.span,
                note: None,
            };
        }

        let found = match self.current() {
            Token::Identifier | Token::Operator | Token::Number => {
                format!("{} `{}`", self.current(), self.lexer.identifier)
            }
            token => token.to_string(),
        };

        ParseError {
            kind: ParseErrorKind::UnexpectedToken,
            message: format!("expected {}, found {}", expected, found),
            line: self.lexer.line,
            span: self.lexer.span.clone(),
            note: None,
        }
    }

    /// Skips to the end of the broken item: past the next `;` outside of
    /// braces, or past the `}` closing the current body.
    fn synchronize(&mut self) {
        let mut depth = 0usize;

        loop {
            match self.current() {
                Token::Eof | Token::EmptyLexer => return,
                Token::OpenCurly => depth += 1,
                Token::CloseCurly if depth <= 1 => {
                    self.bump();
                    return;
                }
                Token::CloseCurly => depth -= 1,
                Token::EndStatement if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }
}

pub fn prototype_syntax() -> String {
    format!(
        "a function is declared as: {} name({} {}, ...) {{ ... }}",
        "type".fg(Color::Yellow),
        "type".fg(Color::Yellow),
        "arg".fg(Color::Rgb(150, 200, 100)),
    )
}
