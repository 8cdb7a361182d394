use crate::ast::{Argument, DataType, FunctionDef, Prototype};
use crate::lexer::Token;
use crate::parser::{ParseError, ParseErrorKind, ParseResult, Parser, prototype_syntax};

use std::ops::Range;

impl Parser<'_> {
    /// `extern float sin(float x);`
    pub fn parse_extern(&mut self) -> ParseResult<Prototype> {
        self.expect(Token::Extern)?;
        let prototype = self.parse_prototype()?;
        self.expect(Token::EndStatement)?;
        Ok(prototype)
    }

    pub fn parse_prototype(&mut self) -> ParseResult<Prototype> {
        self.parse_signature()
            .map_err(|error| error.with_note(prototype_syntax()))
    }

    fn parse_signature(&mut self) -> ParseResult<Prototype> {
        let (datatype, type_span) = self.parse_type()?;
        let (name, _) = self.expect_identifier()?;
        self.expect(Token::OpenRound)?;

        let mut args = vec![];
        if self.current() != Token::CloseRound {
            loop {
                let (datatype, span) = self.parse_type()?;
                let (name, name_span) = self.expect_identifier()?;
                args.push(Argument {
                    name,
                    datatype,
                    span: span.start..name_span.end,
                });

                if self.current() != Token::Comma {
                    break;
                }
                self.bump();
            }
        }

        let close = self.expect(Token::CloseRound)?;

        Ok(Prototype {
            name,
            args,
            datatype,
            span: type_span.start..close.end,
        })
    }

    /// `int` or `float`. `string` is a keyword but not a usable type yet.
    pub fn parse_type(&mut self) -> ParseResult<(DataType, Range<usize>)> {
        let span = self.lexer.span.clone();

        let datatype = match self.current() {
            Token::String => {
                return Err(ParseError {
                    kind: ParseErrorKind::UnsupportedType,
                    message: "values of type `string` are not supported".to_string(),
                    line: self.lexer.line,
                    span,
                    note: None,
                });
            }
            token => DataType::from_token(token).ok_or_else(|| self.unexpected("a type"))?,
        };

        self.bump();
        Ok((datatype, span))
    }

    pub fn parse_function(&mut self) -> ParseResult<FunctionDef> {
        let prototype = self.parse_prototype()?;
        self.expect(Token::OpenCurly)?;

        let mut body = vec![];
        loop {
            match self.current() {
                Token::CloseCurly => break,
                Token::Eof | Token::EmptyLexer => {
                    return Err(self.unexpected(&format!(
                        "'}}' to close the body of `{}`",
                        prototype.name
                    )));
                }
                _ => match self.parse_statement() {
                    Ok(statement) => body.push(statement),
                    Err(error) => {
                        self.errors.push(error);
                        self.skip_statement();
                    }
                },
            }
        }

        let close = self.expect(Token::CloseCurly)?;
        let span = prototype.span.start..close.end;

        Ok(FunctionDef {
            prototype,
            body,
            span,
        })
    }

    /// Recovery inside a body: past the next `;`, or up to the closing `}`.
    fn skip_statement(&mut self) {
        loop {
            match self.current() {
                Token::Eof | Token::EmptyLexer | Token::CloseCurly => return,
                Token::EndStatement => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }
}
