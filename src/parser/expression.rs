use crate::ast::Expr;
use crate::lexer::Token;
use crate::parser::{ParseResult, Parser};

use std::ops::Range;

/// Binding power of the binary operators. Higher binds tighter.
pub static PRECEDENCE: phf::Map<&'static str, i32> = phf::phf_map! {
    "<" => 10,
    "+" => 20,
    "-" => 20,
    "*" => 40,
    "/" => 40,
};

impl Parser<'_> {
    /// One statement of a function body, including its `;`.
    pub fn parse_statement(&mut self) -> ParseResult<Expr> {
        let returning = self.current() == Token::Return;
        let start = self.lexer.span.start;
        if returning {
            self.bump();
        }

        let mut statement = match self.current() {
            Token::Int | Token::Float | Token::String => self.parse_definition()?,
            Token::Identifier if self.is_assignment() => {
                let (name, span) = self.expect_identifier()?;
                self.expect(Token::AssignmentOperator)?;
                let value = self.parse_expression()?;
                let span = span.start..value.span.end;
                Expr::assignment(name, value, span)
            }
            _ => self.parse_expression()?,
        };

        self.expect(Token::EndStatement)?;

        if returning {
            statement.span.start = start;
            statement = statement.returning();
        }
        Ok(statement)
    }

    fn is_assignment(&mut self) -> bool {
        self.lexer.look_ahead(1)
            && self
                .lexer
                .peek(0)
                .is_some_and(|next| next.token == Token::AssignmentOperator)
    }

    /// `int x = expr` or a bare `int x`, which is left for code generation
    /// to reject.
    fn parse_definition(&mut self) -> ParseResult<Expr> {
        let (datatype, type_span) = self.parse_type()?;
        let (name, name_span) = self.expect_identifier()?;

        let value = if self.current() == Token::AssignmentOperator {
            self.bump();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let end = value.as_ref().map_or(name_span.end, |v| v.span.end);
        Ok(Expr::definition(name, datatype, value, type_span.start..end))
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_primary()?;
        self.parse_binary_rhs(0, lhs)
    }

    fn operator_precedence(&self) -> Option<i32> {
        if self.current() != Token::Operator {
            return None;
        }
        PRECEDENCE.get(self.lexer.identifier.as_str()).copied()
    }

    /// Precedence climbing: folds operators binding at least as tight as
    /// `min_precedence` into `lhs`, left to right.
    fn parse_binary_rhs(&mut self, min_precedence: i32, mut lhs: Expr) -> ParseResult<Expr> {
        loop {
            let Some(precedence) = self.operator_precedence() else {
                return Ok(lhs);
            };
            if precedence < min_precedence {
                return Ok(lhs);
            }

            let op = self.lexer.identifier.clone();
            self.bump();

            let mut rhs = self.parse_primary()?;
            if self
                .operator_precedence()
                .is_some_and(|next| next > precedence)
            {
                rhs = self.parse_binary_rhs(precedence + 1, rhs)?;
            }

            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let span = self.lexer.span.clone();

        match self.current() {
            Token::Number => {
                let Some(value) = self.lexer.value else {
                    return Err(self.unexpected("a number"));
                };
                self.bump();
                Ok(Expr::number(value, span))
            }
            Token::Identifier => {
                let (name, span) = self.expect_identifier()?;
                if self.current() == Token::OpenRound {
                    self.parse_call(name, span)
                } else {
                    Ok(Expr::variable(name, span))
                }
            }
            Token::OpenRound => {
                self.bump();
                let mut inner = self.parse_expression()?;
                let close = self.expect(Token::CloseRound)?;
                inner.span = span.start..close.end;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_call(&mut self, callee: String, span: Range<usize>) -> ParseResult<Expr> {
        self.expect(Token::OpenRound)?;

        let mut args = vec![];
        if self.current() != Token::CloseRound {
            loop {
                args.push(self.parse_expression()?);
                if self.current() != Token::Comma {
                    break;
                }
                self.bump();
            }
        }

        let close = self.expect(Token::CloseRound)?;
        Ok(Expr::call(callee, args, span.start..close.end))
    }
}
