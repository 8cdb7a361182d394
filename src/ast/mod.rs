use std::ops::Range;

use crate::lexer::{Number, Token};

/// The two value types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Float,
}

impl DataType {
    pub fn from_token(token: Token) -> Option<DataType> {
        match token {
            Token::Int => Some(DataType::Int),
            Token::Float => Some(DataType::Float),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub is_definition: bool,
    pub is_return: bool,
}

/// An expression or statement node. `datatype` is `None` until the node's
/// type is known, either from the source or from code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub datatype: Option<DataType>,
    pub flags: NodeFlags,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(Number),
    /// A read, an assignment (`value` set) or a definition (flagged).
    Variable {
        name: String,
        value: Option<Box<Expr>>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    fn new(kind: ExprKind, datatype: Option<DataType>, span: Range<usize>) -> Self {
        Expr {
            kind,
            datatype,
            flags: NodeFlags::default(),
            span,
        }
    }

    pub fn number(value: Number, span: Range<usize>) -> Self {
        let datatype = DataType::from_token(value.token());
        Self::new(ExprKind::Number(value), datatype, span)
    }

    pub fn variable(name: impl Into<String>, span: Range<usize>) -> Self {
        Self::new(
            ExprKind::Variable {
                name: name.into(),
                value: None,
            },
            None,
            span,
        )
    }

    pub fn assignment(name: impl Into<String>, value: Expr, span: Range<usize>) -> Self {
        Self::new(
            ExprKind::Variable {
                name: name.into(),
                value: Some(Box::new(value)),
            },
            None,
            span,
        )
    }

    pub fn definition(
        name: impl Into<String>,
        datatype: DataType,
        value: Option<Expr>,
        span: Range<usize>,
    ) -> Self {
        let mut expr = Self::new(
            ExprKind::Variable {
                name: name.into(),
                value: value.map(Box::new),
            },
            Some(datatype),
            span,
        );
        expr.flags.is_definition = true;
        expr
    }

    pub fn binary(op: impl Into<String>, lhs: Expr, rhs: Expr) -> Self {
        let span = lhs.span.start..rhs.span.end;
        Self::new(
            ExprKind::Binary {
                op: op.into(),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            None,
            span,
        )
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>, span: Range<usize>) -> Self {
        Self::new(
            ExprKind::Call {
                callee: callee.into(),
                args,
            },
            None,
            span,
        )
    }

    /// Marks this statement as the value returned from its function.
    pub fn returning(mut self) -> Self {
        self.flags.is_return = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub datatype: DataType,
    pub span: Range<usize>,
}

/// A function signature: `float name(int a, float b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<Argument>,
    pub datatype: DataType,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub prototype: Prototype,
    pub body: Vec<Expr>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ASTNode {
    Extern(Prototype),
    Function(FunctionDef),
}

impl ASTNode {
    pub fn name(&self) -> &str {
        match self {
            ASTNode::Extern(prototype) => &prototype.name,
            ASTNode::Function(function) => &function.prototype.name,
        }
    }
}
