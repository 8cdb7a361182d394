use crate::ast::{DataType, Expr, ExprKind, NodeFlags};
use crate::codegen::{Backend, Codegen, CodegenError, CodegenResult, ErrorKind, FloatOp};
use crate::lexer::Number;

use std::ops::Range;

impl<B: Backend> Codegen<B> {
    /// Lowers one expression or statement, resolving its datatype on the way.
    pub fn codegen_expr(&mut self, expr: &mut Expr) -> CodegenResult<B::Value> {
        let span = expr.span.clone();

        match &mut expr.kind {
            ExprKind::Number(number) => Ok(self.codegen_number(*number)),
            ExprKind::Variable { name, value } => self.codegen_variable(
                name,
                value.as_deref_mut(),
                &mut expr.datatype,
                expr.flags,
                span,
            ),
            ExprKind::Binary { op, lhs, rhs } => {
                let (value, datatype) = self.codegen_binary(op, lhs, rhs, span)?;
                expr.datatype = Some(datatype);
                Ok(value)
            }
            ExprKind::Call { callee, args } => {
                let (value, datatype) = self.codegen_call(callee, args, span)?;
                expr.datatype = Some(datatype);
                Ok(value)
            }
        }
    }

    fn codegen_number(&mut self, number: Number) -> B::Value {
        match number {
            Number::Int(i) => self.backend.const_int(i),
            Number::Float(f) => self.backend.const_float(f),
        }
    }

    fn codegen_variable(
        &mut self,
        name: &str,
        value: Option<&mut Expr>,
        datatype: &mut Option<DataType>,
        flags: NodeFlags,
        span: Range<usize>,
    ) -> CodegenResult<B::Value> {
        if flags.is_definition {
            return self.codegen_definition(name, value, *datatype, span);
        }

        let Some(slot) = self.named_values.get(name).cloned() else {
            return Err(match datatype {
                Some(declared) => CodegenError::new(
                    ErrorKind::InvalidNodeState,
                    format!("variable `{}` has type {} but was never defined", name, declared),
                    span,
                ),
                None => CodegenError::new(
                    ErrorKind::UndefinedVariable,
                    format!("variable `{}` is not defined", name),
                    span,
                ),
            });
        };

        let stored = self.backend.slot_kind(&slot).datatype();
        if let Some(declared) = *datatype {
            if declared != stored {
                return Err(CodegenError::new(
                    ErrorKind::InvalidNodeState,
                    format!(
                        "variable `{}` is used as {} but was defined as {}",
                        name, declared, stored
                    ),
                    span,
                ));
            }
        }
        *datatype = Some(stored);

        match value {
            // assignment
            Some(value) => {
                let value = self.codegen_expr(value)?;
                self.backend
                    .build_store(value, &slot)
                    .map_err(|e| CodegenError::backend(e, span))
            }
            // read
            None => self
                .backend
                .build_load(&slot, name)
                .map_err(|e| CodegenError::backend(e, span)),
        }
    }

    fn codegen_definition(
        &mut self,
        name: &str,
        value: Option<&mut Expr>,
        datatype: Option<DataType>,
        span: Range<usize>,
    ) -> CodegenResult<B::Value> {
        let Some(datatype) = datatype else {
            return Err(CodegenError::new(
                ErrorKind::InvalidNodeState,
                format!("definition of `{}` has no type", name),
                span,
            ));
        };
        let Some(function) = self.current_function.clone() else {
            return Err(CodegenError::new(
                ErrorKind::InvalidNodeState,
                format!("definition of `{}` outside of a function", name),
                span,
            ));
        };

        let slot = self
            .backend
            .build_entry_alloca(&function, name, datatype)
            .map_err(|e| CodegenError::backend(e, span.clone()))?;
        self.named_values.insert(name.to_string(), slot.clone());

        let Some(value) = value else {
            return Err(CodegenError::new(
                ErrorKind::MissingInitializer,
                format!("expected a value for the definition of `{}`", name),
                span,
            ));
        };

        let value = self.codegen_expr(value)?;
        self.backend
            .build_store(value, &slot)
            .map_err(|e| CodegenError::backend(e, span))
    }

    fn codegen_binary(
        &mut self,
        op: &str,
        lhs: &mut Expr,
        rhs: &mut Expr,
        span: Range<usize>,
    ) -> CodegenResult<(B::Value, DataType)> {
        let lhs_value = self.codegen_expr(lhs)?;
        let rhs_value = self.codegen_expr(rhs)?;

        let (lhs_value, rhs_value, datatype) =
            self.homogenize_operands(lhs.datatype, rhs.datatype, lhs_value, rhs_value, &span)?;

        let float_op = match op {
            "+" => FloatOp::Add,
            "-" => FloatOp::Sub,
            "*" => FloatOp::Mul,
            "/" => FloatOp::Div,
            "<" => {
                let cmp = self
                    .backend
                    .build_float_lt(lhs_value, rhs_value, "cmptmp")
                    .map_err(|e| CodegenError::backend(e, span.clone()))?;
                // No boolean type: comparisons evaluate to 0.0 or 1.0.
                let value = self
                    .backend
                    .build_uint_to_float(cmp, "booltmp")
                    .map_err(|e| CodegenError::backend(e, span))?;
                return Ok((value, DataType::Float));
            }
            _ => {
                return Err(CodegenError::new(
                    ErrorKind::UnrecognizedOperator,
                    format!("unrecognized operator `{}`", op),
                    span,
                ));
            }
        };

        let name = match float_op {
            FloatOp::Add => "addtmp",
            FloatOp::Sub => "subtmp",
            FloatOp::Mul => "multmp",
            FloatOp::Div => "divtmp",
        };

        let value = self
            .backend
            .build_float_op(float_op, lhs_value, rhs_value, name)
            .map_err(|e| CodegenError::backend(e, span))?;
        Ok((value, datatype))
    }

    /// Brings both operands of a binary operation to a common datatype.
    /// Only int to float widening exists.
    pub fn homogenize_operands(
        &mut self,
        lhs_type: Option<DataType>,
        rhs_type: Option<DataType>,
        lhs: B::Value,
        rhs: B::Value,
        span: &Range<usize>,
    ) -> CodegenResult<(B::Value, B::Value, DataType)> {
        let (Some(lhs_type), Some(rhs_type)) = (lhs_type, rhs_type) else {
            return Err(CodegenError::new(
                ErrorKind::TypeUnresolved,
                "cannot deduce the type of the operation",
                span.clone(),
            ));
        };

        match (lhs_type, rhs_type) {
            (DataType::Float, DataType::Int) => {
                let rhs = self
                    .backend
                    .build_uint_to_float(rhs, "intToFPcast")
                    .map_err(|e| CodegenError::backend(e, span.clone()))?;
                Ok((lhs, rhs, DataType::Float))
            }
            (DataType::Int, DataType::Float) => {
                let lhs = self
                    .backend
                    .build_uint_to_float(lhs, "intToFPcast")
                    .map_err(|e| CodegenError::backend(e, span.clone()))?;
                Ok((lhs, rhs, DataType::Float))
            }
            _ => Ok((lhs, rhs, lhs_type)),
        }
    }

    fn codegen_call(
        &mut self,
        callee: &str,
        args: &mut [Expr],
        span: Range<usize>,
    ) -> CodegenResult<(B::Value, DataType)> {
        let Some(function) = self.backend.get_function(callee) else {
            return Err(CodegenError::new(
                ErrorKind::UndefinedFunction,
                format!("function `{}` is not defined", callee),
                span,
            ));
        };

        let kinds = self.backend.param_kinds(&function);
        if kinds.len() != args.len() {
            return Err(CodegenError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "`{}` takes {} argument(s) but {} were given",
                    callee,
                    kinds.len(),
                    args.len()
                ),
                span,
            ));
        }

        // Every argument is checked before anything is emitted.
        for (index, (arg, kind)) in args.iter_mut().zip(&kinds).enumerate() {
            let datatype = self.resolve_datatype(arg);
            if !kind.accepts(datatype) {
                let found = datatype.map_or("an unresolved type".to_string(), |t| t.to_string());
                return Err(CodegenError::new(
                    ErrorKind::ArgumentTypeMismatch,
                    format!(
                        "argument {} of `{}` expects {} but got {}",
                        index + 1,
                        callee,
                        kind.datatype(),
                        found
                    ),
                    arg.span.clone(),
                ));
            }
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            values.push(self.codegen_expr(arg)?);
        }

        let value = self
            .backend
            .build_call(&function, &values, "calltmp")
            .map_err(|e| CodegenError::backend(e, span))?;
        let datatype = self.backend.return_kind(&function).datatype();
        Ok((value, datatype))
    }

    /// Works out the datatype an expression will have without emitting any
    /// code, recording it on the nodes it could resolve.
    pub fn resolve_datatype(&self, expr: &mut Expr) -> Option<DataType> {
        if expr.datatype.is_some() || expr.flags.is_definition {
            return expr.datatype;
        }

        let datatype = match &mut expr.kind {
            ExprKind::Number(number) => DataType::from_token(number.token()),
            ExprKind::Variable { name, .. } => self
                .named_values
                .get(name.as_str())
                .map(|slot| self.backend.slot_kind(slot).datatype()),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.resolve_datatype(lhs);
                let rhs = self.resolve_datatype(rhs);
                match (lhs, rhs) {
                    (Some(_), Some(_)) if op.as_str() == "<" => Some(DataType::Float),
                    (Some(lhs), Some(rhs)) if lhs == rhs => Some(lhs),
                    (Some(_), Some(_)) => Some(DataType::Float),
                    _ => None,
                }
            }
            ExprKind::Call { callee, .. } => self
                .backend
                .get_function(callee)
                .map(|f| self.backend.return_kind(&f).datatype()),
        };

        expr.datatype = datatype;
        datatype
    }
}
