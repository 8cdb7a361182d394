use crate::ast::{FunctionDef, Prototype};
use crate::codegen::{Backend, Codegen, CodegenError, CodegenResult, ErrorKind};

use std::ops::{Deref, DerefMut};

/// Scope of one function body being lowered.
///
/// Entering clears the symbol table and makes `function` the current
/// function; dropping the context resets both, whichever way lowering ends.
pub struct FunctionContext<'a, B: Backend> {
    codegen: &'a mut Codegen<B>,
}

impl<'a, B: Backend> FunctionContext<'a, B> {
    pub fn enter(codegen: &'a mut Codegen<B>, function: B::Function) -> Self {
        codegen.named_values.clear();
        codegen.current_function = Some(function);
        FunctionContext { codegen }
    }
}

impl<B: Backend> Deref for FunctionContext<'_, B> {
    type Target = Codegen<B>;

    fn deref(&self) -> &Self::Target {
        self.codegen
    }
}

impl<B: Backend> DerefMut for FunctionContext<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.codegen
    }
}

impl<B: Backend> Drop for FunctionContext<'_, B> {
    fn drop(&mut self) {
        self.codegen.named_values.clear();
        self.codegen.current_function = None;
    }
}

impl<B: Backend> Codegen<B> {
    fn signature_matches(&self, existing: &B::Function, prototype: &Prototype) -> bool {
        let params = self.backend.param_kinds(existing);
        params.len() == prototype.args.len()
            && params
                .iter()
                .zip(&prototype.args)
                .all(|(kind, arg)| kind.accepts(Some(arg.datatype)))
            && self
                .backend
                .return_kind(existing)
                .accepts(Some(prototype.datatype))
    }

    fn signature_conflict(prototype: &Prototype) -> CodegenError {
        CodegenError::new(
            ErrorKind::Redefinition,
            format!(
                "function `{}` was already declared with a different signature",
                prototype.name
            ),
            prototype.span.clone(),
        )
    }

    /// Declares the function described by `prototype`. Declaring the same
    /// signature twice yields the existing function.
    pub fn codegen_prototype(&mut self, prototype: &Prototype) -> CodegenResult<B::Function> {
        if let Some(existing) = self.backend.get_function(&prototype.name) {
            if self.signature_matches(&existing, prototype) {
                return Ok(existing);
            }
            return Err(Self::signature_conflict(prototype));
        }

        let params: Vec<(&str, _)> = prototype
            .args
            .iter()
            .map(|arg| (arg.name.as_str(), arg.datatype))
            .collect();

        self.backend
            .declare_function(&prototype.name, &params, prototype.datatype)
            .map_err(|e| CodegenError::backend(e, prototype.span.clone()))
    }

    /// Lowers a function definition and verifies it. On failure the body is
    /// discarded: a function declared by an earlier `extern` goes back to
    /// being a declaration, one declared here is removed from the module.
    pub fn codegen_function(&mut self, function: &mut FunctionDef) -> CodegenResult<B::Function> {
        let name = function.prototype.name.clone();
        let span = function.span.clone();

        let (handle, declared_here) = match self.backend.get_function(&name) {
            Some(handle) => {
                if self.backend.has_body(&handle) {
                    return Err(CodegenError::new(
                        ErrorKind::Redefinition,
                        format!("function `{}` cannot be redefined", name),
                        function.prototype.span.clone(),
                    ));
                }

                let declared = self.backend.param_kinds(&handle).len();
                if declared != function.prototype.args.len() {
                    return Err(CodegenError::new(
                        ErrorKind::ArityMismatch,
                        format!(
                            "`{}` was declared with {} argument(s) but defined with {}",
                            name,
                            declared,
                            function.prototype.args.len()
                        ),
                        function.prototype.span.clone(),
                    ));
                }
                if !self.signature_matches(&handle, &function.prototype) {
                    return Err(Self::signature_conflict(&function.prototype));
                }
                (handle, false)
            }
            None => (self.codegen_prototype(&function.prototype)?, true),
        };

        if let Err(error) = self.codegen_body(&handle, function) {
            self.discard(&handle, declared_here);
            return Err(error);
        }

        if let Err(diagnostic) = self.backend.verify_function(&handle) {
            let ir = self.backend.print_function(&handle);
            self.discard(&handle, declared_here);
            return Err(CodegenError::new(
                ErrorKind::VerificationFailure,
                format!("function `{}` failed verification: {}", name, diagnostic),
                span,
            )
            .with_note(format!("generated code:\n{}", ir)));
        }

        Ok(handle)
    }

    fn discard(&mut self, handle: &B::Function, declared_here: bool) {
        if declared_here {
            self.backend.delete_function(handle);
        } else {
            self.backend.clear_body(handle);
        }
    }

    fn codegen_body(&mut self, handle: &B::Function, function: &mut FunctionDef) -> CodegenResult<()> {
        let span = function.span.clone();
        self.backend
            .append_entry_block(handle)
            .map_err(|e| CodegenError::backend(e, span.clone()))?;

        let mut scope = FunctionContext::enter(self, handle.clone());

        // Parameters are copied into stack slots so the body can assign them.
        let params = scope.backend.params(handle);
        for (arg, value) in function.prototype.args.iter().zip(params) {
            let slot = scope
                .backend
                .build_entry_alloca(handle, &arg.name, arg.datatype)
                .map_err(|e| CodegenError::backend(e, arg.span.clone()))?;
            scope
                .backend
                .build_store(value, &slot)
                .map_err(|e| CodegenError::backend(e, arg.span.clone()))?;
            scope.named_values.insert(arg.name.clone(), slot);
        }

        for statement in function.body.iter_mut() {
            match scope.codegen_expr(statement) {
                Ok(value) if statement.flags.is_return => {
                    if let Err(e) = scope.backend.build_return(value) {
                        let error = CodegenError::backend(e, statement.span.clone());
                        scope.errors.push(error);
                    }
                }
                Ok(_) => {}
                Err(error) => scope.errors.push(error),
            }
        }

        Ok(())
    }
}
