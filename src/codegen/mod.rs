use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};

use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Range;

use crate::ast::{ASTNode, DataType};

pub mod expression;
pub mod function;
#[cfg(feature = "llvm")]
pub mod llvm;

#[cfg(test)]
pub mod test;

pub use function::FunctionContext;

pub type BackendResult<T> = Result<T, String>;

/// Coarse classification of a backend type, used to match backend
/// signatures against the language's datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Integer,
    Float,
    Other,
}

impl TypeKind {
    /// Strict mapping used at call boundaries: no promotion.
    pub fn accepts(self, datatype: Option<DataType>) -> bool {
        matches!(
            (self, datatype),
            (TypeKind::Integer, Some(DataType::Int)) | (TypeKind::Float, Some(DataType::Float))
        )
    }

    /// The datatype of a value stored with this kind. Anything that is not a
    /// float is read back as an int.
    pub fn datatype(self) -> DataType {
        match self {
            TypeKind::Float => DataType::Float,
            TypeKind::Integer | TypeKind::Other => DataType::Int,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// The IR construction primitives code generation needs. Implemented by the
/// in-crate [`crate::ir::IRBuilder`] and, with the `llvm` feature, by
/// [`llvm::LLVMBackend`].
pub trait Backend {
    type Value: Clone + Debug;
    type Function: Clone + Debug;
    /// Handle to stack storage created with [`Backend::build_entry_alloca`].
    type Slot: Clone + Debug;

    fn get_function(&self, name: &str) -> Option<Self::Function>;
    /// Adds an externally linked function with the given signature.
    fn declare_function(
        &mut self,
        name: &str,
        params: &[(&str, DataType)],
        return_type: DataType,
    ) -> BackendResult<Self::Function>;
    fn param_kinds(&self, function: &Self::Function) -> Vec<TypeKind>;
    fn return_kind(&self, function: &Self::Function) -> TypeKind;
    /// Incoming parameter values, in declaration order.
    fn params(&self, function: &Self::Function) -> Vec<Self::Value>;
    fn has_body(&self, function: &Self::Function) -> bool;
    fn delete_function(&mut self, function: &Self::Function);
    /// Drops the body of `function`, leaving its declaration in place.
    fn clear_body(&mut self, function: &Self::Function);

    /// Opens the entry block of `function` and moves the insertion point there.
    fn append_entry_block(&mut self, function: &Self::Function) -> BackendResult<()>;
    /// Allocates storage at the top of the entry block, ahead of any code
    /// already emitted.
    fn build_entry_alloca(
        &mut self,
        function: &Self::Function,
        name: &str,
        datatype: DataType,
    ) -> BackendResult<Self::Slot>;
    fn slot_kind(&self, slot: &Self::Slot) -> TypeKind;
    /// Stores `value` and hands it back as the result of the store.
    fn build_store(&mut self, value: Self::Value, slot: &Self::Slot) -> BackendResult<Self::Value>;
    fn build_load(&mut self, slot: &Self::Slot, name: &str) -> BackendResult<Self::Value>;

    fn const_int(&mut self, value: i32) -> Self::Value;
    fn const_float(&mut self, value: f32) -> Self::Value;
    fn build_float_op(
        &mut self,
        op: FloatOp,
        lhs: Self::Value,
        rhs: Self::Value,
        name: &str,
    ) -> BackendResult<Self::Value>;
    /// Unordered less-than; yields a one bit integer.
    fn build_float_lt(
        &mut self,
        lhs: Self::Value,
        rhs: Self::Value,
        name: &str,
    ) -> BackendResult<Self::Value>;
    fn build_uint_to_float(&mut self, value: Self::Value, name: &str) -> BackendResult<Self::Value>;
    fn build_call(
        &mut self,
        function: &Self::Function,
        args: &[Self::Value],
        name: &str,
    ) -> BackendResult<Self::Value>;
    fn build_return(&mut self, value: Self::Value) -> BackendResult<()>;

    /// Structural well-formedness check, with a readable diagnostic on failure.
    fn verify_function(&self, function: &Self::Function) -> Result<(), String>;
    fn print_function(&self, function: &Self::Function) -> String;
    fn print_module(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UndefinedVariable,
    MissingInitializer,
    TypeUnresolved,
    UnrecognizedOperator,
    UndefinedFunction,
    ArityMismatch,
    ArgumentTypeMismatch,
    Redefinition,
    VerificationFailure,
    InvalidNodeState,
    Backend,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::UndefinedVariable => "undefined variable",
            ErrorKind::MissingInitializer => "missing initializer",
            ErrorKind::TypeUnresolved => "type unresolved",
            ErrorKind::UnrecognizedOperator => "unrecognized operator",
            ErrorKind::UndefinedFunction => "undefined function",
            ErrorKind::ArityMismatch => "arity mismatch",
            ErrorKind::ArgumentTypeMismatch => "argument type mismatch",
            ErrorKind::Redefinition => "redefinition",
            ErrorKind::VerificationFailure => "verification failure",
            ErrorKind::InvalidNodeState => "invalid node",
            ErrorKind::Backend => "backend",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodegenError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Range<usize>,
    /// Extra context, such as the IR of a function that failed verification.
    pub note: Option<String>,
}

impl CodegenError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Range<usize>) -> Self {
        CodegenError {
            kind,
            message: message.into(),
            span,
            note: None,
        }
    }

    pub fn backend(message: String, span: Range<usize>) -> Self {
        Self::new(ErrorKind::Backend, message, span)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// One-based line of the error in `source`.
    pub fn line(&self, source: &str) -> usize {
        let end = self.span.start.min(source.len());
        source[..end].matches('\n').count() + 1
    }
}

impl Display for CodegenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Lowers AST items through a [`Backend`].
///
/// The symbol table holds exactly one flat scope and is only populated while
/// a function body is being lowered, see [`FunctionContext`].
pub struct Codegen<B: Backend> {
    backend: B,
    named_values: HashMap<String, B::Slot>,
    current_function: Option<B::Function>,
    errors: Vec<CodegenError>,
}

impl<B: Backend> Codegen<B> {
    pub fn new(backend: B) -> Self {
        Codegen {
            backend,
            named_values: HashMap::new(),
            current_function: None,
            errors: vec![],
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn named_values(&self) -> &HashMap<String, B::Slot> {
        &self.named_values
    }

    pub fn current_function(&self) -> Option<&B::Function> {
        self.current_function.as_ref()
    }

    pub fn errors(&self) -> &[CodegenError] {
        &self.errors
    }

    /// Lowers every item in order. A failing item is recorded and skipped so
    /// the remaining items still get compiled. Returns false if any error
    /// was recorded.
    pub fn generate_module(&mut self, ast: &mut [ASTNode]) -> bool {
        let before = self.errors.len();

        for node in ast.iter_mut() {
            self.generate_item(node);
        }

        self.errors.len() == before
    }

    /// Lowers one top level item, recording any error. Returns false if the
    /// item failed or if lowering its body recorded an error.
    pub fn generate_item(&mut self, node: &mut ASTNode) -> bool {
        let before = self.errors.len();

        let result = match node {
            ASTNode::Extern(prototype) => self.codegen_prototype(prototype).map(drop),
            ASTNode::Function(function) => self.codegen_function(function).map(drop),
        };

        if let Err(error) = result {
            self.errors.push(error);
        }

        self.errors.len() == before
    }

    /// Prints every recorded error. Returns true if there was any.
    pub fn report_errors(&self, file: &str, source: &str) -> bool {
        let source = Source::from(source.to_string());

        for error in &self.errors {
            let mut report = Report::build(ReportKind::Error, (file.to_string(), error.span.clone()))
                .with_code(error.kind.code())
                .with_message(&error.message)
                .with_label(
                    Label::new((file.to_string(), error.span.clone()))
                        .with_message(&error.message)
                        .with_color(ColorGenerator::new().next()),
                );

            if let Some(note) = &error.note {
                report = report.with_note(note);
            }

            let _ = report.finish().eprint((file.to_string(), source.clone()));
        }

        !self.errors.is_empty()
    }
}
