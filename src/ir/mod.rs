use std::fmt::{self, Display, Formatter};

use crate::ast::DataType;
use crate::codegen::TypeKind;

pub mod builder;
pub mod irvalidator;


pub use builder::{IRBuilder, Slot};
pub use irvalidator::IRValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IRType {
    I1,  // bool
    I32, // int
    F32, // float
    Ptr, // stack slot
}

impl IRType {
    pub fn kind(self) -> TypeKind {
        match self {
            IRType::I1 | IRType::I32 => TypeKind::Integer,
            IRType::F32 => TypeKind::Float,
            IRType::Ptr => TypeKind::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, IRType::I32 | IRType::F32)
    }
}

impl From<DataType> for IRType {
    fn from(datatype: DataType) -> Self {
        match datatype {
            DataType::Int => IRType::I32,
            DataType::Float => IRType::F32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Constant(Constant),
    Register(String),
    Argument(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    I32(i32),
    F32(f32),
}

impl Constant {
    pub fn ty(self) -> IRType {
        match self {
            Constant::I32(_) => IRType::I32,
            Constant::F32(_) => IRType::F32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        BasicBlock {
            label: label.into(),
            instructions: Vec::new(),
            terminator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Memory operations
    Alloca {
        dest: String,
        ty: IRType,
    },
    Load {
        dest: String,
        ptr: Value,
        ty: IRType,
    },
    Store {
        value: Value,
        ptr: Value,
        ty: IRType,
    },

    // Floating point arithmetic. `ty` is the operand type.
    FAdd {
        dest: String,
        lhs: Value,
        rhs: Value,
        ty: IRType,
    },
    FSub {
        dest: String,
        lhs: Value,
        rhs: Value,
        ty: IRType,
    },
    FMul {
        dest: String,
        lhs: Value,
        rhs: Value,
        ty: IRType,
    },
    FDiv {
        dest: String,
        lhs: Value,
        rhs: Value,
        ty: IRType,
    },

    // Comparison, producing an i1
    FCmp {
        dest: String,
        cond: FCmpCond,
        lhs: Value,
        rhs: Value,
        ty: IRType,
    },

    // Type conversions
    UIToFP {
        dest: String,
        value: Value,
        from_ty: IRType,
        to_ty: IRType,
    },

    // Function calls
    Call {
        dest: Option<String>,
        func: String,
        args: Vec<Value>,
        ty: IRType,
    },
}

impl Instruction {
    pub fn dest(&self) -> Option<&str> {
        match self {
            Instruction::Alloca { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::FAdd { dest, .. }
            | Instruction::FSub { dest, .. }
            | Instruction::FMul { dest, .. }
            | Instruction::FDiv { dest, .. }
            | Instruction::FCmp { dest, .. }
            | Instruction::UIToFP { dest, .. } => Some(dest),
            Instruction::Call { dest, .. } => dest.as_deref(),
            Instruction::Store { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret { value: Value, ty: IRType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FCmpCond {
    Ult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, IRType)>,
    pub return_type: IRType,
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    /// True while the function is only declared (extern or not yet defined).
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl Display for IRType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IRType::I1 => write!(f, "i1"),
            IRType::I32 => write!(f, "i32"),
            IRType::F32 => write!(f, "float"),
            IRType::Ptr => write!(f, "ptr"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(constant) => write!(f, "{}", constant),
            Value::Register(name) | Value::Argument(name) => write!(f, "%{}", name),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::I32(value) => write!(f, "{}", value),
            Constant::F32(value) => write!(f, "{:.6}", value),
        }
    }
}

impl Display for FCmpCond {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FCmpCond::Ult => write!(f, "ult"),
        }
    }
}

fn join<T: Display>(items: impl Iterator<Item = T>) -> String {
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(dest) = self.dest() {
            write!(f, "  %{} = ", dest)?;
        } else {
            write!(f, "  ")?;
        }

        match self {
            Instruction::Alloca { ty, .. } => write!(f, "alloca {}", ty),
            Instruction::Load { ptr, ty, .. } => write!(f, "load {}, ptr {}", ty, ptr),
            Instruction::Store { value, ptr, ty } => write!(f, "store {} {}, ptr {}", ty, value, ptr),
            Instruction::FAdd { lhs, rhs, ty, .. } => write!(f, "fadd {} {}, {}", ty, lhs, rhs),
            Instruction::FSub { lhs, rhs, ty, .. } => write!(f, "fsub {} {}, {}", ty, lhs, rhs),
            Instruction::FMul { lhs, rhs, ty, .. } => write!(f, "fmul {} {}, {}", ty, lhs, rhs),
            Instruction::FDiv { lhs, rhs, ty, .. } => write!(f, "fdiv {} {}, {}", ty, lhs, rhs),
            Instruction::FCmp {
                cond, lhs, rhs, ty, ..
            } => write!(f, "fcmp {} {} {}, {}", cond, ty, lhs, rhs),
            Instruction::UIToFP {
                value,
                from_ty,
                to_ty,
                ..
            } => write!(f, "uitofp {} {} to {}", from_ty, value, to_ty),
            Instruction::Call { func, args, ty, .. } => {
                write!(f, "call {} @{}({})", ty, func, join(args.iter()))
            }
        }
    }
}

impl Display for Terminator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret { value, ty } => write!(f, "  ret {} {}", ty, value),
        }
    }
}

impl Display for BasicBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        self.instructions
            .iter()
            .try_for_each(|instruction| writeln!(f, "{}", instruction))?;
        match &self.terminator {
            Some(terminator) => writeln!(f, "{}", terminator),
            None => Ok(()),
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let params = join(self.params.iter().map(|(name, ty)| format!("{} %{}", ty, name)));
        let keyword = if self.is_declaration() { "declare" } else { "define" };
        write!(f, "{} {} @{}({})", keyword, self.return_type, self.name, params)?;

        if self.is_declaration() {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        self.blocks.iter().try_for_each(|block| write!(f, "{}", block))?;
        writeln!(f, "}}")
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "; Module: {}", self.name)?;
        self.functions
            .iter()
            .try_for_each(|function| write!(f, "\n{}", function))
    }
}
