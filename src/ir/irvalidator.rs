use super::*;

use std::collections::HashMap;

/// Structural checks over built IR: every block terminates, registers are
/// defined once and before use, and operand types agree with each
/// instruction and with the signatures of called functions.
pub struct IRValidator;

impl IRValidator {
    pub fn validate_module(module: &Module) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for function in &module.functions {
            if let Err(mut func_errors) = Self::validate_function(function, module) {
                errors.append(&mut func_errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn validate_function(function: &Function, module: &Module) -> Result<(), Vec<String>> {
        if function.is_declaration() {
            return Ok(());
        }

        let mut checker = FunctionChecker {
            function,
            module,
            registers: HashMap::new(),
            slots: HashMap::new(),
            errors: Vec::new(),
        };

        for block in &function.blocks {
            for instruction in &block.instructions {
                checker.check_instruction(instruction);
            }

            match &block.terminator {
                Some(Terminator::Ret { value, ty }) => checker.check_ret(value, *ty),
                None => checker.error(format!("block `{}` has no terminator", block.label)),
            }
        }

        if checker.errors.is_empty() {
            Ok(())
        } else {
            Err(checker.errors)
        }
    }
}

struct FunctionChecker<'a> {
    function: &'a Function,
    module: &'a Module,
    registers: HashMap<&'a str, IRType>,
    /// Allocated type of every stack slot.
    slots: HashMap<&'a str, IRType>,
    errors: Vec<String>,
}

impl<'a> FunctionChecker<'a> {
    fn error(&mut self, message: String) {
        self.errors
            .push(format!("in `{}`: {}", self.function.name, message));
    }

    fn define(&mut self, dest: &'a str, ty: IRType) {
        if self.registers.insert(dest, ty).is_some() {
            self.error(format!("register %{} is defined more than once", dest));
        }
    }

    fn type_of(&mut self, value: &Value) -> Option<IRType> {
        match value {
            Value::Constant(c) => Some(c.ty()),
            Value::Register(name) => {
                let ty = self.registers.get(name.as_str()).copied();
                if ty.is_none() {
                    self.error(format!("register %{} is used before it is defined", name));
                }
                ty
            }
            Value::Argument(name) => {
                let ty = self
                    .function
                    .params
                    .iter()
                    .find(|(param, _)| param == name)
                    .map(|(_, ty)| *ty);
                if ty.is_none() {
                    self.error(format!("%{} is not a parameter", name));
                }
                ty
            }
        }
    }

    fn slot_of(&mut self, ptr: &Value) -> Option<IRType> {
        let Value::Register(name) = ptr else {
            self.error(format!("{} is not a pointer", ptr));
            return None;
        };
        let slot = self.slots.get(name.as_str()).copied();
        if slot.is_none() {
            self.error(format!("%{} does not point to a stack slot", name));
        }
        slot
    }

    fn expect(&mut self, what: &str, found: Option<IRType>, expected: IRType) {
        if let Some(found) = found {
            if found != expected {
                self.error(format!("{} has type {} but {} was expected", what, found, expected));
            }
        }
    }

    fn check_arithmetic(&mut self, dest: &'a str, lhs: &Value, rhs: &Value, ty: IRType) {
        let lhs_ty = self.type_of(lhs);
        let rhs_ty = self.type_of(rhs);
        if !ty.is_numeric() {
            self.error(format!("arithmetic on non-numeric type {}", ty));
        }
        self.expect(&format!("operand {}", lhs), lhs_ty, ty);
        self.expect(&format!("operand {}", rhs), rhs_ty, ty);
        self.define(dest, ty);
    }

    fn check_instruction(&mut self, instruction: &'a Instruction) {
        match instruction {
            Instruction::Alloca { dest, ty } => {
                self.define(dest, IRType::Ptr);
                self.slots.insert(dest, *ty);
            }
            Instruction::Load { dest, ptr, ty } => {
                let slot = self.slot_of(ptr);
                self.expect(&format!("slot {}", ptr), slot, *ty);
                self.define(dest, *ty);
            }
            Instruction::Store { value, ptr, ty } => {
                let value_ty = self.type_of(value);
                let slot = self.slot_of(ptr);
                self.expect(&format!("stored value {}", value), value_ty, *ty);
                self.expect(&format!("slot {}", ptr), slot, *ty);
            }
            Instruction::FAdd { dest, lhs, rhs, ty }
            | Instruction::FSub { dest, lhs, rhs, ty }
            | Instruction::FMul { dest, lhs, rhs, ty }
            | Instruction::FDiv { dest, lhs, rhs, ty } => {
                self.check_arithmetic(dest, lhs, rhs, *ty);
            }
            Instruction::FCmp {
                dest, lhs, rhs, ty, ..
            } => {
                let lhs_ty = self.type_of(lhs);
                let rhs_ty = self.type_of(rhs);
                self.expect(&format!("operand {}", lhs), lhs_ty, *ty);
                self.expect(&format!("operand {}", rhs), rhs_ty, *ty);
                self.define(dest, IRType::I1);
            }
            Instruction::UIToFP {
                dest,
                value,
                from_ty,
                to_ty,
            } => {
                let value_ty = self.type_of(value);
                self.expect(&format!("converted value {}", value), value_ty, *from_ty);
                if !matches!(from_ty, IRType::I1 | IRType::I32) || *to_ty != IRType::F32 {
                    self.error(format!("invalid conversion from {} to {}", from_ty, to_ty));
                }
                self.define(dest, *to_ty);
            }
            Instruction::Call {
                dest,
                func,
                args,
                ty,
            } => {
                self.check_call(func, args, *ty);
                if let Some(dest) = dest {
                    self.define(dest, *ty);
                }
            }
        }
    }

    fn check_call(&mut self, func: &str, args: &[Value], ty: IRType) {
        let module = self.module;
        let Some(callee) = module.get_function(func) else {
            self.error(format!("call to unknown function @{}", func));
            return;
        };

        if callee.params.len() != args.len() {
            self.error(format!(
                "@{} takes {} argument(s) but is called with {}",
                func,
                callee.params.len(),
                args.len()
            ));
        }
        for (arg, (_, param_ty)) in args.iter().zip(&callee.params) {
            let arg_ty = self.type_of(arg);
            self.expect(&format!("argument {} of @{}", arg, func), arg_ty, *param_ty);
        }
        self.expect(&format!("result of @{}", func), Some(callee.return_type), ty);
    }

    fn check_ret(&mut self, value: &Value, ty: IRType) {
        let value_ty = self.type_of(value);
        self.expect(&format!("returned value {}", value), value_ty, ty);
        self.expect("return", Some(ty), self.function.return_type);
    }
}
