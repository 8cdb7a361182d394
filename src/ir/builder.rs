use super::*;
use crate::ast::DataType;
use crate::codegen::{Backend, BackendResult, FloatOp, TypeKind};

use std::collections::{HashMap, HashSet};

/// A stack slot: the register holding its address and the allocated type.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub register: String,
    pub ty: IRType,
}

/// Builds an in-memory [`Module`]. This is the default [`Backend`].
pub struct IRBuilder {
    module: Module,
    current_function: Option<String>,
    register_names: HashSet<String>,
    register_types: HashMap<String, IRType>,
    entry_allocas: usize,
}

impl IRBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module: Module::new(module_name),
            current_function: None,
            register_names: HashSet::new(),
            register_types: HashMap::new(),
            entry_allocas: 0,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn function(&self, name: &str) -> BackendResult<&Function> {
        self.module
            .get_function(name)
            .ok_or_else(|| format!("no function named `{}` in module", name))
    }

    fn current_function(&self) -> BackendResult<&Function> {
        let name = self
            .current_function
            .as_deref()
            .ok_or("no insertion point is set")?;
        self.function(name)
    }

    fn current_block(&mut self) -> BackendResult<&mut BasicBlock> {
        let name = self
            .current_function
            .as_deref()
            .ok_or("no insertion point is set")?;
        let function = self
            .module
            .functions
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| format!("no function named `{}` in module", name))?;
        function
            .blocks
            .last_mut()
            .ok_or_else(|| format!("function `{}` has no blocks", name))
    }

    /// Unique register name within the current function: `x`, `x1`, `x2`...
    fn new_register(&mut self, name: &str) -> String {
        let base = if name.is_empty() { "tmp" } else { name };
        let mut register = base.to_string();
        let mut suffix = 0;
        while self.register_names.contains(&register) {
            suffix += 1;
            register = format!("{}{}", base, suffix);
        }
        self.register_names.insert(register.clone());
        register
    }

    fn value_type(&self, value: &Value) -> BackendResult<IRType> {
        match value {
            Value::Constant(c) => Ok(c.ty()),
            Value::Register(name) => self
                .register_types
                .get(name)
                .copied()
                .ok_or_else(|| format!("unknown register %{}", name)),
            Value::Argument(name) => self
                .current_function()?
                .params
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, ty)| *ty)
                .ok_or_else(|| format!("unknown argument %{}", name)),
        }
    }

    fn add_instruction(&mut self, instruction: Instruction) -> BackendResult<()> {
        let block = self.current_block()?;
        if block.terminator.is_some() {
            return Err(format!(
                "cannot add `{}` after the terminator of block `{}`",
                instruction.to_string().trim(),
                block.label
            ));
        }
        block.instructions.push(instruction);
        Ok(())
    }

    fn define(&mut self, name: &str, ty: IRType) -> String {
        let register = self.new_register(name);
        self.register_types.insert(register.clone(), ty);
        register
    }
}

impl Backend for IRBuilder {
    type Value = Value;
    type Function = String;
    type Slot = Slot;

    fn get_function(&self, name: &str) -> Option<String> {
        self.module.get_function(name).map(|f| f.name.clone())
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[(&str, DataType)],
        return_type: DataType,
    ) -> BackendResult<String> {
        if self.module.get_function(name).is_some() {
            return Err(format!("function `{}` is already declared", name));
        }

        self.module.functions.push(Function {
            name: name.to_string(),
            params: params
                .iter()
                .map(|(param, datatype)| (param.to_string(), IRType::from(*datatype)))
                .collect(),
            return_type: IRType::from(return_type),
            blocks: Vec::new(),
        });
        Ok(name.to_string())
    }

    fn param_kinds(&self, function: &String) -> Vec<TypeKind> {
        self.module
            .get_function(function)
            .map(|f| f.params.iter().map(|(_, ty)| ty.kind()).collect())
            .unwrap_or_default()
    }

    fn return_kind(&self, function: &String) -> TypeKind {
        self.module
            .get_function(function)
            .map_or(TypeKind::Other, |f| f.return_type.kind())
    }

    fn params(&self, function: &String) -> Vec<Value> {
        self.module
            .get_function(function)
            .map(|f| {
                f.params
                    .iter()
                    .map(|(name, _)| Value::Argument(name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_body(&self, function: &String) -> bool {
        self.module
            .get_function(function)
            .is_some_and(|f| !f.is_declaration())
    }

    fn delete_function(&mut self, function: &String) {
        self.module.functions.retain(|f| &f.name != function);
        if self.current_function.as_ref() == Some(function) {
            self.current_function = None;
        }
    }

    fn clear_body(&mut self, function: &String) {
        if let Some(target) = self.module.functions.iter_mut().find(|f| &f.name == function) {
            target.blocks.clear();
        }
        if self.current_function.as_ref() == Some(function) {
            self.current_function = None;
        }
    }

    fn append_entry_block(&mut self, function: &String) -> BackendResult<()> {
        let target = self
            .module
            .functions
            .iter_mut()
            .find(|f| &f.name == function)
            .ok_or_else(|| format!("no function named `{}` in module", function))?;
        target.blocks.push(BasicBlock::new("entry"));

        let params: Vec<String> = target.params.iter().map(|(name, _)| name.clone()).collect();

        self.current_function = Some(function.clone());
        self.register_names.clear();
        self.register_types.clear();
        self.entry_allocas = 0;
        self.register_names.extend(params);
        Ok(())
    }

    fn build_entry_alloca(
        &mut self,
        function: &String,
        name: &str,
        datatype: DataType,
    ) -> BackendResult<Slot> {
        if self.current_function.as_ref() != Some(function) {
            return Err(format!("`{}` is not the function being built", function));
        }

        let ty = IRType::from(datatype);
        let register = self.define(name, IRType::Ptr);
        let index = self.entry_allocas;

        let entry = self
            .module
            .functions
            .iter_mut()
            .find(|f| &f.name == function)
            .and_then(|f| f.blocks.first_mut())
            .ok_or_else(|| format!("function `{}` has no entry block", function))?;
        entry.instructions.insert(
            index,
            Instruction::Alloca {
                dest: register.clone(),
                ty,
            },
        );
        self.entry_allocas += 1;

        Ok(Slot { register, ty })
    }

    fn slot_kind(&self, slot: &Slot) -> TypeKind {
        slot.ty.kind()
    }

    fn build_store(&mut self, value: Value, slot: &Slot) -> BackendResult<Value> {
        self.add_instruction(Instruction::Store {
            value: value.clone(),
            ptr: Value::Register(slot.register.clone()),
            ty: slot.ty,
        })?;
        Ok(value)
    }

    fn build_load(&mut self, slot: &Slot, name: &str) -> BackendResult<Value> {
        let dest = self.define(name, slot.ty);
        self.add_instruction(Instruction::Load {
            dest: dest.clone(),
            ptr: Value::Register(slot.register.clone()),
            ty: slot.ty,
        })?;
        Ok(Value::Register(dest))
    }

    fn const_int(&mut self, value: i32) -> Value {
        Value::Constant(Constant::I32(value))
    }

    fn const_float(&mut self, value: f32) -> Value {
        Value::Constant(Constant::F32(value))
    }

    fn build_float_op(
        &mut self,
        op: FloatOp,
        lhs: Value,
        rhs: Value,
        name: &str,
    ) -> BackendResult<Value> {
        let ty = self.value_type(&lhs)?;
        let dest = self.define(name, ty);

        let instruction = match op {
            FloatOp::Add => Instruction::FAdd {
                dest: dest.clone(),
                lhs,
                rhs,
                ty,
            },
            FloatOp::Sub => Instruction::FSub {
                dest: dest.clone(),
                lhs,
                rhs,
                ty,
            },
            FloatOp::Mul => Instruction::FMul {
                dest: dest.clone(),
                lhs,
                rhs,
                ty,
            },
            FloatOp::Div => Instruction::FDiv {
                dest: dest.clone(),
                lhs,
                rhs,
                ty,
            },
        };

        self.add_instruction(instruction)?;
        Ok(Value::Register(dest))
    }

    fn build_float_lt(&mut self, lhs: Value, rhs: Value, name: &str) -> BackendResult<Value> {
        let ty = self.value_type(&lhs)?;
        let dest = self.define(name, IRType::I1);
        self.add_instruction(Instruction::FCmp {
            dest: dest.clone(),
            cond: FCmpCond::Ult,
            lhs,
            rhs,
            ty,
        })?;
        Ok(Value::Register(dest))
    }

    fn build_uint_to_float(&mut self, value: Value, name: &str) -> BackendResult<Value> {
        let from_ty = self.value_type(&value)?;
        let dest = self.define(name, IRType::F32);
        self.add_instruction(Instruction::UIToFP {
            dest: dest.clone(),
            value,
            from_ty,
            to_ty: IRType::F32,
        })?;
        Ok(Value::Register(dest))
    }

    fn build_call(&mut self, function: &String, args: &[Value], name: &str) -> BackendResult<Value> {
        let ty = self.function(function)?.return_type;
        let dest = self.define(name, ty);
        self.add_instruction(Instruction::Call {
            dest: Some(dest.clone()),
            func: function.clone(),
            args: args.to_vec(),
            ty,
        })?;
        Ok(Value::Register(dest))
    }

    fn build_return(&mut self, value: Value) -> BackendResult<()> {
        let ty = self.value_type(&value)?;
        let block = self.current_block()?;
        if block.terminator.is_some() {
            return Err(format!("block `{}` already returns", block.label));
        }
        block.terminator = Some(Terminator::Ret { value, ty });
        Ok(())
    }

    fn verify_function(&self, function: &String) -> Result<(), String> {
        let target = self.function(function)?;
        IRValidator::validate_function(target, &self.module).map_err(|errors| errors.join("; "))
    }

    fn print_function(&self, function: &String) -> String {
        self.module
            .get_function(function)
            .map(|f| f.to_string())
            .unwrap_or_default()
    }

    fn print_module(&self) -> String {
        self.module.to_string()
    }
}
