use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module as LLVMModule};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use crate::ast::DataType;
use crate::codegen::{Backend, BackendResult, FloatOp, TypeKind};

#[derive(Debug, Clone, Copy)]
pub struct LLVMSlot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
}

/// [`Backend`] emitting real LLVM IR through inkwell.
pub struct LLVMBackend<'ctx> {
    context: &'ctx Context,
    module: LLVMModule<'ctx>,
    builder: Builder<'ctx>,
}

fn type_kind(ty: BasicTypeEnum<'_>) -> TypeKind {
    match ty {
        BasicTypeEnum::IntType(_) => TypeKind::Integer,
        BasicTypeEnum::FloatType(_) => TypeKind::Float,
        _ => TypeKind::Other,
    }
}

impl<'ctx> LLVMBackend<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        LLVMBackend {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
        }
    }

    pub fn module(&self) -> &LLVMModule<'ctx> {
        &self.module
    }

    fn llvm_type(&self, datatype: DataType) -> BasicTypeEnum<'ctx> {
        match datatype {
            DataType::Int => self.context.i32_type().as_basic_type_enum(),
            DataType::Float => self.context.f32_type().as_basic_type_enum(),
        }
    }

    /// Fails once the insertion block already ends in a terminator.
    fn ensure_open(&self) -> BackendResult<()> {
        let block = self
            .builder
            .get_insert_block()
            .ok_or("no insertion point is set")?;
        if block.get_terminator().is_some() {
            return Err(format!(
                "block `{}` already returns",
                block.get_name().to_string_lossy()
            ));
        }
        Ok(())
    }
}

impl<'ctx> Backend for LLVMBackend<'ctx> {
    type Value = BasicValueEnum<'ctx>;
    type Function = FunctionValue<'ctx>;
    type Slot = LLVMSlot<'ctx>;

    fn get_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        self.module.get_function(name)
    }

    fn declare_function(
        &mut self,
        name: &str,
        params: &[(&str, DataType)],
        return_type: DataType,
    ) -> BackendResult<FunctionValue<'ctx>> {
        if self.module.get_function(name).is_some() {
            return Err(format!("function `{}` is already declared", name));
        }

        let param_types: Vec<BasicMetadataTypeEnum> = params
            .iter()
            .map(|(_, datatype)| self.llvm_type(*datatype).into())
            .collect();
        let fn_type = self.llvm_type(return_type).fn_type(&param_types, false);
        let function = self
            .module
            .add_function(name, fn_type, Some(Linkage::External));

        for (param, (param_name, _)) in function.get_param_iter().zip(params) {
            param.set_name(param_name);
        }

        Ok(function)
    }

    fn param_kinds(&self, function: &FunctionValue<'ctx>) -> Vec<TypeKind> {
        function
            .get_param_iter()
            .map(|param| type_kind(param.get_type()))
            .collect()
    }

    fn return_kind(&self, function: &FunctionValue<'ctx>) -> TypeKind {
        function
            .get_type()
            .get_return_type()
            .map_or(TypeKind::Other, type_kind)
    }

    fn params(&self, function: &FunctionValue<'ctx>) -> Vec<BasicValueEnum<'ctx>> {
        function.get_param_iter().collect()
    }

    fn has_body(&self, function: &FunctionValue<'ctx>) -> bool {
        function.count_basic_blocks() > 0
    }

    fn delete_function(&mut self, function: &FunctionValue<'ctx>) {
        if self
            .builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            == Some(*function)
        {
            self.builder.clear_insertion_position();
        }
        unsafe { function.delete() };
    }

    fn clear_body(&mut self, function: &FunctionValue<'ctx>) {
        if self
            .builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            == Some(*function)
        {
            self.builder.clear_insertion_position();
        }
        for block in function.get_basic_blocks().into_iter().rev() {
            let _ = unsafe { block.delete() };
        }
    }

    fn append_entry_block(&mut self, function: &FunctionValue<'ctx>) -> BackendResult<()> {
        let entry = self.context.append_basic_block(*function, "entry");
        self.builder.position_at_end(entry);
        Ok(())
    }

    fn build_entry_alloca(
        &mut self,
        function: &FunctionValue<'ctx>,
        name: &str,
        datatype: DataType,
    ) -> BackendResult<LLVMSlot<'ctx>> {
        let entry = function
            .get_first_basic_block()
            .ok_or_else(|| format!("function has no entry block for `{}`", name))?;

        let builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }

        let ty = self.llvm_type(datatype);
        let ptr = builder.build_alloca(ty, name).map_err(|e| e.to_string())?;
        Ok(LLVMSlot { ptr, ty })
    }

    fn slot_kind(&self, slot: &LLVMSlot<'ctx>) -> TypeKind {
        type_kind(slot.ty)
    }

    fn build_store(
        &mut self,
        value: BasicValueEnum<'ctx>,
        slot: &LLVMSlot<'ctx>,
    ) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;
        self.builder
            .build_store(slot.ptr, value)
            .map_err(|e| e.to_string())?;
        Ok(value)
    }

    fn build_load(&mut self, slot: &LLVMSlot<'ctx>, name: &str) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;
        self.builder
            .build_load(slot.ty, slot.ptr, name)
            .map_err(|e| e.to_string())
    }

    fn const_int(&mut self, value: i32) -> BasicValueEnum<'ctx> {
        self.context
            .i32_type()
            .const_int(value as u64, true)
            .into()
    }

    fn const_float(&mut self, value: f32) -> BasicValueEnum<'ctx> {
        self.context.f32_type().const_float(value as f64).into()
    }

    fn build_float_op(
        &mut self,
        op: FloatOp,
        lhs: BasicValueEnum<'ctx>,
        rhs: BasicValueEnum<'ctx>,
        name: &str,
    ) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;

        // LLVM has no float opcodes for integer operands.
        let value: BasicValueEnum = match (lhs, rhs) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => {
                let result = match op {
                    FloatOp::Add => self.builder.build_int_add(l, r, name),
                    FloatOp::Sub => self.builder.build_int_sub(l, r, name),
                    FloatOp::Mul => self.builder.build_int_mul(l, r, name),
                    FloatOp::Div => self.builder.build_int_signed_div(l, r, name),
                };
                result.map_err(|e| e.to_string())?.into()
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => {
                let result = match op {
                    FloatOp::Add => self.builder.build_float_add(l, r, name),
                    FloatOp::Sub => self.builder.build_float_sub(l, r, name),
                    FloatOp::Mul => self.builder.build_float_mul(l, r, name),
                    FloatOp::Div => self.builder.build_float_div(l, r, name),
                };
                result.map_err(|e| e.to_string())?.into()
            }
            _ => return Err(format!("operands of `{}` have different types", name)),
        };

        Ok(value)
    }

    fn build_float_lt(
        &mut self,
        lhs: BasicValueEnum<'ctx>,
        rhs: BasicValueEnum<'ctx>,
        name: &str,
    ) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;

        let value = match (lhs, rhs) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) => self
                .builder
                .build_int_compare(IntPredicate::SLT, l, r, name),
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => self
                .builder
                .build_float_compare(FloatPredicate::ULT, l, r, name),
            _ => return Err(format!("operands of `{}` have different types", name)),
        };

        value.map(Into::into).map_err(|e| e.to_string())
    }

    fn build_uint_to_float(
        &mut self,
        value: BasicValueEnum<'ctx>,
        name: &str,
    ) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;

        let BasicValueEnum::IntValue(value) = value else {
            return Err(format!("`{}` converts a value that is not an integer", name));
        };
        self.builder
            .build_unsigned_int_to_float(value, self.context.f32_type(), name)
            .map(Into::into)
            .map_err(|e| e.to_string())
    }

    fn build_call(
        &mut self,
        function: &FunctionValue<'ctx>,
        args: &[BasicValueEnum<'ctx>],
        name: &str,
    ) -> BackendResult<BasicValueEnum<'ctx>> {
        self.ensure_open()?;

        let args: Vec<BasicMetadataValueEnum> = args.iter().map(|arg| (*arg).into()).collect();
        self.builder
            .build_call(*function, &args, name)
            .map_err(|e| e.to_string())?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| format!("call `{}` produced no value", name))
    }

    fn build_return(&mut self, value: BasicValueEnum<'ctx>) -> BackendResult<()> {
        self.ensure_open()?;
        self.builder
            .build_return(Some(&value))
            .map(drop)
            .map_err(|e| e.to_string())
    }

    fn verify_function(&self, function: &FunctionValue<'ctx>) -> Result<(), String> {
        if function.verify(false) {
            return Ok(());
        }

        Err(match self.module.verify() {
            Err(message) => message.to_string().trim().to_string(),
            Ok(()) => "function failed verification".to_string(),
        })
    }

    fn print_function(&self, function: &FunctionValue<'ctx>) -> String {
        function.print_to_string().to_string()
    }

    fn print_module(&self) -> String {
        self.module.print_to_string().to_string()
    }
}
