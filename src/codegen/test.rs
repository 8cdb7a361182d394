use super::*;
use crate::ast::{Argument, Expr, FunctionDef, Prototype};
use crate::ir::{Constant, IRBuilder, IRValidator, Value};
use crate::lexer::Number;

fn int(value: i32) -> Expr {
    Expr::number(Number::Int(value), 0..1)
}

fn float(value: f32) -> Expr {
    Expr::number(Number::Float(value), 0..1)
}

fn prototype(name: &str, args: &[(&str, DataType)], datatype: DataType) -> Prototype {
    Prototype {
        name: name.to_string(),
        args: args
            .iter()
            .map(|(name, datatype)| Argument {
                name: name.to_string(),
                datatype: *datatype,
                span: 0..1,
            })
            .collect(),
        datatype,
        span: 0..1,
    }
}

fn define(name: &str, args: &[(&str, DataType)], datatype: DataType, body: Vec<Expr>) -> ASTNode {
    ASTNode::Function(FunctionDef {
        prototype: prototype(name, args, datatype),
        body,
        span: 0..1,
    })
}

fn extern_(name: &str, args: &[(&str, DataType)], datatype: DataType) -> ASTNode {
    ASTNode::Extern(prototype(name, args, datatype))
}

fn codegen() -> Codegen<IRBuilder> {
    Codegen::new(IRBuilder::new("test"))
}

/// Opens an empty body so single expressions can be lowered.
fn open_function(codegen: &mut Codegen<IRBuilder>) -> String {
    let function = codegen
        .backend
        .declare_function("scratch", &[], DataType::Float)
        .unwrap();
    codegen.backend.append_entry_block(&function).unwrap();
    codegen.current_function = Some(function.clone());
    function
}

fn instructions(codegen: &Codegen<IRBuilder>, function: &str) -> Vec<String> {
    codegen
        .backend()
        .module()
        .get_function(function)
        .map(|f| {
            f.blocks[0]
                .instructions
                .iter()
                .map(|i| i.to_string().trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn error_kinds<B: Backend>(codegen: &Codegen<B>) -> Vec<ErrorKind> {
    codegen.errors().iter().map(|e| e.kind).collect()
}

#[test]
fn test_number_constants() {
    let mut codegen = codegen();

    let mut three = int(3);
    let mut half = float(0.5);
    assert_eq!(
        codegen.codegen_expr(&mut three).unwrap(),
        Value::Constant(Constant::I32(3))
    );
    assert_eq!(
        codegen.codegen_expr(&mut half).unwrap(),
        Value::Constant(Constant::F32(0.5))
    );
    assert_eq!(three.datatype, Some(DataType::Int));
    assert_eq!(half.datatype, Some(DataType::Float));
}

#[test]
fn test_int_promoted_to_float() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut expr = Expr::binary("+", int(1), float(2.5));
    let value = codegen.codegen_expr(&mut expr).unwrap();

    assert_eq!(value, Value::Register("addtmp".to_string()));
    assert_eq!(expr.datatype, Some(DataType::Float));
    assert_eq!(
        instructions(&codegen, "scratch"),
        vec![
            "%intToFPcast = uitofp i32 1 to float",
            "%addtmp = fadd float %intToFPcast, 2.500000",
        ]
    );
}

#[test]
fn test_float_rhs_promotion() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut expr = Expr::binary("/", float(9.0), int(3));
    codegen.codegen_expr(&mut expr).unwrap();

    assert_eq!(expr.datatype, Some(DataType::Float));
    assert_eq!(
        instructions(&codegen, "scratch"),
        vec![
            "%intToFPcast = uitofp i32 3 to float",
            "%divtmp = fdiv float 9.000000, %intToFPcast",
        ]
    );
}

#[test]
fn test_same_type_operands_not_cast() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut expr = Expr::binary("*", int(6), int(7));
    codegen.codegen_expr(&mut expr).unwrap();

    assert_eq!(expr.datatype, Some(DataType::Int));
    assert_eq!(
        instructions(&codegen, "scratch"),
        vec!["%multmp = fmul i32 6, 7"]
    );
}

#[test]
fn test_unresolved_operand() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut lhs = int(1);
    lhs.datatype = None;
    let mut expr = Expr::binary("-", lhs, int(2));

    let error = codegen.codegen_expr(&mut expr).unwrap_err();
    assert_eq!(error.kind, ErrorKind::TypeUnresolved);
    assert!(instructions(&codegen, "scratch").is_empty());
}

#[test]
fn test_unrecognized_operator() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut expr = Expr::binary("%", int(1), int(2));
    let error = codegen.codegen_expr(&mut expr).unwrap_err();
    assert_eq!(error.kind, ErrorKind::UnrecognizedOperator);
    assert_eq!(error.to_string(), "unrecognized operator: unrecognized operator `%`");
}

#[test]
fn test_less_than_is_float() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut expr = Expr::binary("<", int(1), int(2));
    let value = codegen.codegen_expr(&mut expr).unwrap();

    assert_eq!(value, Value::Register("booltmp".to_string()));
    assert_eq!(expr.datatype, Some(DataType::Float));
    assert_eq!(
        instructions(&codegen, "scratch"),
        vec![
            "%cmptmp = fcmp ult i32 1, 2",
            "%booltmp = uitofp i1 %cmptmp to float",
        ]
    );
}

#[test]
fn test_definition_assignment_and_read() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut definition = Expr::definition("y", DataType::Float, Some(float(1.5)), 0..1);
    let stored = codegen.codegen_expr(&mut definition).unwrap();
    assert_eq!(stored, Value::Constant(Constant::F32(1.5)));
    assert!(codegen.named_values().contains_key("y"));

    let mut assignment = Expr::assignment("y", float(2.0), 0..1);
    codegen.codegen_expr(&mut assignment).unwrap();
    assert_eq!(assignment.datatype, Some(DataType::Float));

    let mut read = Expr::variable("y", 0..1);
    let loaded = codegen.codegen_expr(&mut read).unwrap();
    assert_eq!(loaded, Value::Register("y1".to_string()));
    assert_eq!(read.datatype, Some(DataType::Float));

    assert_eq!(
        instructions(&codegen, "scratch"),
        vec![
            "%y = alloca float",
            "store float 1.500000, ptr %y",
            "store float 2.000000, ptr %y",
            "%y1 = load float, ptr %y",
        ]
    );
}

#[test]
fn test_missing_initializer() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut definition = Expr::definition("y", DataType::Int, None, 4..9);
    let error = codegen.codegen_expr(&mut definition).unwrap_err();

    assert_eq!(error.kind, ErrorKind::MissingInitializer);
    assert_eq!(error.span, 4..9);
    assert!(codegen.named_values().contains_key("y"));
}

#[test]
fn test_undefined_variable() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut read = Expr::variable("z", 0..1);
    let error = codegen.codegen_expr(&mut read).unwrap_err();
    assert_eq!(error.kind, ErrorKind::UndefinedVariable);
}

#[test]
fn test_typed_variable_without_definition() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut read = Expr::variable("z", 0..1);
    read.datatype = Some(DataType::Int);
    let error = codegen.codegen_expr(&mut read).unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidNodeState);
}

#[test]
fn test_conflicting_variable_type() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut definition = Expr::definition("y", DataType::Int, Some(int(1)), 0..1);
    codegen.codegen_expr(&mut definition).unwrap();

    let mut read = Expr::variable("y", 0..1);
    read.datatype = Some(DataType::Float);
    let error = codegen.codegen_expr(&mut read).unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidNodeState);
}

#[test]
fn test_definition_returns_stored_value() {
    let mut codegen = codegen();
    let mut ast = vec![define(
        "inc",
        &[("a", DataType::Int)],
        DataType::Int,
        vec![
            Expr::definition(
                "b",
                DataType::Int,
                Some(Expr::binary("+", Expr::variable("a", 0..1), int(1))),
                0..1,
            )
            .returning(),
        ],
    )];

    assert!(codegen.generate_module(&mut ast));
    assert_eq!(
        codegen.backend().print_function(&"inc".to_string()),
        "define i32 @inc(i32 %a) {\n\
         entry:\n  \
         %a1 = alloca i32\n  \
         %b = alloca i32\n  \
         store i32 %a, ptr %a1\n  \
         %a2 = load i32, ptr %a1\n  \
         %addtmp = fadd i32 %a2, 1\n  \
         store i32 %addtmp, ptr %b\n  \
         ret i32 %addtmp\n\
         }\n"
    );
}

#[test]
fn test_context_reset_after_function() {
    let mut codegen = codegen();
    let mut ast = vec![define(
        "f",
        &[("x", DataType::Float)],
        DataType::Float,
        vec![Expr::variable("x", 0..1).returning()],
    )];

    assert!(codegen.generate_module(&mut ast));
    assert!(codegen.named_values().is_empty());
    assert!(codegen.current_function().is_none());
}

#[test]
fn test_function_redefinition() {
    let mut codegen = codegen();
    let mut ast = vec![
        define("f", &[], DataType::Int, vec![int(1).returning()]),
        define("f", &[], DataType::Int, vec![int(2).returning()]),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::Redefinition]);

    let printed = codegen.backend().print_function(&"f".to_string());
    assert!(printed.contains("ret i32 1"));
    assert!(!printed.contains("ret i32 2"));
}

#[test]
fn test_extern_then_definition() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("sq", &[("x", DataType::Float)], DataType::Float),
        define(
            "sq",
            &[("x", DataType::Float)],
            DataType::Float,
            vec![Expr::binary("*", Expr::variable("x", 0..1), Expr::variable("x", 0..1)).returning()],
        ),
    ];

    assert!(codegen.generate_module(&mut ast));
    let module = codegen.backend().module();
    assert_eq!(module.functions.len(), 1);
    assert!(!module.functions[0].is_declaration());
}

#[test]
fn test_extern_arity_differs_from_definition() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("f", &[("x", DataType::Float)], DataType::Float),
        define("f", &[], DataType::Float, vec![float(1.0).returning()]),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::ArityMismatch]);
    assert!(codegen.backend().module().functions[0].is_declaration());
}

#[test]
fn test_extern_types_differ_from_definition() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("f", &[("x", DataType::Float)], DataType::Float),
        define("f", &[("x", DataType::Int)], DataType::Float, vec![float(1.0).returning()]),
        extern_("h", &[], DataType::Int),
        define("h", &[], DataType::Float, vec![float(1.0).returning()]),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(
        error_kinds(&codegen),
        vec![ErrorKind::Redefinition, ErrorKind::Redefinition]
    );
    let module = codegen.backend().module();
    assert!(module.functions.iter().all(|f| f.is_declaration()));
}

#[test]
fn test_redefinition_with_different_arity() {
    let mut codegen = codegen();
    let mut ast = vec![
        define("f", &[("a", DataType::Int)], DataType::Int, vec![int(1).returning()]),
        define(
            "f",
            &[("a", DataType::Int), ("b", DataType::Int)],
            DataType::Int,
            vec![int(2).returning()],
        ),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::Redefinition]);
    assert_eq!(codegen.backend().param_kinds(&"f".to_string()).len(), 1);
}

#[test]
fn test_extern_redeclaration() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("g", &[("a", DataType::Int)], DataType::Float),
        extern_("g", &[("b", DataType::Int)], DataType::Float),
        extern_("g", &[("a", DataType::Float)], DataType::Float),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::Redefinition]);
    assert_eq!(codegen.backend().module().functions.len(), 1);
}

#[test]
fn test_call_argument_type_mismatch() {
    let mut codegen = codegen();
    let mut arg = int(1);
    arg.span = 10..11;
    let mut ast = vec![
        extern_("g", &[("a", DataType::Float)], DataType::Float),
        define(
            "f",
            &[],
            DataType::Float,
            vec![Expr::call("g", vec![arg], 8..12), float(0.0).returning()],
        ),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::ArgumentTypeMismatch]);
    assert_eq!(codegen.errors()[0].span, 10..11);
    assert!(instructions(&codegen, "f").is_empty());
}

#[test]
fn test_call_arity_mismatch() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("g", &[("a", DataType::Float)], DataType::Float),
        define(
            "f",
            &[],
            DataType::Float,
            vec![Expr::call("g", vec![float(1.0), float(2.0)], 0..1).returning()],
        ),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(
        error_kinds(&codegen),
        vec![ErrorKind::ArityMismatch, ErrorKind::VerificationFailure]
    );
}

#[test]
fn test_call_undefined_function() {
    let mut codegen = codegen();
    open_function(&mut codegen);

    let mut call = Expr::call("nope", vec![], 0..1);
    let error = codegen.codegen_expr(&mut call).unwrap_err();
    assert_eq!(error.kind, ErrorKind::UndefinedFunction);
}

#[test]
fn test_call_result_type() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("g", &[("a", DataType::Float), ("b", DataType::Int)], DataType::Int),
        define(
            "f",
            &[("x", DataType::Float)],
            DataType::Int,
            vec![Expr::call("g", vec![Expr::variable("x", 0..1), int(2)], 0..1).returning()],
        ),
    ];

    assert!(codegen.generate_module(&mut ast));
    assert_eq!(
        instructions(&codegen, "f"),
        vec![
            "%x1 = alloca float",
            "store float %x, ptr %x1",
            "%x2 = load float, ptr %x1",
            "%calltmp = call i32 @g(%x2, 2)",
        ]
    );
}

#[test]
fn test_verification_failure_removes_function() {
    let mut codegen = codegen();
    let mut ast = vec![
        define("bad", &[], DataType::Float, vec![int(1).returning()]),
        define("good", &[], DataType::Int, vec![int(2).returning()]),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::VerificationFailure]);

    let note = codegen.errors()[0].note.clone().unwrap();
    assert!(note.contains("define float @bad()"));
    assert!(codegen.backend().get_function("bad").is_none());
    assert!(codegen.backend().has_body(&"good".to_string()));
}

#[test]
fn test_failed_definition_keeps_extern_declaration() {
    let mut codegen = codegen();
    let mut ast = vec![
        extern_("f", &[("a", DataType::Int)], DataType::Int),
        define(
            "g",
            &[("x", DataType::Int)],
            DataType::Int,
            vec![Expr::call("f", vec![Expr::variable("x", 0..1)], 0..1).returning()],
        ),
        define(
            "f",
            &[("a", DataType::Int)],
            DataType::Int,
            vec![Expr::variable("q", 0..1).returning()],
        ),
    ];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(
        error_kinds(&codegen),
        vec![ErrorKind::UndefinedVariable, ErrorKind::VerificationFailure]
    );

    let module = codegen.backend().module();
    assert!(module.get_function("f").is_some_and(|f| f.is_declaration()));
    assert!(codegen.backend().has_body(&"g".to_string()));
    assert_eq!(IRValidator::validate_module(module), Ok(()));
}

#[test]
fn test_missing_return_fails_verification() {
    let mut codegen = codegen();
    let mut ast = vec![define(
        "f",
        &[],
        DataType::Int,
        vec![Expr::definition("y", DataType::Int, Some(int(1)), 0..1)],
    )];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::VerificationFailure]);
    assert!(codegen.backend().module().functions.is_empty());
}

#[test]
fn test_statement_error_keeps_lowering() {
    let mut codegen = codegen();
    let mut ast = vec![define(
        "f",
        &[],
        DataType::Int,
        vec![Expr::variable("z", 0..1), int(1).returning()],
    )];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::UndefinedVariable]);
    assert!(codegen.backend().has_body(&"f".to_string()));
}

#[test]
fn test_float_definition_with_int_initializer() {
    let mut codegen = codegen();
    let mut ast = vec![define(
        "f",
        &[],
        DataType::Float,
        vec![Expr::definition("y", DataType::Float, Some(int(1)), 0..1).returning()],
    )];

    assert!(!codegen.generate_module(&mut ast));
    assert_eq!(error_kinds(&codegen), vec![ErrorKind::VerificationFailure]);
}

#[test]
fn test_error_line() {
    let error = CodegenError::new(ErrorKind::UndefinedVariable, "x", 12..13);
    assert_eq!(error.line("int f()\n{\n  x;\n}"), 3);
}

#[cfg(feature = "llvm")]
mod llvm {
    use super::*;
    use crate::codegen::llvm::LLVMBackend;
    use inkwell::context::Context;

    #[test]
    fn test_llvm_promotion_and_call() {
        let context = Context::create();
        let mut codegen = Codegen::new(LLVMBackend::new(&context, "test"));
        let mut ast = vec![
            extern_("scale", &[("v", DataType::Float)], DataType::Float),
            define(
                "f",
                &[("n", DataType::Int)],
                DataType::Float,
                vec![
                    Expr::call(
                        "scale",
                        vec![Expr::binary("+", Expr::variable("n", 0..1), float(0.5))],
                        0..1,
                    )
                    .returning(),
                ],
            ),
        ];

        assert!(codegen.generate_module(&mut ast), "{:?}", codegen.errors());
        let printed = codegen.backend().print_module();
        assert!(printed.contains("declare float @scale(float"));
        assert!(printed.contains("uitofp i32"));
        assert!(printed.contains("call float @scale"));
    }

    #[test]
    fn test_llvm_verification_failure() {
        let context = Context::create();
        let mut codegen = Codegen::new(LLVMBackend::new(&context, "test"));
        let mut ast = vec![define(
            "f",
            &[],
            DataType::Int,
            vec![Expr::definition("y", DataType::Int, Some(int(1)), 0..1)],
        )];

        assert!(!codegen.generate_module(&mut ast));
        assert_eq!(error_kinds(&codegen), vec![ErrorKind::VerificationFailure]);
        assert!(codegen.backend().get_function("f").is_none());
    }

    #[test]
    fn test_llvm_failed_definition_keeps_declaration() {
        let context = Context::create();
        let mut codegen = Codegen::new(LLVMBackend::new(&context, "test"));
        let mut ast = vec![
            extern_("f", &[("a", DataType::Int)], DataType::Int),
            define(
                "g",
                &[("x", DataType::Int)],
                DataType::Int,
                vec![Expr::call("f", vec![Expr::variable("x", 0..1)], 0..1).returning()],
            ),
            define(
                "f",
                &[("a", DataType::Int)],
                DataType::Int,
                vec![Expr::variable("q", 0..1).returning()],
            ),
        ];

        assert!(!codegen.generate_module(&mut ast));
        let f = codegen.backend().get_function("f").unwrap();
        assert!(!codegen.backend().has_body(&f));
        assert!(codegen.backend().module().verify().is_ok());
    }
}
