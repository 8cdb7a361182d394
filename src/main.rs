use minic::ast::ASTNode;
use minic::codegen::{Backend, Codegen};
use minic::ir::IRBuilder;
use minic::parser::Parser;

use yansi::Paint;

use std::env;
use std::fs;
use std::process;

/// Lowers every item, printing a status line for each one that made it into
/// the module. Returns true if any error was reported.
fn compile<B: Backend>(backend: B, ast: &mut [ASTNode], file: &str, source: &str) -> bool {
    let mut codegen = Codegen::new(backend);

    for node in ast.iter_mut() {
        let accepted = codegen.generate_item(node);
        let status = match node {
            ASTNode::Extern(_) => "declared",
            ASTNode::Function(_) => "verified",
        };
        if accepted {
            println!("{} {}", status.green().bold(), node.name());
        } else {
            println!("{} {}", "rejected".red().bold(), node.name());
        }
    }

    let failed = codegen.report_errors(file, source);
    println!("\n{}", codegen.backend().print_module());
    failed
}

#[cfg(feature = "llvm")]
fn compile_llvm(ast: &mut [ASTNode], file: &str, source: &str) -> bool {
    use minic::codegen::llvm::LLVMBackend;

    let context = inkwell::context::Context::create();
    compile(LLVMBackend::new(&context, file), ast, file, source)
}

#[cfg(not(feature = "llvm"))]
fn compile_llvm(_ast: &mut [ASTNode], _file: &str, _source: &str) -> bool {
    eprintln!(
        "{} --emit-llvm needs minic to be built with the `llvm` feature",
        "error:".red().bold()
    );
    true
}

fn main() {
    let mut filepath = "demos/sample.mc".to_string();
    let mut emit_llvm = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--emit-llvm" => emit_llvm = true,
            _ => filepath = arg,
        }
    }

    let contents = match fs::read_to_string(&filepath) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("{} cannot read {}: {}", "error:".red().bold(), filepath, e);
            process::exit(1);
        }
    };

    let mut parser = Parser::new(&contents, filepath.clone());
    let mut ast = parser.parse_program();

    if parser.report_errors(&contents) {
        eprintln!("{}", "cannot continue, syntax errors".red());
        process::exit(1);
    }

    let failed = if emit_llvm {
        compile_llvm(&mut ast, &filepath, &contents)
    } else {
        compile(IRBuilder::new(filepath.as_str()), &mut ast, &filepath, &contents)
    };

    if failed {
        process::exit(1);
    }
}
