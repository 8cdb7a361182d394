pub mod ast;
pub mod codegen;
pub mod ir;
pub mod lexer;
pub mod parser;
