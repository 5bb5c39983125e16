/*!
# Rust Language Module

This Rust module provides the symbol table, lexical analysis and the
single pass compiler for NPC scripts.

*/

#[macro_use]
mod error;
mod compile;
mod lex;
pub mod report;
pub mod symbol;
mod syntax;
mod token;

pub use compile::{compile, CompileOptions};
pub use error::Error;
pub use error::ErrorCode;
pub use symbol::SymbolTable;
