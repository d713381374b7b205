//! Linker and size optimizer of the assembler.
//!
//! A [`Program`] collects the instructions produced by the parser and its macros.
//! [`Program::optimize_and_link`] then binds every label, rewrites instructions
//! into their compact encodings where the operands allow it and rebinds the labels
//! to the addresses that result.

pub mod context;
pub mod error;
pub mod expr;
pub mod instruction;
pub mod macros;
pub mod pass;
pub mod program;

pub use context::Context;
pub use error::Error;
pub use expr::Expr;
pub use instruction::Instruction;
pub use pass::Pass;
pub use program::Program;
