//! The routine language.
//!
//! Generated routine source is a small JavaScript-flavoured statement
//! language. Parsing it is what "constructing a routine" means; a syntax
//! error here is a compilation failure. Evaluation is a tree walk over the
//! parsed [`Program`] with explicit scope frames instead of implicit global
//! lookup.

pub mod ast;
pub mod builtins;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use interp::{Interpreter, RenderHost};
pub use parser::parse_program;
pub use value::{Function, Value};
