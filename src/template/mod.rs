//! Template compilation: tokenizing marker syntax and generating routine source.

pub mod codegen;
pub mod tokenizer;

pub use codegen::{default_wrapper, generate};
pub use tokenizer::{tokenize, Token};
