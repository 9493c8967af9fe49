//! Embedded interpreter for the constrained snippet dialect the LLM is
//! prompted to produce: line-oriented assignments and expressions, `for`
//! loops over the table list, dict/list literals, subscripts and method
//! calls. Nothing more is parsed; the prompting contract keeps generated
//! code inside this surface.

pub mod ast;
pub mod interp;
pub mod parser;
pub mod value;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("name `{0}` is not defined")]
    Undefined(String),

    #[error("`{kind}` has no method `{method}`")]
    NoSuchMethod { kind: &'static str, method: String },

    #[error("column `{0}` not found")]
    UnknownColumn(String),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Runtime(String),
}
