//! tablegpt: answer natural-language questions about tabular data by running
//! LLM-generated snippets against in-memory tables.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod llm;
pub mod printer;
pub mod prompt;
pub mod response;
pub mod script;
pub mod table;
