//! ClickHouse SQL support: tokenizer, AST, parser and filter analyzer.

pub mod analyzer;
pub mod ast;
pub(crate) mod functions;
mod lexer;
pub mod parser;

pub use analyzer::ClickHouseFilterExtractor;
pub use ast::{Expr, SelectStatement, Statement};
pub use parser::{parse_select, parse_statement, ParseError};
