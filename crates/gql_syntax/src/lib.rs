//! Syntax layer for gql.
//!
//! This crate provides:
//! - `token`: Token kinds and token structures
//! - `lexer`: Tokenization and string literal decoding
//! - `ast`: Abstract syntax tree types
//! - `parser`: Recursive descent parser for schema and executable documents

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, parse_const_value, ParseResult, Parser};
pub use token::{DirectiveLocation, Token, TokenKind};
