#![forbid(unsafe_code)]

mod error;
mod parser;

use miette::IntoDiagnostic;
use mzdsl_lex::Lexer;

pub use error::ParseError;
pub use parser::Parser;

/// Lex and parse a whole DSL module.
pub fn parse_module(src: &str) -> Result<mzdsl_ast::Module, ParseError> {
    let tokens = Lexer::new(src).lex()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_module()
}

pub fn parse_source(src: &str) -> miette::Result<mzdsl_ast::Module> {
    parse_module(src).into_diagnostic()
}

pub fn parse_expr(src: &str) -> miette::Result<mzdsl_ast::Expr> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_expr_eof().into_diagnostic()
}

