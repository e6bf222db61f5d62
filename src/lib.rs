// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use environment::Environment;
pub use evaluator::{EvalError, EvalResult, Resolution, evaluate, evaluate_with};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_all, parse_str};
pub use source::Span;
pub use types::{Expr, ExprKind, Value};

/// Anything that can go wrong between source text and a value.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parses the first expression in `source` and evaluates it in `env`.
#[tracing::instrument(level = "debug", skip(env))]
pub fn run(source: &str, env: &Environment) -> Result<Value, Error> {
    let expr = parse_str(source)?;
    Ok(evaluate(&expr, env)?)
}
