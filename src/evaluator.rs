use crate::environment::Environment;
use crate::source::Span;
use crate::types::{Closure, ClosureBody, Expr, ExprKind, Value, convert_atom};
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

// --- Evaluation Error ---
// Every variant keeps the offending expression and the environment it was
// evaluated in, so callers can show both.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("'{name}' is unbound in the environment")]
    UnboundIdentifier {
        name: String,
        expr: Expr,
        env: Environment,
    },
    #[error("Mismatched argument count: {message}")]
    ArityMismatch {
        message: String,
        expr: Expr,
        env: Environment,
    },
    #[error("Type mismatch: '{operator}' expected {expected}, got {found}")]
    TypeMismatch {
        operator: String,
        expected: &'static str,
        found: Value,
        expr: Expr,
        env: Environment,
    },
    #[error("Malformed '{form}': {message}")]
    MalformedSpecialForm {
        form: &'static str,
        message: String,
        expr: Expr,
        env: Environment,
    },
    #[error("Gave arguments to {value}, which cannot accept them")]
    NotCallable {
        value: Value,
        expr: Expr,
        env: Environment,
    },
    #[error("Cannot evaluate an empty expression '()'")]
    EmptyApplication { expr: Expr, env: Environment },
}

impl EvalError {
    /// The expression the error was raised for.
    pub fn expr(&self) -> &Expr {
        match self {
            EvalError::UnboundIdentifier { expr, .. }
            | EvalError::ArityMismatch { expr, .. }
            | EvalError::TypeMismatch { expr, .. }
            | EvalError::MalformedSpecialForm { expr, .. }
            | EvalError::NotCallable { expr, .. }
            | EvalError::EmptyApplication { expr, .. } => expr,
        }
    }

    /// Snapshot of the environment the failing expression was evaluated in.
    pub fn env(&self) -> &Environment {
        match self {
            EvalError::UnboundIdentifier { env, .. }
            | EvalError::ArityMismatch { env, .. }
            | EvalError::TypeMismatch { env, .. }
            | EvalError::MalformedSpecialForm { env, .. }
            | EvalError::NotCallable { env, .. }
            | EvalError::EmptyApplication { env, .. } => env,
        }
    }

    pub fn span(&self) -> Span {
        self.expr().span
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// How an atom that resolves to nothing is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Unbound atoms are an error.
    #[default]
    Strict,
    /// Unbound atoms become symbols. Used for binding-name positions.
    Lenient,
}

/// Context handed to a builtin alongside its unevaluated arguments.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// The whole application, operator included.
    pub form: &'a Expr,
    pub name: &'static str,
    pub mode: Resolution,
}

// --- Evaluate Function ---

/// Evaluates `expr` in `env`, failing on unbound identifiers.
pub fn evaluate(expr: &Expr, env: &Environment) -> EvalResult {
    evaluate_with(expr, env, Resolution::Strict)
}

/// Evaluates `expr` in `env` under the given resolution mode.
pub fn evaluate_with(expr: &Expr, env: &Environment, mode: Resolution) -> EvalResult {
    match &expr.kind {
        ExprKind::Atom(text) => resolve_atom(text, expr, env, mode),
        ExprKind::SubExpr(children) => evaluate_sub_expr(expr, children, env, mode),
    }
}

fn lookup_or_convert(text: &str, env: &Environment) -> Option<Value> {
    env.lookup(text).cloned().or_else(|| convert_atom(text))
}

/// Resolves atom text to a fixed point.
///
/// Each round looks the current text up (falling back to literal
/// classification) and, unless the result is a closure, feeds the result's
/// canonical text into the next round. Resolution stops at a closure, when the
/// text stops changing, when a text comes round a second time, or when the
/// next text resolves to nothing.
pub fn resolve_atom(
    text: &str,
    expr: &Expr,
    env: &Environment,
    mode: Resolution,
) -> EvalResult {
    match lookup_or_convert(text, env) {
        Some(value) => Ok(settle(value, text.to_string(), env)),
        None => match mode {
            Resolution::Lenient => Ok(Value::Symbol(text.to_string())),
            Resolution::Strict => Err(EvalError::UnboundIdentifier {
                name: text.to_string(),
                expr: expr.clone(),
                env: env.clone(),
            }),
        },
    }
}

/// Re-resolves a computed value through its canonical text.
/// A value whose text resolves to nothing is returned unchanged.
pub fn reinterpret(value: Value, env: &Environment) -> Value {
    let Some(text) = value.arg_string() else {
        return value;
    };
    match lookup_or_convert(&text, env) {
        Some(found) => settle(found, text, env),
        None => value,
    }
}

// `value` was obtained from `current`; keep following canonical text.
fn settle(mut value: Value, mut current: String, env: &Environment) -> Value {
    let mut seen = HashSet::from([current.clone()]);
    loop {
        let Some(next) = value.arg_string() else {
            return value;
        };
        if next == current || !seen.insert(next.clone()) {
            return value;
        }
        match lookup_or_convert(&next, env) {
            Some(found) => {
                trace!(from = %current, to = %next, "atom rebinds forward");
                value = found;
                current = next;
            }
            None => return value,
        }
    }
}

fn evaluate_sub_expr(
    expr: &Expr,
    children: &[Expr],
    env: &Environment,
    mode: Resolution,
) -> EvalResult {
    let Some((operator, args)) = children.split_first() else {
        return Err(EvalError::EmptyApplication {
            expr: expr.clone(),
            env: env.clone(),
        });
    };

    let result = match evaluate_with(operator, env, mode)? {
        Value::Builtin(builtin) => {
            debug!(builtin = builtin.name, args = args.len(), "calling builtin");
            let site = CallSite {
                form: expr,
                name: builtin.name,
                mode,
            };
            (builtin.func)(args, env, &site)?
        }
        Value::Closure(closure) => apply_closure(&closure, args, env, mode, expr)?,
        value if args.is_empty() => value,
        value => {
            return Err(EvalError::NotCallable {
                value,
                expr: expr.clone(),
                env: env.clone(),
            });
        }
    };

    Ok(reinterpret(result, env))
}

/// Applies a closure chain to `args`, one argument per link.
///
/// Arguments are evaluated in the caller's `env`; each one is bound in the
/// link's captured environment, which the next link then adopts. Running out
/// of arguments early yields the partially applied closure.
pub fn apply_closure(
    closure: &Rc<Closure>,
    args: &[Expr],
    env: &Environment,
    mode: Resolution,
    form: &Expr,
) -> EvalResult {
    let arity = closure.arity();
    if args.len() > arity {
        return Err(EvalError::ArityMismatch {
            message: format!(
                "{} accepts {} argument(s), given {}",
                Value::Closure(Rc::clone(closure)),
                arity,
                args.len()
            ),
            expr: form.clone(),
            env: env.clone(),
        });
    }

    let mut current = Rc::clone(closure);
    let mut remaining = args;
    loop {
        let Some(param) = &current.param else {
            // Zero-parameter closures only ever hold a body expression
            return match &current.body {
                ClosureBody::Expr(body) => evaluate_with(body, &current.env, mode),
                ClosureBody::Curried(next) => Ok(Value::Closure(Rc::clone(next))),
            };
        };
        let Some((arg, rest)) = remaining.split_first() else {
            return Ok(Value::Closure(Rc::clone(&current)));
        };

        let value = evaluate_with(arg, env, mode)?;
        debug!(param = %param, value = %value, "binding closure parameter");
        let scope = current.env.bind(param.clone(), value);

        match &current.body {
            ClosureBody::Curried(next) => {
                current = Rc::new(next.rebind(scope));
                remaining = rest;
            }
            ClosureBody::Expr(body) => return evaluate_with(body, &scope, mode),
        }
    }
}
