use std::rc::Rc;

use crate::environment::Environment;
use crate::evaluator::{CallSite, EvalError, EvalResult, Resolution, apply_closure, evaluate_with};
use crate::types::{Builtin, Closure, Expr, ExprKind, Value};

/// Every builtin the global environment is seeded with.
pub fn builtins() -> Vec<Builtin> {
    vec![
        // Basic constructs
        Builtin::new("fun", prim_fun),
        Builtin::new("let", prim_let),
        Builtin::new("if", prim_if),
        // Math
        Builtin::new("+", prim_add),
        Builtin::new("-", prim_sub),
        Builtin::new("*", prim_mul),
        Builtin::new("/", prim_div),
        // Comparisons
        Builtin::new("=", prim_equals),
        Builtin::new(">", prim_greater_than),
        Builtin::new(">=", prim_greater_than_or_equals),
        Builtin::new("<", prim_less_than),
        Builtin::new("<=", prim_less_than_or_equals),
        // Boolean logic
        Builtin::new("&", prim_and),
        Builtin::new("|", prim_or),
        Builtin::new("!", prim_not),
        // String manipulation
        Builtin::new("str-first", prim_str_first),
        Builtin::new("str-rest", prim_str_rest),
    ]
}

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $site:expr, $env:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::ArityMismatch {
                message: format!(
                    "'{}' takes {} argument(s), given {}",
                    $site.name,
                    $expected,
                    $args.len()
                ),
                expr: $site.form.clone(),
                env: $env.clone(),
            });
        }
    };
}

fn type_mismatch(site: &CallSite<'_>, expected: &'static str, found: Value, arg: &Expr, env: &Environment) -> EvalError {
    EvalError::TypeMismatch {
        operator: site.name.to_string(),
        expected,
        found,
        expr: arg.clone(),
        env: env.clone(),
    }
}

fn malformed(form: &'static str, message: impl Into<String>, site: &CallSite<'_>, env: &Environment) -> EvalError {
    EvalError::MalformedSpecialForm {
        form,
        message: message.into(),
        expr: site.form.clone(),
        env: env.clone(),
    }
}

fn eval_arg(arg: &Expr, env: &Environment, site: &CallSite<'_>) -> EvalResult {
    evaluate_with(arg, env, site.mode)
}

fn eval_number(arg: &Expr, env: &Environment, site: &CallSite<'_>) -> EvalResult<f64> {
    match eval_arg(arg, env, site)? {
        Value::Number(n) => Ok(n),
        other => Err(type_mismatch(site, "number", other, arg, env)),
    }
}

fn eval_bool(arg: &Expr, env: &Environment, site: &CallSite<'_>) -> EvalResult<bool> {
    match eval_arg(arg, env, site)? {
        Value::Boolean(b) => Ok(b),
        other => Err(type_mismatch(site, "boolean", other, arg, env)),
    }
}

// --- Scope ---

/// Builds the closure chain for `(fun params body)` without wrapping it.
fn make_closure(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult<Closure> {
    let [params, body] = args else {
        return Err(malformed(
            "fun",
            format!("syntax is (fun (params) body), given {} argument(s)", args.len()),
            site,
            env,
        ));
    };

    let param_exprs: Vec<&Expr> = match &params.kind {
        ExprKind::SubExpr(children) => children.iter().collect(),
        ExprKind::Atom(_) => vec![params],
    };

    // Parameter names are probed leniently so unbound names become symbols
    let mut names = Vec::with_capacity(param_exprs.len());
    for param in param_exprs {
        let value = evaluate_with(param, env, Resolution::Lenient)?;
        match value.arg_string() {
            Some(name) => names.push(name),
            None => return Err(type_mismatch(site, "a parameter name", value, param, env)),
        }
    }

    Ok(Closure::curried(names, Rc::new(body.clone()), env.clone()))
}

pub fn prim_fun(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    Ok(Value::Closure(Rc::new(make_closure(args, env, site)?)))
}

/// `(let ((name value) ...) body)` is `((fun (name ...) body) value ...)`:
/// every value is evaluated in the outer environment.
pub fn prim_let(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    let [bindings, body] = args else {
        return Err(malformed(
            "let",
            format!("syntax is (let ((name value) ...) body), given {} argument(s)", args.len()),
            site,
            env,
        ));
    };
    let ExprKind::SubExpr(pairs) = &bindings.kind else {
        return Err(malformed("let", format!("bindings must be a list of lists, given {}", bindings), site, env));
    };

    let mut names = Vec::with_capacity(pairs.len());
    let mut values = Vec::with_capacity(pairs.len());
    for pair in pairs {
        match &pair.kind {
            ExprKind::SubExpr(name_value) if name_value.len() == 2 => {
                names.push(name_value[0].clone());
                values.push(name_value[1].clone());
            }
            _ => {
                return Err(malformed(
                    "let",
                    format!("each binding must be a name bound to a value, given {}", pair),
                    site,
                    env,
                ));
            }
        }
    }

    let params = Expr::sub_expr(names, bindings.span);
    let closure = make_closure(&[params, body.clone()], env, site)?;
    apply_closure(&Rc::new(closure), &values, env, site.mode, site.form)
}

/// `(if cond then else)`: only the chosen branch is evaluated.
pub fn prim_if(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    let [condition, consequent, alternate] = args else {
        return Err(malformed(
            "if",
            format!("syntax is (if cond then else), given {} argument(s)", args.len()),
            site,
            env,
        ));
    };
    if eval_bool(condition, env, site)? {
        eval_arg(consequent, env, site)
    } else {
        eval_arg(alternate, env, site)
    }
}

// --- Math ---

/// `+` sums numbers, concatenates into a string when any operand is a
/// string, and otherwise concatenates into a symbol when any operand is a
/// boolean or symbol.
pub fn prim_add(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    let mut values = Vec::with_capacity(args.len());
    let mut has_string = false;
    let mut has_symbolic = false;
    for arg in args {
        let value = eval_arg(arg, env, site)?;
        match &value {
            Value::Number(_) => {}
            Value::String(_) => has_string = true,
            Value::Boolean(_) | Value::Symbol(_) => has_symbolic = true,
            Value::Closure(_) | Value::Builtin(_) => {
                return Err(type_mismatch(site, "a number, string, boolean or symbol", value.clone(), arg, env));
            }
        }
        values.push(value);
    }

    if has_string || has_symbolic {
        let text: String = values
            .iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.arg_string().unwrap_or_default(),
            })
            .collect();
        Ok(if has_string {
            Value::String(text)
        } else {
            Value::Symbol(text)
        })
    } else {
        let sum = values
            .iter()
            .map(|value| match value {
                Value::Number(n) => *n,
                _ => 0.0,
            })
            .sum();
        Ok(Value::Number(sum))
    }
}

fn fold_numbers<F: Fn(f64, f64) -> f64>(
    args: &[Expr],
    env: &Environment,
    site: &CallSite<'_>,
    identity: f64,
    func: F,
) -> EvalResult {
    let Some((first, rest)) = args.split_first() else {
        return Ok(Value::Number(identity));
    };
    let mut acc = eval_number(first, env, site)?;
    for arg in rest {
        acc = func(acc, eval_number(arg, env, site)?);
    }
    Ok(Value::Number(acc))
}

pub fn prim_sub(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    // (-) -> 0
    // (- x y z) -> x - y - z
    fold_numbers(args, env, site, 0.0, |acc, val| acc - val)
}

pub fn prim_mul(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    fold_numbers(args, env, site, 1.0, |acc, val| acc * val)
}

pub fn prim_div(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    // IEEE semantics: (/ 1 0) -> inf
    fold_numbers(args, env, site, 1.0, |acc, val| acc / val)
}

// --- Comparisons ---

pub fn prim_equals(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    check_arity!(args, 2, site, env);
    let left = eval_arg(&args[0], env, site)?;
    let right = eval_arg(&args[1], env, site)?;
    Ok(Value::Boolean(left == right))
}

fn compare_numbers<F: Fn(f64, f64) -> bool>(
    args: &[Expr],
    env: &Environment,
    site: &CallSite<'_>,
    compare: F,
) -> EvalResult {
    check_arity!(args, 2, site, env);
    let left = eval_number(&args[0], env, site)?;
    let right = eval_number(&args[1], env, site)?;
    Ok(Value::Boolean(compare(left, right)))
}

pub fn prim_greater_than(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    compare_numbers(args, env, site, |left, right| left > right)
}

pub fn prim_greater_than_or_equals(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    compare_numbers(args, env, site, |left, right| left >= right)
}

pub fn prim_less_than(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    compare_numbers(args, env, site, |left, right| left < right)
}

pub fn prim_less_than_or_equals(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    compare_numbers(args, env, site, |left, right| left <= right)
}

// --- Boolean logic ---

// Both operands are always evaluated; there is no short-circuiting.
fn combine_bools<F: Fn(bool, bool) -> bool>(
    args: &[Expr],
    env: &Environment,
    site: &CallSite<'_>,
    combine: F,
) -> EvalResult {
    check_arity!(args, 2, site, env);
    let left = eval_bool(&args[0], env, site)?;
    let right = eval_bool(&args[1], env, site)?;
    Ok(Value::Boolean(combine(left, right)))
}

pub fn prim_and(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    combine_bools(args, env, site, |left, right| left && right)
}

pub fn prim_or(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    combine_bools(args, env, site, |left, right| left || right)
}

pub fn prim_not(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    check_arity!(args, 1, site, env);
    Ok(Value::Boolean(!eval_bool(&args[0], env, site)?))
}

// --- Strings ---

/// Evaluates the single argument and takes its text; functions have none.
fn eval_text(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult<String> {
    check_arity!(args, 1, site, env);
    match eval_arg(&args[0], env, site)? {
        Value::String(s) => Ok(s),
        value if value.is_function() => Err(type_mismatch(site, "a non-function value", value, &args[0], env)),
        value => Ok(value.arg_string().unwrap_or_default()),
    }
}

pub fn prim_str_first(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    let text = eval_text(args, env, site)?;
    Ok(Value::String(text.chars().take(1).collect()))
}

pub fn prim_str_rest(args: &[Expr], env: &Environment, site: &CallSite<'_>) -> EvalResult {
    let text = eval_text(args, env, site)?;
    Ok(Value::String(text.chars().skip(1).collect()))
}
