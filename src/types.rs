use crate::environment::Environment;
use crate::evaluator::{CallSite, EvalResult};
use crate::source::Span;
use std::fmt;
use std::rc::Rc;

/// Text of the sentinel atom produced when the input holds no expression.
pub const NULL_ATOM: &str = "NULL";

/// A parse-tree node. Equality is structural and ignores the span.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind, // The actual syntax
    pub span: Span,     // The source span it covers
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Raw token text: number, boolean, quoted string (quotes kept) or bare name.
    Atom(String),
    /// An application or special form; the first child is the operator.
    SubExpr(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn atom(text: impl Into<String>, span: Span) -> Self {
        Expr::new(ExprKind::Atom(text.into()), span)
    }

    pub fn sub_expr(children: Vec<Expr>, span: Span) -> Self {
        Expr::new(ExprKind::SubExpr(children), span)
    }

    pub fn null(span: Span) -> Self {
        Expr::atom(NULL_ATOM, span)
    }

    pub fn is_null(&self) -> bool {
        self.atom_text() == Some(NULL_ATOM)
    }

    pub fn atom_text(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Atom(text) => Some(text),
            ExprKind::SubExpr(_) => None,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Atom(text) => write!(f, "{}", text),
            ExprKind::SubExpr(children) => {
                write!(f, "(")?;
                let mut first = true;
                for child in children {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                    first = false;
                }
                write!(f, ")")
            }
        }
    }
}

/// Classifies raw atom text as a literal, if it is one.
///
/// Tried in order: host float grammar, case-insensitive `true`/`false`, then a
/// double-quoted string. Anything else must be resolved through the environment.
pub fn convert_atom(text: &str) -> Option<Value> {
    if let Ok(num) = text.parse::<f64>() {
        return Some(Value::Number(num));
    }
    if text.eq_ignore_ascii_case("true") {
        return Some(Value::Boolean(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(false));
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Some(Value::String(text[1..text.len() - 1].to_string()));
    }
    None
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Symbol(String),
    Closure(Rc<Closure>),
    Builtin(Builtin),
}

impl Value {
    /// Canonical text used to feed a value back into atom resolution.
    /// Closures are never re-expressed as atoms.
    pub fn arg_string(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(n.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::String(s) => Some(format!("\"{}\"", s)),
            Value::Symbol(s) => Some(s.clone()),
            Value::Builtin(builtin) => Some(builtin.name.to_string()),
            Value::Closure(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Builtin(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Closure(closure) => match &closure.param {
                Some(param) => write!(f, "#<closure:{}>", param),
                None => write!(f, "#<closure>"),
            },
            Value::Builtin(builtin) => write!(f, "#<builtin:{}>", builtin.name),
        }
    }
}

/// What a closure does once its parameter is bound.
#[derive(Debug, Clone, PartialEq)]
pub enum ClosureBody {
    Expr(Rc<Expr>),
    /// The next step of a multi-parameter function.
    Curried(Rc<Closure>),
}

/// A one-parameter (or zero-parameter) function value.
///
/// Multi-parameter functions are chains of closures linked through
/// [`ClosureBody::Curried`]; only the last link holds the body expression.
#[derive(Clone, PartialEq)]
pub struct Closure {
    pub param: Option<String>,
    pub body: ClosureBody,
    pub env: Environment,
}

impl Closure {
    /// Builds the curried chain for `params`, every link capturing `env`.
    pub fn curried(params: Vec<String>, body: Rc<Expr>, env: Environment) -> Closure {
        let mut params = params.into_iter().rev();
        let Some(last) = params.next() else {
            return Closure {
                param: None,
                body: ClosureBody::Expr(body),
                env,
            };
        };
        let mut closure = Closure {
            param: Some(last),
            body: ClosureBody::Expr(body),
            env: env.clone(),
        };
        for param in params {
            closure = Closure {
                param: Some(param),
                body: ClosureBody::Curried(Rc::new(closure)),
                env: env.clone(),
            };
        }
        closure
    }

    /// Number of arguments the whole chain accepts.
    pub fn arity(&self) -> usize {
        let mut count = 0;
        let mut current = self;
        loop {
            if current.param.is_some() {
                count += 1;
            }
            match &current.body {
                ClosureBody::Curried(next) => current = next,
                ClosureBody::Expr(_) => return count,
            }
        }
    }

    /// The next link with `env` as its captured environment.
    pub fn rebind(&self, env: Environment) -> Closure {
        Closure {
            param: self.param.clone(),
            body: self.body.clone(),
            env,
        }
    }
}

// Captured environments hold every builtin; keep them out of debug output.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("param", &self.param)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

pub type PrimitiveFunc = fn(&[Expr], &Environment, &CallSite<'_>) -> EvalResult;

/// A primitive operation receiving its arguments unevaluated.
#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub func: PrimitiveFunc,
}

impl Builtin {
    pub fn new(name: &'static str, func: PrimitiveFunc) -> Self {
        Builtin { name, func }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

// Function pointers don't compare meaningfully, so builtins compare by name.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
