use crate::primitives;
use crate::types::Value;
use std::fmt;

// --- Environment Definition ---

/// An immutable mapping from atom text to values.
///
/// Extension never touches the receiver: it returns a new environment that
/// shares structure with the old one (via `im::HashMap`), so closures can keep
/// their captured scope while callers keep extending their own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    bindings: im::HashMap<String, Value>,
}

impl Environment {
    /// Creates an environment with no bindings at all.
    pub fn empty() -> Self {
        Environment::default()
    }

    /// Creates the root environment, seeded with every builtin.
    pub fn global() -> Self {
        Environment::empty().extend(
            primitives::builtins()
                .into_iter()
                .map(|builtin| (builtin.name.to_string(), Value::Builtin(builtin))),
        )
    }

    /// Looks up the value bound to `atom`, if any.
    pub fn lookup(&self, atom: &str) -> Option<&Value> {
        self.bindings.get(atom)
    }

    /// Returns a copy of this environment with `bindings` layered on top.
    /// Later entries win when a name appears twice.
    #[must_use]
    pub fn extend<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut extended = self.bindings.clone();
        for (name, value) in bindings {
            extended.insert(name, value);
        }
        Environment { bindings: extended }
    }

    /// Single-binding form of [`Environment::extend`].
    #[must_use]
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Self {
        Environment {
            bindings: self.bindings.update(name.into(), value),
        }
    }

    /// Gets a sorted list of all identifiers bound in this environment
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.bindings.keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for name in self.identifiers() {
            if !first {
                write!(f, ", ")?;
            }
            if let Some(value) = self.lookup(&name) {
                write!(f, "{} -> {}", name, value)?;
            }
            first = false;
        }
        write!(f, "}}")
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let env = Environment::empty();
        assert_eq!(env.lookup("y"), None);
        assert!(env.is_empty());
    }

    #[test]
    fn test_extend_and_lookup() {
        let env = Environment::empty().extend(vec![("x".to_string(), num(10.0))]);
        assert_eq!(env.lookup("x"), Some(&num(10.0)));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_extend_does_not_mutate_base() {
        let base = Environment::empty().bind("x", num(10.0));
        let extended = base.extend(vec![("x".to_string(), num(50.0)), ("y".to_string(), num(1.0))]);

        assert_eq!(extended.lookup("x"), Some(&num(50.0)));
        assert_eq!(extended.lookup("y"), Some(&num(1.0)));

        // The base still sees its own bindings only
        assert_eq!(base.lookup("x"), Some(&num(10.0)));
        assert_eq!(base.lookup("y"), None);
    }

    #[test]
    fn test_later_bindings_win() {
        let env = Environment::empty().extend(vec![
            ("x".to_string(), num(1.0)),
            ("x".to_string(), num(2.0)),
        ]);
        assert_eq!(env.lookup("x"), Some(&num(2.0)));
    }

    #[test]
    fn test_keys_are_textual() {
        // Any string can be a binding target, not just identifiers
        let env = Environment::empty()
            .bind("15", num(20.0))
            .bind("\"quoted\"", Value::Boolean(true));
        assert_eq!(env.lookup("15"), Some(&num(20.0)));
        assert_eq!(env.lookup("\"quoted\""), Some(&Value::Boolean(true)));
        assert_eq!(env.lookup("15.0"), None);
    }

    #[test]
    fn test_global_is_seeded_with_builtins() {
        let env = Environment::global();
        for name in [
            "fun", "let", "if", "+", "-", "*", "/", "=", ">", ">=", "<", "<=", "&", "|", "!",
            "str-first", "str-rest",
        ] {
            assert!(
                matches!(env.lookup(name), Some(Value::Builtin(b)) if b.name == name),
                "missing builtin {}",
                name
            );
        }
        assert_eq!(env.len(), 17);
    }

    #[test]
    fn test_identifiers_sorted() {
        let env = Environment::empty().bind("b", num(1.0)).bind("a", num(2.0));
        assert_eq!(env.identifiers(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_display() {
        let env = Environment::empty().bind("x", num(1.0)).bind("s", Value::String("hi".into()));
        assert_eq!(env.to_string(), "{s -> \"hi\", x -> 1}");
    }
}
