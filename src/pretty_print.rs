use crate::{Error, EvalError, ParseError};
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::ops::Range;

const SOURCE_ID: &str = "REPL";

type SourceReport<'a> = Report<'a, (&'static str, Range<usize>)>;

fn render(report: SourceReport<'_>, input: &str) -> String {
    let mut buffer = Vec::new();
    match report.write((SOURCE_ID, Source::from(input)), &mut buffer) {
        Ok(()) => String::from_utf8_lossy(&buffer).into_owned(),
        Err(_) => String::new(),
    }
}

fn build(range: Range<usize>, message: String, label: String) -> SourceReport<'static> {
    Report::build(ReportKind::Error, (SOURCE_ID, range.clone()))
        .with_config(Config::default().with_color(false))
        .with_message(message)
        .with_label(Label::new((SOURCE_ID, range)).with_message(label))
        .finish()
}

impl EvalError {
    /// Renders this error as a labelled report against `input`.
    pub fn report(&self, input: &str) -> String {
        let range = self.span().to_range();
        let (message, label) = match self {
            EvalError::UnboundIdentifier { name, .. } => (
                format!("Unbound identifier `{}`", name),
                "This atom resolves to nothing in the current scope".to_string(),
            ),
            EvalError::ArityMismatch { message, .. } => {
                ("Mismatched argument count".to_string(), message.clone())
            }
            EvalError::TypeMismatch {
                operator,
                expected,
                found,
                ..
            } => (
                format!("Type mismatch in `{}`", operator),
                format!("Expected {}, found {} {}", expected, found.type_name(), found),
            ),
            EvalError::MalformedSpecialForm { form, message, .. } => {
                (format!("Malformed `{}`", form), message.clone())
            }
            EvalError::NotCallable { value, .. } => (
                format!("Not callable: {}", value),
                format!("A {} cannot accept arguments", value.type_name()),
            ),
            EvalError::EmptyApplication { .. } => (
                "Empty expression".to_string(),
                "There is no operator to apply".to_string(),
            ),
        };
        render(build(range, message, label), input)
    }

    pub fn pretty_print(&self, input: &str) {
        eprint!("{}", self.report(input));
    }
}

impl ParseError {
    pub fn report(&self, input: &str) -> String {
        match self {
            ParseError::LexerError(lex_err) => render(
                build(
                    lex_err.span.to_range(),
                    "Lexer Error".to_string(),
                    lex_err.error.to_string(),
                ),
                input,
            ),
        }
    }

    pub fn pretty_print(&self, input: &str) {
        eprint!("{}", self.report(input));
    }
}

impl Error {
    pub fn report(&self, input: &str) -> String {
        match self {
            Error::Parse(err) => err.report(input),
            Error::Eval(err) => err.report(input),
        }
    }

    pub fn pretty_print(&self, input: &str) {
        eprint!("{}", self.report(input));
    }
}

#[cfg(test)]
mod tests {
    use crate::{Environment, run};

    #[test]
    fn test_report_names_unbound_identifier() {
        let input = "(+ 1 missing)";
        let err = run(input, &Environment::global()).unwrap_err();
        let report = err.report(input);
        assert!(report.contains("Unbound identifier `missing`"), "{}", report);
        assert!(report.contains("(+ 1 missing)"), "{}", report);
    }

    #[test]
    fn test_report_type_mismatch() {
        let input = "(if 1 2 3)";
        let err = run(input, &Environment::global()).unwrap_err();
        let report = err.report(input);
        assert!(report.contains("Type mismatch in `if`"), "{}", report);
        assert!(report.contains("Expected boolean, found number 1"), "{}", report);
    }
}
