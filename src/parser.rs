use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::Expr;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// Outcome of a single parse step.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// A complete node; the enclosing list keeps going.
    Expr(Expr),
    /// A `)` was consumed; the enclosing list ends here.
    ClosedList(Span),
    /// Input ran out before another token.
    Exhausted,
}

pub struct Parser {
    tokens: IntoIter<Token>,
    // Byte length of the input, where the null atom is placed
    end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, end: usize) -> Self {
        Parser {
            tokens: tokens.into_iter(),
            end,
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses a single node from the token stream.
    pub fn parse_expr(&mut self) -> Parsed {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => Parsed::Expr(self.parse_list(span)),
            Some(Token {
                kind: TokenKind::RParen,
                span,
            }) => Parsed::ClosedList(span),
            Some(Token {
                kind: TokenKind::Str(text) | TokenKind::Atom(text),
                span,
            }) => Parsed::Expr(Expr::atom(text, span)),
            None => Parsed::Exhausted,
        }
    }

    /// Parses the children of a list whose `(` has been consumed.
    /// A list left open at end of input keeps the children read so far.
    fn parse_list(&mut self, open: Span) -> Expr {
        let mut children = Vec::new();
        let mut span = open;
        loop {
            match self.parse_expr() {
                Parsed::Expr(child) => {
                    span = span.merge(child.span);
                    children.push(child);
                }
                Parsed::ClosedList(close) => {
                    span = span.merge(close);
                    break;
                }
                Parsed::Exhausted => break,
            }
        }
        Expr::sub_expr(children, span)
    }

    /// Parses the first top-level expression, ignoring anything after it.
    /// Yields the null atom when there is no expression to read.
    pub fn parse(mut self) -> Expr {
        match self.parse_expr() {
            Parsed::Expr(expr) => expr,
            Parsed::ClosedList(_) | Parsed::Exhausted => Expr::null(Span::point(self.end)),
        }
    }

    /// Parses every top-level expression in order. Stray `)` are skipped.
    pub fn parse_all(mut self) -> Vec<Expr> {
        let mut expressions = Vec::new();
        loop {
            match self.parse_expr() {
                Parsed::Expr(expr) => expressions.push(expr),
                Parsed::ClosedList(_) => continue,
                Parsed::Exhausted => return expressions,
            }
        }
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Expr> {
    let tokens = crate::lexer::tokenize(input)?;
    Ok(Parser::new(tokens, input.len()).parse())
}

pub fn parse_all(input: &str) -> ParseResult<Vec<Expr>> {
    let tokens = crate::lexer::tokenize(input)?;
    Ok(Parser::new(tokens, input.len()).parse_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExprKind;

    // Helper for asserting successful parsing
    fn assert_parse(input: &str, expected: Expr) {
        match parse_str(input) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Tokenize and parse a single expression, then compare its printed form.
    fn assert_parsed_string(input: &str, expected_output: &str) {
        let expr = match parse_str(input) {
            Ok(result) => result,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        assert_eq!(expr.to_string(), expected_output, "Input: '{}'", input);
    }

    fn atom(s: &str) -> Expr {
        Expr::atom(s, Span::default())
    }

    fn list(children: Vec<Expr>) -> Expr {
        Expr::sub_expr(children, Span::default())
    }

    #[test]
    fn test_parse_atoms() {
        assert_parse("123", atom("123"));
        assert_parse("-4.5", atom("-4.5"));
        assert_parse("symbol", atom("symbol"));
        assert_parse("+", atom("+"));
        assert_parse("true", atom("true"));
        assert_parse(r#""hello world""#, atom(r#""hello world""#));
    }

    #[test]
    fn test_leading_whitespace_ignored() {
        assert_parse("   \n\t  x", atom("x"));
    }

    #[test]
    fn test_parse_empty_list() {
        assert_parse("()", list(vec![]));
        assert_parse("( )", list(vec![]));
    }

    #[test]
    fn test_parse_simple_list() {
        assert_parse("(+ 10 20)", list(vec![atom("+"), atom("10"), atom("20")]));
    }

    #[test]
    fn test_parse_nested_lists() {
        assert_parsed_string("((fun (x) x) 10)", "((fun (x) x) 10)");
        assert_parsed_string(
            "(let ((15 (fun (x) x)))\n     (15 20))",
            "(let ((15 (fun (x) x))) (15 20))",
        );
        assert_parse(
            "(a (b (c)))",
            list(vec![atom("a"), list(vec![atom("b"), list(vec![atom("c")])])]),
        );
    }

    #[test]
    fn test_atom_followed_by_close_paren_closes_list() {
        assert_parse("(a b)", list(vec![atom("a"), atom("b")]));
        assert_parse("((a) b)", list(vec![list(vec![atom("a")]), atom("b")]));
    }

    #[test]
    fn test_parse_string_with_parens() {
        assert_parse(
            r#"(Hello world (this "(is a test)" (of the parser )))"#,
            list(vec![
                atom("Hello"),
                atom("world"),
                list(vec![
                    atom("this"),
                    atom(r#""(is a test)""#),
                    list(vec![atom("of"), atom("the"), atom("parser")]),
                ]),
            ]),
        );
    }

    #[test]
    fn test_parse_escaped_quote() {
        assert_parse(r#""with \"quotes\"""#, atom(r#""with "quotes"""#));
    }

    #[test]
    fn test_empty_input_yields_null_atom() {
        let expr = parse_str("").unwrap();
        assert!(expr.is_null());
        assert_eq!(expr.span, Span::new(0, 0));

        assert!(parse_str("   ").unwrap().is_null());
        // A bare close paren is not an expression
        assert!(parse_str(")").unwrap().is_null());
    }

    #[test]
    fn test_trailing_tokens_ignored() {
        assert_parse("(+ 1 2) (- 3 4)", list(vec![atom("+"), atom("1"), atom("2")]));
        assert_parse("a b c", atom("a"));
    }

    #[test]
    fn test_unterminated_list_is_lenient() {
        // Missing closing parens return what was read so far
        assert_parse("(+ 1 2", list(vec![atom("+"), atom("1"), atom("2")]));
        assert_parse("(a (b", list(vec![atom("a"), list(vec![atom("b")])]));
        assert_parse("(", list(vec![]));
    }

    #[test]
    fn test_unterminated_string_is_lenient() {
        assert_parse(r#"(str-first "abc"#, list(vec![atom("str-first"), atom("\"abc")]));
    }

    #[test]
    fn test_parse_spans() {
        let expr = parse_str("(+ 1 22)").unwrap();
        assert_eq!(expr.span, Span::new(0, 8));
        let ExprKind::SubExpr(children) = &expr.kind else {
            panic!("Expected a sub-expression");
        };
        assert_eq!(children[2].span, Span::new(5, 7));
    }

    #[test]
    fn test_parse_all() {
        let exprs = parse_all("(+ 1 2) x ) \"s\"").unwrap();
        assert_eq!(
            exprs,
            vec![list(vec![atom("+"), atom("1"), atom("2")]), atom("x"), atom("\"s\"")]
        );
        assert!(parse_all("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_step_results() {
        let tokens = crate::lexer::tokenize("x)").unwrap();
        let mut parser = Parser::new(tokens, 2);
        assert_eq!(parser.parse_expr(), Parsed::Expr(atom("x")));
        assert_eq!(parser.parse_expr(), Parsed::ClosedList(Span::new(1, 2)));
        assert_eq!(parser.parse_expr(), Parsed::Exhausted);
    }
}
