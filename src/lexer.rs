use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Unicode whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    // The closing quote is optional: an unterminated string still lexes.
    #[regex(r#""([^"\\]|\\(.|\n))*\\?"?"#, |lex| unescape::unescape(lex.slice()))]
    Str(String),
    // Only whitespace and ')' end an atom, so "a(b" is a single atom.
    #[regex(r#"[^\s()"][^\s)]*"#, |lex| lex.slice().to_string())]
    Atom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

mod unescape {
    /// Drops every escaping backslash, keeping the character it escapes.
    /// The surrounding quotes are kept so the atom still reads as a string literal.
    pub fn unescape(slice: &str) -> String {
        let mut result = String::with_capacity(slice.len());
        let mut escaped = false;
        for c in slice.chars() {
            if escaped {
                result.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                result.push(c);
            }
        }
        result
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Str(s) | TokenKind::Atom(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

// Helper function to tokenize a string directly (useful for tests and parser)
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: range.into(),
            }),
            Err(error) => Err(LexerError {
                error,
                span: range.into(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    fn atom(s: &str) -> TokenKind {
        TokenKind::Atom(s.to_string())
    }

    fn string(s: &str) -> TokenKind {
        TokenKind::Str(s.to_string())
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens(" \t\n ", vec![]);
    }

    #[test]
    fn test_parentheses() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens("( )", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens(
            "(())",
            vec![
                TokenKind::LParen,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_atoms() {
        assert_tokens(
            "foo 123 -4.5 true str-first",
            vec![
                atom("foo"),
                atom("123"),
                atom("-4.5"),
                atom("true"),
                atom("str-first"),
            ],
        );
        assert_tokens("+ >= & | !", vec![atom("+"), atom(">="), atom("&"), atom("|"), atom("!")]);
    }

    #[test]
    fn test_atom_ends_at_close_paren_only() {
        assert_tokens("(x)", vec![TokenKind::LParen, atom("x"), TokenKind::RParen]);
        // An open paren or quote inside an atom does not split it
        assert_tokens("a(b", vec![atom("a(b")]);
        assert_tokens("a\"b", vec![atom("a\"b")]);
    }

    #[test]
    fn test_unicode_whitespace() {
        assert_tokens("a\u{00A0}b\u{2003}c", vec![atom("a"), atom("b"), atom("c")]);
    }

    #[test]
    fn test_strings_keep_quotes() {
        assert_tokens(r#""hello""#, vec![string(r#""hello""#)]);
        assert_tokens(r#""with space""#, vec![string(r#""with space""#)]);
        assert_tokens(r#""""#, vec![string(r#""""#)]);
    }

    #[test]
    fn test_string_escapes_drop_backslash() {
        assert_tokens(r#""say \"hi\"""#, vec![string(r#""say "hi"""#)]);
        assert_tokens(r#""back\\slash""#, vec![string(r#""back\slash""#)]);
        assert_tokens(r#""\n""#, vec![string(r#""n""#)]);
    }

    #[test]
    fn test_parens_inside_strings_are_not_structural() {
        assert_tokens(
            r#"(this "(is a test)")"#,
            vec![
                TokenKind::LParen,
                atom("this"),
                string(r#""(is a test)""#),
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_unterminated_string_is_lenient() {
        assert_tokens(r#""hello"#, vec![string(r#""hello"#)]);
        assert_tokens(r#""hello\""#, vec![string(r#""hello""#)]);
        assert_tokens(r#""hello\"#, vec![string(r#""hello"#)]);
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "(+ 1)";
        let tokens = tokenize(input).expect("Should tokenize successfully");

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span { start: 0, end: 1 });
        assert_eq!(tokens[1].span, Span { start: 1, end: 2 });
        assert_eq!(tokens[2].span, Span { start: 3, end: 4 });
        assert_eq!(tokens[3].span, Span { start: 4, end: 5 });
    }
}
