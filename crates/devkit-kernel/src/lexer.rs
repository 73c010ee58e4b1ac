//! Lexer for the evaluation language.
//!
//! Converts source text into a token stream using the logos lexer
//! generator. Newlines are tokens (they separate statements); spaces,
//! tabs and `#` comments are skipped.

use logos::Logos;

use devkit_types::DevError;

/// One token of evaluation-language source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("\n")]
    Newline,
    #[token(";")]
    Semi,

    // Keywords (token rules outrank the identifier regex).
    #[token("del")]
    Del,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Newline => write!(f, "newline"),
            Token::Semi => write!(f, "';'"),
            Token::Del => write!(f, "'del'"),
            Token::Null => write!(f, "'null'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Ident(name) => write!(f, "identifier {name:?}"),
            Token::Float(v) => write!(f, "float {v}"),
            Token::Int(v) => write!(f, "int {v}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
            Token::Le => write!(f, "'<='"),
            Token::Ge => write!(f, "'>='"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::Assign => write!(f, "'='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Percent => write!(f, "'%'"),
            Token::Bang => write!(f, "'!'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Comma => write!(f, "','"),
        }
    }
}

/// Process escape sequences in a quoted string slice (quotes included).
fn unescape(slice: &str) -> Option<String> {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            other => {
                // Unknown escape: keep it verbatim, like a raw backslash.
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Tokenize a source block, reporting the byte offset of the first
/// unrecognized character on failure.
pub fn tokenize(source: &str) -> Result<Vec<Token>, DevError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                let snippet: String = source[span.start..].chars().take(12).collect();
                return Err(DevError::Syntax(format!(
                    "unrecognized input at byte {}: {snippet:?}",
                    span.start
                )));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_assignment() {
        let tokens = tokenize("x = 5").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Ident("x".into()), Token::Assign, Token::Int(5)]
        );
    }

    #[test]
    fn keywords_beat_identifiers() {
        let tokens = tokenize("del true nullish").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Del, Token::True, Token::Ident("nullish".into())]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#""a\nb\"c""#).unwrap();
        assert_eq!(tokens, vec![Token::Str("a\nb\"c".into())]);
    }

    #[test]
    fn floats_and_ints_are_distinct() {
        let tokens = tokenize("1.5 2").unwrap();
        assert_eq!(tokens, vec![Token::Float(1.5), Token::Int(2)]);
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = tokenize("1 # trailing\n2").unwrap();
        assert_eq!(tokens, vec![Token::Int(1), Token::Newline, Token::Int(2)]);
    }

    #[test]
    fn rejects_unknown_characters() {
        let err = tokenize("1 @ 2").unwrap_err();
        assert!(matches!(err, DevError::Syntax(_)));
    }
}
