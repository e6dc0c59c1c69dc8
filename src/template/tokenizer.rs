use crate::constants::{ESCAPED_SIGIL, RAW_SIGIL};
use regex::Regex;
use std::sync::OnceLock;

/// One run of template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text between markers.
    Text(String),
    /// `[[= expr ]]`
    EscapedOutput(String),
    /// `[[- expr ]]`
    RawOutput(String),
    /// `[[ stmt ]]`
    CodeStatement(String),
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // Non-greedy and dot-matches-newline: a marker closes at the nearest `]]`.
    MARKER.get_or_init(|| Regex::new(r"(?s)\[\[(.+?)\]\]").expect("marker pattern is valid"))
}

/// Splits a template into tokens covering the whole input in source order.
///
/// An opening `[[` with no `]]` anywhere after it stays literal text.
///
/// # Arguments
/// * `template` - Raw (already preprocessed) template text
///
/// # Returns
/// * `Vec<Token>` - Tokens in source order
pub fn tokenize(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for captures in marker_regex().captures_iter(template) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(template[last..whole.start()].to_string()));
        }
        tokens.push(classify(inner.as_str()));
        last = whole.end();
    }

    if last < template.len() {
        tokens.push(Token::Text(template[last..].to_string()));
    }
    tokens
}

fn classify(inner: &str) -> Token {
    if let Some(expr) = inner.strip_prefix(ESCAPED_SIGIL) {
        Token::EscapedOutput(expr.trim().to_string())
    } else if let Some(expr) = inner.strip_prefix(RAW_SIGIL) {
        Token::RawOutput(expr.trim().to_string())
    } else {
        Token::CodeStatement(inner.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_markers() {
        assert_eq!(
            tokenize("Hi [[= name ]], [[- html ]][[ if (x) { ]]!"),
            vec![
                Token::Text("Hi ".into()),
                Token::EscapedOutput("name".into()),
                Token::Text(", ".into()),
                Token::RawOutput("html".into()),
                Token::CodeStatement("if (x) {".into()),
                Token::Text("!".into()),
            ]
        );
    }

    #[test]
    fn markers_span_lines_and_close_at_nearest_delimiter() {
        assert_eq!(
            tokenize("[[ let a =\n 1 ]]x]]"),
            vec![Token::CodeStatement("let a =\n 1".into()), Token::Text("x]]".into())]
        );
    }

    #[test]
    fn unterminated_marker_is_literal_text() {
        assert_eq!(tokenize("a [[= b"), vec![Token::Text("a [[= b".into())]);
    }

    #[test]
    fn sigil_must_be_the_first_character() {
        assert_eq!(tokenize("[[ =x ]]"), vec![Token::CodeStatement("=x".into())]);
        assert_eq!(tokenize("[[=x]]"), vec![Token::EscapedOutput("x".into())]);
    }

    #[test]
    fn plain_text_is_a_single_token() {
        assert_eq!(tokenize("just text"), vec![Token::Text("just text".into())]);
    }
}
