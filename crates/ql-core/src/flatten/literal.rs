//! Literal-structure parsing.
//!
//! Some responses arrive as the repr of a dynamic-language structure:
//! single-quoted strings and bare `True`/`False`/`None`. JSON5 already
//! accepts single quotes, so the bare constants are rewritten to their JSON
//! spelling (outside string literals only) and the result is parsed as JSON5.

use serde_json::Value;

/// Parse literal-structure text, or `None` when it is not one.
pub fn parse_literal(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    json5::from_str::<Value>(&rewrite_constants(trimmed)).ok()
}

fn rewrite_constants(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            out.push(c);
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() && (i == 0 || !is_ident(chars[i - 1])) {
            let start = i;
            while i < chars.len() && is_ident(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            out.push_str(match word.as_str() {
                "True" => "true",
                "False" => "false",
                "None" => "null",
                other => other,
            });
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_quoted_map() {
        let v = parse_literal("{'a': 1, 'b': [True, None], 'c': 'x'}").unwrap();
        assert_eq!(v, json!({"a": 1, "b": [true, null], "c": "x"}));
    }

    #[test]
    fn test_constants_inside_strings_are_kept() {
        let v = parse_literal("{'note': 'None of True'}").unwrap();
        assert_eq!(v["note"], json!("None of True"));
    }

    #[test]
    fn test_escaped_quote() {
        let v = parse_literal(r"{'name': 'O\'Neil'}").unwrap();
        assert_eq!(v["name"], json!("O'Neil"));
    }

    #[test]
    fn test_plain_text_is_not_literal() {
        assert!(parse_literal("Thank you for using the API").is_none());
        assert!(parse_literal("").is_none());
    }

    #[test]
    fn test_preserves_key_order() {
        let v = parse_literal("{'z': 1, 'a': 2}").unwrap();
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
