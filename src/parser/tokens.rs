use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

/// Citation marker and line breaks; edge spaces are trimmed afterwards.
static STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"c\.|[\n\t]").unwrap());

/// One alternative per token kind, tried left to right at each position.
/// `regex` has no lookahead, so WEIGHT consumes its ` kg` unit outside the group.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"-(?P<NAME>[A-Za-z ]+)",
        r"|(?P<FLOAT>\d+\.\d+)$",
        r"|(?P<INTEGER>[+-]?[\d,]+)$",
        r"|(?P<MULTIPLIER>[+-]?[\d.]+)x",
        r"|(?P<PERCENTAGE>[+-]?[\d.]+)%",
        r"|(?P<WEIGHT>\d+) kg",
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Multiplier(f64),
    /// Stored as a fraction: `15%` is `0.15`.
    Percentage(f64),
    Weight(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A `-Label` run; becomes the current label.
    Name(String),
    Value(TypedValue),
    /// Matched a numeric alternative but the text would not parse (e.g. a lone `.`).
    Unparsable(String),
}

/// Remove the citation marker, tabs/newlines and surrounding spaces.
pub fn clean_cell(raw: &str) -> String {
    STRIP_RE.replace_all(raw, "").trim_matches(' ').to_string()
}

/// `"Blunt Damage"` -> `"blunt_damage"`.
pub fn normalize_label(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Split one cleaned cell into its tokens, in order of appearance.
pub fn tokenize(cleaned: &str) -> Vec<Token> {
    TOKEN_RE.captures_iter(cleaned).filter_map(|c| classify(&c)).collect()
}

fn classify(caps: &Captures) -> Option<Token> {
    if let Some(m) = caps.name("NAME") {
        return Some(Token::Name(m.as_str().to_string()));
    }
    let (text, kind) = ["FLOAT", "INTEGER", "MULTIPLIER", "PERCENTAGE", "WEIGHT"]
        .into_iter()
        .find_map(|kind| caps.name(kind).map(|m| (m.as_str(), kind)))?;

    let value = match kind {
        "FLOAT" => text.parse().ok().map(TypedValue::Float),
        "INTEGER" => text.replace(',', "").parse().ok().map(TypedValue::Integer),
        "MULTIPLIER" => text.parse().ok().map(TypedValue::Multiplier),
        "PERCENTAGE" => text.parse::<f64>().ok().map(|v| TypedValue::Percentage(v / 100.0)),
        _ => text.parse().ok().map(TypedValue::Weight),
    };
    Some(match value {
        Some(v) => Token::Value(v),
        None => Token::Unparsable(text.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(cell: &str) -> Vec<Token> {
        tokenize(&clean_cell(cell))
    }

    #[test]
    fn name_token() {
        assert_eq!(values("-Blunt Damage"), vec![Token::Name("Blunt Damage".into())]);
    }

    #[test]
    fn float_token() {
        assert_eq!(values("12.5"), vec![Token::Value(TypedValue::Float(12.5))]);
    }

    #[test]
    fn integer_with_commas_and_sign() {
        assert_eq!(values("12,345"), vec![Token::Value(TypedValue::Integer(12345))]);
        assert_eq!(values("-7"), vec![Token::Value(TypedValue::Integer(-7))]);
        assert_eq!(values("+4"), vec![Token::Value(TypedValue::Integer(4))]);
    }

    #[test]
    fn percentage_is_never_integer() {
        assert_eq!(values("+15%"), vec![Token::Value(TypedValue::Percentage(0.15))]);
        assert_eq!(values("-5%"), vec![Token::Value(TypedValue::Percentage(-0.05))]);
    }

    #[test]
    fn multiplier_token() {
        assert_eq!(values("1.2x"), vec![Token::Value(TypedValue::Multiplier(1.2))]);
        assert_eq!(values("-0.5x"), vec![Token::Value(TypedValue::Multiplier(-0.5))]);
    }

    #[test]
    fn weight_keeps_unit_out_of_value() {
        assert_eq!(values("3 kg"), vec![Token::Value(TypedValue::Weight(3))]);
    }

    #[test]
    fn label_and_value_in_one_cell() {
        assert_eq!(
            values("-Cutting Damage 0.8x"),
            vec![
                Token::Name("Cutting Damage ".into()),
                Token::Value(TypedValue::Multiplier(0.8)),
            ]
        );
    }

    #[test]
    fn cleaning_strips_citation_and_whitespace() {
        assert_eq!(clean_cell("c.1,200\n"), "1,200");
        assert_eq!(clean_cell("\n  -Weight \t"), "-Weight");
    }

    #[test]
    fn lone_dot_is_unparsable() {
        assert_eq!(values(".%"), vec![Token::Unparsable(".".into())]);
    }

    #[test]
    fn plain_words_yield_nothing() {
        assert!(values("Katana class").is_empty());
    }

    #[test]
    fn label_normalization() {
        assert_eq!(normalize_label("Damage vs Small Spider "), "damage_vs_small_spider");
    }
}
