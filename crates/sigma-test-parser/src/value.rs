//! Typed values appearing on the right-hand side of detection items.
//!
//! Sigma strings use `*` for multi-character wildcards and `?` for
//! single-character wildcards. Backslash escapes the next character only when
//! that character is itself special (`*`, `?`, `\`); before anything else it
//! is kept literally, so Windows paths like `C:\Windows\` need no escaping.

use std::fmt;

use serde::Serialize;

/// Special characters that can appear in a Sigma string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecialChar {
    /// Multi-character wildcard (`*`)
    WildcardMulti,
    /// Single-character wildcard (`?`)
    WildcardSingle,
}

/// A part of a [`SigmaString`]: either plain text or a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StringPart {
    Plain(String),
    Special(SpecialChar),
}

/// A Sigma string value that may contain wildcards.
///
/// | Input | Parsed as |
/// |-------|-----------|
/// | `\*`  | literal `*` |
/// | `\?`  | literal `?` |
/// | `\\`  | literal `\` |
/// | `\W`  | literal `\W` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigmaString {
    pub parts: Vec<StringPart>,
    pub original: String,
}

impl SigmaString {
    /// Parse a string, interpreting `*` and `?` as wildcards and `\` as escape.
    pub fn new(s: &str) -> Self {
        let mut builder = PartsBuilder::default();
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.clone().next() {
                    Some(next @ ('*' | '?' | '\\')) => {
                        chars.next();
                        builder.text.push(next);
                    }
                    _ => builder.text.push('\\'),
                },
                '*' => builder.special(SpecialChar::WildcardMulti),
                '?' => builder.special(SpecialChar::WildcardSingle),
                other => builder.text.push(other),
            }
        }

        SigmaString {
            parts: builder.finish(),
            original: s.to_string(),
        }
    }

    /// Create from a raw string with no wildcard parsing (e.g. for `re` modifier).
    pub fn from_raw(s: &str) -> Self {
        SigmaString {
            parts: if s.is_empty() {
                Vec::new()
            } else {
                vec![StringPart::Plain(s.to_string())]
            },
            original: s.to_string(),
        }
    }

    /// Returns `true` if the string contains no wildcards.
    pub fn is_plain(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, StringPart::Plain(_)))
    }

    /// Returns `true` if the string contains any wildcard characters.
    pub fn contains_wildcards(&self) -> bool {
        !self.is_plain()
    }

    /// The unescaped text, or `None` if wildcards are present.
    pub fn as_plain(&self) -> Option<String> {
        if !self.is_plain() {
            return None;
        }
        Some(
            self.parts
                .iter()
                .filter_map(|p| match p {
                    StringPart::Plain(s) => Some(s.as_str()),
                    StringPart::Special(_) => None,
                })
                .collect(),
        )
    }
}

impl fmt::Display for SigmaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

#[derive(Default)]
struct PartsBuilder {
    parts: Vec<StringPart>,
    text: String,
}

impl PartsBuilder {
    fn special(&mut self, c: SpecialChar) {
        self.flush();
        self.parts.push(StringPart::Special(c));
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.parts
                .push(StringPart::Plain(std::mem::take(&mut self.text)));
        }
    }

    fn finish(mut self) -> Vec<StringPart> {
        self.flush();
        self.parts
    }
}

// =============================================================================
// SigmaValue
// =============================================================================

/// A typed value from a Sigma detection item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SigmaValue {
    /// String value (may contain wildcards)
    String(SigmaString),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Null / empty value
    Null,
}

impl SigmaValue {
    /// Create a SigmaValue from a YAML scalar.
    ///
    /// Nested mappings and sequences have no meaning as a match value; they
    /// are kept as their debug rendering so the rule still loads.
    pub fn from_yaml(v: &serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::String(s) => SigmaValue::String(SigmaString::new(s)),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SigmaValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SigmaValue::Float(f)
                } else {
                    SigmaValue::Null
                }
            }
            serde_yaml::Value::Bool(b) => SigmaValue::Bool(*b),
            serde_yaml::Value::Null => SigmaValue::Null,
            serde_yaml::Value::Tagged(tagged) => SigmaValue::from_yaml(&tagged.value),
            other => SigmaValue::String(SigmaString::new(&format!("{other:?}"))),
        }
    }

    /// Create from a raw string (no wildcard parsing).
    pub fn from_raw_string(s: &str) -> Self {
        SigmaValue::String(SigmaString::from_raw(s))
    }
}

impl fmt::Display for SigmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigmaValue::String(s) => write!(f, "{s}"),
            SigmaValue::Integer(n) => write!(f, "{n}"),
            SigmaValue::Float(n) => write!(f, "{n}"),
            SigmaValue::Bool(b) => write!(f, "{b}"),
            SigmaValue::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigma_string_plain() {
        let s = SigmaString::new("hello world");
        assert!(s.is_plain());
        assert_eq!(s.as_plain(), Some("hello world".to_string()));
    }

    #[test]
    fn test_sigma_string_wildcards() {
        let s = SigmaString::new("*admin*");
        assert!(s.contains_wildcards());
        assert_eq!(
            s.parts,
            vec![
                StringPart::Special(SpecialChar::WildcardMulti),
                StringPart::Plain("admin".to_string()),
                StringPart::Special(SpecialChar::WildcardMulti),
            ]
        );
    }

    #[test]
    fn test_escaped_wildcard_is_literal() {
        let s = SigmaString::new(r"C:\Windows\*");
        assert!(s.is_plain());
        assert_eq!(s.as_plain(), Some(r"C:\Windows*".to_string()));
    }

    #[test]
    fn test_backslash_before_plain_char_is_kept() {
        let s = SigmaString::new(r"*\cmd.exe");
        assert_eq!(s.parts.len(), 2);
        assert_eq!(s.parts[1], StringPart::Plain(r"\cmd.exe".to_string()));
    }

    #[test]
    fn test_escaped_backslash() {
        let s = SigmaString::new(r"a\\b");
        assert_eq!(s.as_plain(), Some(r"a\b".to_string()));
    }

    #[test]
    fn test_trailing_backslash() {
        let s = SigmaString::new(r"dir\");
        assert_eq!(s.as_plain(), Some(r"dir\".to_string()));
    }

    #[test]
    fn test_single_wildcard() {
        let s = SigmaString::new("user?admin");
        assert_eq!(s.parts.len(), 3);
        assert_eq!(s.parts[1], StringPart::Special(SpecialChar::WildcardSingle));
    }

    #[test]
    fn test_from_yaml_scalars() {
        let v: serde_yaml::Value = serde_yaml::from_str("22").unwrap();
        assert_eq!(SigmaValue::from_yaml(&v), SigmaValue::Integer(22));

        let v: serde_yaml::Value = serde_yaml::from_str("1.5").unwrap();
        assert_eq!(SigmaValue::from_yaml(&v), SigmaValue::Float(1.5));

        let v: serde_yaml::Value = serde_yaml::from_str("true").unwrap();
        assert_eq!(SigmaValue::from_yaml(&v), SigmaValue::Bool(true));

        let v: serde_yaml::Value = serde_yaml::from_str("~").unwrap();
        assert_eq!(SigmaValue::from_yaml(&v), SigmaValue::Null);
    }
}
