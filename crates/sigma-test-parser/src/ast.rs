//! Typed form of a Sigma rule.
//!
//! Only the parts needed to evaluate a rule are modelled in depth: the log
//! source identity and the detection section. Descriptive metadata is kept
//! as plain strings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::value::SigmaValue;

/// Classification of a YAML file found next to rules.
///
/// Only [`FileType::Rule`] files are evaluated; test companions and config
/// files living next to rules are recognised so they can be passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Rule,
    Config,
    Unknown,
}

// =============================================================================
// Modifiers
// =============================================================================

/// A `|modifier` suffix on a detection key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Contains,
    StartsWith,
    EndsWith,
    /// Every value must match instead of any.
    All,
    Base64,
    Base64Offset,
    /// UTF-16LE encoding before base64.
    Wide,
    /// Try every dash-like character in place of `-`.
    WindAsh,
    Re,
    #[serde(rename = "i")]
    IgnoreCase,
    #[serde(rename = "m")]
    Multiline,
    #[serde(rename = "s")]
    DotAll,
    Cidr,
    Cased,
    Exists,
    Expand,
    FieldRef,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FromStr for Modifier {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let modifier = match name {
            "contains" => Modifier::Contains,
            "startswith" => Modifier::StartsWith,
            "endswith" => Modifier::EndsWith,
            "all" => Modifier::All,
            "base64" => Modifier::Base64,
            "base64offset" => Modifier::Base64Offset,
            "wide" | "utf16le" => Modifier::Wide,
            "windash" => Modifier::WindAsh,
            "re" => Modifier::Re,
            "i" | "ignorecase" => Modifier::IgnoreCase,
            "m" | "multiline" => Modifier::Multiline,
            "s" | "dotall" => Modifier::DotAll,
            "cidr" => Modifier::Cidr,
            "cased" => Modifier::Cased,
            "exists" => Modifier::Exists,
            "expand" => Modifier::Expand,
            "fieldref" => Modifier::FieldRef,
            "gt" => Modifier::Gt,
            "gte" => Modifier::Gte,
            "lt" => Modifier::Lt,
            "lte" => Modifier::Lte,
            other => return Err(other.to_string()),
        };
        Ok(modifier)
    }
}

/// Left-hand side of a detection item: `Image|endswith` becomes
/// `name: Some("Image"), modifiers: [EndsWith]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// `None` for keyword items.
    pub name: Option<String>,
    pub modifiers: Vec<Modifier>,
}

impl FieldSpec {
    pub fn has_modifier(&self, m: Modifier) -> bool {
        self.modifiers.contains(&m)
    }

    pub fn is_keyword(&self) -> bool {
        self.name.is_none()
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// A parsed `condition:` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConditionExpr {
    /// Name of a search in the detection section.
    Identifier(String),
    Not(Box<ConditionExpr>),
    And(Vec<ConditionExpr>),
    Or(Vec<ConditionExpr>),
    /// `<quantifier> of <pattern>`.
    Selector {
        quantifier: Quantifier,
        pattern: SelectorPattern,
    },
}

impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::Identifier(name) => f.write_str(name),
            ConditionExpr::Not(inner) => write!(f, "not {inner}"),
            ConditionExpr::And(args) => write_joined(f, args, "and"),
            ConditionExpr::Or(args) => write_joined(f, args, "or"),
            ConditionExpr::Selector {
                quantifier,
                pattern,
            } => write!(f, "{quantifier} of {pattern}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, args: &[ConditionExpr], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

/// How many searches a selector needs: `1`/`any`, `all`, or a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Quantifier {
    Any,
    All,
    Count(u64),
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Any => f.write_str("1"),
            Quantifier::All => f.write_str("all"),
            Quantifier::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Which searches a selector ranges over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SelectorPattern {
    /// Every search whose name does not start with `_`.
    Them,
    /// Search names matching a `*` glob.
    Pattern(String),
}

impl fmt::Display for SelectorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorPattern::Them => f.write_str("them"),
            SelectorPattern::Pattern(p) => f.write_str(p),
        }
    }
}

// =============================================================================
// Detection section
// =============================================================================

/// `field|modifiers: value(s)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionItem {
    pub field: FieldSpec,
    pub values: Vec<SigmaValue>,
}

/// One named search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Detection {
    /// A mapping: every item must match.
    AllOf(Vec<DetectionItem>),
    /// A list of mappings: any entry may match.
    AnyOf(Vec<Detection>),
    /// A list of plain values searched for anywhere in the event.
    Keywords(Vec<SigmaValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detections {
    pub named: HashMap<String, Detection>,
    /// A rule matches when any of its conditions does.
    pub conditions: Vec<ConditionExpr>,
    /// Conditions as written in the rule.
    pub condition_strings: Vec<String>,
}

// =============================================================================
// Rule
// =============================================================================

/// The `{product, category, service}` identity of the events a rule or
/// config definition applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogSource {
    pub product: Option<String>,
    pub category: Option<String>,
    pub service: Option<String>,
    pub definition: Option<String>,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |v: &Option<String>| v.as_deref().unwrap_or("*").to_string();
        write!(
            f,
            "{}/{}/{}",
            part(&self.product),
            part(&self.category),
            part(&self.service)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigmaRule {
    pub title: String,
    pub id: Option<String>,
    pub description: Option<String>,
    pub level: Option<String>,
    pub tags: Vec<String>,
    pub logsource: LogSource,
    pub detection: Detections,
}
