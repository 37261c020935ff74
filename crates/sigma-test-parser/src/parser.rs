//! YAML → AST parser for Sigma detection rules.
//!
//! A rule is read from the first non-empty document of a YAML stream, so
//! stray `---` markers around it are harmless. Alongside the rule parser this
//! module classifies YAML files ([`infer_file_type`]) so that test companions
//! and configuration files sharing a directory with rules are not mistaken
//! for rules.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::ast::*;
use crate::condition::parse_condition;
use crate::error::{Result, SigmaParserError};
use crate::value::SigmaValue;

// =============================================================================
// Public API
// =============================================================================

/// Parse a Sigma detection rule from the first non-empty document of `yaml`.
///
/// ```
/// use sigma_test_parser::parse_rule;
///
/// let rule = parse_rule(r#"
/// title: SSH connection
/// logsource:
///     product: windows
///     category: process_creation
/// detection:
///     selection:
///         dst_port: 22
///     condition: selection
/// "#).unwrap();
/// assert_eq!(rule.logsource.product.as_deref(), Some("windows"));
/// ```
pub fn parse_rule(yaml: &str) -> Result<SigmaRule> {
    let value = first_document(yaml)?;
    parse_detection_rule(&value)
}

/// Read and parse a Sigma rule file.
pub fn parse_rule_file(path: &Path) -> Result<SigmaRule> {
    let content = std::fs::read_to_string(path)?;
    parse_rule(&content)
}

/// Decide whether a YAML file is a rule, a config, or neither.
///
/// The first non-empty document decides. One with a `detection` section is a
/// rule; one with `fieldmappings`, `logsources` or `backends` is a config.
/// When the stream does not decode (duplicate keys, broken syntax) the
/// top-level keys of the text are inspected instead, so a damaged rule is
/// still classified as a rule and its parse error surfaces.
pub fn infer_file_type(yaml: &str) -> FileType {
    match first_document(yaml) {
        Ok(value) => match value.as_mapping() {
            Some(m) => classify_keys(|key| m.contains_key(val_key(key))),
            None => FileType::Unknown,
        },
        Err(e) => {
            let keys = top_level_keys(yaml);
            let file_type = classify_keys(|key| keys.iter().any(|k| *k == key));
            log::debug!("YAML does not decode ({e}), classified as {file_type:?} by its keys");
            file_type
        }
    }
}

fn classify_keys(has_key: impl Fn(&str) -> bool) -> FileType {
    if has_key("detection") {
        FileType::Rule
    } else if ["fieldmappings", "logsources", "backends"]
        .into_iter()
        .any(&has_key)
    {
        FileType::Config
    } else {
        FileType::Unknown
    }
}

/// The first document of the stream that is not empty, or `Null` when every
/// document is.
fn first_document(yaml: &str) -> std::result::Result<Value, serde_yaml::Error> {
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            return Ok(value);
        }
    }
    Ok(Value::Null)
}

/// Unindented `key:` lines of the first document, read as plain text.
fn top_level_keys(yaml: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    for line in yaml.lines() {
        if line.starts_with("---") {
            if keys.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with([' ', '\t', '#', '-']) {
            continue;
        }
        if let Some((key, _)) = line.split_once(':') {
            keys.push(key.trim().trim_matches(['"', '\'']));
        }
    }
    keys
}

/// Parse a field specification string like `"TargetObject|endswith"`.
///
/// Splits on `|`: the first segment is the field name (empty → keyword
/// item), every further segment must be a known modifier.
pub fn parse_field_spec(key: &str) -> Result<FieldSpec> {
    if key.is_empty() {
        return Ok(FieldSpec::default());
    }

    let mut segments = key.split('|');
    let field = segments
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    let modifiers = segments
        .map(|m| {
            m.parse::<Modifier>()
                .map_err(|_| SigmaParserError::UnknownModifier(m.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FieldSpec {
        name: field,
        modifiers,
    })
}

// =============================================================================
// Detection Rule Parsing
// =============================================================================

fn parse_detection_rule(value: &Value) -> Result<SigmaRule> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("rule must be a YAML mapping".into()))?;

    let detection_val = m
        .get(val_key("detection"))
        .ok_or_else(|| SigmaParserError::MissingField("detection".into()))?;
    let detection = parse_detections(detection_val)?;

    let logsource = m
        .get(val_key("logsource"))
        .map(parse_logsource)
        .transpose()?
        .unwrap_or_default();

    Ok(SigmaRule {
        title: get_str(m, "title").unwrap_or_default().to_string(),
        id: get_string(m, "id"),
        description: get_string(m, "description"),
        level: get_string(m, "level"),
        tags: get_str_list(m, "tags"),
        logsource,
        detection,
    })
}

// =============================================================================
// Detection Section Parsing
// =============================================================================

/// Parse the `detection:` section: a required `condition` (string or list of
/// strings) plus any number of named searches. `timeframe` is accepted and
/// ignored.
fn parse_detections(value: &Value) -> Result<Detections> {
    let m = value.as_mapping().ok_or_else(|| {
        SigmaParserError::InvalidDetection("detection section must be a mapping".into())
    })?;

    let condition_val = m
        .get(val_key("condition"))
        .ok_or_else(|| SigmaParserError::MissingField("condition".into()))?;

    let condition_strings = match condition_val {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    SigmaParserError::InvalidDetection("condition list must hold strings".into())
                })
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(SigmaParserError::InvalidDetection(
                "condition must be a string or list of strings".into(),
            ));
        }
    };

    let conditions = condition_strings
        .iter()
        .map(|s| parse_condition(s))
        .collect::<Result<Vec<_>>>()?;

    let mut named = HashMap::new();
    for (key, val) in m {
        let Some(name) = key.as_str() else {
            return Err(SigmaParserError::InvalidDetection(format!(
                "detection names must be strings, got {key:?}"
            )));
        };
        if name == "condition" || name == "timeframe" {
            continue;
        }
        named.insert(name.to_string(), parse_detection(val)?);
    }

    Ok(Detections {
        named,
        conditions,
        condition_strings,
    })
}

/// Parse a single named detection definition.
///
/// 1. A mapping → AND-linked detection items
/// 2. A list of plain values → keyword detection
/// 3. A list of mappings → OR-linked sub-detections
fn parse_detection(value: &Value) -> Result<Detection> {
    match value {
        Value::Mapping(m) => {
            let items = m
                .iter()
                .map(|(k, v)| {
                    let key = k.as_str().ok_or_else(|| {
                        SigmaParserError::InvalidDetection(format!(
                            "field names must be strings, got {k:?}"
                        ))
                    })?;
                    parse_detection_item(key, v)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Detection::AllOf(items))
        }
        Value::Sequence(seq) => {
            if seq.iter().all(|v| !v.is_mapping() && !v.is_sequence()) {
                Ok(Detection::Keywords(
                    seq.iter().map(SigmaValue::from_yaml).collect(),
                ))
            } else {
                let subs = seq
                    .iter()
                    .map(parse_detection)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Detection::AnyOf(subs))
            }
        }
        _ => Ok(Detection::Keywords(vec![SigmaValue::from_yaml(value)])),
    }
}

fn parse_detection_item(key: &str, value: &Value) -> Result<DetectionItem> {
    let field = parse_field_spec(key)?;

    // With |re the value is a regex: `*` and `?` keep their regex meaning.
    let convert = |v: &Value| match v {
        Value::String(s) if field.has_modifier(Modifier::Re) => SigmaValue::from_raw_string(s),
        other => SigmaValue::from_yaml(other),
    };

    let values = match value {
        Value::Sequence(seq) => seq.iter().map(convert).collect(),
        other => vec![convert(other)],
    };

    Ok(DetectionItem { field, values })
}

// =============================================================================
// Log Source Parsing
// =============================================================================

/// Parse a `logsource` mapping. Also used for the `logsource` and `rewrite`
/// blocks of config files.
pub fn parse_logsource(value: &Value) -> Result<LogSource> {
    let m = value
        .as_mapping()
        .ok_or_else(|| SigmaParserError::InvalidRule("logsource must be a mapping".into()))?;

    Ok(LogSource {
        category: get_string(m, "category"),
        product: get_string(m, "product"),
        service: get_string(m, "service"),
        definition: get_string(m, "definition"),
    })
}

// =============================================================================
// YAML Helpers
// =============================================================================

fn val_key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn get_str<'a>(m: &'a Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}

fn get_string(m: &Mapping, key: &str) -> Option<String> {
    get_str(m, key).map(str::to_string)
}

/// A list of strings, also accepting a single bare string.
fn get_str_list(m: &Mapping, key: &str) -> Vec<String> {
    match m.get(val_key(key)) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
