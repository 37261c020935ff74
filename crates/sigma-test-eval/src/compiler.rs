//! Compile parsed Sigma rules into matchers and evaluate them against events.
//!
//! The compiler turns the parser AST (`SigmaRule`, `Detection`,
//! `DetectionItem`) into `CompiledRule`, `CompiledDetection` and
//! `CompiledDetectionItem`. Everything that depends on configs happens here
//! too: field names are resolved through the config field mappings and
//! `|expand` placeholders are replaced by their values, so evaluation only
//! compares values.

use std::collections::{BTreeMap, HashMap};

use base64::Engine as Base64Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use regex::Regex;

use sigma_test_parser::value::{SpecialChar, StringPart};
use sigma_test_parser::{
    ConditionExpr, Detection, DetectionItem, LogSource, Modifier, Quantifier, SelectorPattern,
    SigmaRule, SigmaString, SigmaValue,
};

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::evaluator::{NoPlaceholders, PlaceholderExpander};
use crate::event::Event;
use crate::matcher::{CompiledMatcher, NumOp, StrOp};
use crate::result::MatchResult;

// =============================================================================
// Compiled types
// =============================================================================

/// A compiled Sigma rule, ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub title: String,
    pub logsource: LogSource,
    /// Compiled named detections, keyed by detection name.
    pub detections: HashMap<String, CompiledDetection>,
    /// Condition expression trees (usually one).
    pub conditions: Vec<ConditionExpr>,
}

#[derive(Debug, Clone)]
pub enum CompiledDetection {
    /// AND-linked detection items (from a YAML mapping).
    AllOf(Vec<CompiledDetectionItem>),
    /// OR-linked sub-detections (from a YAML list of mappings).
    AnyOf(Vec<CompiledDetection>),
    /// Keyword detection: match values across all event fields.
    Keywords(CompiledMatcher),
}

#[derive(Debug, Clone)]
pub struct CompiledDetectionItem {
    /// Event field names to look the value up under, after field mapping.
    /// Empty for keyword items.
    pub fields: Vec<String>,
    pub matcher: CompiledMatcher,
    /// `Some(expected)` for `|exists` items.
    pub exists: Option<bool>,
}

// =============================================================================
// Compile context
// =============================================================================

/// Config-derived inputs to compilation: field mappings and placeholders.
pub struct CompileContext<'a> {
    field_names: HashMap<String, Vec<String>>,
    placeholders: Vec<&'a HashMap<String, Vec<String>>>,
    expander: &'a dyn PlaceholderExpander,
}

impl<'a> CompileContext<'a> {
    /// Merge the given configs, applied in ascending `order` (ties keep their
    /// input order). Mapping targets accumulate per generic field.
    pub fn new(configs: &[&'a Config], expander: &'a dyn PlaceholderExpander) -> Self {
        let mut ordered = configs.to_vec();
        ordered.sort_by_key(|c| c.order);

        let mut field_names: HashMap<String, Vec<String>> = HashMap::new();
        for mapping in ordered.iter().flat_map(|c| &c.field_mappings) {
            let targets = field_names.entry(mapping.source.clone()).or_default();
            for target in &mapping.target_names {
                if !targets.contains(target) {
                    targets.push(target.clone());
                }
            }
        }

        CompileContext {
            field_names,
            placeholders: ordered.into_iter().map(|c| &c.placeholders).collect(),
            expander,
        }
    }

    /// Event field names a rule field is looked up under.
    pub fn target_names(&self, field: &str) -> Vec<String> {
        match self.field_names.get(field) {
            Some(targets) if !targets.is_empty() => targets.clone(),
            _ => vec![field.to_string()],
        }
    }

    /// Values of a placeholder: the configs' values when any config defines
    /// it, else whatever the expander supplies.
    pub fn placeholder_values(&self, name: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        let mut defined = false;
        for placeholders in &self.placeholders {
            if let Some(vals) = placeholders.get(name) {
                defined = true;
                for v in vals {
                    if !values.contains(v) {
                        values.push(v.clone());
                    }
                }
            }
        }
        if defined {
            values
        } else {
            self.expander.expand(name)
        }
    }
}

impl Default for CompileContext<'_> {
    fn default() -> Self {
        CompileContext {
            field_names: HashMap::new(),
            placeholders: Vec::new(),
            expander: &NoPlaceholders,
        }
    }
}

// =============================================================================
// Modifier context
// =============================================================================

/// Modifier flags for a single field specification.
#[derive(Debug, Clone, Copy, Default)]
struct ModCtx {
    contains: bool,
    startswith: bool,
    endswith: bool,
    all: bool,
    base64: bool,
    base64offset: bool,
    wide: bool,
    windash: bool,
    re: bool,
    cidr: bool,
    cased: bool,
    exists: bool,
    expand: bool,
    fieldref: bool,
    numeric: Option<NumOp>,
    ignore_case: bool,
    multiline: bool,
    dotall: bool,
}

impl ModCtx {
    fn from_modifiers(modifiers: &[Modifier]) -> Self {
        let mut ctx = ModCtx::default();
        for m in modifiers {
            match m {
                Modifier::Contains => ctx.contains = true,
                Modifier::StartsWith => ctx.startswith = true,
                Modifier::EndsWith => ctx.endswith = true,
                Modifier::All => ctx.all = true,
                Modifier::Base64 => ctx.base64 = true,
                Modifier::Base64Offset => ctx.base64offset = true,
                Modifier::Wide => ctx.wide = true,
                Modifier::WindAsh => ctx.windash = true,
                Modifier::Re => ctx.re = true,
                Modifier::Cidr => ctx.cidr = true,
                Modifier::Cased => ctx.cased = true,
                Modifier::Exists => ctx.exists = true,
                Modifier::Expand => ctx.expand = true,
                Modifier::FieldRef => ctx.fieldref = true,
                Modifier::Gt => ctx.numeric = Some(NumOp::Gt),
                Modifier::Gte => ctx.numeric = Some(NumOp::Gte),
                Modifier::Lt => ctx.numeric = Some(NumOp::Lt),
                Modifier::Lte => ctx.numeric = Some(NumOp::Lte),
                Modifier::IgnoreCase => ctx.ignore_case = true,
                Modifier::Multiline => ctx.multiline = true,
                Modifier::DotAll => ctx.dotall = true,
            }
        }
        ctx
    }

    /// String matching is case-insensitive unless `|cased`.
    fn is_case_insensitive(&self) -> bool {
        !self.cased
    }

    fn has_string_op(&self) -> bool {
        self.contains || self.startswith || self.endswith
    }

    fn str_op(&self) -> StrOp {
        if self.contains {
            StrOp::Contains
        } else if self.startswith {
            StrOp::StartsWith
        } else if self.endswith {
            StrOp::EndsWith
        } else {
            StrOp::Exact
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Compile a parsed `SigmaRule` into a `CompiledRule`.
pub fn compile_rule(rule: &SigmaRule, cc: &CompileContext) -> Result<CompiledRule> {
    let mut detections = HashMap::new();
    for (name, detection) in &rule.detection.named {
        detections.insert(name.clone(), compile_detection(detection, cc)?);
    }

    for condition in &rule.detection.conditions {
        validate_condition_refs(condition, &detections)?;
    }

    Ok(CompiledRule {
        title: rule.title.clone(),
        logsource: rule.logsource.clone(),
        detections,
        conditions: rule.detection.conditions.clone(),
    })
}

/// Evaluate a compiled rule against an event.
///
/// Every named search is evaluated once; the conditions are then decided from
/// those results. The rule matches when any condition holds.
pub fn evaluate_rule(rule: &CompiledRule, event: &Event) -> MatchResult {
    let search_results: BTreeMap<String, bool> = rule
        .detections
        .iter()
        .map(|(name, det)| (name.clone(), eval_detection(det, event)))
        .collect();

    let condition_results: Vec<bool> = rule
        .conditions
        .iter()
        .map(|c| eval_condition(c, &search_results))
        .collect();

    MatchResult {
        matched: condition_results.iter().any(|m| *m),
        search_results,
        condition_results,
    }
}

/// Every plain identifier in a condition must name a detection. Selector
/// patterns are exempt: matching nothing is valid.
fn validate_condition_refs(
    expr: &ConditionExpr,
    detections: &HashMap<String, CompiledDetection>,
) -> Result<()> {
    match expr {
        ConditionExpr::Identifier(name) if !detections.contains_key(name) => {
            Err(EvalError::UnknownDetection(name.clone()))
        }
        ConditionExpr::And(exprs) | ConditionExpr::Or(exprs) => exprs
            .iter()
            .try_for_each(|e| validate_condition_refs(e, detections)),
        ConditionExpr::Not(inner) => validate_condition_refs(inner, detections),
        ConditionExpr::Identifier(_) | ConditionExpr::Selector { .. } => Ok(()),
    }
}

// =============================================================================
// Detection compilation
// =============================================================================

fn compile_detection(detection: &Detection, cc: &CompileContext) -> Result<CompiledDetection> {
    match detection {
        Detection::AllOf(items) => {
            if items.is_empty() {
                return Err(EvalError::InvalidModifiers(
                    "a search mapping must hold at least one field".into(),
                ));
            }
            let compiled = items
                .iter()
                .map(|item| compile_detection_item(item, cc))
                .collect::<Result<Vec<_>>>()?;
            Ok(CompiledDetection::AllOf(compiled))
        }
        Detection::AnyOf(dets) => {
            let compiled = dets
                .iter()
                .map(|d| compile_detection(d, cc))
                .collect::<Result<Vec<_>>>()?;
            Ok(CompiledDetection::AnyOf(compiled))
        }
        Detection::Keywords(values) => {
            let ctx = ModCtx {
                contains: true,
                ..ModCtx::default()
            };
            let matchers = values
                .iter()
                .map(|v| compile_value(v, &ctx, cc))
                .collect::<Result<Vec<_>>>()?;
            Ok(CompiledDetection::Keywords(CompiledMatcher::any_of(matchers)))
        }
    }
}

fn compile_detection_item(item: &DetectionItem, cc: &CompileContext) -> Result<CompiledDetectionItem> {
    let ctx = ModCtx::from_modifiers(&item.field.modifiers);
    let fields = item
        .field
        .name
        .as_deref()
        .map(|name| cc.target_names(name))
        .unwrap_or_default();

    if ctx.exists {
        let expect = match item.values.first() {
            Some(SigmaValue::Bool(b)) => *b,
            Some(SigmaValue::String(s)) => !matches!(s.original.as_str(), "false" | "no"),
            _ => true,
        };
        return Ok(CompiledDetectionItem {
            fields,
            matcher: CompiledMatcher::Null,
            exists: Some(expect),
        });
    }

    if ctx.all && item.values.len() <= 1 {
        return Err(EvalError::InvalidModifiers(
            "|all modifier requires more than one value".to_string(),
        ));
    }

    let matchers = item
        .values
        .iter()
        .map(|v| compile_value(v, &ctx, cc))
        .collect::<Result<Vec<_>>>()?;

    let matcher = if ctx.all {
        CompiledMatcher::AllOf(matchers)
    } else {
        CompiledMatcher::any_of(matchers)
    };

    Ok(CompiledDetectionItem {
        fields,
        matcher,
        exists: None,
    })
}

// =============================================================================
// Value compilation (modifier interpretation)
// =============================================================================

fn compile_value(value: &SigmaValue, ctx: &ModCtx, cc: &CompileContext) -> Result<CompiledMatcher> {
    let ci = ctx.is_case_insensitive();

    // |expand: substitute placeholders, then compile each concrete value
    // with the remaining modifiers. No values means no match.
    if ctx.expand {
        let template = value_to_plain_string(value)?;
        let rest = ModCtx {
            expand: false,
            ..*ctx
        };
        let matchers = expand_template(&template, cc)
            .iter()
            .map(|v| compile_value(&SigmaValue::String(SigmaString::new(v)), &rest, cc))
            .collect::<Result<Vec<_>>>()?;
        return Ok(CompiledMatcher::AnyOf(matchers));
    }

    if ctx.fieldref {
        let field = value_to_plain_string(value)?;
        let refs = cc
            .target_names(&field)
            .into_iter()
            .map(|field| CompiledMatcher::FieldRef {
                field,
                case_insensitive: ci,
            })
            .collect();
        return Ok(CompiledMatcher::any_of(refs));
    }

    // Regexes are case-sensitive unless the `i` flag is given.
    if ctx.re {
        let pattern = value_to_plain_string(value)?;
        let regex = build_regex(&pattern, ctx.ignore_case, ctx.multiline, ctx.dotall)?;
        return Ok(CompiledMatcher::Regex(regex));
    }

    if ctx.cidr {
        let net: ipnet::IpNet = value_to_plain_string(value)?.trim().parse()?;
        return Ok(CompiledMatcher::Cidr(net));
    }

    if let Some(op) = ctx.numeric {
        return Ok(CompiledMatcher::Numeric {
            op,
            value: value_to_f64(value)?,
        });
    }

    match value {
        SigmaValue::Integer(n) if ctx.has_string_op() => compile_plain(&n.to_string(), ctx),
        SigmaValue::Float(n) if ctx.has_string_op() => compile_plain(&n.to_string(), ctx),
        SigmaValue::Integer(n) => Ok(CompiledMatcher::Numeric {
            op: NumOp::Eq,
            value: *n as f64,
        }),
        SigmaValue::Float(n) => Ok(CompiledMatcher::Numeric {
            op: NumOp::Eq,
            value: *n,
        }),
        SigmaValue::Bool(b) => Ok(CompiledMatcher::Bool(*b)),
        SigmaValue::Null => Ok(CompiledMatcher::Null),
        SigmaValue::String(s) => compile_string(s, ctx),
    }
}

/// Encoding chain for strings: wide → base64 / base64offset, or windash,
/// then ordinary string matching.
fn compile_string(s: &SigmaString, ctx: &ModCtx) -> Result<CompiledMatcher> {
    if ctx.base64 || ctx.base64offset {
        let text = s.as_plain().unwrap_or_else(|| s.original.clone());
        let bytes = if ctx.wide {
            to_utf16le_bytes(&text)
        } else {
            text.into_bytes()
        };
        // Encoded text keeps its case.
        let encoded_ctx = ModCtx {
            cased: true,
            ..*ctx
        };

        if ctx.base64offset {
            let matchers = base64_offset_patterns(&bytes)
                .iter()
                .map(|p| CompiledMatcher::string(StrOp::Contains, p, false))
                .collect();
            return Ok(CompiledMatcher::AnyOf(matchers));
        }
        return compile_plain(&BASE64_STANDARD.encode(&bytes), &encoded_ctx);
    }

    if ctx.wide {
        return Err(EvalError::InvalidModifiers(
            "|wide must be followed by |base64 or |base64offset".to_string(),
        ));
    }

    if ctx.windash {
        let matchers = expand_windash(&s.original)?
            .iter()
            .map(|variant| compile_sigma_string(&SigmaString::new(variant), ctx))
            .collect::<Result<Vec<_>>>()?;
        return Ok(CompiledMatcher::AnyOf(matchers));
    }

    compile_sigma_string(s, ctx)
}

/// Compile a string that may contain wildcards. Plain strings become string
/// matchers; wildcards turn into a regex honouring the string modifiers.
fn compile_sigma_string(s: &SigmaString, ctx: &ModCtx) -> Result<CompiledMatcher> {
    if let Some(plain) = s.as_plain() {
        return compile_plain(&plain, ctx);
    }

    let mut pattern = String::new();
    if ctx.is_case_insensitive() {
        pattern.push_str("(?is)");
    } else {
        pattern.push_str("(?s)");
    }
    if !ctx.contains && !ctx.endswith {
        pattern.push('^');
    }
    for part in &s.parts {
        match part {
            StringPart::Plain(text) => pattern.push_str(&regex::escape(text)),
            StringPart::Special(SpecialChar::WildcardMulti) => pattern.push_str(".*"),
            StringPart::Special(SpecialChar::WildcardSingle) => pattern.push('.'),
        }
    }
    if !ctx.contains && !ctx.startswith {
        pattern.push('$');
    }

    Ok(CompiledMatcher::Regex(Regex::new(&pattern)?))
}

fn compile_plain(plain: &str, ctx: &ModCtx) -> Result<CompiledMatcher> {
    Ok(CompiledMatcher::string(
        ctx.str_op(),
        plain,
        ctx.is_case_insensitive(),
    ))
}

// =============================================================================
// Condition evaluation
// =============================================================================

fn eval_condition(expr: &ConditionExpr, searches: &BTreeMap<String, bool>) -> bool {
    match expr {
        ConditionExpr::Identifier(name) => searches.get(name).copied().unwrap_or(false),
        ConditionExpr::And(exprs) => exprs.iter().all(|e| eval_condition(e, searches)),
        ConditionExpr::Or(exprs) => exprs.iter().any(|e| eval_condition(e, searches)),
        ConditionExpr::Not(inner) => !eval_condition(inner, searches),
        ConditionExpr::Selector {
            quantifier,
            pattern,
        } => {
            let selected: Vec<bool> = searches
                .iter()
                .filter(|(name, _)| match pattern {
                    SelectorPattern::Them => !name.starts_with('_'),
                    SelectorPattern::Pattern(p) => pattern_matches(p, name),
                })
                .map(|(_, matched)| *matched)
                .collect();
            let hits = selected.iter().filter(|m| **m).count() as u64;

            match quantifier {
                Quantifier::Any => hits >= 1,
                Quantifier::All => !selected.is_empty() && hits == selected.len() as u64,
                Quantifier::Count(n) => hits >= *n,
            }
        }
    }
}

fn eval_detection(detection: &CompiledDetection, event: &Event) -> bool {
    match detection {
        CompiledDetection::AllOf(items) => items.iter().all(|item| eval_detection_item(item, event)),
        CompiledDetection::AnyOf(dets) => dets.iter().any(|d| eval_detection(d, event)),
        CompiledDetection::Keywords(matcher) => matcher.matches_keyword(event),
    }
}

/// An item matches when any of its mapped fields holds a matching value. A
/// field absent under every name only satisfies null matchers.
fn eval_detection_item(item: &CompiledDetectionItem, event: &Event) -> bool {
    if let Some(expect) = item.exists {
        let present = item
            .fields
            .iter()
            .any(|f| event.get_field(f).is_some_and(|v| !v.is_null()));
        return present == expect;
    }

    if item.fields.is_empty() {
        return item.matcher.matches_keyword(event);
    }

    let mut found = false;
    for field in &item.fields {
        if let Some(value) = event.get_field(field) {
            found = true;
            if item.matcher.matches(value, event) {
                return true;
            }
        }
    }
    !found && item.matcher.matches_missing()
}

/// Match a detection name against a selector pattern where `*` stands for
/// any run of characters.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == name;
    };

    let Some(rest) = name.strip_prefix(first) else {
        return false;
    };
    let Some(mut rest) = rest.strip_suffix(last) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    true
}

// =============================================================================
// Value helpers
// =============================================================================

fn value_to_plain_string(value: &SigmaValue) -> Result<String> {
    match value {
        SigmaValue::String(s) => Ok(s.as_plain().unwrap_or_else(|| s.original.clone())),
        SigmaValue::Integer(n) => Ok(n.to_string()),
        SigmaValue::Float(n) => Ok(n.to_string()),
        SigmaValue::Bool(b) => Ok(b.to_string()),
        SigmaValue::Null => Err(EvalError::IncompatibleValue(
            "null value for string modifier".into(),
        )),
    }
}

fn value_to_f64(value: &SigmaValue) -> Result<f64> {
    match value {
        SigmaValue::Integer(n) => Ok(*n as f64),
        SigmaValue::Float(n) => Ok(*n),
        SigmaValue::String(s) => {
            let plain = s.as_plain().unwrap_or_else(|| s.original.clone());
            plain
                .trim()
                .parse::<f64>()
                .map_err(|_| EvalError::ExpectedNumeric(plain))
        }
        other => Err(EvalError::ExpectedNumeric(other.to_string())),
    }
}

/// Replace every `%name%` in `template` with each of the placeholder's
/// values, producing the cartesian product for several placeholders.
fn expand_template(template: &str, cc: &CompileContext) -> Vec<String> {
    let mut results = vec![String::new()];
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(len) = after.find('%') else {
            break;
        };
        let literal = &rest[..start];
        let values = cc.placeholder_values(&after[..len]);
        results = results
            .iter()
            .flat_map(|prefix| values.iter().map(move |v| format!("{prefix}{literal}{v}")))
            .collect();
        rest = &after[len + 1..];
    }

    for r in &mut results {
        r.push_str(rest);
    }
    results
}

// =============================================================================
// Encoding helpers
// =============================================================================

fn to_utf16le_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// The three base64 renderings of `value` at byte offsets 0, 1 and 2 within
/// a 3-byte group, trimmed to the characters that do not depend on
/// neighbouring bytes.
fn base64_offset_patterns(value: &[u8]) -> Vec<String> {
    const START: [usize; 3] = [0, 2, 3];
    const END_TRIM: [usize; 3] = [0, 3, 2];

    let mut patterns = Vec::with_capacity(3);
    for offset in 0..3 {
        let mut shifted = vec![b' '; offset];
        shifted.extend_from_slice(value);
        let encoded = BASE64_STANDARD.encode(&shifted);

        let end = encoded.len() - END_TRIM[(value.len() + offset) % 3];
        if START[offset] < end {
            patterns.push(encoded[START[offset]..end].to_string());
        }
    }
    patterns
}

fn build_regex(pattern: &str, case_insensitive: bool, multiline: bool, dotall: bool) -> Result<Regex> {
    let mut flags = String::new();
    if case_insensitive {
        flags.push('i');
    }
    if multiline {
        flags.push('m');
    }
    if dotall {
        flags.push('s');
    }

    let full_pattern = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    };
    Ok(Regex::new(&full_pattern)?)
}

/// Characters a `-` may be written as on a Windows command line: hyphen,
/// slash, en dash, em dash, horizontal bar.
const WINDASH_CHARS: [char; 5] = ['-', '/', '\u{2013}', '\u{2014}', '\u{2015}'];

/// 5^8 = 390,625 variants.
const MAX_WINDASH_DASHES: usize = 8;

/// Every spelling of `input` with each `-` replaced by one of
/// [`WINDASH_CHARS`]. The unchanged input comes first.
pub fn expand_windash(input: &str) -> Result<Vec<String>> {
    let dashes = input.matches('-').count();
    if dashes > MAX_WINDASH_DASHES {
        return Err(EvalError::InvalidModifiers(format!(
            "windash value contains {dashes} dashes, max is {MAX_WINDASH_DASHES}"
        )));
    }

    let mut variants = vec![String::with_capacity(input.len())];
    for c in input.chars() {
        if c == '-' {
            variants = variants
                .iter()
                .flat_map(|v| {
                    WINDASH_CHARS.iter().map(move |dash| {
                        let mut s = v.clone();
                        s.push(*dash);
                        s
                    })
                })
                .collect();
        } else {
            variants.iter_mut().for_each(|v| v.push(c));
        }
    }
    Ok(variants)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use serde_json::json;
    use sigma_test_parser::parse_rule;

    fn compile(yaml: &str) -> CompiledRule {
        compile_rule(&parse_rule(yaml).unwrap(), &CompileContext::default()).unwrap()
    }

    fn matches(rule: &CompiledRule, event: serde_json::Value) -> bool {
        evaluate_rule(rule, &Event::from_value(&event).unwrap()).matched
    }

    fn single_search(selection: &str) -> String {
        format!("detection:\n    selection:\n{selection}\n    condition: selection\n")
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let rule = compile(&single_search("        CommandLine: whoami"));
        assert!(matches(&rule, json!({"CommandLine": "whoami"})));
        assert!(matches(&rule, json!({"CommandLine": "WHOAMI"})));
        assert!(!matches(&rule, json!({"CommandLine": "whoami /all"})));
        assert!(!matches(&rule, json!({"Image": "whoami"})));
    }

    #[test]
    fn test_cased_modifier() {
        let rule = compile(&single_search("        CommandLine|cased: whoami"));
        assert!(matches(&rule, json!({"CommandLine": "whoami"})));
        assert!(!matches(&rule, json!({"CommandLine": "WHOAMI"})));
    }

    #[test]
    fn test_wildcards_with_string_modifiers() {
        let rule = compile(&single_search(r"        Image: '*\cmd.exe'"));
        assert!(matches(&rule, json!({"Image": r"C:\Windows\System32\CMD.exe"})));
        assert!(!matches(&rule, json!({"Image": r"C:\cmd.exe.bak"})));

        let rule = compile(&single_search("        CommandLine|contains: 'net*user'"));
        assert!(matches(&rule, json!({"CommandLine": "cmd /c net  user admin"})));

        let rule = compile(&single_search("        CommandLine|startswith: 'ipconfig?/'"));
        assert!(matches(&rule, json!({"CommandLine": "ipconfig /all"})));
        assert!(!matches(&rule, json!({"CommandLine": "x ipconfig /all"})));
    }

    #[test]
    fn test_numeric_and_port_values() {
        let rule = compile(&single_search("        dst_port: 22"));
        assert!(matches(&rule, json!({"dst_port": 22})));
        assert!(matches(&rule, json!({"dst_port": "22"})));
        assert!(!matches(&rule, json!({"dst_port": 23})));

        let rule = compile(&single_search("        size|gt: 1000"));
        assert!(matches(&rule, json!({"size": 1001})));
        assert!(!matches(&rule, json!({"size": 1000})));
    }

    #[test]
    fn test_all_and_list_values() {
        let rule = compile(&single_search(
            "        CommandLine|contains|all:\n            - net\n            - user",
        ));
        assert!(matches(&rule, json!({"CommandLine": "net user admin"})));
        assert!(!matches(&rule, json!({"CommandLine": "net group"})));

        let rule = compile(&single_search(
            "        CommandLine:\n            - whoami\n            - hostname",
        ));
        assert!(matches(&rule, json!({"CommandLine": "hostname"})));
    }

    #[test]
    fn test_all_with_single_value_is_rejected() {
        let rule = parse_rule(&single_search("        CommandLine|contains|all: net")).unwrap();
        assert!(matches!(
            compile_rule(&rule, &CompileContext::default()),
            Err(EvalError::InvalidModifiers(_))
        ));
    }

    #[test]
    fn test_null_and_exists() {
        let rule = compile(&single_search("        ParentImage: null"));
        assert!(matches(&rule, json!({"Image": "x"})));
        assert!(matches(&rule, json!({"ParentImage": null})));
        assert!(!matches(&rule, json!({"ParentImage": "x"})));

        let rule = compile(&single_search("        ParentImage|exists: false"));
        assert!(matches(&rule, json!({"Image": "x"})));
        assert!(!matches(&rule, json!({"ParentImage": "x"})));
    }

    #[test]
    fn test_regex_is_case_sensitive_unless_flagged() {
        let rule = compile(&single_search("        CommandLine|re: 'who.mi$'"));
        assert!(matches(&rule, json!({"CommandLine": "whoami"})));
        assert!(!matches(&rule, json!({"CommandLine": "WHOAMI"})));

        let rule = compile(&single_search("        CommandLine|re|i: 'who.mi$'"));
        assert!(matches(&rule, json!({"CommandLine": "WHOAMI"})));
    }

    #[test]
    fn test_cidr_and_fieldref() {
        let rule = compile(&single_search("        SourceIp|cidr: 10.0.0.0/8"));
        assert!(matches(&rule, json!({"SourceIp": "10.20.30.40"})));
        assert!(!matches(&rule, json!({"SourceIp": "11.0.0.1"})));

        let rule = compile(&single_search("        TargetUser|fieldref: SubjectUser"));
        assert!(matches(&rule, json!({"TargetUser": "bob", "SubjectUser": "BOB"})));
        assert!(!matches(&rule, json!({"TargetUser": "bob", "SubjectUser": "alice"})));
    }

    #[test]
    fn test_base64_variants() {
        let rule = compile(&single_search("        Payload|base64: whoami"));
        assert!(matches(&rule, json!({"Payload": "d2hvYW1p"})));
        assert!(!matches(&rule, json!({"Payload": "D2HVYW1P"})));

        let rule = compile(&single_search("        Payload|base64offset|contains: /bin/sh"));
        // base64("/bin/sh -c id")
        assert!(matches(&rule, json!({"Payload": "L2Jpbi9zaCAtYyBpZA=="})));
        // base64("x/bin/sh")
        assert!(matches(&rule, json!({"Payload": "eC9iaW4vc2g="})));

        let rule = compile(&single_search("        Payload|wide|base64: cmd"));
        assert!(matches(&rule, json!({"Payload": "YwBtAGQA"})));
    }

    #[test]
    fn test_base64_offset_patterns() {
        assert_eq!(
            base64_offset_patterns(b"/bin/sh"),
            vec!["L2Jpbi9za", "9iaW4vc2", "vYmluL3No"]
        );
    }

    #[test]
    fn test_wide_without_base64_is_rejected() {
        let rule = parse_rule(&single_search("        Payload|wide: cmd")).unwrap();
        assert!(compile_rule(&rule, &CompileContext::default()).is_err());
    }

    #[test]
    fn test_windash() {
        let rule = compile(&single_search("        CommandLine|windash|contains: ' -enc '"));
        assert!(matches(&rule, json!({"CommandLine": "powershell -enc AAA"})));
        assert!(matches(&rule, json!({"CommandLine": "powershell /enc AAA"})));
        assert!(matches(&rule, json!({"CommandLine": "powershell \u{2013}enc AAA"})));
        assert!(!matches(&rule, json!({"CommandLine": "powershell enc AAA"})));
    }

    #[test]
    fn test_keywords() {
        let rule = compile(
            "detection:\n    keywords:\n        - mimikatz\n        - 'sekurlsa::*'\n    condition: keywords\n",
        );
        assert!(matches(&rule, json!({"a": {"b": "running MIMIKATZ.exe"}})));
        assert!(matches(&rule, json!({"cmd": "x sekurlsa::logonpasswords"})));
        assert!(!matches(&rule, json!({"cmd": "benign"})));
    }

    #[test]
    fn test_selectors_and_search_results() {
        let rule = compile(
            r#"
detection:
    selection_a:
        a: 1
    selection_b:
        b: 2
    filter:
        c: 3
    condition: all of selection_* and not 1 of filter*
"#,
        );
        let ev = json!({"a": 1, "b": 2});
        let result = evaluate_rule(&rule, &Event::from_value(&ev).unwrap());
        assert!(result.matched);
        assert_eq!(result.condition_results, vec![true]);
        assert_eq!(
            result.matched_searches().collect::<Vec<_>>(),
            vec!["selection_a", "selection_b"]
        );
        assert!(!result.search_results["filter"]);

        assert!(!matches(&rule, json!({"a": 1, "b": 2, "c": 3})));
        assert!(!matches(&rule, json!({"a": 1})));
    }

    #[test]
    fn test_count_quantifier_and_them() {
        let rule = compile(
            "detection:\n    s1:\n        a: 1\n    s2:\n        b: 2\n    s3:\n        c: 3\n    condition: 2 of them\n",
        );
        assert!(matches(&rule, json!({"a": 1, "c": 3})));
        assert!(!matches(&rule, json!({"a": 1})));
    }

    #[test]
    fn test_unknown_identifier_is_rejected() {
        let rule = parse_rule(
            "detection:\n    selection:\n        a: 1\n    condition: selection and missing\n",
        )
        .unwrap();
        assert!(matches!(
            compile_rule(&rule, &CompileContext::default()),
            Err(EvalError::UnknownDetection(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("selection_*", "selection_main"));
        assert!(pattern_matches("*_main", "selection_main"));
        assert!(pattern_matches("sel*_*n", "selection_main"));
        assert!(!pattern_matches("sel*_*x", "selection_main"));
        assert!(!pattern_matches("a*a", "a"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
    }

    #[test]
    fn test_field_mappings_accumulate_in_order() {
        let low = parse_config(
            "order: 1\nfieldmappings:\n  CommandLine: process.command_line\n",
        )
        .unwrap();
        let high = parse_config(
            "order: 5\nfieldmappings:\n  CommandLine: [$.process.args, process.command_line]\n",
        )
        .unwrap();
        let cc = CompileContext::new(&[&high, &low], &NoPlaceholders);
        assert_eq!(
            cc.target_names("CommandLine"),
            vec!["process.command_line", "$.process.args"]
        );
        assert_eq!(cc.target_names("Image"), vec!["Image"]);

        let rule = parse_rule(&single_search("        CommandLine|contains: whoami")).unwrap();
        let compiled = compile_rule(&rule, &cc).unwrap();
        assert!(matches(&compiled, json!({"process": {"command_line": "whoami"}})));
        assert!(matches(&compiled, json!({"process": {"args": "cmd /c whoami"}})));
        assert!(!matches(&compiled, json!({"CommandLine": "whoami"})));
    }

    struct Fixed;

    impl PlaceholderExpander for Fixed {
        fn expand(&self, name: &str) -> Vec<String> {
            match name {
                "users" => vec!["alice".into(), "bob".into()],
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn test_expand_uses_config_then_expander() {
        let config = parse_config("placeholders:\n  admins: [root, Administrator]\n").unwrap();
        let cc = CompileContext::new(&[&config], &Fixed);
        assert_eq!(expand_template("%admins%", &cc), vec!["root", "Administrator"]);
        assert_eq!(
            expand_template("%users%@%admins%.local", &cc),
            vec![
                "alice@root.local",
                "alice@Administrator.local",
                "bob@root.local",
                "bob@Administrator.local"
            ]
        );
        assert!(expand_template("%unknown%", &cc).is_empty());
        assert_eq!(expand_template("100%", &cc), vec!["100%"]);

        let rule = parse_rule(&single_search("        User|expand: '%admins%'")).unwrap();
        let compiled = compile_rule(&rule, &cc).unwrap();
        assert!(matches(&compiled, json!({"User": "root"})));
        assert!(!matches(&compiled, json!({"User": "guest"})));
    }

    #[test]
    fn test_expand_without_values_never_matches() {
        let rule = compile(&single_search("        User|expand: '%admins%'"));
        assert!(!matches(&rule, json!({"User": "root"})));
        assert!(!matches(&rule, json!({})));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn with_dashes(prefix: String, dashes: usize, suffix: String) -> String {
        let mut input = prefix;
        input.push_str(&"-".repeat(dashes));
        input.push_str(&suffix);
        input
    }

    proptest! {
        #[test]
        fn windash_count_is_5_pow_n(
            prefix in "[a-z ]{0,5}",
            dashes in 0usize..=3,
            suffix in "[a-z/]{0,5}",
        ) {
            let input = with_dashes(prefix, dashes, suffix);
            let variants = expand_windash(&input).unwrap();
            prop_assert_eq!(variants.len(), 5usize.pow(dashes as u32));
        }

        #[test]
        fn windash_original_first_and_unique(
            prefix in "[a-z]{0,4}",
            dashes in 0usize..=2,
            suffix in "[a-z]{0,4}",
        ) {
            let input = with_dashes(prefix, dashes, suffix);
            let variants = expand_windash(&input).unwrap();
            prop_assert_eq!(&variants[0], &input);
            let unique: std::collections::HashSet<&String> = variants.iter().collect();
            prop_assert_eq!(unique.len(), variants.len());
        }

        #[test]
        fn windash_preserves_char_count(
            prefix in "[a-z]{0,4}",
            dashes in 0usize..=3,
            suffix in "[a-z]{0,4}",
        ) {
            let input = with_dashes(prefix, dashes, suffix);
            let n = input.chars().count();
            for v in expand_windash(&input).unwrap() {
                prop_assert_eq!(v.chars().count(), n);
            }
        }
    }
}
