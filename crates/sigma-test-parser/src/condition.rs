//! Condition expression parser using a pest PEG grammar + Pratt parser.
//!
//! Parses Sigma condition strings like:
//! - `"selection"`
//! - `"selection and not filter"`
//! - `"1 of selection_* and not 1 of filter_*"`
//! - `"all of them"`

use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use crate::ast::{ConditionExpr, Quantifier, SelectorPattern};
use crate::error::{Result, SigmaParserError};

#[derive(Parser)]
#[grammar = "sigma.pest"]
struct SigmaConditionParser;

/// Parse a Sigma condition expression string into an AST.
///
/// # Examples
///
/// ```
/// use sigma_test_parser::parse_condition;
///
/// let expr = parse_condition("selection and not filter").unwrap();
/// assert_eq!(expr.to_string(), "(selection and not filter)");
/// ```
pub fn parse_condition(input: &str) -> Result<ConditionExpr> {
    let mut pairs = SigmaConditionParser::parse(Rule::condition, input)
        .map_err(|e| SigmaParserError::Condition(e.to_string()))?;

    // condition = { SOI ~ expr ~ EOI }
    let expr_pair = pairs
        .next()
        .and_then(|condition| condition.into_inner().find(|p| p.as_rule() == Rule::expr))
        .ok_or_else(|| SigmaParserError::Condition(format!("empty condition: '{input}'")))?;

    let pratt = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op));

    Ok(parse_expr(expr_pair, &pratt))
}

fn parse_expr(pair: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> ConditionExpr {
    pratt
        .map_primary(|primary| match primary.as_rule() {
            Rule::ident => ConditionExpr::Identifier(primary.as_str().to_string()),
            Rule::selector => parse_selector(primary),
            Rule::expr => parse_expr(primary, pratt),
            other => unreachable!("unexpected primary rule: {other:?}"),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::not_op => ConditionExpr::Not(Box::new(rhs)),
            other => unreachable!("unexpected prefix rule: {other:?}"),
        })
        .map_infix(|lhs, op, rhs| match op.as_rule() {
            Rule::and_op => flatten(lhs, rhs, true),
            Rule::or_op => flatten(lhs, rhs, false),
            other => unreachable!("unexpected infix rule: {other:?}"),
        })
        .parse(pair.into_inner())
}

/// Join two operands, splicing in the children of operands that already use
/// the same operator: `a and (b and c)` becomes `And[a, b, c]`.
fn flatten(lhs: ConditionExpr, rhs: ConditionExpr, conjunction: bool) -> ConditionExpr {
    let mut args = Vec::new();
    for side in [lhs, rhs] {
        match side {
            ConditionExpr::And(children) if conjunction => args.extend(children),
            ConditionExpr::Or(children) if !conjunction => args.extend(children),
            other => args.push(other),
        }
    }
    if conjunction {
        ConditionExpr::And(args)
    } else {
        ConditionExpr::Or(args)
    }
}

fn parse_selector(pair: Pair<'_, Rule>) -> ConditionExpr {
    let mut quantifier = Quantifier::Any;
    let mut pattern = SelectorPattern::Them;

    // of_kw_inner is atomic and therefore shows up in the tree; skip it.
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::quantifier => quantifier = parse_quantifier(p),
            Rule::selector_target => pattern = parse_selector_target(p),
            _ => {}
        }
    }

    ConditionExpr::Selector {
        quantifier,
        pattern,
    }
}

fn parse_quantifier(pair: Pair<'_, Rule>) -> Quantifier {
    let Some(inner) = pair.into_inner().next() else {
        return Quantifier::Any;
    };
    match inner.as_rule() {
        Rule::all_kw => Quantifier::All,
        Rule::any_kw => Quantifier::Any,
        Rule::uint => match inner.as_str().parse::<u64>() {
            Ok(1) => Quantifier::Any,
            Ok(n) => Quantifier::Count(n),
            // Absurdly large counts can never be satisfied.
            Err(_) => Quantifier::Count(u64::MAX),
        },
        other => unreachable!("unexpected quantifier rule: {other:?}"),
    }
}

fn parse_selector_target(pair: Pair<'_, Rule>) -> SelectorPattern {
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::ident_pattern => {
            SelectorPattern::Pattern(inner.as_str().to_string())
        }
        _ => SelectorPattern::Them,
    }
}

// =============================================================================
// Tests
// =============================================================================
