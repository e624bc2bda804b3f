//! Target Filters
//!
//! A filter maps target names to conditions such as `"> 0.5"` or `"<= 2*1.5"`.
//! Conditions are parsed once into a [`Predicate`] (comparison operator plus a
//! constant operand) and then evaluated against the stored target value with
//! the value substituted as the left operand. The operand may be a small
//! arithmetic expression over numeric literals; nothing else is accepted.
use crate::error::{DatasetError, Result};
use crate::storage::TARGETS;
use crate::store::EntryGroup;
use itertools::Itertools;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Comparison {
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "!=")]
    Ne,
}

impl Comparison {
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Gt => lhs > rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Ne => lhs != rhs,
        }
    }
}

/// `target_value <op> operand`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicate {
    pub op: Comparison,
    pub operand: f64,
}

impl Predicate {
    pub fn matches(&self, value: f64) -> bool {
        self.op.holds(value, self.operand)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.operand)
    }
}

impl FromStr for Predicate {
    type Err = DatasetError;

    fn from_str(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| DatasetError::InvalidPredicate {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = expression.trim_start();
        // two-character operators first so `>=` is not read as `>`
        let op_len = if ["<=", ">=", "==", "!="].iter().any(|op| trimmed.starts_with(op)) {
            2
        } else if trimmed.starts_with('<') || trimmed.starts_with('>') {
            1
        } else {
            return Err(invalid("expected one of >, <, ==, <=, >=, !="));
        };
        let op = Comparison::from_str(&trimmed[..op_len])
            .map_err(|_| invalid("unknown comparison operator"))?;
        let operand = Arithmetic::new(&trimmed[op_len..])
            .evaluate()
            .map_err(|reason| invalid(&reason))?;
        Ok(Predicate { op, operand })
    }
}

/// Recursive-descent evaluator for `+ - * /`, unary signs, parentheses and
/// numeric literals.
struct Arithmetic<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Arithmetic<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn evaluate(mut self) -> std::result::Result<f64, String> {
        let value = self.expression()?;
        self.skip_whitespace();
        if self.pos != self.input.len() {
            return Err(format!("unexpected input '{}'", &self.input[self.pos..]));
        }
        if !value.is_finite() {
            return Err("operand is not a finite number".to_string());
        }
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.factor()?;
        loop {
            if self.eat('*') {
                value *= self.factor()?;
            } else if self.eat('/') {
                value /= self.factor()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self) -> std::result::Result<f64, String> {
        if self.eat('-') {
            return Ok(-self.factor()?);
        }
        if self.eat('+') {
            return self.factor();
        }
        if self.eat('(') {
            let value = self.expression()?;
            if !self.eat(')') {
                return Err("unbalanced parenthesis".to_string());
            }
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> std::result::Result<f64, String> {
        self.skip_whitespace();
        let start = self.pos;
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            let exponent_sign = (c == b'-' || c == b'+')
                && self.pos > start
                && matches!(bytes[self.pos - 1], b'e' | b'E');
            if c.is_ascii_digit() || c == b'.' || c == b'e' || c == b'E' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.pos];
        if literal.is_empty() {
            return Err("expected a number".to_string());
        }
        literal
            .parse::<f64>()
            .map_err(|_| format!("'{literal}' is not a number"))
    }
}

/// Conditions on target values deciding whether an entry is kept.
///
/// A `None` condition always holds. Entries lacking a filtered target are kept
/// and a warning is logged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct TargetFilter {
    conditions: Vec<(String, Option<Predicate>)>,
}

impl TargetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, target: impl Into<String>, expression: &str) -> Result<Self> {
        self.conditions
            .push((target.into(), Some(expression.parse()?)));
        Ok(self)
    }

    pub fn unconditional(mut self, target: impl Into<String>) -> Self {
        self.conditions.push((target.into(), None));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Decide whether `entry` is kept.
    pub fn keep(&self, entry: &EntryGroup<'_>) -> Result<bool> {
        for (target, predicate) in &self.conditions {
            let key = format!("{TARGETS}/{target}");
            if !entry.contains(&key) {
                warn!(
                    "filter {} not found for entry {}, filter options are: [{}]",
                    target,
                    entry.name(),
                    entry.children(TARGETS).iter().join(", ")
                );
                continue;
            }
            if let Some(predicate) = predicate {
                if !predicate.matches(entry.read_scalar(&key)?) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl TryFrom<Map<String, Value>> for TargetFilter {
    type Error = DatasetError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let conditions = map
            .into_iter()
            .map(|(target, condition)| match condition {
                Value::Null => Ok((target, None)),
                Value::String(expression) => Ok((target, Some(expression.parse()?))),
                other => Err(DatasetError::UnsupportedCondition {
                    target,
                    condition: other.to_string(),
                }),
            })
            .collect::<Result<_>>()?;
        Ok(Self { conditions })
    }
}

impl TryFrom<Value> for TargetFilter {
    type Error = DatasetError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Self::try_from(map),
            other => Err(DatasetError::UnsupportedCondition {
                target: "*".to_string(),
                condition: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(expression: &str) -> Predicate {
        expression.parse().unwrap()
    }

    #[test]
    fn test_operators() {
        assert_eq!(parse("> 0.5"), Predicate { op: Comparison::Gt, operand: 0.5 });
        assert_eq!(parse(">=1").op, Comparison::Ge);
        assert_eq!(parse("<= 3").op, Comparison::Le);
        assert_eq!(parse("==2").op, Comparison::Eq);
        assert_eq!(parse("!= 0").op, Comparison::Ne);
        assert_eq!(parse("  < -1e-3").operand, -1e-3);

        assert!(parse("> 5").matches(10.0));
        assert!(!parse("> 15").matches(10.0));
        assert!(parse("!= 1").matches(0.0));
        assert!(parse(">= 20").matches(20.0));
    }

    #[test]
    fn test_arithmetic_operand() {
        assert_eq!(parse("> 2*0.5").operand, 1.0);
        assert_eq!(parse("< (1 + 2) / 4").operand, 0.75);
        assert_eq!(parse("== -(2 - 5)").operand, 3.0);
        assert_eq!(parse("> 1.5e2").operand, 150.0);
    }

    #[test]
    fn test_rejects_anything_else() {
        for expression in [
            "0.5",
            "> ",
            "> x",
            "> 1; import os",
            "> __import__('os')",
            "> (1",
            "> 1/0",
            "=> 1",
        ] {
            assert!(
                expression.parse::<Predicate>().is_err(),
                "{expression} should be rejected"
            );
        }
    }

    #[test]
    fn test_filter_from_json() {
        let filter = TargetFilter::try_from(json!({"irmsd": "< 4", "binary": null})).unwrap();
        assert_eq!(filter.conditions.len(), 2);

        let err = TargetFilter::try_from(json!({"irmsd": 4})).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedCondition { .. }));

        let err = TargetFilter::try_from(json!(["irmsd"])).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedCondition { .. }));

        let filter: TargetFilter = serde_json::from_value(json!({"fnat": "> 0.3"})).unwrap();
        assert!(!filter.is_empty());
        assert!(serde_json::from_value::<TargetFilter>(json!({"fnat": true})).is_err());
    }
}
