//! Filter expressions: a recursive tree of rule groups and column rules.
//!
//! # Design
//! A filter is a [`RuleGroup`] whose `rules` are either leaf [`ColumnRule`]s or
//! nested groups, modelled as the tagged union [`Rule`]. The tree is evaluated
//! server-side; the client only guarantees it is well formed and serializes it
//! verbatim (no flattening, no reordering).
//!
//! Decoding from JSON is hand-written so every rejection names the offending
//! path (`filter.rules[2].operator`) and so recursion stays bounded by
//! [`MAX_DEPTH`]. Typed trees built in code are checked with
//! [`RuleGroup::validate`] using the same paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind};

/// Deepest rule-group nesting accepted, counting the root as level 1.
pub const MAX_DEPTH: usize = 32;

/// Logical combinator of a rule group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::And => "AND",
            Condition::Or => "OR",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ValidationErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Condition::And),
            "OR" => Ok(Condition::Or),
            other => Err(ValidationErrorKind::UnknownCondition(other.to_string())),
        }
    }
}

/// Comparison applied by a column rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub const ALL: [Operator; 12] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEquals,
        Operator::LessThanOrEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanOrEquals => "greater_than_or_equals",
            Operator::LessThanOrEquals => "less_than_or_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
        }
    }

    /// Whether a rule with this operator must carry a `value`.
    pub fn takes_value(self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ValidationErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ValidationErrorKind::UnknownOperator(s.to_string()))
    }
}

/// Leaf rule comparing one record column against a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRule {
    pub column: String,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ColumnRule {
    /// Rule for an operator that compares against `value`.
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Equals, value)
    }

    pub fn contains(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Contains, value)
    }

    /// `is_empty` rule; carries no value.
    pub fn empty(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::IsEmpty,
            value: None,
        }
    }

    /// `is_not_empty` rule; carries no value.
    pub fn not_empty(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::IsNotEmpty,
            value: None,
        }
    }

    /// A JSON `null` counts as no value.
    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_null())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check("rule")
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = expect_object(value, "rule", "a column rule object")?;
        let rule = decode_column(obj, "rule")?;
        rule.check("rule")?;
        Ok(rule)
    }

    fn check(&self, path: &str) -> Result<(), ValidationError> {
        if self.column.trim().is_empty() {
            return Err(ValidationError::new(
                format!("{path}.column"),
                ValidationErrorKind::EmptyColumn,
            ));
        }
        match (self.operator.takes_value(), self.has_value()) {
            (true, false) => Err(ValidationError::new(
                format!("{path}.value"),
                ValidationErrorKind::MissingValue(self.operator),
            )),
            (false, true) => Err(ValidationError::new(
                format!("{path}.value"),
                ValidationErrorKind::UnexpectedValue(self.operator),
            )),
            _ => Ok(()),
        }
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rule {
    Column(ColumnRule),
    Group(RuleGroup),
}

impl Rule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Rule::Column(rule) => rule.check("rule"),
            Rule::Group(group) => group.check("rule", 1),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let rule = decode_node(value, "rule", 1)?;
        rule.validate()?;
        Ok(rule)
    }
}

impl From<ColumnRule> for Rule {
    fn from(rule: ColumnRule) -> Self {
        Rule::Column(rule)
    }
}

impl From<RuleGroup> for Rule {
    fn from(group: RuleGroup) -> Self {
        Rule::Group(group)
    }
}

/// Rules combined with one logical condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleGroup {
    pub condition: Condition,
    pub rules: Vec<Rule>,
}

/// The root of a filter expression.
pub type Filter = RuleGroup;

impl RuleGroup {
    pub fn new(condition: Condition, rules: Vec<Rule>) -> Self {
        Self { condition, rules }
    }

    /// Group matching when every rule matches.
    pub fn all<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        Self::new(Condition::And, rules.into_iter().map(Into::into).collect())
    }

    /// Group matching when any rule matches.
    pub fn any<I, R>(rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Rule>,
    {
        Self::new(Condition::Or, rules.into_iter().map(Into::into).collect())
    }

    pub fn with_rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// Nesting depth, counting this group as 1.
    pub fn depth(&self) -> usize {
        1 + self
            .rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::Group(group) => Some(group.depth()),
                Rule::Column(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Check the whole tree, reporting paths rooted at `filter`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check("filter", 1)
    }

    /// Decode and validate a filter tree from JSON.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = expect_object(value, "filter", "a rule group object")?;
        let group = decode_group(obj, "filter", 1)?;
        group.check("filter", 1)?;
        Ok(group)
    }

    pub(crate) fn check(&self, path: &str, depth: usize) -> Result<(), ValidationError> {
        if depth > MAX_DEPTH {
            return Err(ValidationError::new(path, ValidationErrorKind::TooDeep(MAX_DEPTH)));
        }
        if self.rules.is_empty() {
            return Err(ValidationError::new(
                format!("{path}.rules"),
                ValidationErrorKind::EmptyRules,
            ));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            let child = format!("{path}.rules[{i}]");
            match rule {
                Rule::Column(rule) => rule.check(&child)?,
                Rule::Group(group) => group.check(&child, depth + 1)?,
            }
        }
        Ok(())
    }
}

impl From<ColumnRule> for RuleGroup {
    fn from(rule: ColumnRule) -> Self {
        RuleGroup::all([rule])
    }
}

impl<'de> Deserialize<'de> for RuleGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleGroup::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Rule::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for ColumnRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ColumnRule::from_value(&value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Structural decoding. Semantic checks (empty groups, value presence) run
// afterwards on the typed tree so both entry points report identical paths.
// ---------------------------------------------------------------------------

const GROUP_FIELDS: [&str; 2] = ["condition", "rules"];
const COLUMN_FIELDS: [&str; 3] = ["column", "operator", "value"];

fn expect_object<'a>(
    value: &'a Value,
    path: &str,
    expected: &'static str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::new(path, ValidationErrorKind::InvalidType(expected)))
}

fn decode_node(value: &Value, path: &str, depth: usize) -> Result<Rule, ValidationError> {
    let obj = expect_object(value, path, "a rule object")?;
    let group_like = GROUP_FIELDS.iter().any(|k| obj.contains_key(*k));
    if group_like {
        decode_group(obj, path, depth).map(Rule::Group)
    } else {
        decode_column(obj, path).map(Rule::Column)
    }
}

fn decode_group(
    obj: &Map<String, Value>,
    path: &str,
    depth: usize,
) -> Result<RuleGroup, ValidationError> {
    if depth > MAX_DEPTH {
        return Err(ValidationError::new(path, ValidationErrorKind::TooDeep(MAX_DEPTH)));
    }
    if COLUMN_FIELDS.iter().any(|k| obj.contains_key(*k)) {
        return Err(ValidationError::new(path, ValidationErrorKind::AmbiguousNode));
    }

    let condition = match obj.get("condition") {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(path, ValidationErrorKind::MissingCondition));
        }
        Some(Value::String(s)) => s
            .parse::<Condition>()
            .map_err(|kind| ValidationError::new(format!("{path}.condition"), kind))?,
        Some(_) => {
            return Err(ValidationError::new(
                format!("{path}.condition"),
                ValidationErrorKind::InvalidType("a condition string"),
            ));
        }
    };

    let rules = match obj.get("rules") {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(path, ValidationErrorKind::MissingField("rules")));
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_node(item, &format!("{path}.rules[{i}]"), depth + 1))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ValidationError::new(
                format!("{path}.rules"),
                ValidationErrorKind::InvalidType("an array of rules"),
            ));
        }
    };

    Ok(RuleGroup { condition, rules })
}

fn decode_column(obj: &Map<String, Value>, path: &str) -> Result<ColumnRule, ValidationError> {
    let column = match obj.get("column") {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(path, ValidationErrorKind::MissingField("column")));
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ValidationError::new(
                format!("{path}.column"),
                ValidationErrorKind::InvalidType("a column name string"),
            ));
        }
    };

    let operator = match obj.get("operator") {
        None | Some(Value::Null) => {
            return Err(ValidationError::new(path, ValidationErrorKind::MissingField("operator")));
        }
        Some(Value::String(s)) => s
            .parse::<Operator>()
            .map_err(|kind| ValidationError::new(format!("{path}.operator"), kind))?,
        Some(_) => {
            return Err(ValidationError::new(
                format!("{path}.operator"),
                ValidationErrorKind::InvalidType("an operator string"),
            ));
        }
    };

    let value = obj.get("value").filter(|v| !v.is_null()).cloned();

    Ok(ColumnRule {
        column,
        operator,
        value,
    })
}
