use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Logical operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonOperator {
    // for string or array
    Contains,
    NotContains,
    StartWith,
    EndWith,
    Is,
    IsNot,
    Empty,
    NotEmpty,
    In,
    NotIn,
    AllOf,
    // for number
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Null,
    NotNull,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(Number),
    Str(String),
    List(Vec<Value>),
}

impl ConditionValue {
    /// Scalar text form, `None` for lists.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ConditionValue::Bool(b) => Some(b.to_string()),
            ConditionValue::Number(n) => Some(n.to_string()),
            ConditionValue::Str(s) => Some(s.clone()),
            ConditionValue::List(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => n.as_f64(),
            ConditionValue::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Text form of every list item.
    pub fn items(&self) -> Vec<String> {
        match self {
            ConditionValue::List(list) => list.iter().filter_map(value_text).collect(),
            other => other.as_text().into_iter().collect(),
        }
    }
}

/// Text form of a scalar JSON value.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    /// Variable path (`count`, `user.name`) or a `{{#..#}}` template.
    pub variable_selector: String,
    pub comparison_operator: ComparisonOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
}
