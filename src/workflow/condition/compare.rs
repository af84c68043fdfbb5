use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    runtime::ExecutionContext,
    workflow::{condition::Condition, template},
};

use super::models::*;

/// Compares variables against expected values.
///
/// ```json
/// {"type": "compare", "logical_operator": "and", "conditions": [
///     {"variable_selector": "page", "comparison_operator": "lt", "value": 10}
/// ]}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompareCondition {
    #[serde(default)]
    logical_operator: LogicalOperator,
    conditions: Vec<Comparison>,
}

impl CompareCondition {
    fn select(
        &self,
        ctx: &ExecutionContext,
        selector: &str,
    ) -> Option<Value> {
        if selector.contains("{{") {
            template::resolve_template_to_value(ctx, selector).ok()
        } else {
            template::lookup(ctx, selector)
        }
    }
}

/// Missing variables and JSON null count as absent for the presence checks.
/// Every other operator is false when either side is missing.
fn compare(
    operator: ComparisonOperator,
    actual: Option<&Value>,
    expected: Option<&ConditionValue>,
) -> bool {
    use ComparisonOperator as Op;

    match (operator, actual, expected) {
        (Op::Null, ..) => actual.is_none_or(Value::is_null),
        (Op::NotNull, ..) => !actual.is_none_or(Value::is_null),
        (Op::Empty, ..) => actual.is_none_or(is_empty),
        (Op::NotEmpty, ..) => !actual.is_none_or(is_empty),
        (_, None, _) | (_, _, None) => false,
        (Op::Contains, Some(a), Some(e)) => contains(a, e),
        (Op::NotContains, Some(a), Some(e)) => !contains(a, e),
        (Op::StartWith, Some(a), Some(e)) => affix(a, e, |s, e| s.starts_with(e)),
        (Op::EndWith, Some(a), Some(e)) => affix(a, e, |s, e| s.ends_with(e)),
        (Op::Is, Some(a), Some(e)) => same_text(a, e),
        (Op::IsNot, Some(a), Some(e)) => !same_text(a, e),
        (Op::In, Some(a), Some(e)) => member_of(a, e),
        (Op::NotIn, Some(a), Some(e)) => !member_of(a, e),
        (Op::AllOf, Some(a), Some(e)) => all_of(a, e),
        (Op::Eq, Some(a), Some(e)) => equals(a, e),
        (Op::Ne, Some(a), Some(e)) => !equals(a, e),
        (Op::Gt, Some(a), Some(e)) => numeric(a, e).is_some_and(|(a, e)| a > e),
        (Op::Lt, Some(a), Some(e)) => numeric(a, e).is_some_and(|(a, e)| a < e),
        (Op::Ge, Some(a), Some(e)) => numeric(a, e).is_some_and(|(a, e)| a >= e),
        (Op::Le, Some(a), Some(e)) => numeric(a, e).is_some_and(|(a, e)| a <= e),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

fn contains(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    let Some(e) = expected.as_text() else {
        return false;
    };
    match actual {
        Value::String(s) => s.contains(&e),
        Value::Array(arr) => arr.iter().any(|v| value_text(v).as_deref() == Some(e.as_str())),
        _ => false,
    }
}

fn affix(
    actual: &Value,
    expected: &ConditionValue,
    test: fn(&str, &str) -> bool,
) -> bool {
    match (actual, expected.as_text()) {
        (Value::String(s), Some(e)) => test(s, &e),
        _ => false,
    }
}

fn same_text(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    matches!((value_text(actual), expected.as_text()), (Some(a), Some(e)) if a == e)
}

/// A string expected value is searched as a substring, a list by item.
fn member_of(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    let Some(a) = value_text(actual) else {
        return false;
    };
    match expected {
        ConditionValue::Str(s) => s.contains(a.as_str()),
        other => other.items().contains(&a),
    }
}

fn all_of(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    let Value::Array(arr) = actual else {
        return false;
    };
    let present: Vec<String> = arr.iter().filter_map(value_text).collect();
    expected.items().iter().all(|e| present.contains(e))
}

/// Numbers compare numerically, anything else by text.
fn equals(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected.as_f64()) {
        (Value::Number(n), Some(e)) => n.as_f64() == Some(e),
        _ => same_text(actual, expected),
    }
}

/// Both sides as numbers; numeric strings on the actual side are parsed.
fn numeric(
    actual: &Value,
    expected: &ConditionValue,
) -> Option<(f64, f64)> {
    let actual = match actual {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Some((actual?, expected.as_f64()?))
}

#[typetag::serialize(name = "compare")]
impl Condition for CompareCondition {
    fn create(params: Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), &params)?;
        let condition = serde_json::from_value::<Self>(params)?;
        Ok(condition)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "logical_operator": { "type": "string", "enum": ["and", "or"] },
                "conditions": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "variable_selector": { "type": "string" },
                            "comparison_operator": { "type": "string" },
                            "value": {}
                        },
                        "required": ["variable_selector", "comparison_operator"]
                    }
                }
            },
            "required": ["conditions"]
        })
    }

    fn type_name() -> &'static str {
        "compare"
    }

    fn condition_type(&self) -> &str {
        Self::type_name()
    }

    fn evaluate(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<bool> {
        let mut results = self.conditions.iter().map(|condition| {
            let actual = self.select(ctx, &condition.variable_selector);
            compare(condition.comparison_operator, actual.as_ref(), condition.value.as_ref())
        });

        let result = match self.logical_operator {
            LogicalOperator::And => results.all(|r| r),
            LogicalOperator::Or => results.any(|r| r),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::common::Vars;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new().with_variables(
            Vars::new()
                .with("count", 3)
                .with("title", "Order #42 confirmed")
                .with("tags", json!(["new", "paid"]))
                .with("status", "paid")
                .with("done", false)
                .with("empty", ""),
        )
    }

    fn check(
        selector: &str,
        operator: &str,
        value: Value,
    ) -> bool {
        let condition = CompareCondition::create(json!({
            "type": "compare",
            "conditions": [{"variable_selector": selector, "comparison_operator": operator, "value": value}]
        }))
        .unwrap();
        condition.evaluate(&ctx()).unwrap()
    }

    #[test]
    fn test_numeric_operators() {
        assert!(check("count", "lt", json!(5)));
        assert!(check("count", "ge", json!("3")));
        assert!(check("count", "eq", json!(3)));
        assert!(check("count", "ne", json!(4)));
        assert!(!check("count", "gt", json!(3)));
        assert!(!check("title", "gt", json!(1)));
    }

    #[test]
    fn test_string_operators() {
        assert!(check("title", "contains", json!("#42")));
        assert!(check("title", "start_with", json!("Order")));
        assert!(check("title", "end_with", json!("confirmed")));
        assert!(check("status", "is", json!("paid")));
        assert!(check("status", "in", json!(["paid", "shipped"])));
        assert!(check("status", "not_in", json!(["cancelled"])));
        assert!(check("done", "is", json!(false)));
    }

    #[test]
    fn test_collection_and_presence_operators() {
        assert!(check("tags", "contains", json!("new")));
        assert!(check("tags", "all_of", json!(["new", "paid"])));
        assert!(!check("tags", "all_of", json!(["new", "refunded"])));
        assert!(check("empty", "empty", Value::Null));
        assert!(check("missing", "null", Value::Null));
        assert!(check("title", "not_empty", Value::Null));
        assert!(!check("missing", "eq", json!(1)));
        assert!(check("done", "not_null", Value::Null));
        assert!(check("count", "not_empty", Value::Null));
        assert!(!check("count", "empty", Value::Null));
        assert!(!check("status", "is", Value::Null));
    }

    #[test]
    fn test_template_selector_and_logic() {
        assert!(check("{{#count#}}", "eq", json!(3)));

        let condition = CompareCondition::create(json!({
            "type": "compare",
            "logical_operator": "or",
            "conditions": [
                {"variable_selector": "count", "comparison_operator": "gt", "value": 10},
                {"variable_selector": "status", "comparison_operator": "is", "value": "paid"}
            ]
        }))
        .unwrap();
        assert!(condition.evaluate(&ctx()).unwrap());
    }

    #[test]
    fn test_schema_rejects_empty_conditions() {
        assert!(CompareCondition::create(json!({"type": "compare", "conditions": []})).is_err());
        assert!(CompareCondition::create(json!({"type": "compare", "conditions": [{"variable_selector": "x", "comparison_operator": "near"}]})).is_err());
    }
}
