use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{AutoflowError, Result, runtime::ExecutionContext};

/// Variable references
/// Format: `{{#name#}}` or `{{#name.key.subkey#}}`
static VARIABLE_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{#([^#]+)#\}\}").expect("valid variable template pattern"));
/// Environment variables
/// Format: `{{$VAR_NAME$}}`
static ENV_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\$([^$]+)\$\}\}").expect("valid env template pattern"));

/// Look up a dotted path in the variable store.
///
/// The first segment names the variable; later segments index into objects
/// by key and into arrays by position.
pub fn lookup(
    ctx: &ExecutionContext,
    path: &str,
) -> Option<Value> {
    let mut keys = path.trim().split('.');
    let mut current = ctx.get_variable(keys.next()?)?;
    for key in keys {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            value => value.get(key)?,
        };
    }
    Some(current.clone())
}

fn to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        v => v.to_string(),
    }
}

/// Resolve template variables in the format `{{#name.path#}}` and `{{$VAR_NAME$}}`
/// Returns error if any template variable cannot be resolved
pub fn resolve_template(
    ctx: &ExecutionContext,
    template: &str,
) -> Result<String> {
    let mut result = template.to_string();
    let mut errors: Vec<String> = Vec::new();

    for caps in ENV_TEMPLATE.captures_iter(template) {
        match ctx.env().get(&caps[1]) {
            Some(value) => result = result.replace(&caps[0], value),
            None => errors.push(format!("env variable '{}' not found", &caps[1])),
        }
    }

    for caps in VARIABLE_TEMPLATE.captures_iter(template) {
        match lookup(ctx, &caps[1]) {
            Some(value) => result = result.replace(&caps[0], &to_text(value)),
            None => errors.push(format!("variable '{}' not found", &caps[0])),
        }
    }

    if !errors.is_empty() {
        return Err(AutoflowError::Variable(errors.join(", ")));
    }

    Ok(result)
}

/// Resolve `template` to a JSON value.
///
/// A template that is exactly one `{{#name.path#}}` reference yields the
/// referenced value with its JSON type intact. Anything else resolves to a
/// string.
pub fn resolve_template_to_value(
    ctx: &ExecutionContext,
    template: &str,
) -> Result<Value> {
    if let Some(caps) = VARIABLE_TEMPLATE.captures(template)
        && caps[0].len() == template.len()
    {
        return lookup(ctx, &caps[1]).ok_or_else(|| AutoflowError::Variable(format!("variable '{}' not found", template)));
    }
    Ok(Value::String(resolve_template(ctx, template)?))
}

/// Resolve template variables in a JSON Value recursively
pub fn resolve_json_value(
    ctx: &ExecutionContext,
    value: &Value,
) -> Result<Value> {
    match value {
        Value::String(s) => resolve_template_to_value(ctx, s),
        Value::Array(arr) => {
            let resolved: Result<Vec<Value>> = arr.iter().map(|v| resolve_json_value(ctx, v)).collect();
            Ok(Value::Array(resolved?))
        }
        Value::Object(obj) => {
            let resolved: Result<serde_json::Map<String, Value>> = obj.iter().map(|(k, v)| resolve_json_value(ctx, v).map(|rv| (k.clone(), rv))).collect();
            Ok(Value::Object(resolved?))
        }
        _ => Ok(value.clone()),
    }
}
