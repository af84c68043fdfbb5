use serde_json::Value;

#[derive(Debug, Clone)]
pub enum VariableEvent {
    Updated {
        name: String,
        value: Value,
    },
}

impl VariableEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VariableEvent::Updated {
                ..
            } => "variable.updated",
        }
    }
}
