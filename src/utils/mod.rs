pub mod time;

/// Generate an id for an action definition that did not carry one.
pub fn shortid() -> String {
    nanoid::nanoid!(12)
}

/// Generate an id for one workflow execution.
pub fn longid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
