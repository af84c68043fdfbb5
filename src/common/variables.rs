//! Scoped variable store.

use serde_json::Value;

use crate::common::Vars;

/// Stack of variable scopes.
///
/// The bottom scope is the workflow-wide scope and can never be popped.
/// Lookups walk from the innermost scope outwards. [`VariableStore::set`]
/// updates the innermost scope that already binds the name and otherwise
/// defines it in the workflow-wide scope, so variables written by loop bodies
/// outlive the loop. [`VariableStore::set_local`] binds in the innermost scope
/// only; loops use it for their item variable, which disappears with the scope.
#[derive(Debug, Clone)]
pub struct VariableStore {
    scopes: Vec<Vars>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self {
            scopes: vec![Vars::new()],
        }
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose workflow-wide scope holds `vars`.
    pub fn with_globals(vars: Vars) -> Self {
        Self {
            scopes: vec![vars],
        }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get_value(name))
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.get(name).is_some()
    }

    /// Set `name`, returning the previous value if any.
    pub fn set(
        &mut self,
        name: &str,
        value: Value,
    ) -> Option<Value> {
        let idx = self.scopes.iter().rposition(|scope| scope.contains_key(name)).unwrap_or(0);
        let previous = self.scopes[idx].remove(name);
        self.scopes[idx].set(name, value);
        previous
    }

    /// Bind `name` in the innermost scope.
    pub fn set_local(
        &mut self,
        name: &str,
        value: Value,
    ) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.set(name, value);
        }
    }

    /// Remove the innermost binding of `name`.
    pub fn remove(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        let idx = self.scopes.iter().rposition(|scope| scope.contains_key(name))?;
        self.scopes[idx].remove(name)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Vars::new());
    }

    /// Drop the innermost scope. The workflow-wide scope is never dropped.
    pub fn pop_scope(&mut self) -> Option<Vars> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Flatten all scopes, inner bindings shadowing outer ones.
    pub fn snapshot(&self) -> Vars {
        let mut vars = Vars::new();
        for scope in self.scopes.iter() {
            vars.extend(scope.clone());
        }
        vars
    }
}
