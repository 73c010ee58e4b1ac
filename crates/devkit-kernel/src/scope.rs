//! The persistent two-tier variable environment.
//!
//! A `Scope` holds global and local bindings across evaluator
//! invocations. Lookup checks globals first, then locals; deletion must
//! clear the name from whichever tiers contain it and only errors when
//! the name exists in neither.

use std::collections::HashMap;

use devkit_types::{DevError, Value};

/// Two-tier variable bindings shared across evaluations.
///
/// Consumers of [`items`](Scope::items)/[`keys`](Scope::keys)/
/// [`values`](Scope::values) receive the `(globals, locals)` pair rather
/// than a flattened view, so a name shadowed across tiers stays visible
/// in both.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub globals: HashMap<String, Value>,
    pub locals: HashMap<String, Value>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope from optional seed mappings.
    pub fn with_tiers(
        globals: Option<HashMap<String, Value>>,
        locals: Option<HashMap<String, Value>>,
    ) -> Self {
        Self {
            globals: globals.unwrap_or_default(),
            locals: locals.unwrap_or_default(),
        }
    }

    /// Look up a name, globals first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name).or_else(|| self.locals.get(name))
    }

    /// Look up a name, erroring when it is absent from both tiers.
    pub fn get_required(&self, name: &str) -> Result<&Value, DevError> {
        self.get(name)
            .ok_or_else(|| DevError::Reference(name.to_string()))
    }

    /// Remove a name from whichever tiers contain it.
    ///
    /// Errors only when the name is present in neither tier.
    pub fn remove(&mut self, name: &str) -> Result<(), DevError> {
        let in_globals = self.globals.remove(name).is_some();
        let in_locals = self.locals.remove(name).is_some();
        if in_globals || in_locals {
            Ok(())
        } else {
            Err(DevError::Reference(name.to_string()))
        }
    }

    /// Set a binding in the global tier.
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Set a binding in the local tier.
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Merge new bindings into the corresponding tiers,
    /// overwriting on conflict. Either side may be omitted.
    pub fn update(
        &mut self,
        new_globals: Option<HashMap<String, Value>>,
        new_locals: Option<HashMap<String, Value>>,
    ) {
        if let Some(globals) = new_globals {
            self.globals.extend(globals);
        }
        if let Some(locals) = new_locals {
            self.locals.extend(locals);
        }
    }

    /// Key-value pairs, partitioned by tier.
    pub fn items(&self) -> (Vec<(&str, &Value)>, Vec<(&str, &Value)>) {
        (
            self.globals.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            self.locals.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        )
    }

    /// Names, partitioned by tier.
    pub fn keys(&self) -> (Vec<&str>, Vec<&str>) {
        (
            self.globals.keys().map(String::as_str).collect(),
            self.locals.keys().map(String::as_str).collect(),
        )
    }

    /// Values, partitioned by tier.
    pub fn values(&self) -> (Vec<&Value>, Vec<&Value>) {
        (
            self.globals.values().collect(),
            self.locals.values().collect(),
        )
    }

    /// Sum of both tiers' sizes.
    pub fn len(&self) -> usize {
        self.globals.len() + self.locals.len()
    }

    /// True iff both tiers are empty.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty() && self.locals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_prefers_globals() {
        let mut scope = Scope::new();
        scope.set_local("x", Value::Int(1));
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));

        scope.set_global("x", Value::Int(2));
        assert_eq!(scope.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn get_required_errors_when_absent_from_both() {
        let scope = Scope::new();
        let err = scope.get_required("missing").unwrap_err();
        assert!(matches!(err, DevError::Reference(ref name) if name == "missing"));
    }

    #[test]
    fn remove_clears_both_tiers() {
        let mut scope = Scope::new();
        scope.set_global("x", Value::Int(1));
        scope.set_local("x", Value::Int(2));
        scope.remove("x").unwrap();
        assert!(scope.get("x").is_none());
    }

    #[test]
    fn remove_errors_only_when_absent_from_both() {
        let mut scope = Scope::new();
        scope.set_local("only_local", Value::Null);
        assert!(scope.remove("only_local").is_ok());
        assert!(scope.remove("only_local").is_err());
    }

    #[test]
    fn emptiness_requires_both_tiers_empty() {
        let mut scope = Scope::new();
        assert!(scope.is_empty());
        scope.set_local("x", Value::Int(1));
        assert!(!scope.is_empty());
        assert_eq!(scope.len(), 1);
        scope.set_global("y", Value::Int(2));
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn update_merges_with_overwrite() {
        let mut scope = Scope::new();
        scope.set_global("a", Value::Int(1));

        let mut new_globals = HashMap::new();
        new_globals.insert("a".to_string(), Value::Int(10));
        new_globals.insert("b".to_string(), Value::Int(2));
        scope.update(Some(new_globals), None);

        assert_eq!(scope.get("a"), Some(&Value::Int(10)));
        assert_eq!(scope.get("b"), Some(&Value::Int(2)));
        assert!(scope.locals.is_empty());
    }

    #[test]
    fn views_are_partitioned_by_tier() {
        let mut scope = Scope::new();
        scope.set_global("g", Value::Int(1));
        scope.set_local("l", Value::Int(2));

        let (globals, locals) = scope.keys();
        assert_eq!(globals, vec!["g"]);
        assert_eq!(locals, vec!["l"]);
    }
}
