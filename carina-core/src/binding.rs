//! Binding - Resolve `${binding.attribute}` references between resources
//!
//! Bindings are resource names. A binding exposes the configured attributes,
//! the attributes returned by the provider, and `id` (the provider identifier).

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, State, Value};

/// Map of binding name -> visible attributes
#[derive(Debug, Clone, Default)]
pub struct BindingMap {
    bindings: HashMap<String, HashMap<String, Value>>,
}

impl BindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what a resource exposes after it was read, created or updated
    pub fn insert_state(&mut self, state: &State) {
        let mut attrs = state.attributes.clone();
        if let Some(identifier) = &state.identifier {
            attrs
                .entry("id".to_string())
                .or_insert_with(|| Value::String(identifier.clone()));
        }
        self.bindings.insert(state.id.name.clone(), attrs);
    }

    pub fn get(&self, binding: &str, attribute: &str) -> Option<&Value> {
        self.bindings.get(binding)?.get(attribute)
    }

    /// Resolve every reference in the resource's attributes
    ///
    /// Returns the names of references that could not be resolved yet.
    pub fn resolve(&self, resource: &Resource) -> Result<Resource, Vec<String>> {
        let mut unresolved = Vec::new();
        let attributes = resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v, &mut unresolved)))
            .collect();

        if unresolved.is_empty() {
            Ok(Resource {
                attributes,
                ..resource.clone()
            })
        } else {
            unresolved.sort();
            unresolved.dedup();
            Err(unresolved)
        }
    }

    fn resolve_value(&self, value: &Value, unresolved: &mut Vec<String>) -> Value {
        match value {
            Value::ResourceRef(binding, attr) => match self.get(binding, attr) {
                // Recursively resolve
                Some(v) => self.resolve_value(v, unresolved),
                None => {
                    unresolved.push(format!("{}.{}", binding, attr));
                    value.clone()
                }
            },
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value(v, unresolved))
                    .collect(),
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, unresolved)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

/// Extract binding names that a resource depends on
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding, _) => {
            deps.insert(binding.clone());
        }
        Value::List(items) => items.iter().for_each(|v| collect_dependencies(v, deps)),
        Value::Map(map) => map.values().for_each(|v| collect_dependencies(v, deps)),
        _ => {}
    }
}

/// Order resources so that every resource comes after the bindings it references
///
/// Resources keep their declared order where dependencies allow it.
/// Returns the names involved in a cycle if no such order exists.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, Vec<String>> {
    let names: HashSet<&str> = resources.iter().map(|r| r.id.name.as_str()).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining: Vec<&Resource> = resources.iter().collect();
    let mut sorted = Vec::with_capacity(resources.len());

    while !remaining.is_empty() {
        let ready = remaining.iter().position(|r| {
            dependencies(r)
                .iter()
                .all(|d| placed.contains(d) || !names.contains(d.as_str()))
        });
        match ready {
            Some(index) => {
                let resource = remaining.remove(index);
                placed.insert(resource.id.name.clone());
                sorted.push(resource.clone());
            }
            None => return Err(remaining.iter().map(|r| r.id.name.clone()).collect()),
        }
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;

    fn toolchain_state() -> State {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::string("tc"));
        State::existing(ResourceId::new("cd_toolchain", "toolchain"), attrs)
            .with_identifier("tc-123")
    }

    #[test]
    fn resolves_identifier_as_id() {
        let mut bindings = BindingMap::new();
        bindings.insert_state(&toolchain_state());

        let tool = Resource::new("cd_toolchain_tool_githubconsolidated", "tool").with_attribute(
            "toolchain_id",
            Value::ResourceRef("toolchain".to_string(), "id".to_string()),
        );
        let resolved = bindings.resolve(&tool).unwrap();
        assert_eq!(
            resolved.attributes.get("toolchain_id"),
            Some(&Value::string("tc-123"))
        );
    }

    #[test]
    fn reports_unresolved_references() {
        let bindings = BindingMap::new();
        let tool = Resource::new("t", "tool").with_attribute(
            "toolchain_id",
            Value::List(vec![Value::ResourceRef(
                "toolchain".to_string(),
                "id".to_string(),
            )]),
        );
        assert_eq!(
            bindings.resolve(&tool).unwrap_err(),
            vec!["toolchain.id".to_string()]
        );
    }

    #[test]
    fn sorts_dependents_after_dependencies() {
        let tool = Resource::new("t", "tool")
            .with_attribute("toolchain_id", Value::ResourceRef("tc".into(), "id".into()));
        let tc = Resource::new("t", "tc");
        let other = Resource::new("t", "other")
            .with_attribute("x", Value::ResourceRef("external".into(), "id".into()));

        let sorted = sort_by_dependencies(&[tool, tc, other]).unwrap();
        let names: Vec<&str> = sorted.iter().map(|r| r.id.name.as_str()).collect();
        assert_eq!(names, vec!["tc", "tool", "other"]);
    }

    #[test]
    fn detects_cycles() {
        let a = Resource::new("t", "a").with_attribute("x", Value::ResourceRef("b".into(), "id".into()));
        let b = Resource::new("t", "b").with_attribute("x", Value::ResourceRef("a".into(), "id".into()));
        let cycle = sort_by_dependencies(&[a, b]).unwrap_err();
        assert_eq!(cycle.len(), 2);
    }
}
