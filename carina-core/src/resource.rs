//! Resource - Representing resources and their state

use std::collections::HashMap;

use serde_json::json;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "en_destination_servicenow", "is_lbs")
    pub resource_type: String,
    /// Resource name (binding name from the manifest)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding_name, attribute_name)
    ResourceRef(String, String),
}

impl Value {
    /// Shorthand for `Value::String`
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// A single nested block, stored the way block attributes are: a one-item list of maps
    pub fn block(attrs: HashMap<String, Value>) -> Self {
        Value::List(vec![Value::Map(attrs)])
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Convert a JSON value into a Value.
    ///
    /// Strings of the form `${binding.attribute}` become resource references.
    /// JSON `null` has no Value counterpart and yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        convert_json(value, true)
    }

    /// Like `from_json`, but strings are always kept verbatim
    ///
    /// Used for values that came back from an API or a state file.
    pub fn from_json_literal(value: &serde_json::Value) -> Option<Value> {
        convert_json(value, false)
    }

    /// Convert this Value into JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => json!(s),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Bool(b) => json!(b),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::ResourceRef(binding, attr) => json!(format!("${{{}.{}}}", binding, attr)),
        }
    }
}

fn convert_json(value: &serde_json::Value, references: bool) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            None => n.as_f64().map(Value::Float),
        },
        serde_json::Value::String(s) => Some(
            references
                .then(|| parse_reference(s))
                .flatten()
                .unwrap_or_else(|| Value::String(s.clone())),
        ),
        serde_json::Value::Array(items) => Some(Value::List(
            items
                .iter()
                .filter_map(|v| convert_json(v, references))
                .collect(),
        )),
        serde_json::Value::Object(obj) => Some(Value::Map(
            obj.iter()
                .filter_map(|(k, v)| convert_json(v, references).map(|v| (k.clone(), v)))
                .collect(),
        )),
    }
}

/// Parse `${binding.attribute}` into a resource reference
fn parse_reference(s: &str) -> Option<Value> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (binding, attr) = inner.split_once('.')?;
    if binding.is_empty() || attr.is_empty() {
        return None;
    }
    Some(Value::ResourceRef(binding.to_string(), attr.to_string()))
}

/// Convert a JSON object into an attribute map
pub fn attributes_from_json(value: &serde_json::Value) -> HashMap<String, Value> {
    match Value::from_json(value) {
        Some(Value::Map(map)) => map,
        _ => HashMap::new(),
    }
}

/// Convert an attribute map into a JSON object
pub fn attributes_to_json(attributes: &HashMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(
        attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// Desired state declared in the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    /// If true, this is a data source (read-only) that won't be modified
    pub read_only: bool,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            read_only: false,
        }
    }

    /// Create a data source declaration
    pub fn data_source(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(resource_type, name).with_read_only(true)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns true if this resource is a data source (read-only)
    pub fn is_data_source(&self) -> bool {
        self.read_only
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider-side identifier (e.g., "{instance_guid}/{destination_id}")
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Keep values from `prior` that this state does not have, including inside blocks.
    ///
    /// After a refresh, pass only the write-only values
    /// (see `ResourceSchema::restore_write_only`).
    pub fn carry_forward(&mut self, prior: &State) {
        for (key, prior_value) in &prior.attributes {
            match self.attributes.get_mut(key) {
                Some(current) => merge_missing(current, prior_value),
                None => {
                    self.attributes.insert(key.clone(), prior_value.clone());
                }
            }
        }
    }

    /// Look up an attribute by dotted path, e.g. `config.0.params.0.client_id`.
    ///
    /// A trailing `#` yields the length of the list at that path.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        lookup_path(&self.attributes, path)
    }
}

fn merge_missing(current: &mut Value, prior: &Value) {
    match (current, prior) {
        (Value::Map(cur), Value::Map(old)) => {
            for (k, v) in old {
                match cur.get_mut(k) {
                    Some(c) => merge_missing(c, v),
                    None => {
                        cur.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (Value::List(cur), Value::List(old)) if cur.len() == old.len() => {
            for (c, o) in cur.iter_mut().zip(old) {
                merge_missing(c, o);
            }
        }
        _ => {}
    }
}

/// Resolve a dotted path against an attribute map
pub fn lookup_path(attributes: &HashMap<String, Value>, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = attributes.get(first)?;

    for segment in segments {
        match (current, segment) {
            (Value::List(items), "#") => return Some(Value::Int(items.len() as i64)),
            (Value::Map(map), "%") => return Some(Value::Int(map.len() as i64)),
            (Value::List(items), index) => {
                let index: usize = index.parse().ok()?;
                current = items.get(index)?;
            }
            (Value::Map(map), key) => {
                current = map.get(key)?;
            }
            _ => return None,
        }
    }

    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_nested_blocks() {
        let json = json!({
            "name": "servicenow",
            "config": [{"params": [{"client_id": "abc", "pre_prod": false}]}],
            "count": 3
        });
        let attrs = attributes_from_json(&json);
        assert_eq!(attrs.get("count"), Some(&Value::Int(3)));
        assert_eq!(attributes_to_json(&attrs), json);
    }

    #[test]
    fn reference_strings_become_refs() {
        let value = Value::from_json(&json!("${toolchain.id}")).unwrap();
        assert_eq!(
            value,
            Value::ResourceRef("toolchain".to_string(), "id".to_string())
        );
        assert_eq!(value.to_json(), json!("${toolchain.id}"));

        assert_eq!(
            Value::from_json(&json!("${nodot}")),
            Some(Value::String("${nodot}".to_string()))
        );
        assert_eq!(
            Value::from_json_literal(&json!(["${toolchain.id}"])),
            Some(Value::List(vec![Value::string("${toolchain.id}")]))
        );
    }

    #[test]
    fn null_is_dropped() {
        let attrs = attributes_from_json(&json!({"a": null, "b": "x"}));
        assert!(!attrs.contains_key("a"));
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn lookup_nested_paths() {
        let mut params = HashMap::new();
        params.insert("client_id".to_string(), Value::string("abc"));
        let mut config = HashMap::new();
        config.insert("params".to_string(), Value::block(params));
        let mut attrs = HashMap::new();
        attrs.insert("config".to_string(), Value::block(config));
        let state = State::existing(ResourceId::new("t", "n"), attrs);

        assert_eq!(
            state.lookup("config.0.params.0.client_id"),
            Some(Value::string("abc"))
        );
        assert_eq!(state.lookup("config.#"), Some(Value::Int(1)));
        assert_eq!(state.lookup("config.1.params"), None);
        assert_eq!(state.lookup("missing"), None);
    }

    #[test]
    fn carry_forward_fills_missing_values() {
        let mut old_params = HashMap::new();
        old_params.insert("client_secret".to_string(), Value::string("s3cret"));
        old_params.insert("client_id".to_string(), Value::string("old-id"));
        let mut prior_attrs = HashMap::new();
        prior_attrs.insert("config".to_string(), Value::block(old_params));
        prior_attrs.insert("name".to_string(), Value::string("old"));
        let prior = State::existing(ResourceId::new("t", "n"), prior_attrs);

        let mut new_params = HashMap::new();
        new_params.insert("client_id".to_string(), Value::string("new-id"));
        let mut attrs = HashMap::new();
        attrs.insert("config".to_string(), Value::block(new_params));
        attrs.insert("name".to_string(), Value::string("new"));
        let mut refreshed = State::existing(ResourceId::new("t", "n"), attrs);

        refreshed.carry_forward(&prior);

        assert_eq!(refreshed.lookup("name"), Some(Value::string("new")));
        assert_eq!(
            refreshed.lookup("config.0.client_id"),
            Some(Value::string("new-id"))
        );
        assert_eq!(
            refreshed.lookup("config.0.client_secret"),
            Some(Value::string("s3cret"))
        );
    }

    #[test]
    fn resource_id_display() {
        assert_eq!(ResourceId::new("is_lbs", "all").to_string(), "is_lbs.all");
    }
}
