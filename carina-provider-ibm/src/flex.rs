//! Helpers for moving values between manifest attributes and API payloads

use std::collections::HashMap;

use carina_core::differ::value_matches;
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use chrono::{SecondsFormat, Utc};

use crate::error::{IbmError, Result};

/// Split a composite ID such as `{instance}/{destination}` into its two parts
pub fn sep_id_parts<'a>(id: &'a str, separator: &str) -> Result<(&'a str, &'a str)> {
    let invalid = |reason: &str| IbmError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    };
    let mut parts = id.split(separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => Ok((a, b)),
        (_, _, Some(_)) => Err(invalid("too many parts")),
        _ => Err(invalid(&format!("expected <parent>{}<child>", separator))),
    }
}

pub fn build_id(parent: &str, child: &str) -> String {
    format!("{}/{}", parent, child)
}

/// Current time as RFC 3339 in UTC, used as the ID of list data sources
pub fn timestamp_id() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert a JSON value from an API response; strings are kept verbatim
pub fn json_to_value(value: &serde_json::Value) -> Option<Value> {
    Value::from_json_literal(value)
}

pub fn json_object_to_map(
    obj: &serde_json::Map<String, serde_json::Value>,
) -> HashMap<String, Value> {
    obj.iter()
        .filter_map(|(k, v)| json_to_value(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Convert a block's attributes into a JSON object for a request body
pub fn map_to_json_object(map: &HashMap<String, Value>) -> serde_json::Map<String, serde_json::Value> {
    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// First item of a nested block, e.g. `config.0`
pub fn first_block<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> Option<&'a HashMap<String, Value>> {
    attributes
        .get(key)
        .and_then(Value::as_list)
        .and_then(|items| items.first())
        .and_then(Value::as_map)
}

pub fn get_str<'a>(attributes: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}

/// A string attribute the schema marks required
pub fn required_str<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
    id: &ResourceId,
) -> ProviderResult<&'a str> {
    get_str(attributes, key).ok_or_else(|| {
        ProviderError::new(format!("Missing required attribute '{}'", key)).for_resource(id.clone())
    })
}

pub fn insert_opt_str(attributes: &mut HashMap<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        attributes.insert(key.to_string(), Value::string(v));
    }
}

pub fn string_list(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::string(s.as_str())).collect())
}

/// True if any of `keys` differs between configuration and the last known state
pub fn has_changes(from: &State, to: &Resource, keys: &[&str]) -> bool {
    keys.iter()
        .any(|k| match (to.attributes.get(*k), from.attributes.get(*k)) {
            (Some(desired), Some(current)) => !value_matches(desired, current),
            (None, None) => false,
            _ => true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_two_part_ids() {
        assert_eq!(sep_id_parts("inst/dest", "/").unwrap(), ("inst", "dest"));
        assert!(sep_id_parts("inst", "/").is_err());
        assert!(sep_id_parts("inst/", "/").is_err());
        assert!(sep_id_parts("/dest", "/").is_err());
        assert!(matches!(
            sep_id_parts("a/b/c", "/"),
            Err(IbmError::InvalidId { ref reason, .. }) if reason == "too many parts"
        ));
        assert_eq!(build_id("tc", "tool"), "tc/tool");
    }

    #[test]
    fn response_strings_are_not_references() {
        let value = json_to_value(&serde_json::json!({"template": "${a.b}", "n": null}));
        let map = value.unwrap();
        let map = map.as_map().unwrap();
        assert_eq!(map.get("template"), Some(&Value::string("${a.b}")));
        assert!(!map.contains_key("n"));
    }

    #[test]
    fn first_block_reads_nested_items() {
        let mut params = HashMap::new();
        params.insert("client_id".to_string(), Value::string("id"));
        let mut attrs = HashMap::new();
        attrs.insert("config".to_string(), Value::block(params));

        let block = first_block(&attrs, "config").unwrap();
        assert_eq!(get_str(block, "client_id"), Some("id"));
        assert!(first_block(&attrs, "missing").is_none());
    }

    #[test]
    fn change_detection_ignores_remote_extras() {
        let id = ResourceId::new("t", "n");
        let mut remote_params = HashMap::new();
        remote_params.insert("enable_traceability".to_string(), Value::Bool(true));
        remote_params.insert("repo_url".to_string(), Value::string("https://github.com/x/y"));
        let mut state_attrs = HashMap::new();
        state_attrs.insert("parameters".to_string(), Value::block(remote_params));
        state_attrs.insert("name".to_string(), Value::string("a"));
        let from = State::existing(id, state_attrs);

        let mut desired_params = HashMap::new();
        desired_params.insert("enable_traceability".to_string(), Value::Bool(true));
        let to = Resource::new("t", "n")
            .with_attribute("parameters", Value::block(desired_params))
            .with_attribute("name", Value::string("a"));
        assert!(!has_changes(&from, &to, &["name", "parameters"]));

        let renamed = to.clone().with_attribute("name", Value::string("b"));
        assert!(has_changes(&from, &renamed, &["name", "parameters"]));
        assert!(!has_changes(&from, &to, &["description"]));
    }

    #[test]
    fn timestamp_id_is_utc() {
        assert!(timestamp_id().ends_with('Z'));
    }
}
