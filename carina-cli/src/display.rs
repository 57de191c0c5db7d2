//! Terminal rendering of plans, states and values

use std::collections::HashMap;

use colored::{ColoredString, Colorize};

use carina_core::effect::Effect;
use carina_core::plan::Plan;
use carina_core::resource::{State, Value};
use carina_core::schema::ResourceSchema;

/// Schemas keyed by (resource type, is data source)
pub type SchemaIndex = HashMap<(String, bool), ResourceSchema>;

const BASE_INDENT: &str = "  ";
const ATTR_INDENT: &str = "      ";

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("${{{}.{}}}", binding, attr),
    }
}

/// `name` first, then alphabetical; internal `_` keys are hidden
fn display_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<_> = attributes.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

fn redacted(
    schemas: &SchemaIndex,
    resource_type: &str,
    data_source: bool,
    attributes: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    match schemas.get(&(resource_type.to_string(), data_source)) {
        Some(schema) => schema.redact(attributes),
        None => attributes.clone(),
    }
}

fn symbol(effect: &Effect) -> ColoredString {
    match effect {
        Effect::Read(_) => "<=".cyan().bold(),
        Effect::Create(_) => "+".green().bold(),
        Effect::Update { .. } => "~".yellow().bold(),
        Effect::Replace { .. } => "-/+".magenta().bold(),
        Effect::Delete { .. } => "-".red().bold(),
    }
}

pub fn print_attributes(attributes: &HashMap<String, Value>) {
    for key in display_keys(attributes) {
        let value = format_value(&attributes[key]);
        if key == "name" {
            println!("{}{}: {}", ATTR_INDENT, key.bold(), value.white().bold());
        } else {
            println!("{}{}: {}", ATTR_INDENT, key, value.green());
        }
    }
}

fn print_changes(from: &HashMap<String, Value>, to: &HashMap<String, Value>, changed: &[String]) {
    for key in changed {
        let old = from
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let new = to
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        println!("{}{}: {} → {}", ATTR_INDENT, key, old.red(), new.green());
    }
}

pub fn print_plan(plan: &Plan, schemas: &SchemaIndex) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let id = effect.resource_id();
        let address = match effect {
            Effect::Read(_) => format!("data.{}", id),
            _ => id.to_string(),
        };
        println!("{}{} {}", BASE_INDENT, symbol(effect), address.cyan().bold());

        match effect {
            Effect::Create(r) => {
                print_attributes(&redacted(schemas, &id.resource_type, false, &r.attributes))
            }
            Effect::Update {
                from,
                to,
                changed_attributes,
                ..
            }
            | Effect::Replace {
                from,
                to,
                changed_attributes,
                ..
            } => print_changes(
                &redacted(schemas, &id.resource_type, false, &from.attributes),
                &redacted(schemas, &id.resource_type, false, &to.attributes),
                changed_attributes,
            ),
            Effect::Delete { identifier, .. } => {
                println!("{}{}: {}", ATTR_INDENT, "id".bold(), identifier.red())
            }
            Effect::Read(_) => {}
        }
    }

    println!();
    println!("{}", plan.summary());
}

pub fn print_state(state: &State, schemas: &SchemaIndex, data_source: bool) {
    println!(
        "{}{} {}",
        BASE_INDENT,
        if data_source { "data" } else { "resource" }.dimmed(),
        state.id.to_string().cyan().bold()
    );
    if let Some(identifier) = &state.identifier {
        println!("{}{}: {}", ATTR_INDENT, "id".bold(), identifier);
    }
    print_attributes(&redacted(
        schemas,
        &state.id.resource_type,
        data_source,
        &state.attributes,
    ));
}

/// One line describing an applied Effect
pub fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Read(r) => format!("Read data.{}", r.id),
        Effect::Create(r) => format!("Create {}", r.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Replace { id, .. } => format!("Replace {}", id),
        Effect::Delete { id, .. } => format!("Delete {}", id),
    }
}

#[cfg(test)]
mod tests {
    use carina_core::resource::Resource;
    use carina_core::schema::{AttributeSchema, AttributeType, SENSITIVE_PLACEHOLDER};

    use super::*;

    #[test]
    fn values_render_like_json() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), Value::Int(2));
        map.insert("a".to_string(), Value::Bool(true));
        let value = Value::List(vec![Value::string("x"), Value::Map(map)]);
        assert_eq!(format_value(&value), r#"["x", {a: true, b: 2}]"#);
        assert_eq!(
            format_value(&Value::ResourceRef("sn".into(), "destination_id".into())),
            "${sn.destination_id}"
        );
    }

    #[test]
    fn name_sorts_first_and_internals_are_hidden() {
        let resource = Resource::new("t", "n")
            .with_attribute("description", Value::string("d"))
            .with_attribute("_internal", Value::string("x"))
            .with_attribute("name", Value::string("n"));
        let keys = display_keys(&resource.attributes);
        assert_eq!(keys, vec!["name", "description"]);
    }

    #[test]
    fn sensitive_values_are_masked() {
        let mut schemas = SchemaIndex::new();
        schemas.insert(
            ("t".to_string(), false),
            ResourceSchema::new("t")
                .attribute(AttributeSchema::new("secret", AttributeType::String).sensitive()),
        );
        let resource = Resource::new("t", "n").with_attribute("secret", Value::string("hunter2"));
        let shown = redacted(&schemas, "t", false, &resource.attributes);
        assert_eq!(shown["secret"], Value::string(SENSITIVE_PLACEHOLDER));

        let unmasked = redacted(&schemas, "t", true, &resource.attributes);
        assert_eq!(unmasked["secret"], Value::string("hunter2"));
    }
}
