//! Schema - Define type schemas for resources and data sources
//!
//! Providers define schemas for each resource type,
//! enabling validation before any API call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::{State, Value};

/// Placeholder shown instead of sensitive values
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive)";

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block, stored as a list of maps
    Block(Box<BlockSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            // References resolve to concrete values at apply time
            (_, Value::ResourceRef(_, _)) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::List(items)) => {
                if let Some(max) = block.max_items
                    && items.len() > max
                {
                    return Err(TypeError::TooManyItems {
                        max,
                        got: items.len(),
                    });
                }
                // Attributes inside each item are checked by `ResourceSchema::validate`
                for (i, item) in items.iter().enumerate() {
                    if !matches!(item, Value::Map(_)) {
                        return Err(TypeError::ListItemError {
                            index: i,
                            inner: Box::new(TypeError::TypeMismatch {
                                expected: "Block".to_string(),
                                got: item.type_name(),
                            }),
                        });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is read-only and cannot be set")]
    ReadOnly { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Too many blocks: at most {max} allowed, got {got}")]
    TooManyItems { max: usize, got: usize },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub optional: bool,
    /// Value is set by the provider
    pub computed: bool,
    /// Value must never be displayed
    pub sensitive: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    /// Accepted by the API but never returned by a read
    pub write_only: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    /// New optional attribute
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            optional: true,
            computed: false,
            sensitive: false,
            force_new: false,
            write_only: false,
            default: None,
            description: None,
        }
    }

    /// New nested block attribute
    pub fn block(name: impl Into<String>, block: BlockSchema) -> Self {
        Self::new(name, AttributeType::Block(Box::new(block)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Allow the user to set a computed attribute
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    /// Provider-populated attribute; read-only unless followed by `optional()`
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self.required = false;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// True if only the provider may set this attribute
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }
}

/// Schema of a nested block
#[derive(Debug, Clone, Default)]
pub struct BlockSchema {
    pub attributes: HashMap<String, AttributeSchema>,
    pub max_items: Option<usize>,
}

impl BlockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

/// Whether a schema describes a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaKind {
    #[default]
    Resource,
    DataSource,
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub kind: SchemaKind,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            kind: SchemaKind::Resource,
        }
    }

    /// New data source schema
    pub fn data_source(resource_type: impl Into<String>) -> Self {
        Self {
            kind: SchemaKind::DataSource,
            ..Self::new(resource_type)
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn is_data_source(&self) -> bool {
        self.kind == SchemaKind::DataSource
    }

    /// Validate resource attributes, collecting every error
    ///
    /// Errors inside blocks name the attribute by dotted path,
    /// e.g. `config.0.params.0.client_secret`.
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();
        validate_attributes(&self.attributes, attributes, "", &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Copy of `attributes` with sensitive values masked at any depth
    pub fn redact(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        redact_attributes(&self.attributes, attributes)
    }

    /// Names of attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> Vec<&str> {
        self.attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Fill in defaults for attributes the user left unset, including inside blocks
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_defaults_to(&self.attributes, attributes);
    }

    /// Write-only values in `attributes`, keeping the blocks that enclose them
    pub fn write_only_values(&self, attributes: &HashMap<String, Value>) -> HashMap<String, Value> {
        write_only_values(&self.attributes, attributes)
    }

    /// Restore write-only values from `prior` into a state just read from the API.
    ///
    /// Everything else comes from the read, so remote drift stays visible.
    pub fn restore_write_only(&self, fresh: &mut State, prior: &State) {
        let kept = State::existing(prior.id.clone(), self.write_only_values(&prior.attributes));
        fresh.carry_forward(&kept);
    }
}

fn write_only_values(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    attributes
        .iter()
        .filter_map(|(name, value)| {
            let schema = schemas.get(name)?;
            if schema.write_only {
                return Some((name.clone(), value.clone()));
            }
            let (AttributeType::Block(block), Value::List(items)) = (&schema.attr_type, value) else {
                return None;
            };
            let kept: Vec<Value> = items
                .iter()
                .map(|item| match item {
                    Value::Map(inner) => Value::Map(write_only_values(&block.attributes, inner)),
                    _ => Value::Map(HashMap::new()),
                })
                .collect();
            kept.iter()
                .any(|item| matches!(item, Value::Map(m) if !m.is_empty()))
                .then(|| (name.clone(), Value::List(kept)))
        })
        .collect()
}

fn apply_defaults_to(schemas: &HashMap<String, AttributeSchema>, attributes: &mut HashMap<String, Value>) {
    for (name, schema) in schemas {
        match attributes.get_mut(name) {
            None => {
                if let Some(default) = &schema.default {
                    attributes.insert(name.clone(), default.clone());
                }
            }
            Some(Value::List(items)) => {
                if let AttributeType::Block(block) = &schema.attr_type {
                    for item in items.iter_mut() {
                        if let Value::Map(inner) = item {
                            apply_defaults_to(&block.attributes, inner);
                        }
                    }
                }
            }
            Some(_) => {}
        }
    }
}

fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
    prefix: &str,
    errors: &mut Vec<TypeError>,
) {
    let path = |name: &str| format!("{}{}", prefix, name);

    let mut required: Vec<&String> = schemas
        .iter()
        .filter(|(name, schema)| {
            schema.required && schema.default.is_none() && !attributes.contains_key(*name)
        })
        .map(|(name, _)| name)
        .collect();
    required.sort();
    for name in required {
        errors.push(TypeError::MissingRequired { name: path(name) });
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();
    for name in names {
        let value = &attributes[name];
        let Some(schema) = schemas.get(name) else {
            errors.push(TypeError::UnknownAttribute { name: path(name) });
            continue;
        };
        if schema.is_read_only() {
            errors.push(TypeError::ReadOnly { name: path(name) });
            continue;
        }
        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(TypeError::AttributeError {
                name: path(name),
                inner: Box::new(e),
            });
            continue;
        }
        if let (AttributeType::Block(block), Value::List(items)) = (&schema.attr_type, value) {
            for (i, item) in items.iter().enumerate() {
                if let Value::Map(inner) = item {
                    let prefix = format!("{}.{}.", path(name), i);
                    validate_attributes(&block.attributes, inner, &prefix, errors);
                }
            }
        }
    }
}

fn redact_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    attributes
        .iter()
        .map(|(name, value)| {
            let redacted = match schemas.get(name) {
                Some(schema) if schema.sensitive => {
                    Value::String(SENSITIVE_PLACEHOLDER.to_string())
                }
                Some(AttributeSchema {
                    attr_type: AttributeType::Block(block),
                    ..
                }) => match value {
                    Value::List(items) => Value::List(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::Map(inner) => {
                                    Value::Map(redact_attributes(&block.attributes, inner))
                                }
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                },
                _ => value.clone(),
            };
            (name.clone(), redacted)
        })
        .collect()
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;

    static CRN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^crn:v1:[^:]+:[^:]+:[^:]+:[^:]*:[^:]*:[^:]*:[^:]*:[^:]*$")
            .expect("valid CRN regex")
    });

    static URL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid URL regex"));

    /// Integer that is zero or greater
    pub fn non_negative_int() -> AttributeType {
        AttributeType::Custom {
            name: "NonNegativeInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n < 0 => Err("Value must not be negative".to_string()),
                _ => Ok(()),
            },
        }
    }

    /// HTTP(S) URL
    pub fn url() -> AttributeType {
        AttributeType::Custom {
            name: "Url".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if !URL_RE.is_match(s) => {
                    Err(format!("Invalid URL '{}': expected http(s)://...", s))
                }
                _ => Ok(()),
            },
        }
    }

    /// IBM Cloud resource name (e.g., "crn:v1:bluemix:public:toolchain:us-south:a/123::tool:abc")
    pub fn crn() -> AttributeType {
        AttributeType::Custom {
            name: "Crn".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if !CRN_RE.is_match(s) => Err(format!("Invalid CRN '{}'", s)),
                _ => Ok(()),
            },
        }
    }
}
