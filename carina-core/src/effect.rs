//! Effect - A single side effect described as a value
//!
//! Effects are produced by the differ and executed by the interpreter.

use std::fmt;

use crate::resource::{Resource, ResourceId, State};

/// A side effect to be performed against a Provider
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read a data source
    Read(Resource),
    /// Create a resource
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete and recreate a resource (a force-new attribute changed)
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource by its provider identifier
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    /// Whether this Effect changes infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    /// Resource targeted by this Effect
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(r) | Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => {
                id
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Read(r) => write!(f, "read {}", r.id),
            Effect::Create(r) => write!(f, "create {}", r.id),
            Effect::Update {
                id,
                changed_attributes,
                ..
            } => write!(f, "update {} ({})", id, changed_attributes.join(", ")),
            Effect::Replace {
                id,
                changed_attributes,
                ..
            } => write!(f, "replace {} ({})", id, changed_attributes.join(", ")),
            Effect::Delete { id, .. } => write!(f, "delete {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_not_mutating() {
        let read = Effect::Read(Resource::data_source("is_lbs", "all"));
        assert!(!read.is_mutating());
        assert_eq!(read.to_string(), "read is_lbs.all");

        let delete = Effect::Delete {
            id: ResourceId::new("en_destination_huawei", "push"),
            identifier: "guid/dest".to_string(),
        };
        assert!(delete.is_mutating());
        assert_eq!(delete.resource_id().name, "push");
    }
}
