//! JSON manifest: provider settings plus the resources and data sources to manage

use std::collections::HashSet;
use std::path::Path;

use carina_core::binding::sort_by_dependencies;
use carina_core::resource::{Resource, Value};
use carina_provider_ibm::ConfigOverrides;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Overrides for `IC_*` / `IBMCLOUD_*` environment settings
    #[serde(default)]
    pub provider: ConfigOverrides,
    #[serde(default)]
    pub resources: Vec<Declaration>,
    #[serde(default)]
    pub data: Vec<Declaration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Declaration {
    fn to_resource(&self, data_source: bool) -> Resource {
        let mut resource = Resource::new(&self.resource_type, &self.name).with_read_only(data_source);
        resource.attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect();
        resource
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        let mut seen = HashSet::new();
        for decl in manifest.data.iter().chain(&manifest.resources) {
            if !seen.insert(decl.name.as_str()) {
                return Err(format!("Duplicate binding name '{}'", decl.name));
            }
        }
        Ok(manifest)
    }

    /// Data sources and managed resources, ordered so references come first
    pub fn resources(&self) -> Result<Vec<Resource>, String> {
        let declared: Vec<Resource> = self
            .data
            .iter()
            .map(|d| d.to_resource(true))
            .chain(self.resources.iter().map(|d| d.to_resource(false)))
            .collect();
        sort_by_dependencies(&declared)
            .map_err(|cycle| format!("Circular references between: {}", cycle.join(", ")))
    }
}
