//! IBM Cloud provider implementation
//!
//! Routes each operation to the handler for its resource type. Handlers live
//! next to their schemas in `resources`.

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State};

use crate::client::IbmClient;
use crate::config::IbmConfig;
use crate::error::IbmError;
use crate::resources::en_destination::kind_for;
use crate::resources::{cd_toolchain_tool, is_lbs, scc_report};

/// IBM Cloud Provider
pub struct IbmProvider {
    pub(crate) client: IbmClient,
    region: String,
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type)).for_resource(id.clone())
}

impl IbmProvider {
    pub fn new(config: &IbmConfig) -> Result<Self, IbmError> {
        Ok(Self {
            client: IbmClient::new(config)?,
            region: config.region.clone(),
        })
    }

    /// Create a provider from `IC_API_KEY` and related environment variables
    pub fn from_env() -> Result<Self, IbmError> {
        Self::new(&IbmConfig::from_env()?)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn client(&self) -> &IbmClient {
        &self.client
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    pub async fn read_resource(&self, id: &ResourceId, identifier: Option<&str>) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            cd_toolchain_tool::RESOURCE_TYPE => self.read_githubconsolidated(id, identifier).await,
            other => match kind_for(other) {
                Some(kind) => self.read_en_destination(kind, id, identifier).await,
                None => Err(unknown_type(id)),
            },
        }
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            cd_toolchain_tool::RESOURCE_TYPE => self.create_githubconsolidated(resource).await,
            other => match kind_for(other) {
                Some(kind) => self.create_en_destination(kind, resource).await,
                None => Err(unknown_type(&resource.id)),
            },
        }
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            cd_toolchain_tool::RESOURCE_TYPE => {
                self.update_githubconsolidated(id, identifier, from, to).await
            }
            other => match kind_for(other) {
                Some(kind) => self.update_en_destination(kind, id, identifier, from, to).await,
                None => Err(unknown_type(id)),
            },
        }
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            cd_toolchain_tool::RESOURCE_TYPE => self.delete_githubconsolidated(id, identifier).await,
            other => match kind_for(other) {
                Some(_) => self.delete_en_destination(id, identifier).await,
                None => Err(unknown_type(id)),
            },
        }
    }

    // =========================================================================
    // Data Sources
    // =========================================================================

    pub async fn read_data_source_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            scc_report::DATA_SOURCE_TYPE => self.read_scc_report_violation_drift(resource).await,
            is_lbs::DATA_SOURCE_TYPE => self.read_is_lbs(resource).await,
            other => match kind_for(other) {
                Some(kind) => self.read_en_destination_data_source(kind, resource).await,
                None => Err(unknown_type(&resource.id)),
            },
        }
    }
}
