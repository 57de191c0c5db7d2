//! Event Notifications destinations API

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::Result;

/// Destination as returned by the service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub destination_type: String,
    pub config: Option<DestinationConfig>,
    pub updated_at: Option<String>,
    pub created_at: Option<String>,
    pub subscription_count: Option<i64>,
    pub subscription_names: Vec<String>,
}

/// Type-specific destination parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Body of create and update calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DestinationRequest {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<DestinationConfig>,
}

pub struct EventNotificationsClient {
    api: ApiClient,
}

impl EventNotificationsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn destinations_path(instance_id: &str) -> String {
        format!("/v1/instances/{}/destinations", instance_id)
    }

    pub async fn create_destination(
        &self,
        instance_id: &str,
        request: &DestinationRequest,
    ) -> Result<Destination> {
        self.api
            .post(&Self::destinations_path(instance_id), request)
            .await
    }

    pub async fn get_destination(&self, instance_id: &str, id: &str) -> Result<Destination> {
        self.api
            .get(&format!("{}/{}", Self::destinations_path(instance_id), id), &[])
            .await
    }

    pub async fn update_destination(
        &self,
        instance_id: &str,
        id: &str,
        request: &DestinationRequest,
    ) -> Result<Destination> {
        self.api
            .patch(
                &format!("{}/{}", Self::destinations_path(instance_id), id),
                request,
                None,
            )
            .await
    }

    pub async fn delete_destination(&self, instance_id: &str, id: &str) -> Result<()> {
        self.api
            .delete(&format!("{}/{}", Self::destinations_path(instance_id), id))
            .await
    }
}
