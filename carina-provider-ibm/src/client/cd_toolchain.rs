//! Continuous Delivery toolchain tools API

use serde::{Deserialize, Serialize};

use super::{ApiClient, MERGE_PATCH};
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolchainTool {
    pub id: String,
    pub resource_group_id: Option<String>,
    pub crn: Option<String>,
    pub tool_type_id: Option<String>,
    pub toolchain_id: String,
    pub toolchain_crn: Option<String>,
    pub href: Option<String>,
    pub referent: Option<ToolReferent>,
    pub name: Option<String>,
    pub updated_at: Option<String>,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolReferent {
    pub ui_href: Option<String>,
    pub api_href: Option<String>,
}

/// Body of create (POST) and update (merge-patch) calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolRequest {
    pub tool_type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

pub struct CdToolchainClient {
    api: ApiClient,
}

impl CdToolchainClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn create_tool(&self, toolchain_id: &str, request: &ToolRequest) -> Result<ToolchainTool> {
        self.api
            .post(&format!("/toolchains/{}/tools", toolchain_id), request)
            .await
    }

    pub async fn get_tool(&self, toolchain_id: &str, tool_id: &str) -> Result<ToolchainTool> {
        self.api
            .get(&format!("/toolchains/{}/tools/{}", toolchain_id, tool_id), &[])
            .await
    }

    pub async fn update_tool(
        &self,
        toolchain_id: &str,
        tool_id: &str,
        request: &ToolRequest,
    ) -> Result<ToolchainTool> {
        self.api
            .patch(
                &format!("/toolchains/{}/tools/{}", toolchain_id, tool_id),
                request,
                Some(MERGE_PATCH),
            )
            .await
    }

    pub async fn delete_tool(&self, toolchain_id: &str, tool_id: &str) -> Result<()> {
        self.api
            .delete(&format!("/toolchains/{}/tools/{}", toolchain_id, tool_id))
            .await
    }
}
