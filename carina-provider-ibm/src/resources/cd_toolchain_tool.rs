//! GitHub tool integration in a Continuous Delivery toolchain

use std::collections::HashMap;

use carina_core::provider::ProviderResult;
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};
use log::{debug, warn};

use crate::client::cd_toolchain::{ToolRequest, ToolchainTool};
use crate::flex::{
    build_id, first_block, get_str, has_changes, insert_opt_str, json_object_to_map,
    map_to_json_object, required_str, sep_id_parts,
};
use crate::provider::IbmProvider;

pub const RESOURCE_TYPE: &str = "cd_toolchain_tool_githubconsolidated";
pub const TOOL_TYPE_ID: &str = "githubconsolidated";

/// Parameters the service accepts but never returns
const WRITE_ONLY_PARAMETERS: &[&str] = &["api_token"];

fn initialization_block() -> BlockSchema {
    let string = |name: &str, description: &str| {
        AttributeSchema::new(name, AttributeType::String).with_description(description)
    };
    BlockSchema::new()
        .max_items(1)
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(
                    ["new", "fork", "clone", "link"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
            )
            .required()
            .with_description("How the repository is set up: new, fork, clone or link"),
        )
        .attribute(
            AttributeSchema::new("repo_url", types::url())
                .with_description("URL of the repository to link, or of the new repository"),
        )
        .attribute(
            AttributeSchema::new("source_repo_url", types::url())
                .with_description("URL of the repository to fork or clone"),
        )
        .attribute(string("repo_name", "Name of the new GitHub repository"))
        .attribute(string("owner_id", "GitHub user or organization owning the repository"))
        .attribute(
            AttributeSchema::new("private_repo", AttributeType::Bool)
                .with_description("Make the new repository private"),
        )
        .attribute(string("git_id", "Server type: github or integrated"))
        .attribute(string("title", "Title of the server"))
        .attribute(
            AttributeSchema::new("root_url", types::url())
                .with_description("Root URL of the server"),
        )
        .attribute(
            AttributeSchema::new("blind_connection", AttributeType::Bool)
                .with_description("Server is not reachable from the public internet"),
        )
}

fn parameters_block() -> BlockSchema {
    let string = |name: &str| AttributeSchema::new(name, AttributeType::String);
    let boolean = |name: &str| AttributeSchema::new(name, AttributeType::Bool);
    let mut block = BlockSchema::new()
        .max_items(1)
        .attribute(string("git_id"))
        .attribute(string("title"))
        .attribute(AttributeSchema::new("api_root_url", types::url()))
        .attribute(string("default_branch"))
        .attribute(AttributeSchema::new("root_url", types::url()))
        .attribute(boolean("blind_connection"))
        .attribute(string("owner_id"))
        .attribute(string("repo_name"))
        .attribute(AttributeSchema::new("repo_url", types::url()))
        .attribute(AttributeSchema::new("source_repo_url", types::url()))
        .attribute(AttributeSchema::new("token_url", types::url()))
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(
                    ["new", "fork", "clone", "link"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
            ),
        )
        .attribute(boolean("private_repo"))
        .attribute(
            AttributeSchema::new(
                "auth_type",
                AttributeType::Enum(vec!["oauth".to_string(), "pat".to_string()]),
            )
            .with_description("Authentication: oauth or personal access token"),
        )
        .attribute(
            string("api_token")
                .sensitive()
                .with_description("Personal access token"),
        )
        .attribute(boolean("toolchain_issues_enabled"))
        .attribute(boolean("enable_traceability"))
        .attribute(boolean("integration_owner"));
    for name in WRITE_ONLY_PARAMETERS {
        if let Some(attr) = block.attributes.get_mut(*name) {
            attr.write_only = true;
        }
    }
    block
}

pub fn resource_schema() -> ResourceSchema {
    let computed_string = |name: &str, description: &str| {
        AttributeSchema::new(name, AttributeType::String)
            .computed()
            .with_description(description)
    };
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("GitHub tool integration in a toolchain")
        .attribute(
            AttributeSchema::new("toolchain_id", AttributeType::String)
                .required()
                .force_new()
                .with_description("ID of the toolchain to bind the tool to"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .with_description("Name of the tool"),
        )
        .attribute(
            AttributeSchema::block("initialization", initialization_block())
                .required()
                .force_new()
                .write_only(),
        )
        .attribute(AttributeSchema::block("parameters", parameters_block()).required())
        .attribute(computed_string("tool_id", "Tool ID"))
        .attribute(computed_string("resource_group_id", "Resource group of the tool"))
        .attribute(AttributeSchema::new("crn", types::crn()).computed())
        .attribute(computed_string("toolchain_crn", "CRN of the toolchain"))
        .attribute(computed_string("href", "URI of the tool"))
        .attribute(
            AttributeSchema::block(
                "referent",
                BlockSchema::new()
                    .attribute(AttributeSchema::new("ui_href", AttributeType::String).computed())
                    .attribute(AttributeSchema::new("api_href", AttributeType::String).computed()),
            )
            .computed(),
        )
        .attribute(computed_string("updated_at", "Last modification time"))
        .attribute(computed_string("state", "Current configuration state of the tool"))
}

/// `parameters.0` with `initialization.0` folded in, as the create call expects
fn create_parameters(attributes: &HashMap<String, Value>) -> serde_json::Map<String, serde_json::Value> {
    let mut parameters = first_block(attributes, "parameters")
        .map(map_to_json_object)
        .unwrap_or_default();
    if let Some(initialization) = first_block(attributes, "initialization") {
        parameters.extend(map_to_json_object(initialization));
    }
    parameters
}

fn flatten_tool(toolchain_id: &str, tool: &ToolchainTool) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    attrs.insert("toolchain_id".to_string(), Value::string(toolchain_id));
    attrs.insert("tool_id".to_string(), Value::string(&tool.id));
    insert_opt_str(&mut attrs, "name", tool.name.as_deref());
    insert_opt_str(&mut attrs, "resource_group_id", tool.resource_group_id.as_deref());
    insert_opt_str(&mut attrs, "crn", tool.crn.as_deref());
    insert_opt_str(&mut attrs, "toolchain_crn", tool.toolchain_crn.as_deref());
    insert_opt_str(&mut attrs, "href", tool.href.as_deref());
    insert_opt_str(&mut attrs, "updated_at", tool.updated_at.as_deref());
    insert_opt_str(&mut attrs, "state", tool.state.as_deref());

    if let Some(referent) = &tool.referent {
        let mut referent_attrs = HashMap::new();
        insert_opt_str(&mut referent_attrs, "ui_href", referent.ui_href.as_deref());
        insert_opt_str(&mut referent_attrs, "api_href", referent.api_href.as_deref());
        attrs.insert("referent".to_string(), Value::block(referent_attrs));
    }

    let mut parameters = json_object_to_map(&tool.parameters);
    for key in WRITE_ONLY_PARAMETERS {
        parameters.remove(*key);
    }
    attrs.insert("parameters".to_string(), Value::block(parameters));

    attrs
}

impl IbmProvider {
    pub(crate) async fn create_githubconsolidated(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let toolchain_id = required_str(&resource.attributes, "toolchain_id", id)?;

        let request = ToolRequest {
            tool_type_id: TOOL_TYPE_ID.to_string(),
            name: get_str(&resource.attributes, "name").map(str::to_string),
            parameters: Some(create_parameters(&resource.attributes)),
        };
        let tool = self
            .client
            .toolchain
            .create_tool(toolchain_id, &request)
            .await
            .map_err(|e| e.for_resource(id))?;
        debug!("created tool {} in toolchain {}", tool.id, toolchain_id);

        let identifier = build_id(toolchain_id, &tool.id);
        self.read_githubconsolidated(id, Some(&identifier)).await
    }

    pub(crate) async fn read_githubconsolidated(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let (toolchain_id, tool_id) = sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;

        match self.client.toolchain.get_tool(toolchain_id, tool_id).await {
            Ok(tool) => Ok(State::existing(id.clone(), flatten_tool(toolchain_id, &tool))
                .with_identifier(identifier)),
            Err(e) if e.is_not_found() => {
                warn!("{} {} no longer exists, removing from state", id, identifier);
                Ok(State::not_found(id.clone()))
            }
            Err(e) => Err(e.for_resource(id)),
        }
    }

    pub(crate) async fn update_githubconsolidated(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (toolchain_id, tool_id) = sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;

        let mut request = ToolRequest {
            tool_type_id: TOOL_TYPE_ID.to_string(),
            ..Default::default()
        };
        if has_changes(from, to, &["name"]) {
            request.name = get_str(&to.attributes, "name").map(str::to_string);
        }
        if has_changes(from, to, &["parameters"]) {
            request.parameters = first_block(&to.attributes, "parameters").map(map_to_json_object);
        }

        if request.name.is_some() || request.parameters.is_some() {
            self.client
                .toolchain
                .update_tool(toolchain_id, tool_id, &request)
                .await
                .map_err(|e| e.for_resource(id))?;
        }

        self.read_githubconsolidated(id, Some(identifier)).await
    }

    pub(crate) async fn delete_githubconsolidated(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (toolchain_id, tool_id) = sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;
        match self.client.toolchain.delete_tool(toolchain_id, tool_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.for_resource(id)),
        }
    }
}
