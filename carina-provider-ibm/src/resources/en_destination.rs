//! Event Notifications destinations (ServiceNow, Huawei push)
//!
//! Both destination types share one handler; they differ only in the
//! destination `type` and the parameters inside `config.0.params.0`.

use std::collections::HashMap;

use carina_core::provider::ProviderResult;
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};
use log::{debug, warn};

use crate::client::event_notifications::{Destination, DestinationConfig, DestinationRequest};
use crate::flex::{
    build_id, first_block, get_str, has_changes, insert_opt_str, json_to_value, map_to_json_object,
    required_str, sep_id_parts, string_list,
};
use crate::provider::IbmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Bool,
}

/// One entry of `config.0.params.0`
#[derive(Debug)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub sensitive: bool,
    /// Never returned by the service
    pub write_only: bool,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct DestinationKind {
    pub resource_type: &'static str,
    pub destination_type: &'static str,
    pub params: &'static [Param],
}

const fn string_param(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind: ParamKind::String,
        required: false,
        sensitive: false,
        write_only: false,
        description,
    }
}

pub static SERVICENOW: DestinationKind = DestinationKind {
    resource_type: "en_destination_servicenow",
    destination_type: "servicenow",
    params: &[
        Param {
            sensitive: true,
            ..string_param("client_id", "ClientID for the ServiceNow account OAuth")
        },
        Param {
            sensitive: true,
            write_only: true,
            ..string_param("client_secret", "ClientSecret for the ServiceNow account OAuth")
        },
        string_param("username", "Username for the ServiceNow account REST API"),
        Param {
            sensitive: true,
            write_only: true,
            ..string_param("password", "Password for the ServiceNow account REST API")
        },
        Param {
            sensitive: true,
            ..string_param("instance_name", "Instance name of the ServiceNow account")
        },
    ],
};

pub static HUAWEI: DestinationKind = DestinationKind {
    resource_type: "en_destination_huawei",
    destination_type: "push_huawei",
    params: &[
        Param {
            required: true,
            sensitive: true,
            ..string_param("client_id", "ClientID for the Huawei account")
        },
        Param {
            required: true,
            sensitive: true,
            write_only: true,
            ..string_param("client_secret", "ClientSecret for the Huawei account")
        },
        Param {
            kind: ParamKind::Bool,
            ..string_param("pre_prod", "Send notifications to the pre-production environment")
        },
    ],
};

pub fn kind_for(resource_type: &str) -> Option<&'static DestinationKind> {
    [&SERVICENOW, &HUAWEI]
        .into_iter()
        .find(|k| k.resource_type == resource_type)
}

fn params_block(kind: &DestinationKind, computed: bool) -> BlockSchema {
    kind.params.iter().fold(BlockSchema::new().max_items(1), |block, p| {
        let attr_type = match p.kind {
            ParamKind::String => AttributeType::String,
            ParamKind::Bool => AttributeType::Bool,
        };
        let mut attr = AttributeSchema::new(p.name, attr_type).with_description(p.description);
        if computed {
            attr = attr.computed();
        } else if p.required {
            attr = attr.required();
        }
        if p.sensitive {
            attr = attr.sensitive();
        }
        if p.write_only && !computed {
            attr = attr.write_only();
        }
        if p.kind == ParamKind::Bool && !computed {
            attr = attr.with_default(Value::Bool(false));
        }
        block.attribute(attr)
    })
}

fn config_block(kind: &DestinationKind, computed: bool) -> AttributeSchema {
    let config = BlockSchema::new()
        .max_items(1)
        .attribute(AttributeSchema::block("params", params_block(kind, computed)));
    let attr = AttributeSchema::block("config", config)
        .with_description("Payload describing a destination configuration");
    if computed { attr.computed() } else { attr }
}

fn computed_attributes(schema: ResourceSchema) -> ResourceSchema {
    schema
        .attribute(
            AttributeSchema::new("updated_at", AttributeType::String)
                .computed()
                .with_description("Last updated time"),
        )
        .attribute(
            AttributeSchema::new("subscription_count", AttributeType::Int)
                .computed()
                .with_description("Number of subscriptions"),
        )
        .attribute(
            AttributeSchema::new(
                "subscription_names",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed()
            .with_description("List of subscriptions"),
        )
}

pub fn resource_schema(kind: &DestinationKind) -> ResourceSchema {
    let schema = ResourceSchema::new(kind.resource_type)
        .with_description(format!("Event Notifications {} destination", kind.destination_type))
        .attribute(
            AttributeSchema::new("instance_guid", AttributeType::String)
                .required()
                .force_new()
                .with_description("Unique identifier for IBM Cloud Event Notifications instance"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_description("The destination name"),
        )
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec![kind.destination_type.to_string()]),
            )
            .required()
            .with_description("The type of destination"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_description("The destination description"),
        )
        .attribute(config_block(kind, false))
        .attribute(
            AttributeSchema::new("destination_id", AttributeType::String)
                .computed()
                .with_description("Destination ID"),
        );
    computed_attributes(schema)
}

pub fn data_source_schema(kind: &DestinationKind) -> ResourceSchema {
    let schema = ResourceSchema::data_source(kind.resource_type)
        .with_description(format!("Reads an Event Notifications {} destination", kind.destination_type))
        .attribute(AttributeSchema::new("instance_guid", AttributeType::String).required())
        .attribute(AttributeSchema::new("destination_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("description", AttributeType::String).computed())
        .attribute(config_block(kind, true));
    computed_attributes(schema)
}

/// Build the create/update body from configuration
fn destination_request(kind: &DestinationKind, attributes: &HashMap<String, Value>, name: &str) -> DestinationRequest {
    let config = first_block(attributes, "config").map(|config| {
        let params = first_block(config, "params")
            .map(|params| {
                let known: HashMap<String, Value> = params
                    .iter()
                    .filter(|(k, _)| kind.params.iter().any(|p| p.name == k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                map_to_json_object(&known)
            })
            .unwrap_or_default();
        DestinationConfig { params }
    });

    DestinationRequest {
        name: name.to_string(),
        destination_type: None,
        description: get_str(attributes, "description").map(str::to_string),
        config,
    }
}

/// Map a destination into state attributes; write-only parameters are left out
fn flatten_destination(
    kind: &DestinationKind,
    instance_id: &str,
    destination: &Destination,
) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    attrs.insert("instance_guid".to_string(), Value::string(instance_id));
    attrs.insert("destination_id".to_string(), Value::string(&destination.id));
    attrs.insert("name".to_string(), Value::string(&destination.name));
    attrs.insert(
        "type".to_string(),
        Value::string(&destination.destination_type),
    );
    insert_opt_str(&mut attrs, "description", destination.description.as_deref());
    insert_opt_str(&mut attrs, "updated_at", destination.updated_at.as_deref());
    if let Some(count) = destination.subscription_count {
        attrs.insert("subscription_count".to_string(), Value::Int(count));
    }
    attrs.insert(
        "subscription_names".to_string(),
        string_list(&destination.subscription_names),
    );

    if let Some(config) = &destination.config {
        let params: HashMap<String, Value> = kind
            .params
            .iter()
            .filter(|p| !p.write_only)
            .filter_map(|p| {
                config
                    .params
                    .get(p.name)
                    .and_then(json_to_value)
                    .map(|v| (p.name.to_string(), v))
            })
            .collect();
        let mut config_attrs = HashMap::new();
        config_attrs.insert("params".to_string(), Value::block(params));
        attrs.insert("config".to_string(), Value::block(config_attrs));
    }

    attrs
}

impl IbmProvider {
    pub(crate) async fn create_en_destination(
        &self,
        kind: &DestinationKind,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let instance_id = required_str(&resource.attributes, "instance_guid", id)?;
        let name = required_str(&resource.attributes, "name", id)?;
        let destination_type = required_str(&resource.attributes, "type", id)?;

        let mut request = destination_request(kind, &resource.attributes, name);
        request.destination_type = Some(destination_type.to_string());

        let created = self
            .client
            .event_notifications
            .create_destination(instance_id, &request)
            .await
            .map_err(|e| e.for_resource(id))?;
        debug!("created destination {} in {}", created.id, instance_id);

        let identifier = build_id(instance_id, &created.id);
        self.read_en_destination(kind, id, Some(&identifier)).await
    }

    pub(crate) async fn read_en_destination(
        &self,
        kind: &DestinationKind,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let (instance_id, destination_id) =
            sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;

        match self
            .client
            .event_notifications
            .get_destination(instance_id, destination_id)
            .await
        {
            Ok(destination) => Ok(State::existing(
                id.clone(),
                flatten_destination(kind, instance_id, &destination),
            )
            .with_identifier(identifier)),
            Err(e) if e.is_not_found() => {
                warn!("{} {} no longer exists, removing from state", id, identifier);
                Ok(State::not_found(id.clone()))
            }
            Err(e) => Err(e.for_resource(id)),
        }
    }

    pub(crate) async fn update_en_destination(
        &self,
        kind: &DestinationKind,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let (instance_id, destination_id) =
            sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;

        if has_changes(from, to, &["name", "description", "config"]) {
            let name = required_str(&to.attributes, "name", id)?;
            let request = destination_request(kind, &to.attributes, name);
            self.client
                .event_notifications
                .update_destination(instance_id, destination_id, &request)
                .await
                .map_err(|e| e.for_resource(id))?;
        } else {
            debug!("{}: nothing to send, refreshing only", id);
        }

        self.read_en_destination(kind, id, Some(identifier)).await
    }

    pub(crate) async fn delete_en_destination(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (instance_id, destination_id) =
            sep_id_parts(identifier, "/").map_err(|e| e.for_resource(id))?;
        match self
            .client
            .event_notifications
            .delete_destination(instance_id, destination_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.for_resource(id)),
        }
    }

    pub(crate) async fn read_en_destination_data_source(
        &self,
        kind: &DestinationKind,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let instance_id = required_str(&resource.attributes, "instance_guid", id)?;
        let destination_id = required_str(&resource.attributes, "destination_id", id)?;

        let destination = self
            .client
            .event_notifications
            .get_destination(instance_id, destination_id)
            .await
            .map_err(|e| e.for_resource(id))?;

        Ok(
            State::existing(id.clone(), flatten_destination(kind, instance_id, &destination))
                .with_identifier(build_id(instance_id, destination_id)),
        )
    }
}
