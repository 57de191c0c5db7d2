//! VPC load balancers list

use std::collections::HashMap;

use carina_core::provider::ProviderResult;
use carina_core::resource::{Resource, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema};
use log::debug;

use crate::client::vpc::{LoadBalancer, Reference};
use crate::flex::{insert_opt_str, timestamp_id};
use crate::provider::IbmProvider;

pub const DATA_SOURCE_TYPE: &str = "is_lbs";

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn reference_block() -> BlockSchema {
    BlockSchema::new()
        .attribute(computed("id", AttributeType::String))
        .attribute(computed("name", AttributeType::String))
        .attribute(computed("href", AttributeType::String))
        .attribute(computed("crn", AttributeType::String))
}

fn load_balancer_block() -> BlockSchema {
    let private_ip = BlockSchema::new()
        .attribute(computed("address", AttributeType::String))
        .attribute(computed("href", AttributeType::String))
        .attribute(computed("name", AttributeType::String))
        .attribute(computed("reserved_ip", AttributeType::String))
        .attribute(computed("resource_type", AttributeType::String));

    BlockSchema::new()
        .attribute(computed("id", AttributeType::String))
        .attribute(computed("name", AttributeType::String))
        .attribute(computed("crn", AttributeType::String))
        .attribute(computed("created_at", AttributeType::String))
        .attribute(computed("hostname", AttributeType::String))
        .attribute(computed("type", AttributeType::String).with_description("public or private"))
        .attribute(computed("status", AttributeType::String).with_description("Provisioning status"))
        .attribute(computed("operating_status", AttributeType::String))
        .attribute(computed("route_mode", AttributeType::Bool))
        .attribute(computed("udp_supported", AttributeType::Bool))
        .attribute(computed(
            "profile",
            AttributeType::Map(Box::new(AttributeType::String)),
        ))
        .attribute(computed("resource_group", AttributeType::String))
        .attribute(computed("resource_group_name", AttributeType::String))
        .attribute(AttributeSchema::block("subnets", reference_block()).computed())
        .attribute(AttributeSchema::block("listeners", reference_block()).computed())
        .attribute(AttributeSchema::block("pools", reference_block()).computed())
        .attribute(computed("public_ips", string_list()))
        .attribute(computed("private_ips", string_list()))
        .attribute(AttributeSchema::block("private_ip", private_ip).computed())
        .attribute(computed("security_groups", string_list()))
}

pub fn data_source_schema() -> ResourceSchema {
    ResourceSchema::data_source(DATA_SOURCE_TYPE)
        .with_description("Lists every VPC load balancer in the region")
        .attribute(AttributeSchema::block("load_balancers", load_balancer_block()).computed())
}

fn flatten_reference(reference: &Reference) -> Value {
    let mut attrs = HashMap::new();
    attrs.insert("id".to_string(), Value::string(&reference.id));
    insert_opt_str(&mut attrs, "name", reference.name.as_deref());
    insert_opt_str(&mut attrs, "href", reference.href.as_deref());
    insert_opt_str(&mut attrs, "crn", reference.crn.as_deref());
    Value::Map(attrs)
}

fn flatten_load_balancer(lb: &LoadBalancer) -> Value {
    let mut attrs = HashMap::new();
    attrs.insert("id".to_string(), Value::string(&lb.id));
    attrs.insert("name".to_string(), Value::string(&lb.name));
    attrs.insert("crn".to_string(), Value::string(&lb.crn));
    insert_opt_str(&mut attrs, "created_at", lb.created_at.as_deref());
    insert_opt_str(&mut attrs, "hostname", lb.hostname.as_deref());
    attrs.insert(
        "type".to_string(),
        Value::string(if lb.is_public { "public" } else { "private" }),
    );
    insert_opt_str(&mut attrs, "status", lb.provisioning_status.as_deref());
    insert_opt_str(&mut attrs, "operating_status", lb.operating_status.as_deref());
    attrs.insert("route_mode".to_string(), Value::Bool(lb.route_mode));
    attrs.insert("udp_supported".to_string(), Value::Bool(lb.udp_supported));

    if let Some(profile) = &lb.profile {
        let mut profile_attrs = HashMap::new();
        profile_attrs.insert("name".to_string(), Value::string(&profile.name));
        insert_opt_str(&mut profile_attrs, "family", profile.family.as_deref());
        insert_opt_str(&mut profile_attrs, "href", profile.href.as_deref());
        attrs.insert("profile".to_string(), Value::Map(profile_attrs));
    }
    if let Some(group) = &lb.resource_group {
        attrs.insert("resource_group".to_string(), Value::string(&group.id));
        insert_opt_str(&mut attrs, "resource_group_name", group.name.as_deref());
    }

    let subnets = lb
        .subnets
        .iter()
        .map(|s| {
            flatten_reference(&Reference {
                id: s.id.clone(),
                name: Some(s.name.clone()),
                href: s.href.clone(),
                crn: s.crn.clone(),
            })
        })
        .collect();
    attrs.insert("subnets".to_string(), Value::List(subnets));
    attrs.insert(
        "listeners".to_string(),
        Value::List(lb.listeners.iter().map(flatten_reference).collect()),
    );
    attrs.insert(
        "pools".to_string(),
        Value::List(lb.pools.iter().map(flatten_reference).collect()),
    );

    attrs.insert(
        "public_ips".to_string(),
        Value::List(lb.public_ips.iter().map(|ip| Value::string(&ip.address)).collect()),
    );
    attrs.insert(
        "private_ips".to_string(),
        Value::List(lb.private_ips.iter().map(|ip| Value::string(&ip.address)).collect()),
    );
    let private_ip = lb
        .private_ips
        .iter()
        .map(|ip| {
            let mut ip_attrs = HashMap::new();
            ip_attrs.insert("address".to_string(), Value::string(&ip.address));
            ip_attrs.insert("reserved_ip".to_string(), Value::string(&ip.id));
            insert_opt_str(&mut ip_attrs, "href", ip.href.as_deref());
            insert_opt_str(&mut ip_attrs, "name", ip.name.as_deref());
            insert_opt_str(&mut ip_attrs, "resource_type", ip.resource_type.as_deref());
            Value::Map(ip_attrs)
        })
        .collect();
    attrs.insert("private_ip".to_string(), Value::List(private_ip));

    attrs.insert(
        "security_groups".to_string(),
        Value::List(lb.security_groups.iter().map(|sg| Value::string(&sg.id)).collect()),
    );

    Value::Map(attrs)
}

impl IbmProvider {
    pub(crate) async fn read_is_lbs(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let load_balancers = self
            .client
            .vpc
            .list_load_balancers()
            .await
            .map_err(|e| e.for_resource(id))?;
        debug!("{} found {} load balancers", id, load_balancers.len());

        let mut attrs = HashMap::new();
        attrs.insert(
            "load_balancers".to_string(),
            Value::List(load_balancers.iter().map(flatten_load_balancer).collect()),
        );
        Ok(State::existing(id.clone(), attrs).with_identifier(timestamp_id()))
    }
}
