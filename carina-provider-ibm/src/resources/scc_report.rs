//! Security and Compliance Center report violation drift

use std::collections::HashMap;

use carina_core::provider::ProviderResult;
use carina_core::resource::{Resource, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, BlockSchema, ResourceSchema, types};

use crate::client::scc::{ComplianceStats, ReportViolationDrift, ViolationDataPoint};
use crate::flex::{insert_opt_str, required_str};
use crate::provider::IbmProvider;

pub const DATA_SOURCE_TYPE: &str = "scc_report_violation_drift";

fn controls_block() -> BlockSchema {
    let count = |name: &str| AttributeSchema::new(name, AttributeType::Int).computed();
    BlockSchema::new()
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_description("Allowed values: compliant, not_compliant, unable_to_perform, user_evaluation_required"),
        )
        .attribute(count("total_count"))
        .attribute(count("compliant_count"))
        .attribute(count("not_compliant_count"))
        .attribute(count("unable_to_perform_count"))
        .attribute(count("user_evaluation_required_count"))
}

pub fn data_source_schema() -> ResourceSchema {
    let data_point = BlockSchema::new()
        .attribute(AttributeSchema::new("report_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("report_group_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("scan_time", AttributeType::String)
                .computed()
                .with_description("Date and time the scan was run"),
        )
        .attribute(AttributeSchema::block("controls", controls_block()).computed());

    ResourceSchema::data_source(DATA_SOURCE_TYPE)
        .with_description("Compliance drift of a report over time")
        .attribute(
            AttributeSchema::new("instance_id", AttributeType::String)
                .required()
                .with_description("ID of the Security and Compliance Center instance"),
        )
        .attribute(
            AttributeSchema::new("report_id", AttributeType::String)
                .required()
                .with_description("ID of the scan associated with the report"),
        )
        .attribute(
            AttributeSchema::new("scan_time_duration", types::non_negative_int())
                .with_description("Number of days of drift to return; 0 means the full history"),
        )
        .attribute(
            AttributeSchema::new("home_account_id", AttributeType::String)
                .computed()
                .with_description("ID of the home account"),
        )
        .attribute(AttributeSchema::block("data_points", data_point).computed())
}

fn flatten_controls(controls: &ComplianceStats) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    insert_opt_str(&mut attrs, "status", controls.status.as_deref());
    for (key, count) in [
        ("total_count", controls.total_count),
        ("compliant_count", controls.compliant_count),
        ("not_compliant_count", controls.not_compliant_count),
        ("unable_to_perform_count", controls.unable_to_perform_count),
        (
            "user_evaluation_required_count",
            controls.user_evaluation_required_count,
        ),
    ] {
        if let Some(n) = count {
            attrs.insert(key.to_string(), Value::Int(n));
        }
    }
    attrs
}

fn flatten_data_point(point: &ViolationDataPoint) -> Value {
    let mut attrs = HashMap::new();
    insert_opt_str(&mut attrs, "report_id", point.report_id.as_deref());
    insert_opt_str(&mut attrs, "report_group_id", point.report_group_id.as_deref());
    insert_opt_str(&mut attrs, "scan_time", point.scan_time.as_deref());
    if let Some(controls) = &point.controls {
        attrs.insert("controls".to_string(), Value::block(flatten_controls(controls)));
    }
    Value::Map(attrs)
}

fn flatten_drift(inputs: &HashMap<String, Value>, drift: &ReportViolationDrift) -> HashMap<String, Value> {
    let mut attrs = inputs.clone();
    insert_opt_str(&mut attrs, "home_account_id", drift.home_account_id.as_deref());
    attrs.insert(
        "data_points".to_string(),
        Value::List(drift.data_points.iter().map(flatten_data_point).collect()),
    );
    attrs
}

impl IbmProvider {
    pub(crate) async fn read_scc_report_violation_drift(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let instance_id = required_str(&resource.attributes, "instance_id", id)?;
        let report_id = required_str(&resource.attributes, "report_id", id)?;
        let scan_time_duration = resource
            .attributes
            .get("scan_time_duration")
            .and_then(Value::as_int);

        let drift = self
            .client
            .scc
            .get_report_violation_drift(instance_id, report_id, scan_time_duration)
            .await
            .map_err(|e| e.for_resource(id))?;

        Ok(State::existing(id.clone(), flatten_drift(&resource.attributes, &drift))
            .with_identifier(report_id))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::client::testing::mock_server;
    use crate::config::IbmConfig;

    fn drift_source(duration: Option<i64>) -> Resource {
        let resource = Resource::data_source(DATA_SOURCE_TYPE, "drift")
            .with_attribute("instance_id", Value::string("inst-1"))
            .with_attribute("report_id", Value::string("rep-1"));
        match duration {
            Some(d) => resource.with_attribute("scan_time_duration", Value::Int(d)),
            None => resource,
        }
    }

    #[tokio::test]
    async fn reads_data_points_with_controls() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/instances/inst-1/v3/reports/rep-1/violation_drift"))
            .and(query_param("scan_time_duration", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "home_account_id": "acct-1",
                "report_id": "rep-1",
                "data_points": [
                    {
                        "report_id": "rep-0",
                        "report_group_id": "grp-1",
                        "scan_time": "2024-04-30T00:00:00Z",
                        "controls": {
                            "status": "not_compliant",
                            "total_count": 150,
                            "compliant_count": 130,
                            "not_compliant_count": 5,
                            "unable_to_perform_count": 5,
                            "user_evaluation_required_count": 10
                        }
                    },
                    {"report_id": "rep-1", "scan_time": "2024-05-01T00:00:00Z"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = IbmProvider::new(&IbmConfig::for_endpoint("key", &server.uri())).unwrap();
        let state = provider
            .read_scc_report_violation_drift(&drift_source(Some(0)))
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("rep-1"));
        assert_eq!(state.lookup("home_account_id"), Some(Value::string("acct-1")));
        assert_eq!(state.lookup("data_points.#"), Some(Value::Int(2)));
        assert_eq!(
            state.lookup("data_points.0.controls.0.status"),
            Some(Value::string("not_compliant"))
        );
        assert_eq!(
            state.lookup("data_points.0.controls.0.total_count"),
            Some(Value::Int(150))
        );
        assert_eq!(state.lookup("data_points.1.controls"), None);
        assert_eq!(state.lookup("scan_time_duration"), Some(Value::Int(0)));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let schema = data_source_schema();
        assert!(schema.validate(&drift_source(None).attributes).is_ok());
        assert!(schema.validate(&drift_source(Some(-1)).attributes).is_err());
    }

    #[tokio::test]
    async fn missing_report_is_an_error() {
        let server = mock_server().await;
        let provider = IbmProvider::new(&IbmConfig::for_endpoint("key", &server.uri())).unwrap();
        let err = provider
            .read_scc_report_violation_drift(&drift_source(None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.resource_id.map(|id| id.name), Some("drift".to_string()));
    }
}
