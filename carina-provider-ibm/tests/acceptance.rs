//! Live acceptance tests against IBM Cloud
//!
//! Run with `CARINA_ACC=1 IC_API_KEY=... cargo test --test acceptance`.
//! Each test also needs the IDs of pre-existing parent objects in the
//! environment and is skipped when they are missing.

use std::collections::HashMap;

use carina_core::acctest::{self, TestCase, TestStep, attr_absent, attr_eq, attr_set};
use carina_core::resource::{Resource, Value};
use carina_provider_ibm::IbmProvider;

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Provider plus required environment values, or None if the test should be skipped
fn setup(keys: &[&str]) -> Option<(IbmProvider, Vec<String>)> {
    if !acctest::enabled() {
        eprintln!("skipping: {} is not set", acctest::ACC_ENV);
        return None;
    }
    let values: Option<Vec<String>> = keys.iter().map(|k| env(k)).collect();
    let Some(values) = values else {
        eprintln!("skipping: one of {} is not set", keys.join(", "));
        return None;
    };
    let provider = IbmProvider::from_env().expect("IC_API_KEY must be set");
    Some((provider, values))
}

fn block(pairs: &[(&str, Value)]) -> Value {
    Value::block(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<HashMap<_, _>>(),
    )
}

fn suffix() -> String {
    chrono::Utc::now().format("%m%d%H%M%S").to_string()
}

fn servicenow(instance: &str, name: &str, description: &str) -> Resource {
    Resource::new("en_destination_servicenow", "sn")
        .with_attribute("instance_guid", Value::string(instance))
        .with_attribute("name", Value::string(name))
        .with_attribute("type", Value::string("servicenow"))
        .with_attribute("description", Value::string(description))
        .with_attribute(
            "config",
            block(&[(
                "params",
                block(&[
                    ("client_id", Value::string(env("SNOW_CLIENT_ID").unwrap_or_default())),
                    ("client_secret", Value::string(env("SNOW_CLIENT_SECRET").unwrap_or_default())),
                    ("username", Value::string(env("SNOW_USERNAME").unwrap_or_default())),
                    ("password", Value::string(env("SNOW_PASSWORD").unwrap_or_default())),
                    ("instance_name", Value::string(env("SNOW_INSTANCE_NAME").unwrap_or_default())),
                ]),
            )]),
        )
}

#[tokio::test]
async fn en_destination_servicenow_basic() {
    let Some((provider, values)) = setup(&["EVENT_NOTIFICATIONS_INSTANCE_ID", "SNOW_CLIENT_ID"]) else {
        return;
    };
    let instance = &values[0];
    let name = format!("carina-snow-{}", suffix());
    let address = "en_destination_servicenow.sn";

    let lookup = Resource::data_source("en_destination_servicenow", "sn_lookup")
        .with_attribute("instance_guid", Value::string(instance))
        .with_attribute("destination_id", Value::ResourceRef("sn".into(), "destination_id".into()));

    TestCase::new(vec![
        TestStep::apply(
            vec![servicenow(instance, &name, "first"), lookup.clone()],
            vec![
                attr_eq(address, "name", Value::string(&name)),
                attr_eq(address, "type", Value::string("servicenow")),
                attr_eq(address, "description", Value::string("first")),
                attr_set(address, "destination_id"),
                attr_set(address, "updated_at"),
                attr_eq("data.en_destination_servicenow.sn_lookup", "name", Value::string(&name)),
            ],
        ),
        TestStep::apply(
            vec![servicenow(instance, &format!("{}-u", name), "second"), lookup],
            vec![
                attr_eq(address, "name", Value::string(format!("{}-u", name))),
                attr_eq(address, "description", Value::string("second")),
            ],
        ),
        TestStep::import_verify(address, &["config"]),
    ])
    .run(provider)
    .await
    .unwrap();
}

#[tokio::test]
async fn en_destination_huawei_basic() {
    let Some((provider, values)) = setup(&[
        "EVENT_NOTIFICATIONS_INSTANCE_ID",
        "HUAWEI_CLIENT_ID",
        "HUAWEI_CLIENT_SECRET",
    ]) else {
        return;
    };
    let address = "en_destination_huawei.hw";
    let name = format!("carina-huawei-{}", suffix());
    let huawei = |name: &str| {
        Resource::new("en_destination_huawei", "hw")
            .with_attribute("instance_guid", Value::string(&values[0]))
            .with_attribute("name", Value::string(name))
            .with_attribute("type", Value::string("push_huawei"))
            .with_attribute(
                "config",
                block(&[(
                    "params",
                    block(&[
                        ("client_id", Value::string(&values[1])),
                        ("client_secret", Value::string(&values[2])),
                    ]),
                )]),
            )
    };

    TestCase::new(vec![
        TestStep::apply(
            vec![huawei(&name)],
            vec![
                attr_eq(address, "type", Value::string("push_huawei")),
                attr_eq(address, "config.0.params.0.pre_prod", Value::Bool(false)),
                attr_set(address, "destination_id"),
            ],
        ),
        TestStep::apply(
            vec![huawei(&format!("{}-u", name))],
            vec![attr_eq(address, "name", Value::string(format!("{}-u", name)))],
        ),
        TestStep::import_verify(address, &["config"]),
    ])
    .run(provider)
    .await
    .unwrap();
}

#[tokio::test]
async fn cd_toolchain_tool_githubconsolidated_basic() {
    let Some((provider, values)) = setup(&["TOOLCHAIN_ID", "GITHUB_REPO_URL"]) else {
        return;
    };
    let address = "cd_toolchain_tool_githubconsolidated.gh";
    let tool = |name: &str| {
        Resource::new("cd_toolchain_tool_githubconsolidated", "gh")
            .with_attribute("toolchain_id", Value::string(&values[0]))
            .with_attribute("name", Value::string(name))
            .with_attribute(
                "initialization",
                block(&[
                    ("type", Value::string("link")),
                    ("repo_url", Value::string(&values[1])),
                ]),
            )
            .with_attribute(
                "parameters",
                block(&[
                    ("toolchain_issues_enabled", Value::Bool(true)),
                    ("enable_traceability", Value::Bool(false)),
                ]),
            )
    };

    TestCase::new(vec![
        TestStep::apply(
            vec![tool("carina-github")],
            vec![
                attr_eq(address, "name", Value::string("carina-github")),
                attr_set(address, "tool_id"),
                attr_set(address, "crn"),
                attr_set(address, "referent.0.api_href"),
                attr_eq(address, "parameters.0.repo_url", Value::string(&values[1])),
                attr_absent(address, "parameters.0.api_token"),
            ],
        ),
        TestStep::apply(
            vec![tool("carina-github-renamed")],
            vec![attr_eq(address, "name", Value::string("carina-github-renamed"))],
        ),
        TestStep::import_verify(address, &["initialization", "parameters"]),
    ])
    .run(provider)
    .await
    .unwrap();
}

#[tokio::test]
async fn scc_report_violation_drift_basic() {
    let Some((provider, values)) = setup(&["SCC_INSTANCE_ID", "SCC_REPORT_ID"]) else {
        return;
    };
    let drift = Resource::data_source("scc_report_violation_drift", "drift")
        .with_attribute("instance_id", Value::string(&values[0]))
        .with_attribute("report_id", Value::string(&values[1]))
        .with_attribute("scan_time_duration", Value::Int(0));

    TestCase::new(vec![TestStep::apply(
        vec![drift],
        vec![
            attr_eq("data.scc_report_violation_drift.drift", "id", Value::string(&values[1])),
            attr_set("data.scc_report_violation_drift.drift", "home_account_id"),
        ],
    )])
    .run(provider)
    .await
    .unwrap();
}

#[tokio::test]
async fn is_lbs_basic() {
    let Some((provider, _)) = setup(&[]) else {
        return;
    };
    TestCase::new(vec![TestStep::apply(
        vec![Resource::data_source("is_lbs", "all")],
        vec![attr_set("data.is_lbs.all", "load_balancers.#")],
    )])
    .run(provider)
    .await
    .unwrap();
}
