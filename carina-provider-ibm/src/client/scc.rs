//! Security and Compliance Center reports API

use serde::Deserialize;

use super::ApiClient;
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportViolationDrift {
    pub home_account_id: Option<String>,
    pub report_id: Option<String>,
    pub data_points: Vec<ViolationDataPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViolationDataPoint {
    pub report_id: Option<String>,
    pub report_group_id: Option<String>,
    pub scan_time: Option<String>,
    pub controls: Option<ComplianceStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComplianceStats {
    pub status: Option<String>,
    pub total_count: Option<i64>,
    pub compliant_count: Option<i64>,
    pub not_compliant_count: Option<i64>,
    pub unable_to_perform_count: Option<i64>,
    pub user_evaluation_required_count: Option<i64>,
}

pub struct SccClient {
    api: ApiClient,
}

impl SccClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn get_report_violation_drift(
        &self,
        instance_id: &str,
        report_id: &str,
        scan_time_duration: Option<i64>,
    ) -> Result<ReportViolationDrift> {
        let query: Vec<(&str, String)> = scan_time_duration
            .map(|d| vec![("scan_time_duration", d.to_string())])
            .unwrap_or_default();
        self.api
            .get(
                &format!(
                    "/instances/{}/v3/reports/{}/violation_drift",
                    instance_id, report_id
                ),
                &query,
            )
            .await
    }
}
