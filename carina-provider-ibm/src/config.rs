//! Provider configuration
//!
//! Values come from the environment first; a manifest `provider` block
//! may override any of them.

use serde::Deserialize;

use crate::error::{IbmError, Result};

pub const DEFAULT_REGION: &str = "us-south";
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// Per-service endpoint overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub event_notifications: Option<String>,
    pub toolchain: Option<String>,
    pub scc: Option<String>,
    pub vpc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IbmConfig {
    pub api_key: String,
    pub region: String,
    pub iam_url: String,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Manifest `provider` block; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub region: Option<String>,
    pub iam_url: Option<String>,
    pub endpoints: Endpoints,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Read overrides from `IC_*` / `IBMCLOUD_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k).filter(|v| !v.is_empty()))
        };
        Self {
            api_key: first(&["IC_API_KEY", "IBMCLOUD_API_KEY"]),
            region: first(&["IC_REGION", "IBMCLOUD_REGION"]),
            iam_url: first(&["IBMCLOUD_IAM_API_ENDPOINT"]),
            endpoints: Endpoints {
                event_notifications: first(&["IBMCLOUD_EN_API_ENDPOINT"]),
                toolchain: first(&["IBMCLOUD_TOOLCHAIN_ENDPOINT"]),
                scc: first(&["IBMCLOUD_SCC_API_ENDPOINT"]),
                vpc: first(&["IBMCLOUD_IS_NG_API_ENDPOINT"]),
            },
            ..Default::default()
        }
    }

    /// Layer `other` on top of `self`
    pub fn merge(self, other: ConfigOverrides) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            region: other.region.or(self.region),
            iam_url: other.iam_url.or(self.iam_url),
            endpoints: Endpoints {
                event_notifications: other
                    .endpoints
                    .event_notifications
                    .or(self.endpoints.event_notifications),
                toolchain: other.endpoints.toolchain.or(self.endpoints.toolchain),
                scc: other.endpoints.scc.or(self.endpoints.scc),
                vpc: other.endpoints.vpc.or(self.endpoints.vpc),
            },
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            max_retries: other.max_retries.or(self.max_retries),
            retry_delay_ms: other.retry_delay_ms.or(self.retry_delay_ms),
        }
    }

    pub fn build(self) -> Result<IbmConfig> {
        let api_key = self.api_key.ok_or_else(|| {
            IbmError::InvalidConfig(
                "an API key is required (set IC_API_KEY or IBMCLOUD_API_KEY)".to_string(),
            )
        })?;
        Ok(IbmConfig {
            api_key,
            region: self.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            iam_url: self
                .iam_url
                .unwrap_or_else(|| DEFAULT_IAM_URL.to_string()),
            endpoints: self.endpoints,
            timeout_secs: self.timeout_secs.unwrap_or(60),
            max_retries: self.max_retries.unwrap_or(3),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(1000),
        })
    }
}

impl IbmConfig {
    pub fn from_env() -> Result<Self> {
        ConfigOverrides::from_env().build()
    }

    /// Configuration pointing every service at one base URL (mock servers)
    pub fn for_endpoint(api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            iam_url: base_url.to_string(),
            endpoints: Endpoints {
                event_notifications: Some(base_url.to_string()),
                toolchain: Some(base_url.to_string()),
                scc: Some(base_url.to_string()),
                vpc: Some(base_url.to_string()),
            },
            timeout_secs: 10,
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }

    pub fn event_notifications_url(&self) -> String {
        self.endpoints.event_notifications.clone().unwrap_or_else(|| {
            format!(
                "https://{}.event-notifications.cloud.ibm.com/event-notifications",
                self.region
            )
        })
    }

    pub fn toolchain_url(&self) -> String {
        self.endpoints
            .toolchain
            .clone()
            .unwrap_or_else(|| format!("https://api.{}.devops.cloud.ibm.com/toolchain/v2", self.region))
    }

    pub fn scc_url(&self) -> String {
        self.endpoints
            .scc
            .clone()
            .unwrap_or_else(|| format!("https://{}.compliance.cloud.ibm.com", self.region))
    }

    pub fn vpc_url(&self) -> String {
        self.endpoints
            .vpc
            .clone()
            .unwrap_or_else(|| format!("https://{}.iaas.cloud.ibm.com/v1", self.region))
    }
}
