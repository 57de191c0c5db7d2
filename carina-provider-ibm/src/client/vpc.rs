//! VPC infrastructure API (load balancers)

use log::debug;
use serde::Deserialize;

use super::ApiClient;
use crate::error::{IbmError, Result};

/// API version date sent with every VPC request
pub const VPC_API_VERSION: &str = "2024-04-30";

const PAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadBalancerCollection {
    pub load_balancers: Vec<LoadBalancer>,
    pub next: Option<PageLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLink {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub created_at: Option<String>,
    pub hostname: Option<String>,
    pub is_public: bool,
    pub provisioning_status: Option<String>,
    pub operating_status: Option<String>,
    pub route_mode: bool,
    pub udp_supported: bool,
    pub profile: Option<ProfileReference>,
    pub resource_group: Option<ResourceGroupReference>,
    pub subnets: Vec<SubnetReference>,
    pub listeners: Vec<Reference>,
    pub pools: Vec<Reference>,
    pub public_ips: Vec<IpAddress>,
    pub private_ips: Vec<ReservedIpReference>,
    pub security_groups: Vec<Reference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub id: String,
    pub name: Option<String>,
    pub href: Option<String>,
    pub crn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileReference {
    pub name: String,
    pub family: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceGroupReference {
    pub id: String,
    pub name: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubnetReference {
    pub id: String,
    pub name: String,
    pub href: Option<String>,
    pub crn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpAddress {
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReservedIpReference {
    pub address: String,
    pub href: Option<String>,
    pub id: String,
    pub name: Option<String>,
    pub resource_type: Option<String>,
}

pub struct VpcClient {
    api: ApiClient,
}

impl VpcClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// List every load balancer in the region, following pagination links
    pub async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>> {
        let mut all = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let mut query = vec![
                ("version", VPC_API_VERSION.to_string()),
                ("generation", "2".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(start) = &start {
                query.push(("start", start.clone()));
            }

            let page: LoadBalancerCollection = self.api.get("/load_balancers", &query).await?;
            debug!("fetched {} load balancers", page.load_balancers.len());
            all.extend(page.load_balancers);

            match page.next {
                Some(next) => {
                    let token = start_token(&next.href)?;
                    if start.as_deref() == Some(token.as_str()) {
                        return Err(IbmError::UnexpectedResponse(format!(
                            "pagination did not advance past '{}'",
                            token
                        )));
                    }
                    start = Some(token);
                }
                None => break,
            }
        }

        Ok(all)
    }
}

/// Extract the `start` query parameter from a pagination link
pub fn start_token(href: &str) -> Result<String> {
    let url = reqwest::Url::parse(href).map_err(|e| {
        IbmError::UnexpectedResponse(format!("invalid pagination link '{}': {}", href, e))
    })?;
    url.query_pairs()
        .find(|(k, _)| k == "start")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| {
            IbmError::UnexpectedResponse(format!("pagination link '{}' has no start token", href))
        })
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::client::testing::{api_client, mock_server};

    #[test]
    fn extracts_start_token() {
        assert_eq!(
            start_token("https://us-south.iaas.cloud.ibm.com/v1/load_balancers?limit=50&start=r006-abc").unwrap(),
            "r006-abc"
        );
        assert!(start_token("https://x/v1/load_balancers?limit=50").is_err());
    }

    #[tokio::test]
    async fn follows_every_page() {
        let server = mock_server().await;
        let next = format!("{}/load_balancers?limit=50&start=page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/load_balancers"))
            .and(query_param("generation", "2"))
            .and(query_param("version", VPC_API_VERSION))
            .and(query_param_is_missing("start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "load_balancers": [{"id": "lb-1", "name": "one", "crn": "crn:1", "is_public": true}],
                "next": {"href": next}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/load_balancers"))
            .and(query_param("start", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "load_balancers": [{"id": "lb-2", "name": "two", "crn": "crn:2", "is_public": false}]
            })))
            .mount(&server)
            .await;

        let client = VpcClient::new(api_client(&server));
        let lbs = client.list_load_balancers().await.unwrap();
        let ids: Vec<&str> = lbs.iter().map(|lb| lb.id.as_str()).collect();
        assert_eq!(ids, vec!["lb-1", "lb-2"]);
        assert!(lbs[0].is_public);
    }
}
