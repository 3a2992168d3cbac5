//! PassiveTotal enrichment provider

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::enrichment::EnrichmentProvider;
use crate::models::host_utils::normalize_name;
use crate::models::{blank_fields, Fields, Host, HostKind};

const PT_API_URL: &str = "https://api.passivetotal.org/v2";

const COLUMNS: [&str; 8] = [
    "PT Classification",
    "PT Ever Compromised",
    "PT Sinkhole",
    "PT Dynamic DNS",
    "PT Tags",
    "PT Primary Domain",
    "PT Network",
    "PT AS Name",
];

/// PassiveTotal enrichment response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PtEnrichment {
    classification: Option<String>,
    ever_compromised: Option<bool>,
    sinkhole: Option<bool>,
    dynamic_dns: Option<bool>,
    #[serde(default)]
    tags: Vec<String>,
    // Domain specific
    primary_domain: Option<String>,
    // IP specific
    network: Option<String>,
    autonomous_system_name: Option<String>,
}

/// PassiveTotal enrichment provider
pub struct PassiveTotalProvider {
    client: Client,
    username: String,
    api_key: String,
    base_url: String,
}

impl PassiveTotalProvider {
    /// Create a new PassiveTotal provider
    pub fn new(username: String, api_key: String) -> Result<Self> {
        Self::with_base_url(username, api_key, PT_API_URL)
    }

    pub fn with_base_url(
        username: String,
        api_key: String,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            username,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch enrichment metadata for an IP or domain
    pub async fn enrichment(&self, query: &str) -> Result<Fields> {
        let response = self
            .client
            .get(format!("{}/enrichment", self.base_url))
            .basic_auth(&self.username, Some(&self.api_key))
            .query(&[("query", query)])
            .send()
            .await
            .context("Failed to send request to PassiveTotal")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(query, "Host not known to PassiveTotal");
            return Ok(blank_fields(&COLUMNS));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("PassiveTotal API error: {} - {}", status, body);
        }

        let data: PtEnrichment = response
            .json()
            .await
            .context("Failed to parse PassiveTotal response")?;

        Ok(pt_fields(&data))
    }
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => String::new(),
    }
}

fn pt_fields(data: &PtEnrichment) -> Fields {
    let values = [
        data.classification.clone().unwrap_or_default(),
        flag(data.ever_compromised),
        flag(data.sinkhole),
        flag(data.dynamic_dns),
        data.tags.join(", "),
        data.primary_domain.clone().unwrap_or_default(),
        data.network.clone().unwrap_or_default(),
        data.autonomous_system_name.clone().unwrap_or_default(),
    ];

    COLUMNS
        .iter()
        .zip(values)
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

#[async_trait]
impl EnrichmentProvider for PassiveTotalProvider {
    fn name(&self) -> &'static str {
        "passivetotal"
    }

    fn declare_columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn populate(&self, host: &Host) -> Result<Fields> {
        match host.kind() {
            HostKind::Ip(ip) => self.enrichment(&ip.to_string()).await,
            HostKind::Name => self.enrichment(&normalize_name(host.as_str())).await,
        }
    }
}
