//! VirusTotal enrichment provider

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;

use crate::enrichment::EnrichmentProvider;
use crate::models::host_utils::normalize_name;
use crate::models::{blank_fields, Fields, Host, HostKind};

const VT_API_URL: &str = "https://www.virustotal.com/api/v3";

const COLUMNS: [&str; 11] = [
    "VT Reputation",
    "VT Malicious",
    "VT Suspicious",
    "VT Harmless",
    "VT Undetected",
    "VT Detection Ratio",
    "VT Country",
    "VT AS Owner",
    "VT Registrar",
    "VT Tags",
    "VT Last Analysis",
];

/// VirusTotal analysis stats
#[derive(Debug, Deserialize)]
struct VtAnalysisStats {
    malicious: i32,
    suspicious: i32,
    harmless: i32,
    undetected: i32,
}

/// VirusTotal attributes
#[derive(Debug, Deserialize)]
struct VtAttributes {
    last_analysis_stats: Option<VtAnalysisStats>,
    last_analysis_date: Option<i64>,
    reputation: Option<i32>,
    tags: Option<Vec<String>>,
    // IP specific
    country: Option<String>,
    as_owner: Option<String>,
    // Domain specific
    registrar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VtData {
    attributes: VtAttributes,
}

#[derive(Debug, Deserialize)]
struct VtResponse {
    data: VtData,
}

/// VirusTotal enrichment provider
pub struct VirusTotalProvider {
    client: Client,
    api_key: String,
    base_url: String,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl VirusTotalProvider {
    /// Create a new VirusTotal provider, optionally limited to a per-minute quota
    pub fn new(api_key: String, requests_per_minute: Option<u32>) -> Result<Self> {
        Self::with_base_url(api_key, requests_per_minute, VT_API_URL)
    }

    pub fn with_base_url(
        api_key: String,
        requests_per_minute: Option<u32>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let limiter = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|n| RateLimiter::direct(Quota::per_minute(n)));

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limiter,
        })
    }

    /// Check an IP address
    pub async fn check_ip(&self, ip: &str) -> Result<Fields> {
        self.fetch(&format!("{}/ip_addresses/{}", self.base_url, ip)).await
    }

    /// Check a domain
    pub async fn check_domain(&self, domain: &str) -> Result<Fields> {
        self.fetch(&format!("{}/domains/{}", self.base_url, domain)).await
    }

    async fn fetch(&self, url: &str) -> Result<Fields> {
        let response = self
            .client
            .get(url)
            .header("x-apikey", &self.api_key)
            .send()
            .await
            .context("Failed to send request to VirusTotal")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(url, "Host not known to VirusTotal");
            return Ok(blank_fields(&COLUMNS));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("VirusTotal API error: {} - {}", status, body);
        }

        let data: VtResponse = response
            .json()
            .await
            .context("Failed to parse VirusTotal response")?;

        Ok(vt_fields(&data.data.attributes))
    }
}

fn vt_fields(attrs: &VtAttributes) -> Fields {
    let mut fields = blank_fields(&COLUMNS);
    let mut set = |column: &str, value: String| {
        fields.insert(column.to_string(), value);
    };

    if let Some(reputation) = attrs.reputation {
        set("VT Reputation", reputation.to_string());
    }

    if let Some(stats) = &attrs.last_analysis_stats {
        set("VT Malicious", stats.malicious.to_string());
        set("VT Suspicious", stats.suspicious.to_string());
        set("VT Harmless", stats.harmless.to_string());
        set("VT Undetected", stats.undetected.to_string());
        set(
            "VT Detection Ratio",
            format!(
                "{}/{}",
                stats.malicious + stats.suspicious,
                stats.malicious + stats.suspicious + stats.harmless + stats.undetected
            ),
        );
    }

    if let Some(country) = &attrs.country {
        set("VT Country", country.clone());
    }
    if let Some(as_owner) = &attrs.as_owner {
        set("VT AS Owner", as_owner.clone());
    }
    if let Some(registrar) = &attrs.registrar {
        set("VT Registrar", registrar.clone());
    }
    if let Some(tags) = &attrs.tags {
        set("VT Tags", tags.join(", "));
    }

    if let Some(date) = attrs
        .last_analysis_date
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        set("VT Last Analysis", date.to_rfc3339_opts(SecondsFormat::Secs, true));
    }

    fields
}

#[async_trait]
impl EnrichmentProvider for VirusTotalProvider {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    fn declare_columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn populate(&self, host: &Host) -> Result<Fields> {
        match host.kind() {
            HostKind::Ip(ip) => self.check_ip(&ip.to_string()).await,
            HostKind::Name => self.check_domain(&normalize_name(host.as_str())).await,
        }
    }

    async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
