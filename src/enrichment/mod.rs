//! Enrichment providers for host intelligence

pub mod geoip;
pub mod dns;
pub mod virustotal;
pub mod passivetotal;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::error::RegistryError;
use crate::models::{Fields, Host, HOST_COLUMN};
use crate::pipeline::schema::SchemaAccumulator;

use dns::DnsProvider;
use geoip::GeoIpProvider;
use passivetotal::PassiveTotalProvider;
use virustotal::VirusTotalProvider;

/// Trait for enrichment providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &'static str;

    /// Columns this provider may contribute, in order
    fn declare_columns(&self) -> Vec<String>;

    /// Look up a host.
    ///
    /// Every declared column should be present in the result; unknown
    /// values are empty strings.
    async fn populate(&self, host: &Host) -> Result<Fields>;

    /// Wait until the provider may issue another lookup
    async fn ready(&self) {}
}

/// Which optional providers are enabled for the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub all: bool,
    pub dns: bool,
    pub virustotal: bool,
    pub passivetotal: bool,
}

impl Selection {
    pub fn dns(&self) -> bool {
        self.all || self.dns
    }

    pub fn virustotal(&self) -> bool {
        self.all || self.virustotal
    }

    pub fn passivetotal(&self) -> bool {
        self.all || self.passivetotal
    }
}

/// Ordered set of providers active for a run
pub struct ProviderRegistry {
    providers: Vec<Box<dyn EnrichmentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { providers: vec![] }
    }

    pub fn add_provider(&mut self, provider: Box<dyn EnrichmentProvider>) {
        self.providers.push(provider);
    }

    /// Build the registry for a run.
    ///
    /// GeoIP is always first, followed by DNS, VirusTotal and PassiveTotal
    /// when selected. Missing settings for an enabled provider are fatal.
    pub async fn select(config: &Config, selection: &Selection) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        let geoip = config.geoip.clone().unwrap_or_default();
        let city_path = geoip.city_path.ok_or(RegistryError::MissingSetting {
            provider: "geoip",
            section: "GeoIP2",
            key: "City_Path",
        })?;
        let provider = GeoIpProvider::new(&city_path, geoip.asn_path.as_deref())
            .map_err(|source| RegistryError::Init {
                provider: "geoip",
                source,
            })?;
        tracing::info!(db = %city_path.display(), "GeoIP enrichment enabled");
        registry.add_provider(Box::new(provider));

        if selection.dns() {
            let provider = DnsProvider::new().map_err(|source| RegistryError::Init {
                provider: "dns",
                source,
            })?;
            tracing::info!("DNS enrichment enabled");
            registry.add_provider(Box::new(provider));
        }

        if selection.virustotal() {
            let vt = config.virustotal.clone().unwrap_or_default();
            let api_key = vt.api_key.ok_or(RegistryError::MissingSetting {
                provider: "virustotal",
                section: "VirusTotal",
                key: "PublicAPI",
            })?;
            let provider = VirusTotalProvider::new(api_key, vt.requests_per_minute)
                .map_err(|source| RegistryError::Init {
                    provider: "virustotal",
                    source,
                })?;
            tracing::info!(
                requests_per_minute = ?vt.requests_per_minute,
                "VirusTotal enrichment enabled"
            );
            registry.add_provider(Box::new(provider));
        }

        if selection.passivetotal() {
            let pt = config.passivetotal.clone().unwrap_or_default();
            let username = pt.username.ok_or(RegistryError::MissingSetting {
                provider: "passivetotal",
                section: "PassiveTotal",
                key: "Username",
            })?;
            let api_key = pt.api_key.ok_or(RegistryError::MissingSetting {
                provider: "passivetotal",
                section: "PassiveTotal",
                key: "PublicAPI",
            })?;
            let provider = PassiveTotalProvider::new(username, api_key).map_err(|source| {
                RegistryError::Init {
                    provider: "passivetotal",
                    source,
                }
            })?;
            tracing::info!("PassiveTotal enrichment enabled");
            registry.add_provider(Box::new(provider));
        }

        Ok(registry)
    }

    pub fn providers(&self) -> &[Box<dyn EnrichmentProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Seed the schema with every provider's declared columns.
    ///
    /// A column declared by more than one provider keeps its first position;
    /// the later provider's value wins per row.
    pub fn seed_schema(&self, schema: &mut SchemaAccumulator) {
        let mut owners: HashMap<String, &'static str> = HashMap::new();
        owners.insert(HOST_COLUMN.to_string(), "input");

        for provider in &self.providers {
            let columns = provider.declare_columns();

            for column in &columns {
                match owners.get(column.as_str()) {
                    Some(&owner) if owner != provider.name() => {
                        tracing::warn!(
                            column = %column,
                            first = owner,
                            provider = provider.name(),
                            "Column declared by more than one provider"
                        );
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(column.clone(), provider.name());
                    }
                }
            }

            schema.observe(&columns);
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
