//! Configuration file loading
//!
//! The configuration is a TOML document with one section per provider.
//! Every section is optional at load time; the provider registry decides
//! which settings are required based on the providers enabled for the run.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Fully resolved configuration for a run
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(rename = "GeoIP2", default)]
    pub geoip: Option<GeoIpConfig>,

    #[serde(rename = "VirusTotal", default)]
    pub virustotal: Option<VirusTotalConfig>,

    #[serde(rename = "PassiveTotal", default)]
    pub passivetotal: Option<PassiveTotalConfig>,
}

/// `[GeoIP2]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GeoIpConfig {
    #[serde(rename = "City_Path")]
    pub city_path: Option<PathBuf>,

    #[serde(rename = "ASN_Path")]
    pub asn_path: Option<PathBuf>,
}

/// `[VirusTotal]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct VirusTotalConfig {
    #[serde(rename = "PublicAPI")]
    pub api_key: Option<String>,

    /// Public API quota; unlimited when absent
    #[serde(rename = "Requests_Per_Minute")]
    pub requests_per_minute: Option<u32>,
}

/// `[PassiveTotal]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PassiveTotalConfig {
    #[serde(rename = "Username")]
    pub username: Option<String>,

    #[serde(rename = "PublicAPI")]
    pub api_key: Option<String>,
}

/// Setting overrides taken from the command line or environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub geoip_city_db: Option<PathBuf>,
    pub geoip_asn_db: Option<PathBuf>,
    pub virustotal_api_key: Option<String>,
    pub passivetotal_username: Option<String>,
    pub passivetotal_api_key: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.drop_empty_values();
        Ok(config)
    }

    /// Apply overrides; a present override wins over the file value
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if overrides.geoip_city_db.is_some() || overrides.geoip_asn_db.is_some() {
            let geoip = self.geoip.get_or_insert_with(GeoIpConfig::default);
            if let Some(path) = overrides.geoip_city_db {
                geoip.city_path = Some(path);
            }
            if let Some(path) = overrides.geoip_asn_db {
                geoip.asn_path = Some(path);
            }
        }

        if let Some(key) = overrides.virustotal_api_key {
            self.virustotal
                .get_or_insert_with(VirusTotalConfig::default)
                .api_key = Some(key);
        }

        if overrides.passivetotal_username.is_some() || overrides.passivetotal_api_key.is_some() {
            let pt = self
                .passivetotal
                .get_or_insert_with(PassiveTotalConfig::default);
            if let Some(username) = overrides.passivetotal_username {
                pt.username = Some(username);
            }
            if let Some(key) = overrides.passivetotal_api_key {
                pt.api_key = Some(key);
            }
        }

        self.drop_empty_values();
        self
    }

    // Empty strings count as unset
    fn drop_empty_values(&mut self) {
        fn clear_str(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        fn clear_path(value: &mut Option<PathBuf>) {
            if value.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                *value = None;
            }
        }

        if let Some(geoip) = self.geoip.as_mut() {
            clear_path(&mut geoip.city_path);
            clear_path(&mut geoip.asn_path);
        }
        if let Some(vt) = self.virustotal.as_mut() {
            clear_str(&mut vt.api_key);
        }
        if let Some(pt) = self.passivetotal.as_mut() {
            clear_str(&mut pt.username);
            clear_str(&mut pt.api_key);
        }
    }
}
