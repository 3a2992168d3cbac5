//! Error types for hostintel

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Startup failure building the provider registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An enabled provider lacks a required setting
    #[error("Provider '{provider}' requires [{section}] {key} in the configuration")]
    MissingSetting {
        provider: &'static str,
        section: &'static str,
        key: &'static str,
    },

    /// The provider could not acquire its resources
    #[error("Failed to initialize provider '{provider}'")]
    Init {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// A lookup that could not complete for one (provider, host) pair.
///
/// Recorded in the run diagnostics; never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} lookup failed for '{host}': {message}")]
    Failed {
        provider: String,
        host: String,
        message: String,
    },

    #[error("{provider} lookup timed out for '{host}' after {}s", .timeout.as_secs_f64())]
    TimedOut {
        provider: String,
        host: String,
        timeout: Duration,
    },
}

impl ProviderError {
    pub fn failed(provider: &str, host: &str, error: &anyhow::Error) -> Self {
        // Alternate formatting keeps the whole context chain on one line
        Self::Failed {
            provider: provider.to_string(),
            host: host.to_string(),
            message: format!("{:#}", error),
        }
    }

    pub fn timed_out(provider: &str, host: &str, timeout: Duration) -> Self {
        Self::TimedOut {
            provider: provider.to_string(),
            host: host.to_string(),
            timeout,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Failed { provider, .. } | Self::TimedOut { provider, .. } => provider,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::Failed { host, .. } | Self::TimedOut { host, .. } => host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("Failed to send request");
        let e = ProviderError::failed("virustotal", "8.8.8.8", &err);

        assert_eq!(e.provider(), "virustotal");
        assert_eq!(e.host(), "8.8.8.8");
        assert_eq!(
            e.to_string(),
            "virustotal lookup failed for '8.8.8.8': Failed to send request: connection refused"
        );
    }

    #[test]
    fn timed_out_message() {
        let e = ProviderError::timed_out("dns", "example.com", Duration::from_millis(1500));
        assert_eq!(e.to_string(), "dns lookup timed out for 'example.com' after 1.5s");
    }
}
