//! Per-host row construction

use std::time::Duration;

use futures::future::join_all;

use crate::enrichment::EnrichmentProvider;
use crate::error::ProviderError;
use crate::models::{Fields, Host, Row};
use crate::pipeline::schema::SchemaAccumulator;

/// Every provider's outcome for one host, in registry order
pub struct HostLookup {
    pub host: Host,
    pub results: Vec<Result<Fields, ProviderError>>,
}

/// Runs the providers for a host and merges their columns into a row
pub struct RowBuilder<'a> {
    providers: &'a [Box<dyn EnrichmentProvider>],
    timeout: Duration,
}

impl<'a> RowBuilder<'a> {
    pub fn new(providers: &'a [Box<dyn EnrichmentProvider>], timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Run every provider for the host concurrently and wait for all of them
    pub async fn collect(&self, host: Host) -> HostLookup {
        let lookups = self
            .providers
            .iter()
            .map(|provider| self.invoke(provider.as_ref(), &host));
        let results = join_all(lookups).await;

        HostLookup { host, results }
    }

    async fn invoke(
        &self,
        provider: &dyn EnrichmentProvider,
        host: &Host,
    ) -> Result<Fields, ProviderError> {
        provider.ready().await;

        match tokio::time::timeout(self.timeout, provider.populate(host)).await {
            Ok(Ok(fields)) => Ok(fields),
            Ok(Err(e)) => Err(ProviderError::failed(provider.name(), host.as_str(), &e)),
            Err(_) => Err(ProviderError::timed_out(
                provider.name(),
                host.as_str(),
                self.timeout,
            )),
        }
    }

    /// Merge a host's lookup results into a row, in registry order.
    ///
    /// Position 0 always holds the host. A later provider overwrites an
    /// earlier one's value for a shared column; a failed provider writes
    /// nothing.
    pub fn assemble(
        &self,
        lookup: HostLookup,
        schema: &mut SchemaAccumulator,
    ) -> (Row, Vec<ProviderError>) {
        let HostLookup { host, results } = lookup;
        let mut row: Row = vec![String::new(); schema.width()];
        row[0] = host.to_string();
        let mut errors = vec![];

        for (provider, result) in self.providers.iter().zip(results) {
            let fields = match result {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        host = %host,
                        error = %e,
                        "Enrichment failed"
                    );
                    errors.push(e);
                    continue;
                }
            };

            for (column, value) in fields {
                if !schema.contains(&column) {
                    tracing::debug!(
                        provider = provider.name(),
                        column = %column,
                        "Provider returned undeclared column"
                    );
                }

                let index = schema.resolve(&column);
                if index == 0 {
                    tracing::warn!(
                        provider = provider.name(),
                        column = %column,
                        "Ignoring value for reserved host column"
                    );
                    continue;
                }

                if row.len() <= index {
                    row.resize(schema.width(), String::new());
                }
                row[index] = value;
            }
        }

        (row, errors)
    }

    /// Build the row for one host
    pub async fn build(
        &self,
        host: Host,
        schema: &mut SchemaAccumulator,
    ) -> (Row, Vec<ProviderError>) {
        let lookup = self.collect(host).await;
        self.assemble(lookup, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::MockEnrichmentProvider;
    use crate::models::HOST_COLUMN;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn succeeding(name: &'static str, result: Fields) -> Box<dyn EnrichmentProvider> {
        let mut provider = MockEnrichmentProvider::new();
        provider.expect_name().return_const(name);
        provider.expect_ready().return_const(());
        provider
            .expect_populate()
            .returning(move |_| Ok(result.clone()));
        Box::new(provider)
    }

    fn failing(name: &'static str, message: &'static str) -> Box<dyn EnrichmentProvider> {
        let mut provider = MockEnrichmentProvider::new();
        provider.expect_name().return_const(name);
        provider.expect_ready().return_const(());
        provider
            .expect_populate()
            .returning(move |_| Err(anyhow::anyhow!(message)));
        Box::new(provider)
    }

    fn seeded(columns: &[&str]) -> SchemaAccumulator {
        let mut schema = SchemaAccumulator::new(HOST_COLUMN);
        schema.observe(columns);
        schema
    }

    #[tokio::test]
    async fn merges_providers_in_schema_order() {
        let providers = vec![
            succeeding("geoip", fields(&[("Geo Country", "US"), ("Geo City", "Mountain View")])),
            succeeding("dns", fields(&[("DNS PTR", "dns.google.")])),
        ];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&["Geo Country", "Geo City", "DNS PTR"]);

        let (row, errors) = builder.build(Host::new("8.8.8.8"), &mut schema).await;

        assert!(errors.is_empty());
        assert_eq!(row, vec!["8.8.8.8", "US", "Mountain View", "dns.google."]);
    }

    #[tokio::test]
    async fn failed_provider_leaves_cells_empty() {
        let providers = vec![
            succeeding("geoip", fields(&[("Geo Country", ""), ("Geo City", "")])),
            failing("dns", "NXDOMAIN"),
        ];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&["Geo Country", "Geo City", "DNS PTR"]);

        let (row, errors) = builder.build(Host::new("bad-host"), &mut schema).await;

        assert_eq!(row, vec!["bad-host", "", "", ""]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].provider(), "dns");
        assert_eq!(errors[0].host(), "bad-host");
        assert!(errors[0].to_string().contains("NXDOMAIN"));
    }

    #[tokio::test]
    async fn undeclared_column_is_appended() {
        let providers = vec![succeeding(
            "geoip",
            fields(&[("Geo Country", "DE"), ("Geo Extra", "x")]),
        )];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&["Geo Country"]);

        let (row, _) = builder.build(Host::new("1.1.1.1"), &mut schema).await;

        assert_eq!(schema.current_order(), vec![HOST_COLUMN, "Geo Country", "Geo Extra"]);
        assert_eq!(row, vec!["1.1.1.1", "DE", "x"]);
    }

    #[tokio::test]
    async fn later_provider_wins_shared_column() {
        let providers = vec![
            succeeding("geoip", fields(&[("Country", "US")])),
            succeeding("virustotal", fields(&[("Country", "CA")])),
        ];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&["Country"]);

        let (row, _) = builder.build(Host::new("h"), &mut schema).await;
        assert_eq!(row, vec!["h", "CA"]);
    }

    #[tokio::test]
    async fn failed_later_provider_keeps_earlier_value() {
        let providers = vec![
            succeeding("geoip", fields(&[("Country", "US")])),
            failing("virustotal", "401"),
        ];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&["Country"]);

        let (row, errors) = builder.build(Host::new("h"), &mut schema).await;
        assert_eq!(row, vec!["h", "US"]);
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn host_column_cannot_be_overwritten() {
        let providers = vec![succeeding("rogue", fields(&[(HOST_COLUMN, "spoofed")]))];
        let builder = RowBuilder::new(&providers, Duration::from_secs(5));
        let mut schema = seeded(&[]);

        let (row, _) = builder.build(Host::new("real"), &mut schema).await;
        assert_eq!(row, vec!["real"]);
    }
}
