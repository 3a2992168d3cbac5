//! Enrichment pipeline
//!
//! Drives every host in the input through the provider registry and
//! renders the report once the last host has been processed.

pub mod row;
pub mod schema;

use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::enrichment::ProviderRegistry;
use crate::models::{Host, Report, HOST_COLUMN};

use row::RowBuilder;
use schema::SchemaAccumulator;

/// Tuning for a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound on a single provider call
    pub timeout: Duration,
    /// Hosts looked up at once; output order is unaffected
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrency: 1,
        }
    }
}

/// Pipeline driver that owns the registry for a run
pub struct Pipeline {
    registry: ProviderRegistry,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(registry: ProviderRegistry, options: PipelineOptions) -> Self {
        Self { registry, options }
    }

    /// Enrich every host and render the report.
    ///
    /// Provider failures are recorded in the report diagnostics and never
    /// abort the run.
    pub async fn run(&self, hosts: Vec<Host>) -> Report {
        let mut schema = SchemaAccumulator::new(HOST_COLUMN);
        self.registry.seed_schema(&mut schema);

        let builder = RowBuilder::new(self.registry.providers(), self.options.timeout);
        let total = hosts.len();
        let mut rows = Vec::with_capacity(total);
        let mut diagnostics = vec![];

        // buffered() yields in input order, so rows stay aligned with hosts
        let mut lookups = stream::iter(hosts)
            .map(|host| builder.collect(host))
            .buffered(self.options.concurrency.max(1));

        while let Some(lookup) = lookups.next().await {
            tracing::debug!(host = %lookup.host, "Host enriched");
            let (row, errors) = builder.assemble(lookup, &mut schema);
            rows.push(row);
            diagnostics.extend(errors);
        }

        tracing::info!(
            hosts = total,
            columns = schema.width(),
            failures = diagnostics.len(),
            "Enrichment complete"
        );

        Report::render(schema.into_header(), rows, diagnostics)
    }
}
