//! Core data models for host enrichment

pub mod host_utils;

use std::fmt;

use indexmap::IndexMap;

use crate::error::ProviderError;

pub use host_utils::HostKind;

/// Reserved first column holding the input host itself
pub const HOST_COLUMN: &str = "Input Host";

/// An input host identifier (IP literal, domain, or FQDN)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host(String);

impl Host {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// How providers should interpret this host
    pub fn kind(&self) -> HostKind {
        host_utils::classify_host(&self.0)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Host {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Column name to value, as contributed by one provider for one host
pub type Fields = IndexMap<String, String>;

/// Build a field set with every column present and empty
pub fn blank_fields<S: AsRef<str>>(columns: &[S]) -> Fields {
    columns
        .iter()
        .map(|c| (c.as_ref().to_string(), String::new()))
        .collect()
}

/// Per-host cell values aligned to schema positions
pub type Row = Vec<String>;

/// The finished run: header, one row per input host, and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
    pub diagnostics: Vec<ProviderError>,
}

impl Report {
    /// Assemble the report, right-padding every row to the header width
    pub fn render(header: Vec<String>, rows: Vec<Row>, diagnostics: Vec<ProviderError>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            header,
            rows,
            diagnostics,
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
