//! hostintel
//!
//! Enriches a list of hosts with GeoIP, DNS, and reputation data and
//! renders the result as a single CSV report.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;
