//! DNS enrichment provider

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::TokioAsyncResolver;

use crate::enrichment::EnrichmentProvider;
use crate::models::host_utils::normalize_name;
use crate::models::{blank_fields, Fields, Host, HostKind};

const COLUMNS: [&str; 6] = ["DNS PTR", "DNS A", "DNS AAAA", "DNS MX", "DNS NS", "DNS TXT"];

const SEPARATOR: &str = ", ";

/// DNS lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsData {
    pub ptr_records: Vec<String>,
    pub a_records: Vec<String>,
    pub aaaa_records: Vec<String>,
    pub mx_records: Vec<String>,
    pub ns_records: Vec<String>,
    pub txt_records: Vec<String>,
}

impl DnsData {
    pub fn to_fields(&self) -> Fields {
        let mut fields = blank_fields(&COLUMNS);
        let records = [
            &self.ptr_records,
            &self.a_records,
            &self.aaaa_records,
            &self.mx_records,
            &self.ns_records,
            &self.txt_records,
        ];

        for (column, values) in COLUMNS.iter().zip(records) {
            fields.insert(column.to_string(), values.join(SEPARATOR));
        }

        fields
    }
}

fn is_no_records(e: &ResolveError) -> bool {
    matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// Outcome of one record type lookup
#[derive(Debug)]
enum Answer<T> {
    Records(T),
    Empty,
    Failed(ResolveError),
}

impl<T> From<Result<T, ResolveError>> for Answer<T> {
    fn from(result: Result<T, ResolveError>) -> Self {
        match result {
            Ok(records) => Answer::Records(records),
            Err(e) if is_no_records(&e) => Answer::Empty,
            Err(e) => Answer::Failed(e),
        }
    }
}

impl<T> Answer<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Records(records) => Answer::Records(f(records)),
            Answer::Empty => Answer::Empty,
            Answer::Failed(e) => Answer::Failed(e),
        }
    }

    /// Missing records are fine, any other resolver error is not
    fn optional(self) -> Result<Option<T>, ResolveError> {
        match self {
            Answer::Records(records) => Ok(Some(records)),
            Answer::Empty => Ok(None),
            Answer::Failed(e) => Err(e),
        }
    }
}

/// Combine the A and AAAA answers for a name.
///
/// Succeeds when either family returned records. When neither did, a resolver
/// error takes precedence over an empty answer.
fn addresses(
    domain: &str,
    v4: Answer<Vec<String>>,
    v6: Answer<Vec<String>>,
) -> Result<(Vec<String>, Vec<String>)> {
    match (v4, v6) {
        (Answer::Records(a), Answer::Records(aaaa)) => Ok((a, aaaa)),
        (Answer::Records(a), _) => Ok((a, vec![])),
        (_, Answer::Records(aaaa)) => Ok((vec![], aaaa)),
        (Answer::Failed(e), _) | (_, Answer::Failed(e)) => {
            Err(e).with_context(|| format!("Address lookup failed for {}", domain))
        }
        (Answer::Empty, Answer::Empty) => bail!("No address records for {}", domain),
    }
}

/// DNS enrichment provider
pub struct DnsProvider {
    resolver: TokioAsyncResolver,
}

impl DnsProvider {
    /// Create a new DNS provider using the system resolver configuration
    pub fn new() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .context("Failed to read system resolver configuration")?;

        Ok(Self { resolver })
    }

    /// Perform DNS lookups for a name.
    ///
    /// At least one A or AAAA record is required. Missing MX, NS or TXT
    /// records leave those lists empty; resolver errors fail the lookup.
    pub async fn lookup(&self, domain: &str) -> Result<DnsData> {
        let mut data = DnsData::default();

        // A / AAAA records
        (data.a_records, data.aaaa_records) = self.address_lookup(domain).await?;

        // MX records
        if let Some(response) = Answer::from(self.resolver.mx_lookup(domain).await)
            .optional()
            .with_context(|| format!("MX lookup failed for {}", domain))?
        {
            for record in response.iter() {
                data.mx_records.push(record.exchange().to_string());
            }
        }

        // NS records
        if let Some(response) = Answer::from(self.resolver.ns_lookup(domain).await)
            .optional()
            .with_context(|| format!("NS lookup failed for {}", domain))?
        {
            for record in response.iter() {
                data.ns_records.push(record.to_string());
            }
        }

        // TXT records
        if let Some(response) = Answer::from(self.resolver.txt_lookup(domain).await)
            .optional()
            .with_context(|| format!("TXT lookup failed for {}", domain))?
        {
            for record in response.iter() {
                let txt: String = record
                    .iter()
                    .map(|d| String::from_utf8_lossy(d).to_string())
                    .collect();
                data.txt_records.push(txt);
            }
        }

        Ok(data)
    }

    /// A and AAAA lookups for a name, queried separately
    pub async fn address_lookup(&self, domain: &str) -> Result<(Vec<String>, Vec<String>)> {
        let v4: Answer<Vec<String>> = Answer::from(self.resolver.ipv4_lookup(domain).await)
            .map(|response| response.iter().map(|a| a.to_string()).collect());
        let v6: Answer<Vec<String>> = Answer::from(self.resolver.ipv6_lookup(domain).await)
            .map(|response| response.iter().map(|aaaa| aaaa.to_string()).collect());

        addresses(domain, v4, v6)
    }

    /// Reverse DNS lookup for an IP
    pub async fn reverse_lookup(&self, ip_addr: IpAddr) -> Result<Vec<String>> {
        let names = Answer::from(self.resolver.reverse_lookup(ip_addr).await)
            .optional()
            .with_context(|| format!("Reverse lookup failed for {}", ip_addr))?;

        Ok(names
            .map(|response| response.iter().map(|name| name.to_string()).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl EnrichmentProvider for DnsProvider {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn declare_columns(&self) -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    async fn populate(&self, host: &Host) -> Result<Fields> {
        let data = match host.kind() {
            HostKind::Ip(ip) => DnsData {
                ptr_records: self.reverse_lookup(ip).await?,
                ..Default::default()
            },
            HostKind::Name => self.lookup(&normalize_name(host.as_str())).await?,
        };

        if data == DnsData::default() {
            tracing::debug!(host = %host, "No DNS records returned");
        }

        Ok(data.to_fields())
    }
}
