//! GeoIP enrichment using MaxMind database

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::Path;
use trust_dns_resolver::TokioAsyncResolver;

use crate::enrichment::EnrichmentProvider;
use crate::models::{blank_fields, Fields, Host, HostKind};

const CITY_COLUMNS: [&str; 7] = [
    "GeoIP Country Code",
    "GeoIP Country Name",
    "GeoIP Region",
    "GeoIP City",
    "GeoIP Postal Code",
    "GeoIP Latitude",
    "GeoIP Longitude",
];

const ASN_COLUMNS: [&str; 2] = ["GeoIP ASN", "GeoIP AS Organization"];

/// GeoIP lookup result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoIpData {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: Option<u32>,
    pub as_org: Option<String>,
}

/// GeoIP enrichment provider using MaxMind databases
pub struct GeoIpProvider {
    city_reader: Reader<Vec<u8>>,
    asn_reader: Option<Reader<Vec<u8>>>,
    resolver: TokioAsyncResolver,
}

impl GeoIpProvider {
    /// Open the city database, and the ASN database when given
    pub fn new(city_db_path: &Path, asn_db_path: Option<&Path>) -> Result<Self> {
        let city_reader = Reader::open_readfile(city_db_path).with_context(|| {
            format!(
                "Failed to open GeoIP city database at {}",
                city_db_path.display()
            )
        })?;

        let asn_reader = match asn_db_path {
            Some(path) => Some(Reader::open_readfile(path).with_context(|| {
                format!("Failed to open GeoIP ASN database at {}", path.display())
            })?),
            None => None,
        };

        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .context("Failed to create DNS resolver for GeoIP name lookups")?;

        Ok(Self {
            city_reader,
            asn_reader,
            resolver,
        })
    }

    /// Lookup GeoIP data for an IP address
    pub fn lookup(&self, ip_addr: IpAddr) -> Result<GeoIpData> {
        let mut data = GeoIpData::default();

        // City lookup
        match self.city_reader.lookup::<geoip2::City>(ip_addr) {
            Ok(city) => {
                if let Some(country) = city.country {
                    data.country_code = country.iso_code.map(|s| s.to_string());
                    data.country_name = country
                        .names
                        .and_then(|n| n.get("en").map(|s| s.to_string()));
                }

                if let Some(city_data) = city.city {
                    data.city = city_data
                        .names
                        .and_then(|n| n.get("en").map(|s| s.to_string()));
                }

                if let Some(subdivisions) = city.subdivisions {
                    if let Some(region) = subdivisions.first() {
                        data.region = region
                            .names
                            .as_ref()
                            .and_then(|n| n.get("en").map(|s| s.to_string()));
                    }
                }

                if let Some(postal) = city.postal {
                    data.postal_code = postal.code.map(|s| s.to_string());
                }

                if let Some(location) = city.location {
                    data.latitude = location.latitude;
                    data.longitude = location.longitude;
                }
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => {}
            Err(e) => return Err(e).context("GeoIP city lookup failed"),
        }

        // ASN lookup
        if let Some(ref reader) = self.asn_reader {
            match reader.lookup::<geoip2::Asn>(ip_addr) {
                Ok(asn) => {
                    data.asn = asn.autonomous_system_number;
                    data.as_org = asn.autonomous_system_organization.map(|s| s.to_string());
                }
                Err(MaxMindDBError::AddressNotFoundError(_)) => {}
                Err(e) => return Err(e).context("GeoIP ASN lookup failed"),
            }
        }

        Ok(data)
    }

    /// Resolve a name to its first address
    async fn resolve(&self, name: &str) -> Option<IpAddr> {
        match self.resolver.lookup_ip(name).await {
            Ok(response) => response.iter().next(),
            Err(e) => {
                tracing::debug!(host = name, error = %e, "GeoIP could not resolve host");
                None
            }
        }
    }
}

/// Map lookup data onto this provider's columns
pub fn geo_fields(data: &GeoIpData, with_asn: bool) -> Fields {
    let mut fields = blank_fields(&CITY_COLUMNS);
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let number = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();

    fields.insert(CITY_COLUMNS[0].to_string(), text(&data.country_code));
    fields.insert(CITY_COLUMNS[1].to_string(), text(&data.country_name));
    fields.insert(CITY_COLUMNS[2].to_string(), text(&data.region));
    fields.insert(CITY_COLUMNS[3].to_string(), text(&data.city));
    fields.insert(CITY_COLUMNS[4].to_string(), text(&data.postal_code));
    fields.insert(CITY_COLUMNS[5].to_string(), number(data.latitude));
    fields.insert(CITY_COLUMNS[6].to_string(), number(data.longitude));

    if with_asn {
        fields.insert(
            ASN_COLUMNS[0].to_string(),
            data.asn.map(|n| n.to_string()).unwrap_or_default(),
        );
        fields.insert(ASN_COLUMNS[1].to_string(), text(&data.as_org));
    }

    fields
}

#[async_trait]
impl EnrichmentProvider for GeoIpProvider {
    fn name(&self) -> &'static str {
        "geoip"
    }

    fn declare_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = CITY_COLUMNS.iter().map(|c| c.to_string()).collect();
        if self.asn_reader.is_some() {
            columns.extend(ASN_COLUMNS.iter().map(|c| c.to_string()));
        }
        columns
    }

    async fn populate(&self, host: &Host) -> Result<Fields> {
        let with_asn = self.asn_reader.is_some();

        let ip_addr = match host.kind() {
            HostKind::Ip(ip) => Some(ip),
            HostKind::Name => self.resolve(host.as_str()).await,
        };

        let data = match ip_addr {
            Some(ip) => self.lookup(ip)?,
            None => GeoIpData::default(),
        };

        if data.country_code.is_none() && data.asn.is_none() {
            tracing::debug!(host = %host, "No GeoIP data returned");
        }

        Ok(geo_fields(&data, with_asn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fields_cover_city_columns() {
        let data = GeoIpData {
            country_code: Some("US".to_string()),
            country_name: Some("United States".to_string()),
            city: Some("Mountain View".to_string()),
            latitude: Some(37.386),
            longitude: Some(-122.0838),
            ..Default::default()
        };

        let fields = geo_fields(&data, false);

        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, CITY_COLUMNS.to_vec());
        assert_eq!(fields["GeoIP Country Code"], "US");
        assert_eq!(fields["GeoIP City"], "Mountain View");
        assert_eq!(fields["GeoIP Region"], "");
        assert_eq!(fields["GeoIP Latitude"], "37.386");
        assert_eq!(fields["GeoIP Longitude"], "-122.0838");
    }

    #[test]
    fn fields_include_asn_when_enabled() {
        let data = GeoIpData {
            asn: Some(15169),
            as_org: Some("GOOGLE".to_string()),
            ..Default::default()
        };

        let fields = geo_fields(&data, true);
        assert_eq!(fields.len(), CITY_COLUMNS.len() + ASN_COLUMNS.len());
        assert_eq!(fields["GeoIP ASN"], "15169");
        assert_eq!(fields["GeoIP AS Organization"], "GOOGLE");
        assert_eq!(fields["GeoIP Country Code"], "");
    }

    #[test]
    fn new_rejects_invalid_database() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a maxmind database").unwrap();

        assert!(GeoIpProvider::new(file.path(), None).is_err());
    }
}
