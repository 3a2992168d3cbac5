// src/models/host_utils.rs

use std::net::IpAddr;

/// What a host string looks like to the providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Ip(IpAddr),
    Name,
}

/// Classify a raw host string as an IP literal or a DNS name
pub fn classify_host(value: &str) -> HostKind {
    let trimmed = value.trim();

    // Bracketed IPv6 (e.g., [2001:db8::1])
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    match unbracketed.parse::<IpAddr>() {
        Ok(ip) => HostKind::Ip(ip),
        Err(_) => HostKind::Name,
    }
}

/// Normalize a DNS name for lookups
pub fn normalize_name(value: &str) -> String {
    value.trim().trim_end_matches('.').to_lowercase()
}

/// Parse one host per line, dropping surrounding whitespace and blank lines
pub fn parse_host_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
