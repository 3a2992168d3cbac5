//! Report rendering

use std::collections::HashSet;
use std::io::Write;

use anyhow::{Context, Result};

use crate::models::Report;

/// Write the report as CSV: header first, then one record per host
pub fn write_csv<W: Write>(report: &Report, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record(&report.header)
        .context("Failed to write CSV header")?;
    for row in &report.rows {
        csv.write_record(row).context("Failed to write CSV row")?;
    }

    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write a summary of the (host, provider) pairs that failed
pub fn write_diagnostics<W: Write>(report: &Report, mut writer: W) -> Result<()> {
    if report.diagnostics.is_empty() {
        return Ok(());
    }

    let hosts: HashSet<&str> = report.diagnostics.iter().map(|e| e.host()).collect();
    writeln!(
        writer,
        "{} lookup(s) failed across {} host(s):",
        report.diagnostics.len(),
        hosts.len()
    )?;
    for error in &report.diagnostics {
        writeln!(writer, "  {}", error)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use pretty_assertions::assert_eq;

    fn report() -> Report {
        Report::render(
            vec!["Input Host".into(), "GeoIP City".into(), "DNS TXT".into()],
            vec![
                vec!["8.8.8.8".into(), "Mountain View".into(), "v=spf1 -all, x".into()],
                vec!["bad-host".into()],
            ],
            vec![],
        )
    }

    #[test]
    fn csv_quotes_and_pads() {
        let mut out = Vec::new();
        write_csv(&report(), &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Input Host,GeoIP City,DNS TXT\n\
             8.8.8.8,Mountain View,\"v=spf1 -all, x\"\n\
             bad-host,,\n"
        );
    }

    #[test]
    fn diagnostics_summary_lists_failures() {
        let mut report = report();
        report.diagnostics.push(ProviderError::Failed {
            provider: "dns".into(),
            host: "bad-host".into(),
            message: "NXDOMAIN".into(),
        });

        let mut out = Vec::new();
        write_diagnostics(&report, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1 lookup(s) failed across 1 host(s):\n  dns lookup failed for 'bad-host': NXDOMAIN\n"
        );
    }

    #[test]
    fn diagnostics_count_failing_hosts_once() {
        let mut report = report();
        for provider in ["dns", "virustotal"] {
            report.diagnostics.push(ProviderError::Failed {
                provider: provider.into(),
                host: "bad-host".into(),
                message: "NXDOMAIN".into(),
            });
        }

        let mut out = Vec::new();
        write_diagnostics(&report, &mut out).unwrap();

        let summary = String::from_utf8(out).unwrap();
        assert!(summary.starts_with("2 lookup(s) failed across 1 host(s):\n"));
    }

    #[test]
    fn no_diagnostics_writes_nothing() {
        let mut out = Vec::new();
        write_diagnostics(&report(), &mut out).unwrap();
        assert!(out.is_empty());
    }
}
