//! Command line startup behavior
//!
//! Fatal configuration and input errors must exit non-zero before any
//! report is written.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn file_with(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn hostintel() -> Command {
    let mut cmd = Command::cargo_bin("hostintel").unwrap();
    for var in [
        "GEOIP_CITY_DB",
        "GEOIP_ASN_DB",
        "VIRUSTOTAL_API_KEY",
        "PASSIVETOTAL_USERNAME",
        "PASSIVETOTAL_API_KEY",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_missing_geoip_setting_is_fatal() {
    let config = file_with("[VirusTotal]\nPublicAPI = \"key\"\n");
    let input = file_with("8.8.8.8\n");

    hostintel()
        .arg(config.path())
        .arg(input.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("City_Path"));
}

#[test]
fn test_unreadable_geoip_database_is_fatal() {
    let config = file_with("[GeoIP2]\nCity_Path = \"/nonexistent/GeoLite2-City.mmdb\"\n");
    let input = file_with("8.8.8.8\n");

    hostintel()
        .arg(config.path())
        .arg(input.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("GeoIP city database"));
}

#[test]
fn test_missing_input_file_is_fatal() {
    let config = file_with("[GeoIP2]\nCity_Path = \"/nonexistent/GeoLite2-City.mmdb\"\n");

    hostintel()
        .arg(config.path())
        .arg("/nonexistent/hosts.txt")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Cannot open input file"));
}

#[test]
fn test_malformed_config_is_fatal() {
    let config = file_with("[GeoIP2\n");
    let input = file_with("8.8.8.8\n");

    hostintel()
        .arg(config.path())
        .arg(input.path())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Cannot load configuration file"));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let config = file_with("");
    let input = file_with("");

    hostintel()
        .arg(config.path())
        .arg(input.path())
        .args(["--concurrency", "0"])
        .assert()
        .failure();
}

#[test]
fn test_zero_timeout_is_rejected() {
    let config = file_with("");
    let input = file_with("");

    hostintel()
        .arg(config.path())
        .arg(input.path())
        .args(["--timeout", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("--timeout"));
}
