//! hostintel
//!
//! Looks up host intelligence for every line of an input file and writes
//! CSV to stdout once all hosts have been processed.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostintel::config::{Config, Overrides};
use hostintel::enrichment::{ProviderRegistry, Selection};
use hostintel::models::host_utils::parse_host_list;
use hostintel::models::Host;
use hostintel::output;
use hostintel::pipeline::{Pipeline, PipelineOptions};

/// hostintel
#[derive(Parser, Debug)]
#[command(name = "hostintel")]
#[command(about = "Look up host intelligence information and output CSV. \
    Nothing is written until all of the input has been processed.")]
struct Args {
    /// Configuration file
    configuration_file: PathBuf,

    /// Input file, one host per line (IP, domain, or FQDN host name)
    input_file: PathBuf,

    /// Perform all lookups
    #[arg(short, long)]
    all: bool,

    /// DNS lookup
    #[arg(short, long)]
    dns: bool,

    /// VirusTotal lookup
    #[arg(short, long)]
    virustotal: bool,

    /// PassiveTotal lookup
    #[arg(short, long)]
    passivetotal: bool,

    /// Write the CSV report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-provider lookup timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Number of hosts looked up concurrently
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    /// GeoIP city database path
    #[arg(long, env = "GEOIP_CITY_DB")]
    geoip_city_db: Option<PathBuf>,

    /// GeoIP ASN database path
    #[arg(long, env = "GEOIP_ASN_DB")]
    geoip_asn_db: Option<PathBuf>,

    /// VirusTotal API key
    #[arg(long, env = "VIRUSTOTAL_API_KEY", hide_env_values = true)]
    virustotal_api_key: Option<String>,

    /// PassiveTotal username
    #[arg(long, env = "PASSIVETOTAL_USERNAME")]
    passivetotal_username: Option<String>,

    /// PassiveTotal API key
    #[arg(long, env = "PASSIVETOTAL_API_KEY", hide_env_values = true)]
    passivetotal_api_key: Option<String>,
}

impl Args {
    fn selection(&self) -> Selection {
        Selection {
            all: self.all,
            dns: self.dns,
            virustotal: self.virustotal,
            passivetotal: self.passivetotal,
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            geoip_city_db: self.geoip_city_db.clone(),
            geoip_asn_db: self.geoip_asn_db.clone(),
            virustotal_api_key: self.virustotal_api_key.clone(),
            passivetotal_username: self.passivetotal_username.clone(),
            passivetotal_api_key: self.passivetotal_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostintel=info".into()),
        )
        .with(
            args.log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(io::stderr)),
        )
        .with(
            (!args.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr)),
        )
        .init();

    // Load configuration
    let config = Config::load(&args.configuration_file)
        .context("Cannot load configuration file")?
        .with_overrides(args.overrides());

    // Read the whole host list before any lookup starts
    let content = std::fs::read_to_string(&args.input_file).with_context(|| {
        format!("Cannot open input file {}", args.input_file.display())
    })?;
    let hosts: Vec<Host> = parse_host_list(&content)
        .into_iter()
        .map(Host::new)
        .collect();
    tracing::info!(hosts = hosts.len(), "Loaded input hosts");

    // Setup providers
    let registry = ProviderRegistry::select(&config, &args.selection())
        .await
        .context("Cannot initialize enrichment providers")?;

    tracing::info!(providers = ?registry.names(), "Enrichment providers ready");

    let pipeline = Pipeline::new(
        registry,
        PipelineOptions {
            timeout: Duration::from_secs(args.timeout),
            concurrency: usize::from(args.concurrency),
        },
    );

    let report = pipeline.run(hosts).await;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create output file {}", path.display()))?;
            output::write_csv(&report, BufWriter::new(file))?;
        }
        None => output::write_csv(&report, io::stdout().lock())?,
    }

    output::write_diagnostics(&report, io::stderr().lock())?;

    Ok(())
}
