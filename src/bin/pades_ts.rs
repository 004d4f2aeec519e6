//! PAdES document timestamp CLI
//!
//! Adds RFC 3161 document timestamps to PDFs, extends them to B-LT / B-LTA
//! and validates the timestamps a PDF carries.
//!
//! Usage:
//!   pades-ts timestamp https://freetsa.org/tsr in.pdf out.pdf --ltv
//!   pades-ts archive https://freetsa.org/tsr in.pdf
//!   pades-ts verify in.pdf --rfc8933

use clap::{Args, Parser, Subcommand, ValueEnum};
use pades_timestamp::api::{archive_pdf, timestamp_pdf, validate_timestamps, TimestampOutcome};
use pades_timestamp::config::{Config, TimestampOptions};
use pades_timestamp::network::{Fetcher, NetworkConfig};
use pades_timestamp::validation::ValidationStatus;
use pades_timestamp::{Error, HashAlgorithm, Result};
use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pades-ts")]
#[command(about = "RFC 3161 document timestamps for PDF (PAdES B-T, B-LT, B-LTA)")]
#[command(long_about = "
pades-ts - PDF document timestamps with long-term validation data

EXAMPLES:
    # Plain document timestamp (PAdES B-T)
    pades-ts timestamp https://freetsa.org/tsr contract.pdf

    # Timestamp plus chain and revocation data (PAdES B-LT)
    pades-ts timestamp https://freetsa.org/tsr contract.pdf signed.pdf --ltv

    # Archive timestamp over existing timestamps (PAdES B-LTA)
    pades-ts archive https://freetsa.org/tsr signed.pdf

    # Validate every timestamp, checking RFC 8933 algorithm protection
    pades-ts verify signed.pdf --rfc8933

EXIT CODES:
    0   success, or every timestamp verified
    1   any error, or at least one timestamp failed verification

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (debug logging, error causes)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a document timestamp
    Timestamp(TimestampArgs),

    /// Embed LTV data for existing timestamps, then add an archive timestamp
    Archive(TimestampArgs),

    /// Validate the document timestamps of a PDF
    Verify {
        /// PDF to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Check RFC 8933 CMS algorithm protection
        #[arg(long)]
        rfc8933: bool,

        /// Use only data embedded in the document
        #[arg(long)]
        offline: bool,

        #[command(flatten)]
        network: NetworkArgs,
    },
}

#[derive(Args)]
struct TimestampArgs {
    /// Time Stamping Authority URL
    #[arg(value_name = "TSA_URL")]
    tsa_url: String,

    /// PDF to timestamp
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Output file (defaults to <FILE stem>-timestamped.pdf next to the input)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Digest algorithm for the message imprint
    #[arg(long, value_enum)]
    algorithm: Option<AlgorithmArg>,

    /// Embed certificate chain and revocation data (PAdES B-LT)
    #[arg(long)]
    ltv: bool,

    /// Reason stored in the signature dictionary
    #[arg(long)]
    reason: Option<String>,

    /// Location stored in the signature dictionary
    #[arg(long)]
    location: Option<String>,

    /// Bytes reserved for the token
    #[arg(long, value_name = "BYTES")]
    signature_size: Option<usize>,

    #[command(flatten)]
    network: NetworkArgs,
}

#[derive(Args)]
struct NetworkArgs {
    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Retries for TSA requests
    #[arg(long, value_name = "COUNT")]
    retry: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    #[value(name = "SHA-256", alias = "sha256")]
    Sha256,
    #[value(name = "SHA-384", alias = "sha384")]
    Sha384,
    #[value(name = "SHA-512", alias = "sha512")]
    Sha512,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            AlgorithmArg::Sha384 => HashAlgorithm::Sha384,
            AlgorithmArg::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            report(&e, cli.verbose);
            ExitCode::FAILURE
        },
    }
}

fn report(err: &Error, verbose: bool) {
    eprintln!("Error [{}]: {}", err.code(), err);
    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
    }
}

async fn run(cli: &Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => Config::from_json(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    match &cli.command {
        Commands::Timestamp(args) => {
            let (pdf, options, fetcher) = setup(&config, args)?;
            let outcome = timestamp_pdf(&pdf, &args.tsa_url, &options, &fetcher).await?;
            finish(args, "timestamped", &outcome)
        },
        Commands::Archive(args) => {
            let (pdf, options, fetcher) = setup(&config, args)?;
            let outcome = archive_pdf(&pdf, &args.tsa_url, &options, &fetcher).await?;
            finish(args, "archived", &outcome)
        },
        Commands::Verify {
            file,
            rfc8933,
            offline,
            network,
        } => verify(&config, file, *rfc8933, *offline, network, cli.verbose).await,
    }
}

fn network_config(config: &Config, args: &NetworkArgs) -> NetworkConfig {
    let mut network = config.network.clone();
    if let Some(secs) = args.timeout {
        let ms = secs.saturating_mul(1000);
        network.tsa = network.tsa.with_timeout_ms(ms);
        network.ocsp = network.ocsp.with_timeout_ms(ms);
        network.crl = network.crl.with_timeout_ms(ms);
        network.ca_issuer = network.ca_issuer.with_timeout_ms(ms);
    }
    if let Some(retries) = args.retry {
        network.tsa = network.tsa.with_max_retries(retries);
    }
    network
}

fn setup(config: &Config, args: &TimestampArgs) -> Result<(Vec<u8>, TimestampOptions, Fetcher)> {
    let pdf = fs::read(&args.file)?;

    let mut options = config.timestamp.clone();
    if let Some(algorithm) = args.algorithm {
        options.hash_algorithm = algorithm.into();
    }
    if args.ltv {
        options.ltv = true;
    }
    if let Some(reason) = &args.reason {
        options.prepare.reason = Some(reason.clone());
    }
    if let Some(location) = &args.location {
        options.prepare.location = Some(location.clone());
    }
    if let Some(size) = args.signature_size {
        options.prepare.signature_size = size;
    }

    let fetcher = Fetcher::reqwest(network_config(config, &args.network))?;
    Ok((pdf, options, fetcher))
}

fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
    input.with_file_name(format!("{}-{}.pdf", stem, suffix))
}

fn finish(args: &TimestampArgs, suffix: &str, outcome: &TimestampOutcome) -> Result<bool> {
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.file, suffix));
    fs::write(&output, &outcome.bytes)?;

    println!("Wrote {} ({} bytes)", output.display(), outcome.bytes.len());
    println!("  Field:     {}", outcome.field_name);
    println!("  Time:      {}", outcome.info.gen_time.to_rfc3339());
    println!("  Algorithm: {}", outcome.info.hash_algorithm);
    println!("  Serial:    {}", outcome.info.serial_number);
    println!("  Policy:    {}", outcome.info.policy);
    if let Some(tsa) = &outcome.info.tsa_name {
        println!("  TSA:       {}", tsa);
    }
    if !outcome.ltv.is_empty() {
        println!(
            "  DSS:       {} certificate(s), {} CRL(s), {} OCSP response(s)",
            outcome.ltv.certificates.len(),
            outcome.ltv.crls.len(),
            outcome.ltv.ocsp_responses.len()
        );
    }
    for warning in &outcome.warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(true)
}

async fn verify(
    config: &Config,
    file: &Path,
    rfc8933: bool,
    offline: bool,
    network: &NetworkArgs,
    verbose: bool,
) -> Result<bool> {
    let pdf = fs::read(file)?;

    let mut options = config.validation.clone();
    if rfc8933 {
        options.check_rfc8933 = true;
    }
    if offline {
        options.online = false;
    }
    let fetcher = if options.online {
        Some(Fetcher::reqwest(network_config(config, network))?)
    } else {
        None
    };

    let results = validate_timestamps(&pdf, &options, fetcher.as_ref()).await?;
    if results.is_empty() {
        println!("No document timestamps found in {}", file.display());
        return Ok(false);
    }

    for result in &results {
        println!("{}: {}", result.field_name, result.overall_status);
        if let Some(info) = &result.info {
            println!("  Time:      {}", info.gen_time.to_rfc3339());
            println!("  Algorithm: {}", info.hash_algorithm);
        }
        for detail in &result.details {
            if verbose || detail.status != ValidationStatus::Valid {
                println!("  [{}] {:?}: {}", detail.status, detail.stage, detail.message);
            }
        }
        for code in &result.errors {
            println!("  error:   {}", code);
        }
        for code in &result.warnings {
            println!("  warning: {}", code);
        }
    }

    Ok(results.iter().all(|r| r.overall_status != ValidationStatus::Invalid))
}
