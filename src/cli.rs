// Command-line interface.
// Parses flags, drives the client and maps outcomes to exit codes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::api::{Client, ClientConfig, DEFAULT_BASE_URL, Method, SignaturePlacement};
use crate::cache::ResponseCache;
use crate::error::{EconopsError, Result};
use crate::signature::SignatureScheme;

const EXAMPLES: &str = "\
Examples:
  # Make a PCA request
  econops --route /compute/pca --data '{\"data\": [[1,2,3], [4,5,6]], \"n_components\": 2}'

  # Make a GET request
  econops --route /status --method GET

  # Use environment variable for token
  export econops_token=\"your_token\"
  econops --route /compute/pca --data '{\"data\": [[1,2,3]]}'";

/// Log filter used when neither `RUST_LOG` nor `-v` is given. Keeps request timing visible.
pub const DEFAULT_LOG_FILTER: &str = "econops=info";

/// EconOps API client - statistical and data science API for economics and finance
#[derive(Parser, Debug)]
#[command(name = "econops", version, about, after_help = EXAMPLES)]
pub struct Cli {
    /// API route to call (e.g. /compute/pca)
    #[arg(long, required_unless_present_any = ["clear_cache", "cache_stats"])]
    pub route: Option<String>,

    /// JSON data to send in the request body
    #[arg(long)]
    pub data: Option<String>,

    /// HTTP method (GET, POST, PUT, PATCH or DELETE)
    #[arg(long, default_value = "POST")]
    pub method: Method,

    /// API token
    #[arg(long, env = "econops_token", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL for the API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Pretty print the JSON response
    #[arg(long)]
    pub pretty: bool,

    /// Disable response caching
    #[arg(long)]
    pub no_cache: bool,

    /// Directory for cached responses (defaults to the user cache directory)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Use this signature instead of computing one
    #[arg(long)]
    pub signature: Option<String>,

    /// Send the signature inside the JSON body with a route-digest prefix
    #[arg(long)]
    pub signature_in_payload: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Remove all cached responses
    #[arg(long)]
    pub clear_cache: bool,

    /// Show the number and size of cached responses
    #[arg(long)]
    pub cache_stats: bool,

    /// Enable verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Client configuration described by the flags.
    pub fn client_config(&self) -> ClientConfig {
        let (placement, scheme) = if self.signature_in_payload {
            (SignaturePlacement::Payload, SignatureScheme::RouteDigest)
        } else {
            (SignaturePlacement::Header, SignatureScheme::RouteConcat)
        };

        ClientConfig {
            token: self.token.clone(),
            base_url: self.base_url.clone(),
            use_cache: !self.no_cache,
            cache_dir: self.cache_dir.clone(),
            placement,
            scheme,
            insecure: self.insecure,
        }
    }
}

/// Log filter for a verbosity level. At level 0 `RUST_LOG` takes precedence.
pub fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        1 => EnvFilter::new("econops=debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Run the command and report failures on standard error.
pub fn run(cli: &Cli) -> ExitCode {
    match execute(cli) {
        Ok(code) => code,
        Err(e) if e.is_input_error() => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    if cli.clear_cache || cli.cache_stats {
        maintain_cache(cli)?;
    }

    let Some(route) = cli.route.as_deref() else {
        return Ok(ExitCode::SUCCESS);
    };

    let data = cli.data.as_deref().map(parse_data).transpose()?;

    let client = Client::new(cli.client_config())?;
    let dispatched = client.dispatch(cli.method, route, data.as_ref(), cli.signature.as_deref())?;
    let response = dispatched.response;

    if response.is_ok() {
        println!("{}", render_body(&response.body, cli.pretty));
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error {}: {}", response.status, response.body);
        Ok(ExitCode::FAILURE)
    }
}

fn maintain_cache(cli: &Cli) -> Result<()> {
    let dir = cli
        .cache_dir
        .clone()
        .or_else(ResponseCache::default_dir)
        .ok_or_else(|| EconopsError::InvalidInput("no cache directory available".to_string()))?;
    let cache = ResponseCache::new(dir);

    if cli.clear_cache {
        let removed = cache.clear();
        println!("Removed {} cached responses", removed);
    }
    if cli.cache_stats {
        let stats = cache.stats();
        println!(
            "{} cached responses, {} bytes in {}",
            stats.entries,
            stats.total_bytes,
            cache.dir().display()
        );
    }
    Ok(())
}

/// Parse the `--data` argument.
pub fn parse_data(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(EconopsError::InvalidJson)
}

/// Re-emit a JSON body compact or indented, keeping the server's key order.
///
/// Non-JSON bodies, and bodies holding integers too large to keep exactly,
/// are returned verbatim.
pub fn render_body(body: &str, pretty: bool) -> String {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) if !has_inexact_number(&value) => value,
        _ => return body.to_string(),
    };

    if pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string())
    } else {
        value.to_string()
    }
}

/// Integers beyond the 64-bit range only survive parsing as rounded floats.
fn has_inexact_number(value: &Value) -> bool {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(f) if number.is_f64() => f.fract() == 0.0 && f.abs() >= 9.2e18,
            _ => false,
        },
        Value::Array(items) => items.iter().any(has_inexact_number),
        Value::Object(map) => map.values().any(has_inexact_number),
        _ => false,
    }
}
