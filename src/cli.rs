//! CLI arguments and subcommands for tdarr-exporter.
//!
//! Every server option can also be supplied through an environment variable,
//! which is how the exporter is usually configured in containers.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "tdarr-exporter",
    about = "Prometheus exporter for Tdarr server statistics",
    long_about = "Prometheus exporter for Tdarr server statistics.\n\n\
                  Polls the Tdarr API on every scrape and exports server-wide totals, \
                  per-library codec/container/status breakdowns, node resource usage and \
                  worker state.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Tdarr server URL (https:// is assumed when no scheme is given)
    #[arg(long, env = "TDARR_URL")]
    pub url: Option<String>,

    /// API key sent in the x-api-key header
    #[arg(long, env = "TDARR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Verify the Tdarr server's TLS certificate
    #[arg(long, env = "VERIFY_SSL")]
    pub verify_ssl: Option<bool>,

    /// HTTP listen port
    #[arg(short = 'p', long, env = "PROMETHEUS_PORT")]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Path the metrics are served on
    #[arg(long, env = "PROMETHEUS_PATH")]
    pub prometheus_path: Option<String>,

    /// Timeout for each request to the Tdarr server
    #[arg(long)]
    pub http_timeout_seconds: Option<u64>,

    /// Maximum concurrent per-library requests
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Log level [default: info]
    #[arg(long, value_enum, env = "LOG_LEVEL", ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run collection cycles against the configured server
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print the metrics of the last cycle
        #[arg(long)]
        verbose: bool,
    },
}
