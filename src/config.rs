//! Configuration management for tdarr-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tdarr_exporter::collector::{
    CollectorConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_METRICS_PATH, DEFAULT_NODE_PATH,
    DEFAULT_PIES_PATH,
};
use tracing::{info, warn};
use url::Url;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_PROMETHEUS_PATH: &str = "/metrics";
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 15;

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Tdarr server
    pub url: Option<String>,
    #[serde(alias = "api-key")]
    pub api_key: Option<String>,
    #[serde(alias = "verify-ssl")]
    pub verify_ssl: Option<bool>,
    #[serde(alias = "http-timeout-seconds")]
    pub http_timeout_seconds: Option<u64>,
    #[serde(alias = "tdarr-metrics-path")]
    pub tdarr_metrics_path: Option<String>,
    #[serde(alias = "tdarr-node-path")]
    pub tdarr_node_path: Option<String>,
    #[serde(alias = "tdarr-pies-path")]
    pub tdarr_pies_path: Option<String>,
    #[serde(alias = "max-concurrency")]
    pub max_concurrency: Option<usize>,

    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "prometheus-path", alias = "prometheus_path")]
    pub metrics_path: Option<String>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            verify_ssl: Some(true),
            http_timeout_seconds: Some(DEFAULT_HTTP_TIMEOUT_SECONDS),
            tdarr_metrics_path: Some(DEFAULT_METRICS_PATH.into()),
            tdarr_node_path: Some(DEFAULT_NODE_PATH.into()),
            tdarr_pies_path: Some(DEFAULT_PIES_PATH.into()),
            max_concurrency: Some(DEFAULT_MAX_CONCURRENCY),
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            metrics_path: Some(DEFAULT_PROMETHEUS_PATH.into()),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Effective log level; unknown names fall back to info.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|l| LogLevel::from_str(l, true).ok())
            .unwrap_or(LogLevel::Info)
    }

    pub fn metrics_path(&self) -> &str {
        self.metrics_path.as_deref().unwrap_or(DEFAULT_PROMETHEUS_PATH)
    }

    /// Parsed server URL; `https://` is assumed when no scheme is given.
    pub fn server_url(&self) -> Result<Url, Box<dyn std::error::Error>> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or("Tdarr url is not set (use --url, TDARR_URL or the `url` config key)")?;
        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            warn!("Tdarr url {} has no http/https scheme, assuming https", raw);
            format!("https://{raw}")
        };
        Url::parse(&with_scheme).map_err(|e| format!("Invalid Tdarr url '{raw}': {e}").into())
    }

    /// Library-side configuration for the collector.
    pub fn collector_config(&self) -> Result<CollectorConfig, Box<dyn std::error::Error>> {
        let base_url = self.server_url()?;
        let mut collector = CollectorConfig::new(base_url);
        if let Some(url) = &self.url {
            collector.instance = url.trim().to_string();
        }
        collector.api_key = self.api_key.clone().filter(|k| !k.is_empty());
        collector.verify_ssl = self.verify_ssl.unwrap_or(true);
        collector.http_timeout = Duration::from_secs(
            self.http_timeout_seconds
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS),
        );
        if let Some(path) = &self.tdarr_metrics_path {
            collector.metrics_path = path.clone();
        }
        if let Some(path) = &self.tdarr_node_path {
            collector.node_path = path.clone();
        }
        if let Some(path) = &self.tdarr_pies_path {
            collector.pies_path = path.clone();
        }
        collector.max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        Ok(collector)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    cfg.server_url()?;

    if cfg.max_concurrency == Some(0) {
        return Err("max_concurrency must be at least 1".into());
    }
    if cfg.http_timeout_seconds == Some(0) {
        return Err("http_timeout_seconds must be at least 1".into());
    }
    if !cfg.metrics_path().starts_with('/') {
        return Err(format!("metrics_path '{}' must start with '/'", cfg.metrics_path()).into());
    }
    if matches!(cfg.metrics_path(), "/" | "/healthz") {
        return Err(format!("metrics_path '{}' is reserved", cfg.metrics_path()).into());
    }
    if let Some(bind) = &cfg.bind {
        bind.parse::<std::net::IpAddr>()
            .map_err(|e| format!("Invalid bind address '{bind}': {e}"))?;
    }
    for (key, path) in [
        ("tdarr_metrics_path", &cfg.tdarr_metrics_path),
        ("tdarr_node_path", &cfg.tdarr_node_path),
        ("tdarr_pies_path", &cfg.tdarr_pies_path),
    ] {
        if let Some(path) = path {
            if path.is_empty() {
                return Err(format!("{key} must not be empty").into());
            }
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(Path::new(path)) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {kind} file is empty: {path}").into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {kind} file not found: {path}").into())
        }
        Err(e) => Err(format!("TLS {kind} file is not readable: {path} ({e})").into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI/env (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(url) = &args.url {
        config.url = Some(url.clone());
    }
    if let Some(key) = &args.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(verify) = args.verify_ssl {
        config.verify_ssl = Some(verify);
    }
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(path) = &args.prometheus_path {
        config.metrics_path = Some(path.clone());
    }
    if let Some(timeout) = args.http_timeout_seconds {
        config.http_timeout_seconds = Some(timeout);
    }
    if let Some(n) = args.max_concurrency {
        config.max_concurrency = Some(n);
    }
    if let Some(level) = args.log_level.as_ref().and_then(|l| l.to_possible_value()) {
        config.log_level = Some(level.get_name().to_string());
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads a config file, trying the default locations when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/tdarr-exporter/config.yaml",
                "/etc/tdarr-exporter/config.yml",
                "/etc/tdarr-exporter/config.json",
                "./tdarr-exporter.yaml",
                "./tdarr-exporter.yml",
                "./tdarr-exporter.json",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders a configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format with the API key masked.
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("********".into());
    }
    println!("{}", render_config(&shown, &format)?);
    Ok(())
}
