//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Placeholder written for the required server URL.
pub const SAMPLE_URL: &str = "http://localhost:8265";

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        url: Some(SAMPLE_URL.into()),
        ..Config::default()
    };
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(default_file_name(&format)),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn default_file_name(format: &ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => "tdarr-exporter.yaml",
        ConfigFormat::Json => "tdarr-exporter.json",
        ConfigFormat::Toml => "tdarr-exporter.toml",
    }
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Tdarr Exporter Configuration
# ============================
#
# Tdarr Server
# ------------
# url: "http://localhost:8265"   # Required; https:// is assumed without a scheme
# api_key: null                  # Sent as x-api-key when set
# verify_ssl: true               # Verify the server's TLS certificate
# http_timeout_seconds: 15       # Per-request timeout
# max_concurrency: 5             # Parallel per-library requests
#
# Tdarr API Paths
# ---------------
# tdarr_metrics_path: "/api/v2/cruddb"
# tdarr_node_path: "/api/v2/get-nodes"
# tdarr_pies_path: "/api/v2/stats/get-pies"
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                # Bind IP (0.0.0.0 = all interfaces)
# port: 9090                     # HTTP port
# metrics_path: "/metrics"       # Path Prometheus scrapes
#
# Logging
# -------
# log_level: "info"              # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false              # Enable HTTPS (default: false)
# tls_cert_path: null            # Path to TLS certificate (PEM format)
# tls_key_path: null             # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Tdarr Exporter Configuration"));

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.url.as_deref(), Some(SAMPLE_URL));
        assert_eq!(loaded.port, Some(crate::config::DEFAULT_PORT));
    }

    #[test]
    fn test_generated_toml_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.max_concurrency, Some(5));
    }
}
