//! Configuration file generation command.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates a configuration file with default values.
pub fn command_config(
    output: Option<PathBuf>,
    format: &ConfigFormat,
    commented: bool,
) -> Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("procsnap-agent.yaml"));

    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        ConfigFormat::Yaml => {
            let mut content = serde_yaml::to_string(&config)?;
            if commented {
                content = format!("{COMMENT_HEADER}\n{content}");
            }
            content
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("Configuration written to: {}", output.display());
    }
    Ok(())
}

const COMMENT_HEADER: &str = r#"# procsnap-agent configuration
# =============================
#
# Server
# ------
# bind: "0.0.0.0"           # Bind IP (0.0.0.0 = all interfaces)
# port: 9480                # HTTP port
#
# Collection cadence
# ------------------
# freshness_ms: 1500        # Serve the cached snapshot below this age
# cpu_refresh_secs: 5       # Expensive CPU accounting at most this often
# sample_interval_secs: 1   # System-wide CPU sampler cadence
#
# Cache bounds
# ------------
# cpu_cache_max: 500        # Per-PID CPU cache entries before pruning
# name_cache_max: 200       # Resolved-name cache entries before pruning
#
# Collection scope
# ----------------
# proc_root: "/proc"        # Process table root (override for testing)
# max_processes: null       # Hard cap on processes per pass
# parallelism: null         # Worker threads (null = auto)
#
# Feature flags
# -------------
# enable_health: true       # /health endpoint
# enable_name_fallback: true # OS-tool fallback for blocked name lookups
#
# Logging
# -------
# log_level: "info"         # off, error, warn, info, debug, trace
"#;
