//! Configuration loading and CLI > file > default precedence.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9480;
const DEFAULT_FRESHNESS_MS: u64 = 1500;
const DEFAULT_CPU_REFRESH_SECS: u64 = 5;
const DEFAULT_CPU_CACHE_MAX: usize = 500;
const DEFAULT_NAME_CACHE_MAX: usize = 200;
const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 1;

/// Agent configuration. All fields optional so partial files merge over the
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub bind: Option<String>,
    pub port: Option<u16>,

    // Collection cadence
    pub freshness_ms: Option<u64>,
    pub cpu_refresh_secs: Option<u64>,
    pub sample_interval_secs: Option<u64>,

    // Cache bounds
    pub cpu_cache_max: Option<usize>,
    pub name_cache_max: Option<usize>,

    // Collection scope
    pub proc_root: Option<PathBuf>,
    pub max_processes: Option<usize>,
    pub parallelism: Option<usize>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_name_fallback: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            freshness_ms: Some(DEFAULT_FRESHNESS_MS),
            cpu_refresh_secs: Some(DEFAULT_CPU_REFRESH_SECS),
            sample_interval_secs: Some(DEFAULT_SAMPLE_INTERVAL_SECS),
            cpu_cache_max: Some(DEFAULT_CPU_CACHE_MAX),
            name_cache_max: Some(DEFAULT_NAME_CACHE_MAX),
            proc_root: Some(PathBuf::from("/proc")),
            max_processes: None,
            parallelism: None,
            enable_health: Some(true),
            enable_name_fallback: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn freshness_ms(&self) -> u64 {
        self.freshness_ms.unwrap_or(DEFAULT_FRESHNESS_MS)
    }

    pub fn cpu_refresh_secs(&self) -> u64 {
        self.cpu_refresh_secs.unwrap_or(DEFAULT_CPU_REFRESH_SECS)
    }

    pub fn sample_interval_secs(&self) -> u64 {
        self.sample_interval_secs
            .unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS)
    }

    pub fn cpu_cache_max(&self) -> usize {
        self.cpu_cache_max.unwrap_or(DEFAULT_CPU_CACHE_MAX)
    }

    pub fn name_cache_max(&self) -> usize {
        self.name_cache_max.unwrap_or(DEFAULT_NAME_CACHE_MAX)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("/proc"))
    }
}

/// Validate effective config (used by --check-config and at startup).
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.freshness_ms() == 0 {
        return Err(anyhow!("freshness_ms must be greater than zero"));
    }
    if cfg.cpu_refresh_secs() == 0 {
        return Err(anyhow!("cpu_refresh_secs must be greater than zero"));
    }
    if cfg.cpu_cache_max() == 0 || cfg.name_cache_max() == 0 {
        return Err(anyhow!("cache bounds must be greater than zero"));
    }
    if let Some(0) = cfg.max_processes {
        return Err(anyhow!("max_processes must be at least 1 when set"));
    }
    Ok(())
}

/// Resolve configuration with precedence: CLI (if provided) > config file >
/// default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if args.freshness_ms.is_some() {
        config.freshness_ms = args.freshness_ms;
    }
    if args.cpu_refresh_secs.is_some() {
        config.cpu_refresh_secs = args.cpu_refresh_secs;
    }
    if args.proc_root.is_some() {
        config.proc_root = args.proc_root.clone();
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_name_fallback {
        config.enable_name_fallback = Some(false);
    }

    Ok(config)
}

/// Load a config file by extension (YAML default, JSON, TOML), probing the
/// default locations when no explicit path was given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/procsnap/agent.yaml",
                "/etc/procsnap/agent.yml",
                "/etc/procsnap/agent.json",
                "./procsnap-agent.yaml",
                "./procsnap-agent.yml",
                "./procsnap-agent.json",
            ];
            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(anyhow!("config file not found: {}", path.display()));
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };
    Ok(config)
}

/// Print the effective configuration in the requested format.
pub fn show_config(config: &Config, format: &ConfigFormat) -> Result<()> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    println!("{output}");
    Ok(())
}
