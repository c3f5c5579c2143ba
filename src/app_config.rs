//! Application configuration loading for CLI defaults.
//!
//! Values come from a TOML file and sit between the built-in defaults and
//! the command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use docfetch_core::download::env_proxy_for_scheme;
use docfetch_core::{FetchConfig, RetryPolicy, RetryScope};
use serde::Deserialize;

use crate::cli::Args;

/// Target directory used when neither flag nor config names one.
pub const DEFAULT_OUTPUT_DIR: &str = "DOCS";

/// TOML-backed file configuration for docfetch defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default target directory.
    pub output_dir: Option<PathBuf>,
    /// Agent pool size (1..=100).
    pub concurrency: Option<usize>,
    /// Attempts per file including the first (1..=20).
    pub max_attempts: Option<u32>,
    /// Per-request connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Per-request read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Redirect hops per request (0..=50).
    pub max_redirects: Option<usize>,
    /// Page visited once per agent for cookies.
    pub landing_url: Option<String>,
    /// Proxy, `host:port` or URL.
    pub proxy: Option<String>,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// Stop retrying on permanent failures such as 404.
    pub transient_only: Option<bool>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(max_attempts) = self.max_attempts
            && !(1..=20).contains(&max_attempts)
        {
            bail!("Invalid config value for `max_attempts`: {max_attempts}. Expected range: 1..=20");
        }

        if let Some(max_redirects) = self.max_redirects
            && max_redirects > 50
        {
            bail!("Invalid config value for `max_redirects`: {max_redirects}. Expected range: 0..=50");
        }

        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if let Some(landing_url) = self.landing_url.as_deref()
            && !(landing_url.starts_with("http://") || landing_url.starts_with("https://"))
        {
            bail!("Invalid config value for `landing_url`: '{landing_url}'. Expected an http(s) URL");
        }

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log level used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Default log level from flags, then config.
///
/// `RUST_LOG` still wins over the returned value.
#[must_use]
pub fn default_log_level(args: &Args, file: Option<&FileConfig>) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file
            .and_then(|cfg| cfg.verbosity)
            .map_or("info", VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}

/// Everything a run needs after layering defaults, file and flags.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Engine configuration.
    pub fetch: FetchConfig,
    /// Target directory.
    pub output_dir: PathBuf,
}

/// Layers built-in defaults < config file < command-line flags.
#[must_use]
pub fn resolve_run_settings(args: &Args, file: &FileConfig) -> RunSettings {
    let defaults = FetchConfig::default();

    let concurrency = args
        .concurrency
        .map(usize::from)
        .or(file.concurrency)
        .unwrap_or(defaults.concurrency);
    let max_attempts = args
        .max_attempts
        .or(file.max_attempts)
        .unwrap_or(defaults.retry.max_attempts());
    let scope = if args.transient_only || file.transient_only.unwrap_or(false) {
        RetryScope::TransientOnly
    } else {
        RetryScope::Uniform
    };
    let connect_timeout = args
        .connect_timeout
        .or(file.connect_timeout_secs)
        .map_or(defaults.connect_timeout, Duration::from_secs);
    let read_timeout = args
        .read_timeout
        .or(file.read_timeout_secs)
        .map_or(defaults.read_timeout, Duration::from_secs);
    let proxy = if args.env_proxy {
        env_proxy_for_scheme("https").or_else(|| env_proxy_for_scheme("http"))
    } else {
        args.proxy.clone().or_else(|| file.proxy.clone())
    };

    let mut fetch = FetchConfig::default()
        .with_concurrency(concurrency)
        .with_retry(RetryPolicy::with_max_attempts(max_attempts).scoped(scope))
        .with_timeouts(connect_timeout, read_timeout)
        .with_landing_url(args.landing_url.clone().or_else(|| file.landing_url.clone()))
        .with_proxy(proxy);
    if let Some(max_redirects) = file.max_redirects {
        fetch.max_redirects = max_redirects;
    }
    if let Some(user_agent) = file.user_agent.clone() {
        fetch.user_agent = user_agent;
    }

    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    RunSettings { fetch, output_dir }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was consulted, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/docfetch/config.toml`
/// 2. `$HOME/.config/docfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("docfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("docfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads an explicit config file, or the default one if it exists.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };
    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = read_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}
