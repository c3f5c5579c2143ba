//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Fetch a list of documents into a directory, resuming where a previous
/// run stopped.
///
/// URLs come from the positional arguments, `--input`, or stdin (one per
/// line; blank lines and `#` comments are ignored). Files already present
/// in the output directory are skipped.
#[derive(Parser, Debug)]
#[command(name = "docfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to fetch
    pub urls: Vec<String>,

    /// Read URLs from a file, one per line
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Target directory [default: ./DOCS]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Proxy for all requests (host:port or URL)
    #[arg(long, conflicts_with = "env_proxy")]
    pub proxy: Option<String>,

    /// Use HTTPS_PROXY / HTTP_PROXY / ALL_PROXY from the environment
    #[arg(long)]
    pub env_proxy: bool,

    /// Number of agents (1-100) [default: 12]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Attempts per file including the first (1-20) [default: 5]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_attempts: Option<u32>,

    /// Page each agent visits once to collect cookies; also sent as Referer
    #[arg(long, value_name = "URL")]
    pub landing_url: Option<String>,

    /// Connect timeout in seconds (1-3600) [default: 10]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (1-3600) [default: 180]
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Do not retry permanent failures such as 404
    #[arg(long)]
    pub transient_only: bool,

    /// Write result records as JSON to FILE ("-" for stdout)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Config file [default: $XDG_CONFIG_HOME/docfetch/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
