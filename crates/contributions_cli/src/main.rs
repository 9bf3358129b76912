//! Contributions CLI - list the GitHub repositories a user has contributed to.

mod config;
mod progress;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use contributions::{ReportEntry, ScanOptions, StatsPolicy, list_contributions};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::progress::ProgressReporter;

#[derive(Debug, Parser)]
#[command(name = "contributions")]
#[command(version)]
#[command(about = "List repositories a GitHub user has contributed to")]
#[command(
    long_about = "Contributions scans every repository owned by a user and by the \
organizations they belong to, fetches contributor statistics for each one, and \
prints the user's entry for every repository they contributed to as JSON. \
A valid GitHub token is required, via GITHUB_TOKEN or the config file."
)]
#[command(after_long_help = r#"EXAMPLES
    Scan your own repositories and organizations:
        $ contributions > contributions.json

    Scan a specific user across two organizations:
        $ contributions -u alice -o acme -o globex --out alice.json

    Scan a GitHub Enterprise installation:
        $ contributions -g https://ghe.example.com/api

CONFIGURATION
    Contributions reads configuration from:
      1. ~/.config/contributions/config.toml (or $XDG_CONFIG_HOME/contributions/config.toml)
      2. ./contributions.toml
      3. Environment variables (CONTRIBUTIONS_ prefix, e.g., CONTRIBUTIONS_SCAN__CONCURRENCY)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITHUB_TOKEN                    GitHub personal access token
    CONTRIBUTIONS_GITHUB__TOKEN     GitHub token (takes precedence over GITHUB_TOKEN)
    CONTRIBUTIONS_GITHUB__URL       GitHub API base URL
    RUST_LOG                        Log filter (overrides --verbose)
"#)]
struct Cli {
    /// GitHub API base URL (default from config or https://api.github.com)
    #[arg(short = 'g', long)]
    url: Option<String>,

    /// Contributor username (default: the token's owner)
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Owners to check instead of the user's organizations; repeatable
    #[arg(short = 'o', long = "owner")]
    owners: Vec<String>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Don't show the progress bar
    #[arg(short = 'n', long)]
    no_progress: bool,

    /// Maximum concurrent requests to GitHub (default from config or 20)
    #[arg(short = 'm', long)]
    max_concurrency: Option<usize>,

    /// Maximum concurrent requests to the contributors endpoint (default from config or 20)
    #[arg(short = 'c', long)]
    max_contributors: Option<usize>,

    /// Seconds between polls while stats are computed (default from config or 5)
    #[arg(long, value_name = "SECS")]
    stats_delay: Option<u64>,

    /// Give up on a repository after this many polls (default: never)
    #[arg(long, value_name = "N")]
    max_stats_attempts: Option<usize>,

    /// Output file (default: stdout)
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

impl Cli {
    /// Merge flags over the loaded configuration.
    fn scan_options(&self, config: &Config, token: Option<String>) -> ScanOptions {
        let defaults = ScanOptions::default();
        ScanOptions {
            base_url: self
                .url
                .clone()
                .or_else(|| config.github.url.clone())
                .unwrap_or(defaults.base_url),
            token,
            username: self.username.clone(),
            owners: self.owners.clone(),
            concurrency: self.max_concurrency.unwrap_or(config.scan.concurrency),
            stats_concurrency: self
                .max_contributors
                .unwrap_or(config.scan.stats_concurrency),
            stats: StatsPolicy {
                delay: Duration::from_secs(
                    self.stats_delay.unwrap_or(config.scan.stats_delay_secs),
                ),
                max_attempts: self.max_stats_attempts.or(config.scan.max_stats_attempts),
            },
            request_timeout: Duration::from_secs(config.scan.request_timeout_secs),
        }
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "contributions=debug,contributions_cli=debug"
    } else {
        "contributions=warn,contributions_cli=warn"
    }
}

fn init_tracing(verbose: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_filter(verbose)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Render the report as JSON indented with four spaces, plus a newline.
fn render_report(entries: &[ReportEntry]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    entries.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (config file -> env vars -> defaults)
    let config = Config::load();
    let options = cli.scan_options(&config, config.github_token());

    let reporter = Arc::new(ProgressReporter::new(!cli.no_progress));
    let result = list_contributions(&options, Some(reporter.as_callback())).await;
    reporter.finish();
    let report = result?;

    for (repo, error) in &report.failures {
        tracing::debug!(repo = %repo, error = %error, "Left out of report");
    }

    let rendered = render_report(&report.entries)?;
    match &cli.out {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contributions::{ContributorStats, RepoRef};
    use serde_json::json;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("contributions").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert!(cli.url.is_none());
        assert!(cli.owners.is_empty());
        assert!(!cli.verbose);
        assert!(!cli.no_progress);
        assert!(cli.out.is_none());

        let options = cli.scan_options(&Config::default(), None);
        assert_eq!(options.base_url, "https://api.github.com");
        assert_eq!(options.concurrency, 20);
        assert_eq!(options.stats_concurrency, 20);
        assert_eq!(options.stats, StatsPolicy::default());
        assert_eq!(options.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&[
            "-g",
            "https://ghe.example.com/api",
            "-u",
            "alice",
            "-o",
            "acme",
            "-o",
            "globex",
            "-v",
            "-n",
            "-m",
            "5",
            "-c",
            "2",
        ]);

        assert_eq!(cli.username.as_deref(), Some("alice"));
        assert_eq!(cli.owners, vec!["acme", "globex"]);
        assert!(cli.verbose);
        assert!(cli.no_progress);

        let options = cli.scan_options(&Config::default(), Some("t".into()));
        assert_eq!(options.base_url, "https://ghe.example.com/api");
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.stats_concurrency, 2);
        assert_eq!(options.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.github.url = Some("https://ghe.internal/api".into());
        config.scan.concurrency = 8;
        config.scan.stats_delay_secs = 9;
        config.scan.max_stats_attempts = Some(3);

        let from_config = parse(&[]).scan_options(&config, None);
        assert_eq!(from_config.base_url, "https://ghe.internal/api");
        assert_eq!(from_config.concurrency, 8);
        assert_eq!(from_config.stats.delay, Duration::from_secs(9));
        assert_eq!(from_config.stats.max_attempts, Some(3));

        let from_flags = parse(&[
            "--max-concurrency",
            "2",
            "--stats-delay",
            "1",
            "--max-stats-attempts",
            "7",
        ])
        .scan_options(&config, None);
        assert_eq!(from_flags.concurrency, 2);
        assert_eq!(from_flags.stats.delay, Duration::from_secs(1));
        assert_eq!(from_flags.stats.max_attempts, Some(7));
    }

    #[test]
    fn test_out_path_and_invalid_numbers() {
        let cli = parse(&["--out", "report.json"]);
        assert_eq!(cli.out, Some(PathBuf::from("report.json")));

        assert!(Cli::try_parse_from(["contributions", "-m", "many"]).is_err());
    }

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(
            default_filter(false),
            "contributions=warn,contributions_cli=warn"
        );
        assert_eq!(
            default_filter(true),
            "contributions=debug,contributions_cli=debug"
        );
    }

    #[test]
    fn test_render_report_uses_four_space_indent() {
        let stats: ContributorStats =
            serde_json::from_value(json!({"author": {"login": "alice"}, "total": 5}))
                .expect("stats");
        let entries = vec![ReportEntry {
            repo: RepoRef {
                owner: "acme".into(),
                name: "r1".into(),
            },
            stats,
        }];

        let rendered = String::from_utf8(render_report(&entries).expect("render")).expect("utf8");

        assert!(rendered.starts_with("[\n    {\n        \"repo\": {"));
        assert!(rendered.ends_with("]\n"));
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(parsed[0]["stats"]["total"], 5);
        assert_eq!(parsed[0]["repo"]["owner"], "acme");
    }

    #[test]
    fn test_render_empty_report() {
        let rendered = render_report(&[]).expect("render");
        assert_eq!(rendered, b"[]\n");
    }
}
