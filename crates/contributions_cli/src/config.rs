//! Configuration file support for contributions.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `CONTRIBUTIONS_`, sections split
//!    by a double underscore, e.g. `CONTRIBUTIONS_SCAN__STATS_CONCURRENCY`)
//! 3. Config file (./contributions.toml, then ~/.config/contributions/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GITHUB_TOKEN
//! url = "https://ghe.example.com/api"  # optional, defaults to api.github.com
//!
//! [scan]
//! concurrency = 20
//! stats_concurrency = 20
//! stats_delay_secs = 5
//! max_stats_attempts = 60  # optional, polls until computed when unset
//! request_timeout_secs = 60
//! ```

use std::path::PathBuf;

use config::builder::{ConfigBuilder as Builder, DefaultState};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use contributions::scan::DEFAULT_REQUEST_TIMEOUT_SECS;
use contributions::types::{DEFAULT_CONCURRENCY, DEFAULT_STATS_CONCURRENCY, DEFAULT_STATS_DELAY_SECS};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub connection settings.
    pub github: GitHubConfig,
    /// Default scan options.
    pub scan: ScanConfig,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. Falls back to the GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise installations.
    pub url: Option<String>,
}

/// Default scan options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum concurrent API requests.
    pub concurrency: usize,
    /// Maximum repositories polling contributor stats at once.
    pub stats_concurrency: usize,
    /// Seconds to wait between polls while GitHub computes stats.
    pub stats_delay_secs: u64,
    /// Give up on a repository after this many polls.
    pub max_stats_attempts: Option<usize>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            stats_concurrency: DEFAULT_STATS_CONCURRENCY,
            stats_delay_secs: DEFAULT_STATS_DELAY_SECS,
            max_stats_attempts: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/contributions/config.toml)
    /// 3. Local config file (./contributions.toml)
    /// 4. Environment variables with CONTRIBUTIONS_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("contributions.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./contributions.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("CONTRIBUTIONS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    /// Build and deserialize, falling back to defaults on any error.
    fn from_builder(builder: Builder<DefaultState>) -> Self {
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitHub token: the configured one, else `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        self.configured_token()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    fn configured_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "contributions").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Config {
        Config::from_builder(
            ConfigBuilder::builder().add_source(File::from_str(content, FileFormat::Toml)),
        )
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert!(config.github.url.is_none());
        assert_eq!(config.scan.concurrency, 20);
        assert_eq!(config.scan.stats_concurrency, 20);
        assert_eq!(config.scan.stats_delay_secs, 5);
        assert_eq!(config.scan.max_stats_attempts, None);
        assert_eq!(config.scan.request_timeout_secs, 60);
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [github]
            token = "ghp_test123"
            url = "https://ghe.example.com/api"

            [scan]
            concurrency = 8
            stats_concurrency = 4
            stats_delay_secs = 2
            max_stats_attempts = 10
            request_timeout_secs = 30
        "#,
        );

        assert_eq!(config.github.token.as_deref(), Some("ghp_test123"));
        assert_eq!(
            config.github.url.as_deref(),
            Some("https://ghe.example.com/api")
        );
        assert_eq!(config.scan.concurrency, 8);
        assert_eq!(config.scan.stats_concurrency, 4);
        assert_eq!(config.scan.stats_delay_secs, 2);
        assert_eq!(config.scan.max_stats_attempts, Some(10));
        assert_eq!(config.scan.request_timeout_secs, 30);
    }

    #[test]
    fn test_config_partial_override() {
        let config = from_toml(
            r#"
            [scan]
            stats_concurrency = 3
        "#,
        );

        assert_eq!(config.scan.stats_concurrency, 3);
        assert_eq!(config.scan.concurrency, 20);
        assert_eq!(config.scan.stats_delay_secs, 5);
    }

    #[test]
    fn test_config_merging_order() {
        let settings = ConfigBuilder::builder()
            .add_source(File::from_str(
                "[scan]\nconcurrency = 20\nstats_delay_secs = 9",
                FileFormat::Toml,
            ))
            .add_source(File::from_str("[scan]\nconcurrency = 4", FileFormat::Toml));

        let config = Config::from_builder(settings);

        assert_eq!(config.scan.concurrency, 4);
        assert_eq!(config.scan.stats_delay_secs, 9);
    }

    #[test]
    fn test_config_invalid_toml_falls_back_to_defaults() {
        let config = from_toml("[scan\nconcurrency = 1");
        assert_eq!(config.scan.concurrency, 20);
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let config = from_toml(
            r#"
            [scan]
            concurrency = 7
            unknown_field = "should be ignored"
        "#,
        );
        assert_eq!(config.scan.concurrency, 7);
    }

    #[test]
    fn test_blank_configured_token_is_ignored() {
        let config = from_toml("[github]\ntoken = \"  \"");
        assert_eq!(config.configured_token(), None);

        let config = from_toml("[github]\ntoken = \"ghp_x\"");
        assert_eq!(config.configured_token().as_deref(), Some("ghp_x"));
        assert_eq!(config.github_token().as_deref(), Some("ghp_x"));
    }

    #[test]
    fn test_default_config_path_names_the_app() {
        if let Some(path) = Config::default_config_path() {
            assert!(path.ends_with("config.toml"));
            assert!(path.to_string_lossy().contains("contributions"));
        }
    }
}
