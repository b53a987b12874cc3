use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::ResultDisplay;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub voting: VotingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory of prebuilt frontend assets served for non-API paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            static_dir: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    /// Length of the public code handed to voters (default: 6)
    #[serde(default = "default_voting_code_length")]
    pub voting_code_length: usize,
    /// Length of the private code kept by the organizer (default: 8)
    #[serde(default = "default_admin_code_length")]
    pub admin_code_length: usize,
    /// Result visibility used when a create request does not pick one
    #[serde(default = "default_result_display")]
    pub default_result_display: ResultDisplay,
    /// Reject ballots that pick more candidates than a position's maxSelections
    #[serde(default)]
    pub enforce_max_selections: bool,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            voting_code_length: default_voting_code_length(),
            admin_code_length: default_admin_code_length(),
            default_result_display: default_result_display(),
            enforce_max_selections: false,
        }
    }
}

fn default_voting_code_length() -> usize {
    6
}

fn default_admin_code_length() -> usize {
    8
}

fn default_result_display() -> ResultDisplay {
    ResultDisplay::AfterCloses
}

const CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=32;

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let voting = &self.voting;

        if !CODE_LENGTH_RANGE.contains(&voting.voting_code_length) {
            bail!(
                "voting.voting_code_length must be between {} and {}",
                CODE_LENGTH_RANGE.start(),
                CODE_LENGTH_RANGE.end()
            );
        }
        if !CODE_LENGTH_RANGE.contains(&voting.admin_code_length) {
            bail!(
                "voting.admin_code_length must be between {} and {}",
                CODE_LENGTH_RANGE.start(),
                CODE_LENGTH_RANGE.end()
            );
        }
        // Codes are looked up by value in one column pair, so the two kinds
        // must never be able to collide.
        if voting.voting_code_length >= voting.admin_code_length {
            bail!("voting.voting_code_length must be shorter than voting.admin_code_length");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.server.data_dir.join("quickvote.db")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.voting.voting_code_length, 6);
        assert_eq!(config.voting.admin_code_length, 8);
        assert_eq!(config.voting.default_result_display, ResultDisplay::AfterCloses);
        assert!(!config.voting.enforce_max_selections);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8088

            [voting]
            default_result_display = "realtime"
            enforce_max_selections = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.voting.default_result_display, ResultDisplay::Realtime);
        assert!(config.voting.enforce_max_selections);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_code_lengths() {
        let mut config = Config::default();
        config.voting.voting_code_length = 8;
        assert!(config.validate().is_err());

        config.voting.voting_code_length = 2;
        assert!(config.validate().is_err());

        config.voting.voting_code_length = 6;
        config.voting.admin_code_length = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/quickvote.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
