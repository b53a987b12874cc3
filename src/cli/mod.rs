//! CLI module for the QuickVote command-line interface.
//!
//! Provides subcommands for interacting with a running QuickVote server:
//! - `status` - Check server health
//! - `results <code>` - Print ranked results for a session
//! - `close <admin-code>` / `reopen <admin-code>` - Stop or resume voting
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::error::ErrorResponse;
use crate::db::SessionSummary;
use crate::engine::{PositionStanding, SessionStats};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "quickvote")]
#[command(author, version, about = "Run quick polls and elections with shareable codes", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "quickvote.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Skip startup self-checks (for development only)
    #[arg(long)]
    pub skip_checks: bool,

    /// API URL to connect to
    #[arg(long, env = "QUICKVOTE_API_URL", default_value = "http://localhost:3000")]
    pub api_url: String,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the server is up
    Status,

    /// Show ranked results for a session
    Results {
        /// Voting code or admin code
        code: String,
    },

    /// Close a session so no more ballots are accepted
    Close {
        /// Admin code of the session
        admin_code: String,
    },

    /// Reopen a closed session
    Reopen {
        /// Admin code of the session
        admin_code: String,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultsResponse {
    pub session: SessionSummary,
    pub positions: Vec<PositionStanding>,
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub message: String,
    pub closed_at: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// CLI Command Handlers
// ============================================================================

fn create_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::Results { code }) => cmd_results(cli, code).await,
        Some(Commands::Close { admin_code }) => cmd_close(cli, admin_code).await,
        Some(Commands::Reopen { admin_code }) => cmd_reopen(cli, admin_code).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

/// Pull the `error` message out of a failed response
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error,
        Err(_) => format!("{} - {}", status, body),
    }
}

/// Display server status
async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = create_client()?;
    let base_url = &cli.api_url;

    println!("Connecting to {}...", base_url);

    let response = client
        .get(format!("{}/api/health", base_url))
        .send()
        .await
        .context("Failed to connect to server. Is QuickVote running?")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Server returned error {}: {}", status, body);
    }

    let health: HealthResponse = response
        .json()
        .await
        .context("Failed to parse health response")?;

    let icon = if health.status == "ok" { "[OK]" } else { "[!!]" };
    println!();
    println!("{} {}", icon, health.message);
    println!("Server time: {}", health.timestamp);
    println!();
    Ok(())
}

/// Print ranked results
async fn cmd_results(cli: &Cli, code: &str) -> Result<()> {
    let client = create_client()?;
    let url = format!("{}/api/results/{}", cli.api_url, code);

    let response = client
        .get(&url)
        .send()
        .await
        .context("Failed to fetch results")?;

    match response.status() {
        status if status.is_success() => {}
        StatusCode::FORBIDDEN => {
            println!("[..] {}", error_message(response).await);
            return Ok(());
        }
        _ => anyhow::bail!("Failed to fetch results: {}", error_message(response).await),
    }

    let results: ResultsResponse = response
        .json()
        .await
        .context("Failed to parse results response")?;

    println!();
    println!("=== {} ===", results.session.title);
    println!(
        "Mode: {}    Status: {}",
        results.session.mode,
        if results.session.is_active {
            "open"
        } else {
            "closed"
        }
    );

    for position in &results.positions {
        println!();
        for line in render_position(position) {
            println!("{}", line);
        }
    }

    println!();
    println!("Ballots cast: {}", results.stats.total_votes);
    if let Some(turnout) = results.stats.turnout_percentage {
        println!(
            "Turnout:      {}% of {} invited",
            turnout, results.stats.total_invited
        );
    }
    println!();

    Ok(())
}

/// One header line plus one line per candidate
fn render_position(position: &PositionStanding) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({} vote{})",
        position.title,
        position.total_votes,
        if position.total_votes == 1 { "" } else { "s" }
    )];

    for candidate in &position.candidates {
        let marker = if candidate.is_leading {
            " leading"
        } else if candidate.is_tied {
            " tied"
        } else {
            ""
        };
        lines.push(format!(
            "  #{:<3} {:24} {:>5} {:>6.1}%{}",
            candidate.rank,
            truncate(&candidate.name, 24),
            candidate.vote_count,
            candidate.percentage,
            marker
        ));
    }

    lines
}

async fn cmd_close(cli: &Cli, admin_code: &str) -> Result<()> {
    let client = create_client()?;
    let response = client
        .post(format!("{}/api/sessions/close", cli.api_url))
        .json(&json!({ "adminCode": admin_code }))
        .send()
        .await
        .context("Failed to close session")?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to close session: {}", error_message(response).await);
    }

    let closed: CloseResponse = response
        .json()
        .await
        .context("Failed to parse close response")?;

    println!("[OK] {} at {}", closed.message, closed.closed_at);
    Ok(())
}

async fn cmd_reopen(cli: &Cli, admin_code: &str) -> Result<()> {
    let client = create_client()?;
    let response = client
        .post(format!("{}/api/sessions/reopen", cli.api_url))
        .json(&json!({ "adminCode": admin_code }))
        .send()
        .await
        .context("Failed to reopen session")?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to reopen session: {}", error_message(response).await);
    }

    let reopened: MessageResponse = response
        .json()
        .await
        .context("Failed to parse reopen response")?;

    println!("[OK] {}", reopened.message);
    Ok(())
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    use crate::config::Config;

    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Address:      {}", config.bind_addr());
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Database:     {}", config.database_path().display());
            match &config.server.static_dir {
                Some(dir) => println!("  Static Dir:   {}", dir.display()),
                None => println!("  Static Dir:   (none)"),
            }
            println!();
            println!("Voting:");
            println!("  Voting Code:  {} characters", config.voting.voting_code_length);
            println!("  Admin Code:   {} characters", config.voting.admin_code_length);
            println!("  Results:      {}", config.voting.default_result_display);
            println!(
                "  Max Selections: {}",
                if config.voting.enforce_max_selections {
                    "Enforced"
                } else {
                    "Not enforced"
                }
            );
            println!();

            if config.server.static_dir.is_none() {
                println!("Warnings:");
                println!("  [!] No static_dir set - only the API will be served");
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            anyhow::bail!("Invalid configuration file");
        }
    }
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RankedCandidate;

    fn candidate(name: &str, votes: i64, rank: u32, is_tied: bool, is_leading: bool) -> RankedCandidate {
        RankedCandidate {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: None,
            photo_url: None,
            display_order: 0,
            vote_count: votes,
            percentage: 0.0,
            rank,
            is_tied,
            is_leading,
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["quickvote", "results", "ABC123"]);
        assert!(matches!(cli.command, Some(Commands::Results { ref code }) if code == "ABC123"));

        let cli = Cli::parse_from(["quickvote", "--skip-checks"]);
        assert!(cli.skip_checks);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["quickvote", "config", "check"]);
        assert!(matches!(cli.command, Some(Commands::Config(ConfigCommands::Check))));
    }

    #[test]
    fn test_render_position_marks_leader_and_ties() {
        let position = PositionStanding {
            id: "p1".to_string(),
            title: "President".to_string(),
            description: None,
            max_selections: 1,
            display_order: 0,
            total_votes: 1,
            candidates: vec![
                candidate("A", 1, 1, false, true),
                candidate("B", 0, 2, false, false),
            ],
        };

        let lines = render_position(&position);
        assert_eq!(lines[0], "President (1 vote)");
        assert!(lines[1].ends_with("leading"));
        assert!(!lines[2].contains("leading"));

        let tied = PositionStanding {
            total_votes: 4,
            candidates: vec![
                candidate("A", 2, 1, true, false),
                candidate("B", 2, 1, true, false),
            ],
            ..position
        };
        let lines = render_position(&tied);
        assert_eq!(lines[0], "President (4 votes)");
        assert!(lines[1].ends_with("tied") && lines[2].ends_with("tied"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long candidate name", 10), "a very ...");
    }
}
