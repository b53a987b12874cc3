//! Startup self-checks module
//!
//! Verifies the environment before the server starts accepting requests:
//! - Data directory exists and is writable
//! - Database answers queries and has every table
//! - Static frontend directory exists, when one is configured

use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::DbPool;

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Whether this check is critical (failure should abort startup)
    pub critical: bool,
    /// Human-readable message describing the result
    pub message: String,
    /// Additional details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            critical: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            passed: false,
            critical,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregated startup check results
#[derive(Debug, Clone, Serialize)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
    /// Whether all critical checks passed
    pub all_critical_passed: bool,
    /// Whether all checks passed (including non-critical)
    pub all_passed: bool,
    pub summary: String,
}

impl StartupCheckReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        let all_critical_passed = checks.iter().filter(|c| c.critical).all(|c| c.passed);
        let all_passed = checks.iter().all(|c| c.passed);

        let failed_critical = checks
            .iter()
            .filter(|c| c.critical && !c.passed)
            .count();
        let failed_non_critical = checks
            .iter()
            .filter(|c| !c.critical && !c.passed)
            .count();
        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();

        let summary = if all_passed {
            format!("All {} startup checks passed", total)
        } else if all_critical_passed {
            format!(
                "{}/{} checks passed ({} non-critical warnings)",
                passed, total, failed_non_critical
            )
        } else {
            format!(
                "{}/{} checks passed ({} critical failures)",
                passed, total, failed_critical
            )
        };

        Self {
            checks,
            all_critical_passed,
            all_passed,
            summary,
        }
    }
}

/// Run all startup self-checks
pub async fn run_startup_checks(config: &Config, db: &DbPool) -> StartupCheckReport {
    info!("Running startup self-checks...");

    let checks = vec![
        check_data_directory(&config.server.data_dir),
        check_database_connectivity(db).await,
        check_database_schema(db).await,
        check_static_directory(config.server.static_dir.as_deref()),
    ];

    let report = StartupCheckReport::new(checks);

    for check in &report.checks {
        if check.passed {
            info!(
                check = %check.name,
                message = %check.message,
                "Startup check PASSED"
            );
        } else if check.critical {
            error!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (CRITICAL)"
            );
        } else {
            warn!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (non-critical)"
            );
        }
    }

    info!(
        summary = %report.summary,
        all_passed = report.all_passed,
        all_critical_passed = report.all_critical_passed,
        "Startup checks completed"
    );

    report
}

/// Check the data directory exists and accepts writes
fn check_data_directory(data_dir: &Path) -> CheckResult {
    if !data_dir.is_dir() {
        return CheckResult::fail("data_directory", "Data directory does not exist", true)
            .with_details(data_dir.display().to_string());
    }

    let test_file = data_dir.join(".quickvote_write_test");

    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_file);
            CheckResult::pass("data_directory", "Data directory is writable")
                .with_details(format!("Path: {}", data_dir.display()))
        }
        Err(e) => CheckResult::fail("data_directory", "Data directory is not writable", true)
            .with_details(format!("{}: {}", data_dir.display(), e)),
    }
}

/// Check database connectivity
async fn check_database_connectivity(db: &DbPool) -> CheckResult {
    match sqlx::query("SELECT 1").fetch_one(db).await {
        Ok(_) => CheckResult::pass("database_connectivity", "Database connection successful"),
        Err(e) => CheckResult::fail(
            "database_connectivity",
            "Failed to connect to database",
            true,
        )
        .with_details(e.to_string()),
    }
}

/// Check every table the application writes to exists
async fn check_database_schema(db: &DbPool) -> CheckResult {
    match db::missing_tables(db).await {
        Ok(missing) if missing.is_empty() => CheckResult::pass(
            "database_schema",
            format!("Database schema valid ({} tables)", db::REQUIRED_TABLES.len()),
        ),
        Ok(missing) => CheckResult::fail(
            "database_schema",
            "Missing essential database tables",
            true,
        )
        .with_details(format!("Missing: {}", missing.join(", "))),
        Err(e) => CheckResult::fail(
            "database_schema",
            "Failed to query database schema",
            true,
        )
        .with_details(e.to_string()),
    }
}

/// The frontend is optional; a missing directory only means no UI is served
fn check_static_directory(static_dir: Option<&Path>) -> CheckResult {
    match static_dir {
        None => CheckResult::pass("static_directory", "No static directory configured"),
        Some(dir) if dir.is_dir() => {
            CheckResult::pass("static_directory", "Static directory found")
                .with_details(format!("Path: {}", dir.display()))
        }
        Some(dir) => CheckResult::fail(
            "static_directory",
            "Static directory not found (frontend will not be served)",
            false,
        )
        .with_details(dir.display().to_string()),
    }
}
