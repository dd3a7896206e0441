//! `phiguard check` command implementation.
//!
//! Loads and validates the configuration, then looks for settings that are
//! legal but probably unintended, and prints the classification registry.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use phiguard_core::{PhiguardConfig, SensitivityLevel, StorageBackend};

// ============================================================================
// Check Result Types
// ============================================================================

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.pad("INFO"),
            Severity::Warning => f.pad("WARN"),
            Severity::Error => f.pad("ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
    /// Dotted path into the configuration, e.g. `classifications.lab_reports`.
    pub location: Option<String>,
}

impl CheckFinding {
    fn new(severity: Severity, category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            location: None,
        }
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for CheckFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<5} [{}]", self.severity, self.category)?;
        if let Some(location) = &self.location {
            write!(f, " [{}]", location)?;
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// Main Check Runner
// ============================================================================

/// Validate the configuration file and report findings.
pub fn run(config_path: &Path) -> Result<()> {
    println!("Checking {}", config_path.display());

    let config = PhiguardConfig::load_with_context(config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    let mut findings = Vec::new();
    findings.extend(check_storage(&config));
    findings.extend(check_classifications(&config));
    findings.extend(check_principals(&config));
    findings.extend(check_escalation(&config));
    findings.extend(check_dashboard(&config));
    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(&b.category)));

    println!();
    print_registry(&config);

    println!();
    if findings.is_empty() {
        println!("All checks passed.");
    } else {
        for finding in &findings {
            println!("  {}", finding);
        }
        let warnings = findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count();
        println!();
        println!("Configuration is valid with {} warning(s).", warnings);
    }
    Ok(())
}

fn print_registry(config: &PhiguardConfig) {
    let mut names: Vec<&String> = config.classifications.keys().collect();
    names.sort();

    println!(
        "{:<20} {:<13} {:>9} {:<9} {:<20} ROLES",
        "RESOURCE TYPE", "LEVEL", "RETENTION", "ENCRYPTED", "CATEGORIES"
    );
    for name in names {
        let c = &config.classifications[name];
        println!(
            "{:<20} {:<13} {:>8}d {:<9} {:<20} {}",
            name,
            c.level.as_str(),
            c.retention_period_days,
            if c.encryption_required { "yes" } else { "no" },
            join(&c.categories),
            join(&c.access_controls),
        );
    }
    let d = &config.default_classification;
    println!(
        "{:<20} {:<13} {:>8}d {:<9} {:<20} {}",
        "(default)",
        d.level.as_str(),
        d.retention_period_days,
        if d.encryption_required { "yes" } else { "no" },
        join(&d.categories),
        join(&d.access_controls),
    );
}

fn join(set: &BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

// ============================================================================
// Checks
// ============================================================================

fn check_storage(config: &PhiguardConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    let audit = &config.audit;

    if !audit.enabled {
        findings.push(
            CheckFinding::warning("storage", "audit recording is disabled")
                .with_location("audit.enabled"),
        );
    }
    match audit.storage.backend {
        StorageBackend::Memory => findings.push(
            CheckFinding::warning("storage", "in-memory store loses the audit trail on restart")
                .with_location("audit.storage.backend"),
        ),
        StorageBackend::File if audit.storage.file_path.is_none() => findings.push(
            CheckFinding::info("storage", "no file_path set, writing to ./audit.log")
                .with_location("audit.storage.file_path"),
        ),
        StorageBackend::Database if audit.storage.resolve_database_url().is_none() => findings
            .push(
                CheckFinding::new(
                    Severity::Error,
                    "storage",
                    "database backend selected but no database_url resolves",
                )
                .with_location("audit.storage.database_url"),
            ),
        _ => {}
    }
    if audit.cold_store_path.is_none() {
        findings.push(
            CheckFinding::warning("storage", "archives are kept in memory")
                .with_location("audit.cold_store_path"),
        );
    }
    if audit.seed_fixtures && audit.storage.backend != StorageBackend::Memory {
        findings.push(
            CheckFinding::warning("storage", "fixture seeding writes sample entries to a persistent store")
                .with_location("audit.seed_fixtures"),
        );
    }
    findings
}

fn check_classifications(config: &PhiguardConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    for (name, c) in &config.classifications {
        let location = format!("classifications.{}", name);
        if c.holds_phi() && !c.encryption_required {
            findings.push(
                CheckFinding::warning("classifications", "holds PHI but encryption_required is false")
                    .with_location(location.clone()),
            );
        }
        if c.holds_phi() && c.level < SensitivityLevel::Confidential {
            findings.push(
                CheckFinding::warning(
                    "classifications",
                    format!("holds PHI but is only '{}'", c.level),
                )
                .with_location(location),
            );
        }
    }
    findings
}

fn check_principals(config: &PhiguardConfig) -> Vec<CheckFinding> {
    let known_roles: BTreeSet<&str> = config
        .classifications
        .values()
        .flat_map(|c| c.access_controls.iter().map(|r| r.as_str()))
        .collect();

    let mut findings = Vec::new();
    let mut principals: Vec<_> = config.access.principals.iter().collect();
    principals.sort();
    for (principal, role) in principals {
        if !known_roles.contains(role.as_str()) {
            findings.push(
                CheckFinding::warning(
                    "access",
                    format!("role '{}' grants access to no resource type", role),
                )
                .with_location(format!("access.principals.{}", principal)),
            );
        }
    }
    findings
}

fn check_escalation(config: &PhiguardConfig) -> Vec<CheckFinding> {
    let escalation = &config.escalation;
    if !escalation.enabled {
        return vec![
            CheckFinding::warning("escalation", "high-risk entries are not escalated")
                .with_location("escalation.enabled"),
        ];
    }
    if escalation.webhook_url.is_none() {
        return vec![
            CheckFinding::info("escalation", "no webhook_url, escalations are only logged")
                .with_location("escalation.webhook_url"),
        ];
    }
    Vec::new()
}

fn check_dashboard(config: &PhiguardConfig) -> Vec<CheckFinding> {
    if config.dashboard.enabled && config.dashboard.host == "0.0.0.0" {
        return vec![
            CheckFinding::warning("dashboard", "API listens on all interfaces without authentication")
                .with_location("dashboard.host"),
        ];
    }
    Vec::new()
}
