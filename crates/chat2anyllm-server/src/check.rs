//! `chat2anyllm validate`: sanity check of an existing database file.

use std::path::Path;

use chat2anyllm_store::{SqliteStore, StoreStats};

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub db_valid: bool,
    pub stats: Option<StoreStats>,
    pub errors: Vec<String>,
}

/// Open the database (creating missing tables) and count its rows.
pub fn validate(db_path: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !db_path.exists() {
        report
            .errors
            .push(format!("Database not found: {}", db_path.display()));
        return report;
    }

    let store = match SqliteStore::open(db_path) {
        Ok(store) => store,
        Err(e) => {
            report.errors.push(format!("Failed to open database: {}", e));
            return report;
        }
    };

    if let Err(e) = store.ping() {
        report.errors.push(format!("Database not responding: {}", e));
        return report;
    }

    match store.stats() {
        Ok(stats) => {
            report.stats = Some(stats);
            report.db_valid = true;
        }
        Err(e) => report.errors.push(format!("Failed to read row counts: {}", e)),
    }
    report
}

pub fn print_report(report: &ValidationReport) {
    println!("=== chat2anyllm Database Report ===");
    println!();
    println!("Database valid:     {}", if report.db_valid { "YES" } else { "NO" });
    if let Some(stats) = &report.stats {
        println!("Path:               {}", stats.db_path);
        println!("Size:               {:.2} MB", stats.db_size_mb);
        println!("Sessions:           {}", stats.sessions);
        println!("Messages:           {}", stats.messages);
        println!("Roles:              {}", stats.roles);
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &report.errors {
            println!("  - {}", e);
        }
    }
}
