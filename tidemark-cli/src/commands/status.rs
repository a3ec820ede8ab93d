//! Status command - show applied and pending migrations

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use tidemark_core::MigrationStatus;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(project_dir)?;
    let status = ctx.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Migration Status".bold());
    println!("  Directory: {}", ctx.config.migrations_dir.display());
    println!("  Database:  {}", ctx.config.database_path.display());
    println!();

    if status.statuses.is_empty() && status.missing_files.is_empty() {
        println!("No migration files found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Version", "File", "State", "Applied At", "Time", "Checksum"]);

    for entry in &status.statuses {
        table.add_row(vec![
            entry.version.to_string(),
            entry.file_name.clone(),
            state_label(entry),
            entry
                .applied_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            entry
                .execution_time_ms
                .map(output::format_duration_ms)
                .unwrap_or_default(),
            output::short_checksum(&entry.checksum).to_string(),
        ]);
    }

    println!("{}", table);
    println!();
    println!(
        "{} applied, {} pending",
        status.applied_count(),
        status.pending_count()
    );

    if status.mismatch_count() > 0 {
        output::error(&format!(
            "{} applied migration(s) changed since they ran; the next migrate will abort.",
            status.mismatch_count()
        ));
    }

    if !status.missing_files.is_empty() {
        println!();
        output::warning("Applied migrations with no file on disk:");
        for record in &status.missing_files {
            println!("  {} {}", record.version, record.file_name);
        }
    }

    Ok(())
}

fn state_label(entry: &MigrationStatus) -> String {
    if !entry.is_applied {
        "pending".yellow().to_string()
    } else if entry.checksum_matches {
        "applied".green().to_string()
    } else {
        "MODIFIED".red().bold().to_string()
    }
}
