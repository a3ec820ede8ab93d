//! Validate command - checksum verification and pending list, no execution

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use tidemark_core::MigrationError;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(project_dir)?;

    match ctx.validate() {
        Ok(report) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "valid": true,
                        "applied_count": report.applied_count,
                        "pending": report.pending,
                    }))?
                );
                return Ok(());
            }

            output::success(&format!(
                "All {} applied migration(s) match their files.",
                report.applied_count
            ));

            if report.pending.is_empty() {
                println!("No pending migrations.");
                return Ok(());
            }

            println!();
            println!("{}", "Pending migrations".bold());
            let mut table = output::create_table();
            table.set_header(vec!["Version", "File", "Batches", "Checksum"]);
            for pending in &report.pending {
                table.add_row(vec![
                    pending.version.to_string(),
                    pending.file_name.clone(),
                    pending.batch_count.to_string(),
                    output::short_checksum(&pending.checksum).to_string(),
                ]);
            }
            println!("{}", table);
            Ok(())
        }
        Err(error) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "valid": false,
                        "error": error,
                    }))?
                );
            } else if let MigrationError::ChecksumMismatch(mismatch) = &error {
                let mut table = output::create_table();
                table.set_header(vec!["Version", "File", "Recorded", "On Disk"]);
                for m in &mismatch.mismatches {
                    table.add_row(vec![
                        m.version.to_string(),
                        m.file_name.clone(),
                        output::short_checksum(&m.expected).to_string(),
                        output::short_checksum(&m.actual).to_string(),
                    ]);
                }
                println!("{}", table);
            }
            Err(error.into())
        }
    }
}
