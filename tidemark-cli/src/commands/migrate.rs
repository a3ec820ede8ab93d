//! Migrate command - apply pending migrations
//!
//! Ctrl-C requests cancellation: the migration in flight still commits or
//! rolls back, and no further migrations start.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use tidemark_core::{CancellationToken, RunReport};

pub fn run(project_dir: PathBuf, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async move {
        let token = CancellationToken::new();

        let listener = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "{}",
                    "Cancellation requested, stopping after the current migration...".yellow()
                );
                listener.cancel();
            }
        });

        tokio::task::spawn_blocking(move || -> Result<RunReport> {
            let ctx = get_context(&project_dir)?;
            Ok(ctx.migrate(&token))
        })
        .await?
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match report.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_report(report: &RunReport) {
    if report.migrations.is_empty() && report.is_completed() {
        output::info("Database is up to date, no pending migrations.");
        return;
    }

    for migration in &report.migrations {
        println!(
            "  {} {} {}",
            "✓".green(),
            migration.file_name,
            format!("({})", output::format_duration_ms(migration.execution_time_ms)).dimmed()
        );
    }

    let summary = format!(
        "Applied {} migration(s) in {}",
        report.executed_count,
        output::format_duration_ms(report.total_elapsed_ms)
    );
    if report.is_completed() {
        println!();
        output::success(&summary);
    } else {
        println!();
        output::warning(&format!("Run aborted. {}", summary));
    }
}
