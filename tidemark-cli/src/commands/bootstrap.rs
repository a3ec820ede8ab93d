//! Bootstrap command - create the migration history table

use std::path::Path;

use anyhow::Result;

use super::get_context;
use crate::output;
use tidemark_core::BootstrapResult;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(project_dir)?;
    let result = ctx.bootstrap()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        BootstrapResult::AlreadyBootstrapped => {
            output::info("History table already exists, nothing to do.");
        }
        BootstrapResult::Applied {
            source,
            batch_count,
        } => {
            output::success(&format!(
                "Created migration history table from {} ({} batch(es))",
                source, batch_count
            ));
        }
    }

    Ok(())
}
