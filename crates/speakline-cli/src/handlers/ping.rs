//! Ping command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Check that the engine answers and print where it was found.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let synthesizer = ctx.synthesizer()?;
    let url = synthesizer.config().base_url.clone();

    synthesizer
        .check_connection()
        .await
        .map_err(|e| CliError::Engine(format!("{url}: {e}")))?;

    println!("Engine reachable at {url}");
    Ok(())
}
