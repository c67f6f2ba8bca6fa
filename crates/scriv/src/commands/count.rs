//! `scriv count` command implementation.

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Print the number of stored postings.
pub(crate) async fn execute(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let ctx = global.open().await?;

    let count = ctx.store().count().await?;
    output.content(&count.to_string());

    ctx.close().await;
    Ok(())
}
