//! `scriv rm` command implementation.

use clap::Args;
use scriv_storage::PostingId;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the rm command.
#[derive(Args)]
pub(crate) struct RmArgs {
    /// Posting identifiers (16 hex digits each).
    #[arg(required = true)]
    ids: Vec<String>,
}

impl RmArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let ids = self
            .ids
            .iter()
            .map(|s| s.parse::<PostingId>())
            .collect::<Result<Vec<_>, _>>()?;

        let ctx = global.open().await?;
        for id in ids {
            let posting = ctx.journal.posting(id);
            if !posting.exists().await {
                output.warning(&format!("No posting {id}"));
                continue;
            }
            posting.delete().await?;
            output.success(&format!("Deleted {id}"));
        }

        ctx.close().await;
        Ok(())
    }
}
