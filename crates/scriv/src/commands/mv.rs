//! `scriv mv` command implementation.

use clap::Args;
use scriv_storage::PostingId;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the mv command.
#[derive(Args)]
pub(crate) struct MvArgs {
    /// Current identifier.
    old: String,

    /// New identifier. Any posting stored there is overwritten.
    new: String,
}

impl MvArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let old: PostingId = self.old.parse()?;
        let new: PostingId = self.new.parse()?;
        if old == new {
            return Err(CliError::Validation("source and destination are the same".to_owned()));
        }

        let ctx = global.open().await?;
        let mut posting = ctx.journal.posting(old);
        posting.rename(new).await?;

        output.success(&format!("Moved {old} -> {new}"));
        output.info(&posting.location());
        ctx.close().await;
        Ok(())
    }
}
