//! `scriv edit` command implementation.

use std::path::PathBuf;

use clap::Args;
use scriv_storage::{PostingId, StoreError};

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

use super::read_body;

/// Arguments for the edit command.
#[derive(Args)]
pub(crate) struct EditArgs {
    /// Posting identifier (16 hex digits).
    id: String,

    /// Read the new content from this file instead of stdin.
    #[arg(short, long)]
    file: Option<PathBuf>,
}

impl EditArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let id: PostingId = self.id.parse()?;
        let body = read_body(self.file.as_deref())?;

        let ctx = global.open().await?;
        let mut posting = ctx.journal.posting(id);
        if !posting.exists().await {
            return Err(StoreError::not_found(id).into());
        }

        posting.set_markdown(body);
        let written = posting.update().await?;

        output.success(&format!("Updated {id} ({written} bytes)"));
        ctx.close().await;
        Ok(())
    }
}
