//! `scriv show` command implementation.

use clap::Args;
use scriv_storage::PostingId;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the show command.
#[derive(Args)]
pub(crate) struct ShowArgs {
    /// Posting identifier (16 hex digits).
    id: String,

    /// Print rendered HTML instead of Markdown.
    #[arg(long)]
    html: bool,

    /// Print the backend location instead of the content.
    #[arg(long, conflicts_with = "html")]
    location: bool,
}

impl ShowArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let ctx = global.open().await?;
        let id: PostingId = self.id.parse()?;
        let mut posting = ctx.journal.posting(id);

        if self.location {
            output.content(&posting.location());
        } else if self.html {
            output.content(&posting.html().await?);
        } else {
            output.content(posting.markdown().await?);
        }

        ctx.close().await;
        Ok(())
    }
}
