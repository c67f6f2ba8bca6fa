//! `scriv new` command implementation.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::Args;
use scriv_storage::PostingId;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

use super::read_body;

/// Arguments for the new command.
#[derive(Args)]
pub(crate) struct NewArgs {
    /// Read content from this file instead of stdin.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Backdate the posting to this UTC day (YYYY-MM-DD).
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl NewArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let body = read_body(self.file.as_deref())?;

        let ctx = global.open().await?;
        let mut posting = match self.date {
            Some(date) => ctx.journal.posting(id_on(date)),
            None => ctx.journal.new_posting(),
        };
        if posting.exists().await {
            return Err(CliError::Validation(format!(
                "posting {} already exists",
                posting.id()
            )));
        }

        posting.set_markdown(body);
        let written = posting.create().await?;

        output.success(&format!("Created {} ({written} bytes)", posting.id()));
        output.info(&posting.location());
        ctx.close().await;
        Ok(())
    }
}

/// Identifier on `date` at the current UTC time of day.
fn id_on(date: NaiveDate) -> PostingId {
    PostingId::from_datetime(date.and_time(Utc::now().time()).and_utc())
}
