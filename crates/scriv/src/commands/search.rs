//! `scriv search` command implementation.

use clap::Args;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

use super::print_list;

/// Arguments for the search command.
#[derive(Args)]
pub(crate) struct SearchArgs {
    /// Text to look for.
    text: String,

    /// Maximum number of results (0 for no limit).
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,

    /// Number of results to skip.
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

impl SearchArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        if self.text.trim().is_empty() {
            return Err(CliError::Validation("search text is empty".to_owned()));
        }

        let ctx = global.open().await?;
        let list = ctx
            .journal
            .search(&self.text, self.offset, self.limit)
            .await?;

        let rows = print_list(&output, list).await?;
        if rows == 0 {
            output.warning(&format!("Nothing matches {:?}", self.text));
        }
        ctx.close().await;
        Ok(())
    }
}
