//! scriv CLI - Posting persistence engine.
//!
//! Provides commands for:
//! - `new`, `show`, `edit`, `rm`, `mv`: single posting operations
//! - `list`, `search`, `count`: queries over the journal
//! - `sweep`: drop stale rendered HTML
//! - `migrate`: copy every posting to another backend

mod commands;
mod context;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    EditArgs, ListArgs, MigrateArgs, MvArgs, NewArgs, RmArgs, SearchArgs, ShowArgs, SweepArgs,
};
use context::GlobalArgs;
use error::CliError;
use output::Output;

/// scriv - Posting persistence engine.
#[derive(Parser)]
#[command(name = "scriv", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a posting from stdin or a file.
    New(NewArgs),
    /// Print a posting as Markdown or HTML.
    Show(ShowArgs),
    /// Replace the content of a posting.
    Edit(EditArgs),
    /// Delete a posting.
    Rm(RmArgs),
    /// Move a posting to another identifier.
    Mv(MvArgs),
    /// List postings by recency or time window.
    List(ListArgs),
    /// Search postings for text.
    Search(SearchArgs),
    /// Print the number of stored postings.
    Count,
    /// Delete stale and orphaned rendered HTML.
    Sweep(SweepArgs),
    /// Copy every posting to another backend.
    Migrate(MigrateArgs),
}

impl Commands {
    async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        match self {
            Self::New(args) => args.execute(global).await,
            Self::Show(args) => args.execute(global).await,
            Self::Edit(args) => args.execute(global).await,
            Self::Rm(args) => args.execute(global).await,
            Self::Mv(args) => args.execute(global).await,
            Self::List(args) => args.execute(global).await,
            Self::Search(args) => args.execute(global).await,
            Self::Count => commands::count::execute(global).await,
            Self::Sweep(args) => args.execute(global).await,
            Self::Migrate(args) => args.execute(global).await,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|rt| rt.block_on(cli.command.execute(&cli.global)));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
