//! `scriv migrate` command implementation.
//!
//! Copies every posting from the configured store into another backend,
//! using the paths from the same configuration. Existing postings in the
//! target with the same identifier are overwritten.

use std::ops::ControlFlow;
use std::sync::{Mutex, PoisonError};

use clap::{Args, ValueEnum};
use scriv_config::BackendKind;
use scriv_storage::{PostingId, PostingStore};

use crate::context::{GlobalArgs, open_store};
use crate::error::CliError;
use crate::output::Output;

/// Migration target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Target {
    Fs,
    Sqlite,
}

impl From<Target> for BackendKind {
    fn from(target: Target) -> Self {
        match target {
            Target::Fs => Self::Fs,
            Target::Sqlite => Self::Sqlite,
        }
    }
}

/// Arguments for the migrate command.
#[derive(Args)]
pub(crate) struct MigrateArgs {
    /// Backend to copy postings into.
    #[arg(long, value_enum)]
    to: Target,
}

impl MigrateArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let target = BackendKind::from(self.to);
        let ctx = global.open().await?;
        let source_kind = ctx.config.storage_resolved.backend;
        if source_kind == BackendKind::Tee {
            return Err(CliError::Validation(
                "the tee backend already writes to both stores".to_owned(),
            ));
        }
        if source_kind == target {
            return Err(CliError::Validation(format!(
                "configured backend is already {target:?}"
            )));
        }

        let (dest, dest_sqlite) = open_store(&ctx.config.storage_resolved, target).await?;
        output.info(&format!(
            "Copying postings from {} to {}",
            ctx.store().name(),
            dest.name()
        ));

        let copied = copy_all(ctx.store().as_ref(), dest.as_ref()).await?;
        output.success(&format!("Copied {copied} postings"));

        if let Some(sqlite) = dest_sqlite {
            sqlite.close().await;
        }
        ctx.close().await;
        Ok(())
    }
}

/// Copy every posting in `source` into `dest`. Returns the number copied.
///
/// Identifiers are collected first so `dest` is never written while `source`
/// is being walked.
pub(crate) async fn copy_all(
    source: &dyn PostingStore,
    dest: &dyn PostingStore,
) -> Result<usize, CliError> {
    let ids = Mutex::new(Vec::new());
    source
        .walk(&|id: PostingId| {
            ids.lock().unwrap_or_else(PoisonError::into_inner).push(id);
            Ok(ControlFlow::Continue(()))
        })
        .await?;
    let ids = ids.into_inner().unwrap_or_else(PoisonError::into_inner);

    let mut copied = 0;
    for id in ids {
        let posting = match source.read(id).await {
            Ok(posting) => posting,
            Err(e) if e.is_not_found() => {
                tracing::warn!(%id, "posting vanished during migration");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        dest.update(&posting).await?;
        copied += 1;
    }
    tracing::info!(copied, from = source.name(), to = dest.name(), "migration done");
    Ok(copied)
}
