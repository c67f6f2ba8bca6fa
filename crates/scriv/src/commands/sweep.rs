//! `scriv sweep` command implementation.

use clap::Args;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the sweep command.
#[derive(Args)]
pub(crate) struct SweepArgs {
    /// Keep sweeping every `cache.sweep_interval_secs` until interrupted.
    #[arg(long)]
    watch: bool,
}

impl SweepArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let ctx = global.open().await?;
        let Some(cache) = ctx.journal.cache().cloned() else {
            return Err(CliError::Validation("render cache is disabled".to_owned()));
        };

        if self.watch {
            let interval = ctx.config.cache.sweep_interval();
            output.info(&format!(
                "Sweeping {} every {}s (Ctrl-C to stop)",
                cache.root().display(),
                interval.as_secs()
            ));
            let sweeper = cache.spawn_sweeper(std::sync::Arc::clone(ctx.store()), interval);
            tokio::signal::ctrl_c().await?;
            sweeper.abort();
        } else {
            let stats = cache.sweep(ctx.store().as_ref()).await?;
            output.success(&format!(
                "Scanned {} entries: {} stale, {} orphaned removed",
                stats.scanned, stats.stale, stats.orphaned
            ));
        }

        ctx.close().await;
        Ok(())
    }
}
