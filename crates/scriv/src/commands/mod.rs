//! CLI command implementations.

pub(crate) mod count;
mod edit;
mod list;
mod migrate;
mod mv;
mod new;
mod rm;
mod search;
mod show;
mod sweep;

use std::io::Read;
use std::path::Path;

use scriv_site::PostingList;

pub(crate) use edit::EditArgs;
pub(crate) use list::ListArgs;
pub(crate) use migrate::MigrateArgs;
pub(crate) use mv::MvArgs;
pub(crate) use new::NewArgs;
pub(crate) use rm::RmArgs;
pub(crate) use search::SearchArgs;
pub(crate) use show::ShowArgs;
pub(crate) use sweep::SweepArgs;

use crate::error::CliError;
use crate::output::Output;

/// Width of the summary column in listings.
const SUMMARY_WIDTH: usize = 60;

/// Read posting content from `file`, or from stdin when absent.
///
/// Blank content is rejected: stores treat an empty body as a delete.
fn read_body(file: Option<&Path>) -> Result<String, CliError> {
    let body = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            body
        }
    };
    if body.trim().is_empty() {
        return Err(CliError::Validation("posting content is empty".to_owned()));
    }
    Ok(body)
}

/// First non-blank line of `markdown`, shortened to `width` characters.
fn summary(markdown: &str, width: usize) -> String {
    let line = markdown
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    if line.chars().count() <= width {
        return line.to_owned();
    }
    let mut short: String = line.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

/// Print one row per posting. Returns the number of rows.
async fn print_list(output: &Output, list: PostingList) -> Result<usize, CliError> {
    let mut rows = 0;
    for mut posting in list {
        let id = posting.id();
        let date = id.to_datetime().format("%Y-%m-%d %H:%M").to_string();
        let markdown = posting.markdown().await?;
        output.row(&id.to_hex(), &date, &summary(markdown, SUMMARY_WIDTH));
        rows += 1;
    }
    Ok(rows)
}
