//! `scriv list` command implementation.

use std::str::FromStr;

use chrono::{Month, NaiveDate};
use clap::Args;

use crate::context::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

use super::print_list;

/// A calendar month given as `YYYY-MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct YearMonth {
    year: i32,
    month: Month,
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid month {s:?}: expected YYYY-MM");
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month
            .parse::<u8>()
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        Ok(Self { year, month })
    }
}

/// Arguments for the list command.
#[derive(Args)]
pub(crate) struct ListArgs {
    /// Maximum number of postings.
    #[arg(short = 'n', long, default_value_t = 20)]
    limit: usize,

    /// Number of newest postings to skip.
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Postings from this UTC day (YYYY-MM-DD).
    #[arg(long, conflicts_with_all = ["week", "month", "offset"])]
    day: Option<NaiveDate>,

    /// Postings from the Monday-to-Sunday week containing this day (YYYY-MM-DD).
    #[arg(long, conflicts_with_all = ["month", "offset"])]
    week: Option<NaiveDate>,

    /// Postings from this month (YYYY-MM).
    #[arg(long, conflicts_with = "offset")]
    month: Option<YearMonth>,
}

impl ListArgs {
    pub(crate) async fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let ctx = global.open().await?;
        let journal = &ctx.journal;

        let mut list = if let Some(date) = self.day {
            journal.day(date).await?
        } else if let Some(date) = self.week {
            journal.week(date).await?
        } else if let Some(ym) = self.month {
            journal.month(ym.year, ym.month).await?
        } else {
            journal.newest(self.limit, self.offset).await?
        };
        list.sort();

        let rows = print_list(&output, list).await?;
        if rows == 0 {
            output.warning("No postings");
        }
        ctx.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_year_month() {
        assert_eq!(
            "2019-01".parse::<YearMonth>().unwrap(),
            YearMonth {
                year: 2019,
                month: Month::January
            }
        );
        assert_eq!(
            "2018-12".parse::<YearMonth>().unwrap().month,
            Month::December
        );
    }

    #[test]
    fn test_parse_year_month_rejects_garbage() {
        assert!("2019".parse::<YearMonth>().is_err());
        assert!("2019-13".parse::<YearMonth>().is_err());
        assert!("2019-00".parse::<YearMonth>().is_err());
        assert!("xx-01".parse::<YearMonth>().is_err());
    }
}
