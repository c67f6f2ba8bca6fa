//! Posting lists assembled by time-window and search queries.
//!
//! Windows are half-open `[lo, hi)` in UTC. The bounds are converted to
//! identifiers and handed to
//! [`PostingStore::range`](scriv_storage::PostingStore::range), so only the shards the
//! window touches are read.

use std::ops::Range;

use chrono::{DateTime, Datelike, Days, Month, Months, NaiveDate, NaiveTime, Utc};
use scriv_storage::{PostingId, StoreError, StoredPosting};

use crate::journal::Journal;
use crate::posting::Posting;

/// An ordered, in-memory list of postings.
///
/// Order is whatever the store returned; call [`sort`](Self::sort) for
/// newest-first order.
#[derive(Clone, Debug, Default)]
pub struct PostingList {
    postings: Vec<Posting>,
}

/// Identifiers covering `[start of lo, start of hi)` in UTC.
fn window(lo: NaiveDate, hi: NaiveDate) -> Range<PostingId> {
    let at_midnight = |date: NaiveDate| -> PostingId {
        let datetime: DateTime<Utc> = date.and_time(NaiveTime::MIN).and_utc();
        PostingId::from_datetime(datetime)
    };
    at_midnight(lo)..at_midnight(hi)
}

impl PostingList {
    fn from_stored(journal: &Journal, stored: Vec<StoredPosting>) -> Self {
        Self {
            postings: stored
                .into_iter()
                .map(|s| Posting::from_stored(journal.clone(), s))
                .collect(),
        }
    }

    async fn range(journal: &Journal, ids: Range<PostingId>) -> Result<Self, StoreError> {
        let stored = journal.store().range(ids.start, ids.end).await?;
        Ok(Self::from_stored(journal, stored))
    }

    /// The `limit` most recent postings after skipping `offset`.
    pub async fn newest(journal: &Journal, limit: usize, offset: usize) -> Result<Self, StoreError> {
        let stored = journal.store().newest(limit, offset).await?;
        Ok(Self::from_stored(journal, stored))
    }

    /// Postings created on the UTC calendar day `date`.
    pub async fn day(journal: &Journal, date: NaiveDate) -> Result<Self, StoreError> {
        let Some(next) = date.checked_add_days(Days::new(1)) else {
            return Ok(Self::default());
        };
        Self::range(journal, window(date, next)).await
    }

    /// Postings created in the ISO week (Monday to Sunday) containing `date`.
    pub async fn week(journal: &Journal, date: NaiveDate) -> Result<Self, StoreError> {
        let since_monday = u64::from(date.weekday().num_days_from_monday());
        let bounds = date
            .checked_sub_days(Days::new(since_monday))
            .and_then(|monday| Some((monday, monday.checked_add_days(Days::new(7))?)));
        let Some((monday, next_monday)) = bounds else {
            return Ok(Self::default());
        };
        Self::range(journal, window(monday, next_monday)).await
    }

    /// Postings created in `month` of `year`.
    pub async fn month(journal: &Journal, year: i32, month: Month) -> Result<Self, StoreError> {
        let bounds = NaiveDate::from_ymd_opt(year, month.number_from_month(), 1)
            .and_then(|first| Some((first, first.checked_add_months(Months::new(1))?)));
        let Some((first, next)) = bounds else {
            return Ok(Self::default());
        };
        Self::range(journal, window(first, next)).await
    }

    /// Postings containing `text`, newest first.
    ///
    /// A `limit` of `0` means no practical limit.
    pub async fn search(
        journal: &Journal,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Self, StoreError> {
        let stored = journal.store().search(text, offset, limit).await?;
        Ok(Self::from_stored(journal, stored))
    }

    /// Sort newest first.
    pub fn sort(&mut self) {
        self.postings.sort_by_key(|p| std::cmp::Reverse(p.id()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Posting> {
        self.postings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Posting> {
        self.postings
    }
}

impl IntoIterator for PostingList {
    type Item = Posting;
    type IntoIter = std::vec::IntoIter<Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.into_iter()
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}

impl Journal {
    /// See [`PostingList::newest`].
    pub async fn newest(&self, limit: usize, offset: usize) -> Result<PostingList, StoreError> {
        PostingList::newest(self, limit, offset).await
    }

    /// See [`PostingList::day`].
    pub async fn day(&self, date: NaiveDate) -> Result<PostingList, StoreError> {
        PostingList::day(self, date).await
    }

    /// See [`PostingList::week`].
    pub async fn week(&self, date: NaiveDate) -> Result<PostingList, StoreError> {
        PostingList::week(self, date).await
    }

    /// See [`PostingList::month`].
    pub async fn month(&self, year: i32, month: Month) -> Result<PostingList, StoreError> {
        PostingList::month(self, year, month).await
    }

    /// See [`PostingList::search`].
    pub async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<PostingList, StoreError> {
        PostingList::search(self, text, offset, limit).await
    }
}
