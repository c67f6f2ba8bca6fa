//! Mock storage implementation for testing.
//!
//! Provides [`MockStore`] for unit testing without filesystem or database
//! access, with per-operation failure injection for replication scenarios.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::id::PostingId;
use crate::storage::{
    PostingStore, StoreError, StoreErrorKind, StoredPosting, WalkFn, effective_limit,
};

/// Operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    Create,
    Read,
    Update,
    Delete,
    Rename,
    Search,
    Count,
    Walk,
}

/// In-memory store for testing.
///
/// # Example
///
/// ```ignore
/// use scriv_storage::{MockOp, MockStore, PostingStore};
///
/// let store = MockStore::named("A").fail_on(MockOp::Create);
/// ```
#[derive(Debug)]
pub struct MockStore {
    name: &'static str,
    postings: RwLock<BTreeMap<PostingId, StoredPosting>>,
    failing: RwLock<HashSet<MockOp>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::named("Mock")
    }
}

impl MockStore {
    /// Create a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mock store reporting `name` as its backend.
    #[must_use]
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            postings: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Make `op` fail with an I/O error from now on.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn fail_on(self, op: MockOp) -> Self {
        self.failing.write().unwrap().insert(op);
        self
    }

    /// Make `op` succeed again.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn heal(&self, op: MockOp) {
        self.failing.write().unwrap().remove(&op);
    }

    fn check(&self, op: MockOp) -> Result<(), StoreError> {
        if self.failing.read().unwrap().contains(&op) {
            return Err(StoreError::new(StoreErrorKind::Io)
                .with_backend(self.name)
                .with_source(std::io::Error::other(format!("injected {op:?} failure"))));
        }
        Ok(())
    }

    fn put(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        if posting.id.is_unassigned() {
            return Err(StoreError::empty_posting().with_backend(self.name));
        }
        let markdown = posting.trimmed().to_owned();
        let written = markdown.len();
        self.postings.write().unwrap().insert(
            posting.id,
            StoredPosting {
                id: posting.id,
                last_modified: std::time::SystemTime::now(),
                markdown,
            },
        );
        Ok(written)
    }
}

#[async_trait]
impl PostingStore for MockStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        self.check(MockOp::Create)?;
        self.put(posting)
    }

    async fn read(&self, id: PostingId) -> Result<StoredPosting, StoreError> {
        self.check(MockOp::Read)?;
        self.postings
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id).with_backend(self.name))
    }

    async fn update(&self, posting: &StoredPosting) -> Result<usize, StoreError> {
        self.check(MockOp::Update)?;
        self.put(posting)
    }

    async fn delete(&self, id: PostingId) -> Result<(), StoreError> {
        self.check(MockOp::Delete)?;
        self.postings.write().unwrap().remove(&id);
        Ok(())
    }

    async fn exists(&self, id: PostingId) -> bool {
        self.check(MockOp::Read).is_ok() && self.postings.read().unwrap().contains_key(&id)
    }

    async fn rename(&self, old: PostingId, new: PostingId) -> Result<(), StoreError> {
        self.check(MockOp::Rename)?;
        let mut postings = self.postings.write().unwrap();
        let mut posting = postings
            .remove(&old)
            .ok_or_else(|| StoreError::not_found(old).with_backend(self.name))?;
        posting.id = new;
        postings.insert(new, posting);
        Ok(())
    }

    async fn search(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredPosting>, StoreError> {
        self.check(MockOp::Search)?;
        let needle = text.to_lowercase();
        Ok(self
            .postings
            .read()
            .unwrap()
            .values()
            .rev()
            .filter(|p| p.markdown.to_lowercase().contains(&needle))
            .skip(offset)
            .take(effective_limit(limit))
            .cloned()
            .collect())
    }

    fn location(&self, id: PostingId) -> String {
        format!("mock:{}#{id}", self.name)
    }

    async fn count(&self) -> Result<u32, StoreError> {
        self.check(MockOp::Count)?;
        let len = self.postings.read().unwrap().len();
        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }

    async fn walk(&self, f: &WalkFn<'_>) -> Result<(), StoreError> {
        self.check(MockOp::Walk)?;
        let ids: Vec<PostingId> = self.postings.read().unwrap().keys().rev().copied().collect();
        for id in ids {
            if f(id)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn newest(&self, limit: usize, offset: usize) -> Result<Vec<StoredPosting>, StoreError> {
        self.check(MockOp::Read)?;
        Ok(self
            .postings
            .read()
            .unwrap()
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn range(&self, lo: PostingId, hi: PostingId) -> Result<Vec<StoredPosting>, StoreError> {
        self.check(MockOp::Read)?;
        if lo >= hi {
            return Ok(Vec::new());
        }
        Ok(self
            .postings
            .read()
            .unwrap()
            .range(lo..hi)
            .map(|(_, p)| p.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use pretty_assertions::assert_eq;

    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_mock_store_is_send_sync() {
        assert_send_sync::<MockStore>();
    }

    #[tokio::test]
    async fn test_create_and_read_trims() {
        let store = MockStore::new();
        let id = PostingId::new(1);
        store
            .create(&StoredPosting::new(id, "  # Hi\n\n"))
            .await
            .unwrap();

        assert_eq!(store.read(id).await.unwrap().markdown, "# Hi");
    }

    #[tokio::test]
    async fn test_unassigned_id_is_rejected() {
        let store = MockStore::new();
        let err = store
            .create(&StoredPosting::new(PostingId::UNASSIGNED, "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::EmptyPosting);
    }

    #[tokio::test]
    async fn test_fail_on_and_heal() {
        let store = MockStore::named("A").fail_on(MockOp::Create);
        let posting = StoredPosting::new(PostingId::new(1), "x");

        let err = store.create(&posting).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Io);
        assert_eq!(err.backend(), Some("A"));

        store.heal(MockOp::Create);
        store.create(&posting).await.unwrap();
    }

    #[tokio::test]
    async fn test_walk_stops_on_break() {
        let store = MockStore::new();
        for n in 1..=5 {
            store
                .create(&StoredPosting::new(PostingId::new(n), "x"))
                .await
                .unwrap();
        }
        let visited = std::sync::atomic::AtomicUsize::new(0);

        store
            .walk(&|_| {
                let seen = visited.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                Ok(if seen == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .await
            .unwrap();

        assert_eq!(visited.into_inner(), 2);
    }

    #[tokio::test]
    async fn test_range_is_half_open() {
        let store = MockStore::new();
        for n in [10, 20, 30] {
            store
                .create(&StoredPosting::new(PostingId::new(n), "x"))
                .await
                .unwrap();
        }

        let ids: Vec<_> = store
            .range(PostingId::new(10), PostingId::new(30))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.as_u64())
            .collect();

        assert_eq!(ids, vec![10, 20]);
    }
}
