//! Transactional resource contract and identity-based commit batching
//!
//! A connector may expose a begin/commit/rollback-capable resource. The
//! engine never looks inside a resource; it tracks the distinct set touched
//! while dispatching one batch and commits each exactly once when the whole
//! batch completes. Rollback and cleanup discipline stay with the resource
//! implementation; this is single-pass commit batching, not two-phase
//! commit.

use crate::error::StageError;
use async_trait::async_trait;
use std::sync::Arc;

/// A begin/commit/rollback-capable object owned by a connector
#[async_trait]
pub trait TransactionalResource: Send + Sync {
    /// Open a unit of work. Optional; defaults to a no-op.
    async fn begin(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Make the work since the last commit durable
    async fn commit(&self) -> Result<(), StageError>;

    /// Abandon the work since the last commit
    async fn rollback(&self) -> Result<(), StageError>;
}

/// Identity-distinct set of resources touched while dispatching one batch.
///
/// Membership is by `Arc` identity, never by value: two clones of the same
/// `Arc` are one resource, two resources that happen to compare equal are
/// two. Commit order is first-touched order, which keeps it deterministic
/// for a given dispatch.
#[derive(Default)]
pub struct ResourceSet {
    resources: Vec<Arc<dyn TransactionalResource>>,
}

impl ResourceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource; returns false if it was already tracked
    pub fn insert(&mut self, resource: Arc<dyn TransactionalResource>) -> bool {
        if self.resources.iter().any(|r| Arc::ptr_eq(r, &resource)) {
            return false;
        }
        self.resources.push(resource);
        true
    }

    /// Number of distinct resources tracked
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if no resources are tracked
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Commit every tracked resource exactly once, in first-touched order.
    ///
    /// Stops at the first commit failure; already-committed resources stay
    /// committed; compensation belongs to the resource implementations.
    pub async fn commit_all(&self) -> Result<usize, StageError> {
        for resource in &self.resources {
            resource.commit().await?;
        }
        Ok(self.resources.len())
    }
}

impl std::fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSet")
            .field("len", &self.resources.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingResource {
        commits: AtomicU64,
    }

    #[async_trait]
    impl TransactionalResource for CountingResource {
        async fn commit(&self) -> Result<(), StageError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> Result<(), StageError> {
            Ok(())
        }
    }

    #[test]
    fn test_identity_dedup() {
        let a: Arc<dyn TransactionalResource> = Arc::new(CountingResource::default());
        let b: Arc<dyn TransactionalResource> = Arc::new(CountingResource::default());

        let mut set = ResourceSet::new();
        assert!(set.insert(a.clone()));
        assert!(!set.insert(a.clone()));
        assert!(set.insert(b));
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_all_commits_each_once() {
        let a = Arc::new(CountingResource::default());
        let b = Arc::new(CountingResource::default());

        let mut set = ResourceSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b.clone());

        let committed = set.commit_all().await.unwrap();
        assert_eq!(committed, 2);
        assert_eq!(a.commits.load(Ordering::SeqCst), 1);
        assert_eq!(b.commits.load(Ordering::SeqCst), 1);
    }
}
