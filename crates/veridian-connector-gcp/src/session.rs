//! Per-run session state.
//!
//! One [`SyncSession`] is constructed per sync run and passed explicitly to
//! every component that needs cross-component memory: the native-policy
//! cache, the set of bindings this process has written, and the policy tags
//! it manages. Each cache sits behind its own lock so pull and push may run
//! concurrently for different resources.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::iam::{Binding, BindingKey, IamPolicy};

/// Mutable state shared across one reconciliation run.
#[derive(Debug, Default)]
pub struct SyncSession {
    /// Last-fetched native policy per fully-qualified resource name.
    policy_cache: Mutex<HashMap<String, IamPolicy>>,
    /// Bindings successfully written by this process.
    managed_bindings: Mutex<HashSet<BindingKey>>,
    /// Policy tags created or updated by this process.
    managed_tags: Mutex<HashSet<String>>,
}

impl SyncSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached policy for a resource, if fetched this run.
    pub async fn cached_policy(&self, resource: &str) -> Option<IamPolicy> {
        self.policy_cache.lock().await.get(resource).cloned()
    }

    /// Stores (or refreshes) the cached policy for a resource.
    ///
    /// Called after every fetch, and again after a successful mutating
    /// write with the server's returned post-mutation policy.
    pub async fn store_policy(&self, resource: &str, policy: IamPolicy) {
        self.policy_cache
            .lock()
            .await
            .insert(resource.to_string(), policy);
    }

    /// Records a binding this process successfully applied.
    pub async fn record_managed(&self, binding: &Binding) {
        self.managed_bindings.lock().await.insert(binding.key());
    }

    /// Whether a binding was written by this process.
    pub async fn is_managed(&self, binding: &Binding) -> bool {
        self.managed_bindings.lock().await.contains(&binding.key())
    }

    /// Snapshot of the managed-binding keys for the importer.
    pub async fn managed_snapshot(&self) -> HashSet<BindingKey> {
        self.managed_bindings.lock().await.clone()
    }

    /// Records a policy tag this process manages.
    pub async fn record_managed_tag(&self, tag_id: &str) {
        self.managed_tags.lock().await.insert(tag_id.to_string());
    }

    /// Forgets a policy tag after teardown.
    pub async fn forget_managed_tag(&self, tag_id: &str) {
        self.managed_tags.lock().await.remove(tag_id);
    }

    /// Snapshot of the managed policy-tag ids.
    pub async fn managed_tags_snapshot(&self) -> HashSet<String> {
        self.managed_tags.lock().await.clone()
    }
}
