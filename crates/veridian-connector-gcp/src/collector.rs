//! Native policy collection with per-run caching.

use tracing::{debug, instrument, warn};

use crate::api::PolicyApi;
use crate::error::GcpResult;
use crate::iam::{flatten_policy, Binding, IamPolicy};
use crate::resource::ResourceNode;
use crate::session::SyncSession;

/// Fetches and flattens native policies, one cached fetch per resource.
#[derive(Debug)]
pub struct BindingCollector<'a, P: PolicyApi> {
    api: &'a P,
    session: &'a SyncSession,
}

impl<'a, P: PolicyApi> BindingCollector<'a, P> {
    /// Creates a collector bound to the run's session.
    #[must_use]
    pub fn new(api: &'a P, session: &'a SyncSession) -> Self {
        Self { api, session }
    }

    /// Returns the node's native policy, from the session cache when
    /// already fetched this run.
    ///
    /// An authorization rejection degrades to an empty policy; the empty
    /// policy is cached like any other so the resource is not re-fetched.
    #[instrument(skip(self))]
    pub async fn policy(&self, resource: &str) -> GcpResult<IamPolicy> {
        if let Some(policy) = self.session.cached_policy(resource).await {
            debug!(%resource, "Policy cache hit");
            return Ok(policy);
        }

        let policy = match self.api.get_iam_policy(resource).await {
            Ok(policy) => policy,
            Err(e) if e.is_permission_denied() => {
                warn!(%resource, "Policy fetch denied, treating as empty");
                IamPolicy::default()
            }
            Err(e) => return Err(e),
        };

        self.session.store_policy(resource, policy.clone()).await;
        Ok(policy)
    }

    /// Flattens the node's policy into one binding per (role, member) pair.
    #[instrument(skip(self, node), fields(resource = %node.entry_name))]
    pub async fn bindings(&self, node: &ResourceNode) -> GcpResult<Vec<Binding>> {
        let policy = self.policy(&node.entry_name).await?;
        Ok(flatten_policy(&node.id, node.resource_type, &policy))
    }
}
