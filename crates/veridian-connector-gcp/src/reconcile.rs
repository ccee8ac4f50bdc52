//! Application of a binding delta against the native policy API.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::api::PolicyApi;
use crate::collector::BindingCollector;
use crate::config::GcpConfig;
use crate::error::{GcpError, GcpResult};
use crate::export::{BindingDelta, DeltaEntry};
use crate::iam::Binding;
use crate::resource::GcpResourceType;
use crate::session::SyncSession;

/// Per-delta application outcome.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Failure descriptions per originating record external id.
    pub record_errors: BTreeMap<String, Vec<String>>,
    /// Successfully applied deletions.
    pub deletes_applied: usize,
    /// Successfully applied additions.
    pub adds_applied: usize,
    /// Bindings whose mutation failed.
    pub failures: usize,
}

impl ReconcileOutcome {
    fn attribute_failure(&mut self, entry: &DeltaEntry, message: &str) {
        self.failures += 1;
        for source in &entry.sources {
            self.record_errors
                .entry(source.clone())
                .or_default()
                .push(message.to_string());
        }
    }
}

enum Mutation {
    Add,
    Remove,
}

/// Applies add and delete sets one binding at a time.
///
/// Deletions run before additions so a role moved between two records does
/// not pass through a double-grant window. A failed binding is attributed
/// to every requesting record and never blocks the rest of the batch.
#[derive(Debug)]
pub struct BindingReconciler<'a, P: PolicyApi> {
    api: &'a P,
    session: &'a SyncSession,
    config: &'a GcpConfig,
}

impl<'a, P: PolicyApi> BindingReconciler<'a, P> {
    /// Creates a reconciler bound to the run's session.
    #[must_use]
    pub fn new(api: &'a P, session: &'a SyncSession, config: &'a GcpConfig) -> Self {
        Self {
            api,
            session,
            config,
        }
    }

    /// Applies the delta, returning per-record failure accounting.
    #[instrument(skip(self, delta), fields(adds = delta.add_len(), deletes = delta.delete_len()))]
    pub async fn apply(&self, delta: &BindingDelta) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for entry in delta.deletions() {
            match self.apply_one(&entry.binding, &Mutation::Remove).await {
                Ok(()) => outcome.deletes_applied += 1,
                Err(e) => {
                    let message = format!("failed to remove binding {}: {e}", entry.binding);
                    warn!("{message}");
                    outcome.attribute_failure(entry, &message);
                }
            }
        }

        for entry in delta.additions() {
            match self.apply_one(&entry.binding, &Mutation::Add).await {
                Ok(()) => {
                    outcome.adds_applied += 1;
                    // Remember the write so the next pull does not
                    // re-import it as a foreign grant.
                    self.session.record_managed(&entry.binding).await;
                }
                Err(e) => {
                    let message = format!("failed to add binding {}: {e}", entry.binding);
                    warn!("{message}");
                    outcome.attribute_failure(entry, &message);
                }
            }
        }

        info!(
            adds = outcome.adds_applied,
            deletes = outcome.deletes_applied,
            failures = outcome.failures,
            "Delta applied"
        );
        outcome
    }

    /// Applies one mutation through a policy read-modify-write.
    ///
    /// The session cache supplies the read when warm; the server's
    /// post-mutation policy refreshes it after the write.
    async fn apply_one(&self, binding: &Binding, mutation: &Mutation) -> GcpResult<()> {
        let resource = self.api_resource_name(binding)?;
        let collector = BindingCollector::new(self.api, self.session);
        let mut policy = collector.policy(&resource).await?;

        let changed = match mutation {
            Mutation::Add => policy.add_member(&binding.role, &binding.member),
            Mutation::Remove => policy.remove_member(&binding.role, &binding.member),
        };
        if !changed {
            debug!(binding = %binding, "Policy already converged, no write needed");
            return Ok(());
        }

        let updated = self.api.set_iam_policy(&resource, &policy).await?;
        self.session.store_policy(&resource, updated).await;
        Ok(())
    }

    /// Maps a binding's (resource type, resource) onto the API resource
    /// name.
    ///
    /// Organization-level bindings carry the synthetic data-source name and
    /// map back onto the configured organization id.
    fn api_resource_name(&self, binding: &Binding) -> GcpResult<String> {
        let resource_type: GcpResourceType = binding
            .resource_type
            .parse()
            .map_err(|()| {
                GcpError::Config(format!(
                    "unknown resource type '{}' for binding {}",
                    binding.resource_type, binding
                ))
            })?;

        let id = match resource_type {
            GcpResourceType::Organization => self.config.organization_id.clone(),
            GcpResourceType::Folder | GcpResourceType::Project => binding.resource.clone(),
        };
        Ok(format!("{}/{id}", resource_type.api_prefix()))
    }
}
