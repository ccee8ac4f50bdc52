//! Connector facade wiring the pull and push pipelines together.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use veridian_access::error::AccessResult;
use veridian_access::feedback::AccessFeedback;
use veridian_access::record::{AccessRecord, Action};
use veridian_access::traits::{AccessSource, AccessTarget, FeedbackSink, RecordSink};
use veridian_access::catalog::PermissionCatalog;

use crate::api::{MaskingApi, PolicyApi, ResourceApi};
use crate::collector::BindingCollector;
use crate::config::GcpConfig;
use crate::error::{GcpError, GcpResult};
use crate::export::build_delta;
use crate::import::BindingImporter;
use crate::masking::MaskingManager;
use crate::permissions::default_catalog;
use crate::reconcile::BindingReconciler;
use crate::session::SyncSession;
use crate::walker::ResourceWalker;

/// The GCP access syncer.
///
/// Owns the per-run [`SyncSession`] so the pull direction can recognize
/// the push direction's writes within one process lifetime.
#[derive(Debug)]
pub struct GcpAccessSyncer<A> {
    api: A,
    config: GcpConfig,
    catalog: PermissionCatalog,
    session: SyncSession,
}

impl<A> GcpAccessSyncer<A>
where
    A: ResourceApi + PolicyApi + MaskingApi,
{
    /// Creates a syncer over the default GCP permission catalog.
    #[must_use]
    pub fn new(api: A, config: GcpConfig) -> Self {
        Self::with_catalog(api, config, default_catalog())
    }

    /// Creates a syncer with a custom permission catalog.
    #[must_use]
    pub fn with_catalog(api: A, config: GcpConfig, catalog: PermissionCatalog) -> Self {
        Self {
            api,
            config,
            catalog,
            session: SyncSession::new(),
        }
    }

    /// The run's session state, exposed for inspection.
    #[must_use]
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Verifies credentials and organization visibility.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> GcpResult<()> {
        self.api
            .get_organization(&self.config.organization_id)
            .await
            .map(|_| ())
    }

    /// Pull direction: walk, collect, convert, and hand records to the
    /// host.
    #[instrument(skip(self, sink))]
    pub async fn import_access(&self, sink: &mut dyn RecordSink) -> GcpResult<()> {
        let walker = ResourceWalker::new(&self.api, &self.config.organization_id);
        let mut nodes = Vec::new();
        walker
            .walk(|node| {
                nodes.push(Arc::clone(node));
                Ok(())
            })
            .await?;
        info!(resources = nodes.len(), "Hierarchy traversed");

        let collector = BindingCollector::new(&self.api, &self.session);
        let mut bindings = Vec::new();
        for node in &nodes {
            bindings.extend(collector.bindings(node).await?);
        }
        info!(bindings = bindings.len(), "Native bindings collected");

        let managed = self.session.managed_snapshot().await;
        let importer = BindingImporter::new(&self.config, &self.catalog);
        let records = importer.convert(&bindings, &managed);
        info!(records = records.len(), "Records converted");

        sink.handle(records)
            .await
            .map_err(|e| GcpError::Host(e.to_string()))?;

        if self.config.enable_masking {
            let manager = MaskingManager::new(&self.api, &self.session);
            let masks = manager.import_masks().await?;
            info!(masks = masks.len(), "Masks imported");
            if !masks.is_empty() {
                sink.handle(masks)
                    .await
                    .map_err(|e| GcpError::Host(e.to_string()))?;
            }
        }

        Ok(())
    }

    /// Push direction: converge the target onto the desired records.
    ///
    /// Binding and masking failures land in per-record feedback; only
    /// feedback-sink I/O failures surface as the run's error.
    #[instrument(skip(self, desired, feedback_sink), fields(records = desired.len()))]
    pub async fn apply_access(
        &self,
        desired: Vec<AccessRecord>,
        feedback_sink: &mut dyn FeedbackSink,
    ) -> GcpResult<()> {
        let mut feedback: Vec<AccessFeedback> = Vec::with_capacity(desired.len());
        let mut grants: Vec<AccessRecord> = Vec::new();

        for record in &desired {
            let mut entry = AccessFeedback::new(&record.external_id);
            match record.action {
                Action::Grant => grants.push(record.clone()),
                Action::Mask if self.config.enable_masking => {
                    let manager = MaskingManager::new(&self.api, &self.session);
                    let outcome = manager.apply_mask(record).await;
                    entry.actual_external_id = Some(outcome.external_id);
                    entry.errors.extend(outcome.errors);
                }
                Action::Mask => {
                    warn!(record = %record.external_id, "Masking requested but not enabled");
                    entry.add_error(GcpError::MaskingUnsupported.to_string());
                }
            }
            feedback.push(entry);
        }

        let delta = build_delta(&grants);
        let reconciler = BindingReconciler::new(&self.api, &self.session, &self.config);
        let outcome = reconciler.apply(&delta).await;

        for entry in &mut feedback {
            if let Some(errors) = outcome.record_errors.get(&entry.external_id) {
                entry.errors.extend(errors.iter().cloned());
            }
        }

        let mut delivery_errors = Vec::new();
        for entry in feedback {
            if let Err(e) = feedback_sink.handle(entry).await {
                delivery_errors.push(e.to_string());
            }
        }
        if !delivery_errors.is_empty() {
            return Err(GcpError::FeedbackDelivery(delivery_errors));
        }
        Ok(())
    }
}

#[async_trait]
impl<A> AccessSource for GcpAccessSyncer<A>
where
    A: ResourceApi + PolicyApi + MaskingApi,
{
    async fn sync_access_from_target(&self, sink: &mut dyn RecordSink) -> AccessResult<()> {
        self.import_access(sink).await.map_err(Into::into)
    }
}

#[async_trait]
impl<A> AccessTarget for GcpAccessSyncer<A>
where
    A: ResourceApi + PolicyApi + MaskingApi,
{
    async fn sync_access_to_target(
        &self,
        desired: Vec<AccessRecord>,
        feedback: &mut dyn FeedbackSink,
    ) -> AccessResult<()> {
        self.apply_access(desired, feedback).await.map_err(Into::into)
    }
}
