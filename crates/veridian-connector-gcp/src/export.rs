//! Conversion of desired access records into a binding delta.

use std::collections::BTreeMap;

use tracing::{debug, instrument};
use veridian_access::record::AccessRecord;

use crate::iam::{Binding, BindingKey};
use crate::identity::{native_group_member, native_user_member};

/// One computed binding with the records that requested it.
#[derive(Debug, Clone)]
pub struct DeltaEntry {
    /// The binding to apply.
    pub binding: Binding,
    /// External ids of the originating records, for feedback attribution.
    pub sources: Vec<String>,
}

/// The add and delete sets of one reconciliation cycle.
///
/// The sets are disjoint once [`BindingDelta::finalize`] has run: a binding
/// requested as both an add and a delete stays an add.
#[derive(Debug, Default)]
pub struct BindingDelta {
    to_add: BTreeMap<BindingKey, DeltaEntry>,
    to_delete: BTreeMap<BindingKey, DeltaEntry>,
}

impl BindingDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(map: &mut BTreeMap<BindingKey, DeltaEntry>, binding: Binding, source: &str) {
        let entry = map.entry(binding.key()).or_insert_with(|| DeltaEntry {
            binding,
            sources: Vec::new(),
        });
        if !entry.sources.iter().any(|s| s == source) {
            entry.sources.push(source.to_string());
        }
    }

    /// Requests a binding addition on behalf of `source`.
    pub fn push_add(&mut self, binding: Binding, source: &str) {
        Self::push(&mut self.to_add, binding, source);
    }

    /// Requests a binding removal on behalf of `source`.
    pub fn push_delete(&mut self, binding: Binding, source: &str) {
        Self::push(&mut self.to_delete, binding, source);
    }

    /// Enforces the add-wins invariant after both sets are complete.
    pub fn finalize(&mut self) {
        let adds: Vec<BindingKey> = self.to_add.keys().cloned().collect();
        for key in adds {
            self.to_delete.remove(&key);
        }
    }

    /// Bindings to add, in deterministic key order.
    pub fn additions(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.to_add.values()
    }

    /// Bindings to delete, in deterministic key order.
    pub fn deletions(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.to_delete.values()
    }

    /// Number of bindings to add.
    #[must_use]
    pub fn add_len(&self) -> usize {
        self.to_add.len()
    }

    /// Number of bindings to delete.
    #[must_use]
    pub fn delete_len(&self) -> usize {
        self.to_delete.len()
    }

    /// Whether both sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// Builds the finalized delta for a batch of desired records.
///
/// Informational records never contribute native writes and are skipped.
#[instrument(skip_all, fields(records = records.len()))]
#[must_use]
pub fn build_delta(records: &[AccessRecord]) -> BindingDelta {
    let mut delta = BindingDelta::new();

    for record in records {
        if record.not_internalizable {
            debug!(record = %record.external_id, "Informational record skipped on export");
            continue;
        }

        let members = native_members(&record.who.users, &record.who.groups);
        let deleted_members = record
            .deleted_who
            .as_ref()
            .map(|who| native_members(&who.users, &who.groups))
            .unwrap_or_default();

        for what in &record.what {
            for permission in &what.permissions {
                for member in &members {
                    let binding = Binding::new(
                        member.clone(),
                        permission.clone(),
                        what.resource.clone(),
                        what.resource_type.clone(),
                    );
                    if record.delete {
                        delta.push_delete(binding, &record.external_id);
                    } else {
                        delta.push_add(binding, &record.external_id);
                    }
                }
                for member in &deleted_members {
                    delta.push_delete(
                        Binding::new(
                            member.clone(),
                            permission.clone(),
                            what.resource.clone(),
                            what.resource_type.clone(),
                        ),
                        &record.external_id,
                    );
                }
            }
        }

        // Scope teardown removes every permission for every member the
        // record has ever referenced, current or deleted.
        for what in &record.delete_what {
            for permission in &what.permissions {
                for member in members.iter().chain(deleted_members.iter()) {
                    delta.push_delete(
                        Binding::new(
                            member.clone(),
                            permission.clone(),
                            what.resource.clone(),
                            what.resource_type.clone(),
                        ),
                        &record.external_id,
                    );
                }
            }
        }
    }

    delta.finalize();
    delta
}

fn native_members(users: &[String], groups: &[String]) -> Vec<String> {
    users
        .iter()
        .map(|u| native_user_member(u))
        .chain(groups.iter().map(|g| native_group_member(g)))
        .collect()
}
