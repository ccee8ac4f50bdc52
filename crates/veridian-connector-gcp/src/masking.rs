//! Column-masking policy lifecycle management.
//!
//! Masks pair a policy tag (carrying fine-grained-reader membership and
//! column attachments) with a data policy (carrying the masking
//! expression). One pair exists per (mask, storage location); a mask
//! spanning several locations owns several independent pairs aggregated
//! under one record external id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use veridian_access::record::{AccessRecord, Action, WhatItem, Who};

use crate::api::{MaskingApi, FINE_GRAINED_READER_ROLE};
use crate::error::GcpResult;
use crate::identity::{native_group_member, native_user_member, Identity};
use crate::session::SyncSession;

/// Separator joining a mask's per-location pair ids into one external id.
const PAIR_ID_SEPARATOR: char = ',';

/// Predefined masking expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskType {
    /// Replace the value with NULL.
    AlwaysNull,
    /// Replace the value with its SHA-256 hash.
    Sha256,
    /// Replace the value with the type's default.
    DefaultMaskingValue,
    /// Keep only the last four characters.
    LastFourCharacters,
    /// Mask the local part of an email address.
    EmailMask,
}

impl MaskType {
    /// Wire string of the predefined expression.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MaskType::AlwaysNull => "ALWAYS_NULL",
            MaskType::Sha256 => "SHA256",
            MaskType::DefaultMaskingValue => "DEFAULT_MASKING_VALUE",
            MaskType::LastFourCharacters => "LAST_FOUR_CHARACTERS",
            MaskType::EmailMask => "EMAIL_MASK",
        }
    }

    /// Parses a declared mask type, defaulting to [`MaskType::AlwaysNull`]
    /// for anything unrecognized.
    #[must_use]
    pub fn parse(value: &str) -> MaskType {
        match value.to_uppercase().as_str() {
            "SHA256" | "HASH" => MaskType::Sha256,
            "DEFAULT_MASKING_VALUE" => MaskType::DefaultMaskingValue,
            "LAST_FOUR_CHARACTERS" => MaskType::LastFourCharacters,
            "EMAIL_MASK" => MaskType::EmailMask,
            _ => MaskType::AlwaysNull,
        }
    }
}

impl std::fmt::Display for MaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column carrying a policy tag, as listed by the masked-column catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedColumn {
    /// Full data-object name of the column.
    pub column: String,
    /// Policy tag attached to the column.
    pub policy_tag: String,
    /// Storage location of the column's dataset.
    pub location: String,
}

/// Policy tag attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTagInfo {
    /// Resource id of the tag.
    #[serde(rename = "name")]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Storage location the tag lives in.
    #[serde(default)]
    pub location: String,
}

/// Masking expression carried by a data policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMaskingPolicy {
    /// Predefined expression name.
    #[serde(default)]
    pub predefined_expression: String,
}

/// Data policy attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPolicyInfo {
    /// Resource id of the policy.
    #[serde(rename = "name")]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Policy tag the policy is bound to.
    #[serde(default)]
    pub policy_tag: String,
    /// Storage location.
    #[serde(default)]
    pub location: String,
    /// Masking expression.
    #[serde(default)]
    pub data_masking_policy: DataMaskingPolicy,
}

impl DataPolicyInfo {
    /// The policy's masking expression type.
    #[must_use]
    pub fn mask_type(&self) -> MaskType {
        MaskType::parse(&self.data_masking_policy.predefined_expression)
    }
}

/// One (mask, location) pair.
#[derive(Debug, Clone)]
pub struct MaskingInformation {
    /// Storage location of the pair.
    pub location: String,
    /// The pair's policy tag.
    pub policy_tag: PolicyTagInfo,
    /// The pair's data policy, when resolved.
    pub data_policy: Option<DataPolicyInfo>,
}

/// Outcome of applying one desired mask.
#[derive(Debug, Default)]
pub struct MaskOutcome {
    /// Comma-joined ids of the surviving pairs; empty after full teardown.
    pub external_id: String,
    /// Failure descriptions accumulated across pair operations.
    pub errors: Vec<String>,
}

/// Drives policy-tag/data-policy pairs through their lifecycle.
#[derive(Debug)]
pub struct MaskingManager<'a, M: MaskingApi> {
    api: &'a M,
    session: &'a SyncSession,
}

impl<'a, M: MaskingApi> MaskingManager<'a, M> {
    /// Creates a manager bound to the run's session.
    #[must_use]
    pub fn new(api: &'a M, session: &'a SyncSession) -> Self {
        Self { api, session }
    }

    /// Import path: reads foreign masks out of the tagged-column catalog.
    ///
    /// Tags this process manages are skipped; remaining tags are grouped
    /// per (tag, location), pairs with the same display name are one
    /// logical mask aggregated into one record.
    #[instrument(skip(self))]
    pub async fn import_masks(&self) -> GcpResult<Vec<AccessRecord>> {
        let columns = self.api.list_masked_columns().await?;
        let managed_tags = self.session.managed_tags_snapshot().await;

        let mut groups: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for column in columns {
            if managed_tags.contains(&column.policy_tag) {
                debug!(tag = %column.policy_tag, "Own mask skipped on import");
                continue;
            }
            groups
                .entry((column.policy_tag, column.location))
                .or_default()
                .insert(column.column);
        }

        let mut drafts: BTreeMap<String, MaskDraft> = BTreeMap::new();
        for ((tag_id, location), columns) in groups {
            let tag = self.api.get_policy_tag(&tag_id).await?;
            let data_policy = self.api.get_data_policy_for_tag(&tag_id).await?;
            let readers = self.api.get_fine_grained_readers(&tag_id).await?;

            let name = if tag.display_name.is_empty() {
                tag_id.clone()
            } else {
                tag.display_name.clone()
            };
            let draft = drafts.entry(name).or_default();
            draft.tag_ids.insert(tag_id);
            draft.columns.extend(columns);
            draft.mask_type = data_policy
                .map(|p| p.mask_type())
                .or(draft.mask_type)
                .or(Some(MaskType::AlwaysNull));
            for member in readers {
                match Identity::parse(&member) {
                    Some(Identity::User(id)) | Some(Identity::ServiceAccount(id)) => {
                        draft.users.insert(id);
                    }
                    Some(Identity::Group(id)) => {
                        draft.groups.insert(id);
                    }
                    _ => {
                        warn!(member = %member, location = %location, "Unmapped reader member skipped");
                    }
                }
            }
        }

        Ok(drafts
            .into_iter()
            .map(|(name, draft)| draft.into_record(&name))
            .collect())
    }

    /// Export path: converges the pairs of one desired mask.
    ///
    /// Locations the mask must cover get a created or updated pair;
    /// locations only referenced by removed columns, or covering zero
    /// active columns, have their pair torn down. Failures are collected
    /// per operation and never abort the remaining pairs.
    #[instrument(skip(self, record), fields(record = %record.external_id))]
    pub async fn apply_mask(&self, record: &AccessRecord) -> MaskOutcome {
        let mut outcome = MaskOutcome::default();

        let active_columns = flat_columns(&record.what);
        let removed_columns = flat_columns(&record.delete_what);

        let all_columns: Vec<String> = active_columns
            .iter()
            .chain(removed_columns.iter())
            .cloned()
            .collect();
        let locations = match self.api.resolve_locations(&all_columns).await {
            Ok(map) => map,
            Err(e) => {
                outcome
                    .errors
                    .push(format!("failed to resolve column locations: {e}"));
                return outcome;
            }
        };

        let mut active_by_location: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for column in &active_columns {
            match locations.get(column) {
                Some(location) => {
                    active_by_location
                        .entry(location.clone())
                        .or_default()
                        .insert(column.clone());
                }
                None => outcome
                    .errors
                    .push(format!("no storage location known for column {column}")),
            }
        }
        let mut removed_by_location: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for column in &removed_columns {
            if let Some(location) = locations.get(column) {
                removed_by_location
                    .entry(location.clone())
                    .or_default()
                    .insert(column.clone());
            }
        }

        let existing = self.existing_pairs(record, &mut outcome).await;
        let must_cover: BTreeSet<String> = if record.delete {
            BTreeSet::new()
        } else {
            active_by_location.keys().cloned().collect()
        };

        let mask_type = MaskType::parse(record.mask_type.as_deref().unwrap_or_default());
        let members = native_reader_members(&record.who);

        let mut surviving_ids = BTreeSet::new();

        for location in &must_cover {
            let columns = &active_by_location[location];
            let removed = removed_by_location.remove(location).unwrap_or_default();
            let result = match existing.get(location) {
                Some(pair) => {
                    self.update_pair(pair, mask_type, &members, columns, &removed)
                        .await
                }
                None => {
                    self.create_pair(&record.name, location, mask_type, &members, columns)
                        .await
                }
            };
            match result {
                Ok(tag_id) => {
                    surviving_ids.insert(tag_id);
                }
                Err(e) => outcome
                    .errors
                    .push(format!("failed to converge mask in {location}: {e}")),
            }
        }

        // Every remaining pair covers zero active columns: teardown.
        for (location, pair) in &existing {
            if must_cover.contains(location) {
                continue;
            }
            let removed = removed_by_location.remove(location).unwrap_or_default();
            if let Err(e) = self.teardown_pair(pair, &removed).await {
                outcome
                    .errors
                    .push(format!("failed to tear down mask in {location}: {e}"));
                // The pair is still standing; keep it attributed.
                surviving_ids.insert(pair.policy_tag.id.clone());
            }
        }

        outcome.external_id = surviving_ids
            .into_iter()
            .collect::<Vec<_>>()
            .join(&PAIR_ID_SEPARATOR.to_string());
        outcome
    }

    /// Resolves the pairs currently backing a record from its external id.
    async fn existing_pairs(
        &self,
        record: &AccessRecord,
        outcome: &mut MaskOutcome,
    ) -> BTreeMap<String, MaskingInformation> {
        let mut pairs = BTreeMap::new();
        for tag_id in record
            .external_id
            .split(PAIR_ID_SEPARATOR)
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.contains('/'))
        {
            let tag = match self.api.get_policy_tag(tag_id).await {
                Ok(tag) => tag,
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("failed to resolve policy tag {tag_id}: {e}"));
                    continue;
                }
            };
            let data_policy = match self.api.get_data_policy_for_tag(tag_id).await {
                Ok(policy) => policy,
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("failed to resolve data policy for {tag_id}: {e}"));
                    None
                }
            };
            pairs.insert(
                tag.location.clone(),
                MaskingInformation {
                    location: tag.location.clone(),
                    policy_tag: tag,
                    data_policy,
                },
            );
        }
        pairs
    }

    /// Creates a new pair in a location and populates it.
    async fn create_pair(
        &self,
        name: &str,
        location: &str,
        mask_type: MaskType,
        members: &[String],
        columns: &BTreeSet<String>,
    ) -> GcpResult<String> {
        info!(%location, mask = %name, "Creating masking pair");
        let tag = self.api.create_policy_tag(location, name).await?;
        self.session.record_managed_tag(&tag.id).await;
        self.api
            .create_data_policy(location, name, mask_type, &tag.id)
            .await?;
        self.api
            .set_fine_grained_readers(&tag.id, members)
            .await?;
        for column in columns {
            self.api.set_column_policy_tag(column, Some(&tag.id)).await?;
        }
        Ok(tag.id)
    }

    /// Converges an existing pair's expression, membership, and coverage.
    async fn update_pair(
        &self,
        pair: &MaskingInformation,
        mask_type: MaskType,
        members: &[String],
        columns: &BTreeSet<String>,
        removed: &BTreeSet<String>,
    ) -> GcpResult<String> {
        let tag_id = &pair.policy_tag.id;
        info!(location = %pair.location, tag = %tag_id, "Updating masking pair");
        self.session.record_managed_tag(tag_id).await;

        match &pair.data_policy {
            Some(policy) if policy.mask_type() == mask_type => {}
            Some(policy) => {
                self.api.update_data_policy(&policy.id, mask_type).await?;
            }
            None => {
                self.api
                    .create_data_policy(&pair.location, &pair.policy_tag.display_name, mask_type, tag_id)
                    .await?;
            }
        }

        self.api.set_fine_grained_readers(tag_id, members).await?;
        for column in columns {
            self.api.set_column_policy_tag(column, Some(tag_id)).await?;
        }
        for column in removed {
            self.api.set_column_policy_tag(column, None).await?;
        }
        Ok(tag_id.clone())
    }

    /// Tears a pair down completely.
    async fn teardown_pair(
        &self,
        pair: &MaskingInformation,
        removed: &BTreeSet<String>,
    ) -> GcpResult<()> {
        info!(location = %pair.location, tag = %pair.policy_tag.id, "Tearing down masking pair");
        for column in removed {
            self.api.set_column_policy_tag(column, None).await?;
        }
        if let Some(policy) = &pair.data_policy {
            self.api.delete_data_policy(&policy.id).await?;
        }
        self.api.delete_policy_tag(&pair.policy_tag.id).await?;
        self.session.forget_managed_tag(&pair.policy_tag.id).await;
        Ok(())
    }
}

/// Accumulating state of one imported mask.
#[derive(Debug, Default)]
struct MaskDraft {
    tag_ids: BTreeSet<String>,
    columns: BTreeSet<String>,
    users: BTreeSet<String>,
    groups: BTreeSet<String>,
    mask_type: Option<MaskType>,
}

impl MaskDraft {
    fn into_record(self, name: &str) -> AccessRecord {
        let mut record = AccessRecord::new(name, Action::Mask);
        record.external_id = self
            .tag_ids
            .into_iter()
            .collect::<Vec<_>>()
            .join(&PAIR_ID_SEPARATOR.to_string());
        record.who = Who {
            users: self.users.into_iter().collect(),
            groups: self.groups.into_iter().collect(),
        };
        record.what = self
            .columns
            .into_iter()
            .map(|column| WhatItem {
                resource: column,
                resource_type: "column".to_string(),
                permissions: vec![FINE_GRAINED_READER_ROLE.to_string()],
            })
            .collect();
        record.mask_type = self.mask_type.map(|t| t.as_str().to_string());
        record
    }
}

fn flat_columns(what: &[WhatItem]) -> Vec<String> {
    let mut columns: Vec<String> = what.iter().map(|w| w.resource.clone()).collect();
    columns.sort();
    columns.dedup();
    columns
}

fn native_reader_members(who: &Who) -> Vec<String> {
    who.users
        .iter()
        .map(|u| native_user_member(u))
        .chain(who.groups.iter().map(|g| native_group_member(g)))
        .collect()
}
