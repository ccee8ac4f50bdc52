//! Conversion of flattened native bindings into access records.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, instrument, warn};
use veridian_access::catalog::PermissionCatalog;
use veridian_access::record::{AccessRecord, Action, LockSet, WhatItem, Who};

use crate::config::GcpConfig;
use crate::iam::{Binding, BindingKey};
use crate::identity::Identity;
use crate::permissions::{special_group_kind, ProjectRoleKind};
use crate::resource::GcpResourceType;

/// Grouping key of the per-resource-role path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ResourceRoleKey {
    resource_type: String,
    resource: String,
    role: String,
}

/// Accumulating state of one record under construction.
#[derive(Debug, Default)]
struct RecordDraft {
    users: BTreeSet<String>,
    groups: BTreeSet<String>,
    what: BTreeMap<(String, String), BTreeSet<String>>,
    not_internalizable: bool,
}

impl RecordDraft {
    fn add_scope(&mut self, resource: &str, resource_type: &str, permission: &str) {
        self.what
            .entry((resource.to_string(), resource_type.to_string()))
            .or_default()
            .insert(permission.to_string());
    }

    fn add_identity(&mut self, identity: &Identity) {
        match identity {
            Identity::User(id) | Identity::ServiceAccount(id) => {
                self.users.insert(id.clone());
            }
            Identity::Group(id) => {
                self.groups.insert(id.clone());
            }
            Identity::Domain(id) => {
                debug!(domain = %id, "Domain member has no record membership mapping, skipped");
            }
            Identity::SpecialGroup(_) => {}
        }
    }

    fn into_record(self, name: &str, action: Action) -> AccessRecord {
        let mut record = AccessRecord::new(name, action);
        record.who = Who {
            users: self.users.into_iter().collect(),
            groups: self.groups.into_iter().collect(),
        };
        record.what = self
            .what
            .into_iter()
            .map(|((resource, resource_type), permissions)| WhatItem {
                resource,
                resource_type,
                permissions: permissions.into_iter().collect(),
            })
            .collect();
        record.not_internalizable = self.not_internalizable;
        if record.not_internalizable {
            record.locks = LockSet::all();
        }
        record
    }
}

/// Owner/editor/viewer membership per project, resolved once per
/// conversion from the binding list itself.
#[derive(Debug, Default)]
struct ProjectOwnership {
    members: BTreeMap<(String, ProjectRoleKind), BTreeSet<String>>,
}

impl ProjectOwnership {
    fn from_bindings(bindings: &[Binding]) -> Self {
        let mut ownership = Self::default();
        for binding in bindings {
            if !binding
                .resource_type
                .eq_ignore_ascii_case(GcpResourceType::Project.as_str())
            {
                continue;
            }
            let kind = [
                ProjectRoleKind::Owner,
                ProjectRoleKind::Editor,
                ProjectRoleKind::Viewer,
            ]
            .into_iter()
            .find(|k| binding.role.eq_ignore_ascii_case(k.backing_role()));
            if let Some(kind) = kind {
                ownership
                    .members
                    .entry((binding.resource.to_lowercase(), kind))
                    .or_default()
                    .insert(binding.member.clone());
            }
        }
        ownership
    }

    fn members_of(&self, project: &str, kind: ProjectRoleKind) -> impl Iterator<Item = &String> {
        self.members
            .get(&(project.to_lowercase(), kind))
            .into_iter()
            .flatten()
    }
}

/// Converts flattened bindings into access records.
///
/// Pure with respect to its inputs: identical bindings and an identical
/// managed-binding set yield an identical record list.
#[derive(Debug)]
pub struct BindingImporter<'a> {
    config: &'a GcpConfig,
    catalog: &'a PermissionCatalog,
}

impl<'a> BindingImporter<'a> {
    /// Creates an importer over the configured permission catalog.
    #[must_use]
    pub fn new(config: &'a GcpConfig, catalog: &'a PermissionCatalog) -> Self {
        Self { config, catalog }
    }

    /// Runs the conversion.
    ///
    /// `managed` holds the bindings this process wrote earlier in the run;
    /// matching bindings are suppressed so the system's own writes are not
    /// re-imported as foreign grants.
    #[instrument(skip_all, fields(bindings = bindings.len()))]
    pub fn convert(
        &self,
        bindings: &[Binding],
        managed: &HashSet<BindingKey>,
    ) -> Vec<AccessRecord> {
        let ownership = ProjectOwnership::from_bindings(bindings);

        let mut by_resource_role: BTreeMap<ResourceRoleKey, RecordDraft> = BTreeMap::new();
        let mut by_identity: BTreeMap<String, RecordDraft> = BTreeMap::new();
        let mut special: BTreeMap<ProjectRoleKind, RecordDraft> = BTreeMap::new();

        for original in bindings {
            let binding = self.rewrite_organization_resource(original);

            let is_managed_role = self
                .catalog
                .is_managed(&binding.resource_type, &binding.role);
            if !is_managed_role && !self.config.include_unknown_roles {
                debug!(binding = %binding, "Unmanaged role dropped");
                continue;
            }

            if managed.contains(&binding.key()) {
                debug!(binding = %binding, "Own write suppressed");
                continue;
            }

            let Some(identity) = Identity::parse(&binding.member) else {
                warn!(member = %binding.member, "Unrecognized member prefix, skipped");
                continue;
            };

            if let Identity::SpecialGroup(tag) = &identity {
                self.accumulate_special_group(&mut special, &binding, tag, &ownership);
                continue;
            }

            if self.config.is_group_by_identity_role(&binding.role) {
                let draft = by_identity.entry(binding.member.clone()).or_default();
                draft.not_internalizable = true;
                draft.add_identity(&identity);
                draft.add_scope(&binding.resource, &binding.resource_type, &binding.role);
                continue;
            }

            let key = ResourceRoleKey {
                resource_type: binding.resource_type.to_lowercase(),
                resource: binding.resource.to_lowercase(),
                role: binding.role.to_lowercase(),
            };
            let draft = by_resource_role.entry(key).or_default();
            draft.not_internalizable |= !is_managed_role;
            draft.add_identity(&identity);
            draft.add_scope(&binding.resource, &binding.resource_type, &binding.role);
        }

        let mut records = Vec::new();
        for (key, draft) in by_resource_role {
            let name = format!(
                "{}_{}_{}",
                key.resource_type,
                key.resource,
                key.role.replace('/', "_")
            );
            records.push(draft.into_record(&name, Action::Grant));
        }
        for (member, draft) in by_identity {
            let name = member.replace(':', "_");
            records.push(draft.into_record(&name, Action::Grant));
        }
        for (kind, draft) in special {
            let name = format!("special_group_{}", kind.as_str());
            records.push(draft.into_record(&name, Action::Grant));
        }
        records
    }

    /// Rewrites organization-level resources onto the canonical synthetic
    /// organization data-source name.
    fn rewrite_organization_resource(&self, binding: &Binding) -> Binding {
        if binding
            .resource_type
            .eq_ignore_ascii_case(GcpResourceType::Organization.as_str())
        {
            let mut rewritten = binding.clone();
            rewritten.resource = self.config.organization_datasource_name();
            rewritten
        } else {
            binding.clone()
        }
    }

    /// Accumulates a special-group binding into its membership-kind record.
    ///
    /// The record's membership comes from the project's own
    /// owner/editor/viewer bindings rather than from the member field.
    fn accumulate_special_group(
        &self,
        special: &mut BTreeMap<ProjectRoleKind, RecordDraft>,
        binding: &Binding,
        tag: &str,
        ownership: &ProjectOwnership,
    ) {
        let Some(kind) = special_group_kind(&binding.role) else {
            warn!(
                role = %binding.role,
                member = %tag,
                "Special group role has no mapping, dropped"
            );
            return;
        };

        let draft = special.entry(kind).or_default();
        draft.not_internalizable = true;
        draft.add_scope(&binding.resource, &binding.resource_type, &binding.role);
        for member in ownership.members_of(&binding.resource, kind) {
            if let Some(identity) = Identity::parse(member) {
                draft.add_identity(&identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::default_catalog;

    fn config() -> GcpConfig {
        GcpConfig::builder().organization_id("123").build().unwrap()
    }

    #[test]
    fn test_org_binding_resource_is_rewritten() {
        let config = config();
        let catalog = default_catalog();
        let importer = BindingImporter::new(&config, &catalog);

        let bindings = vec![Binding::new(
            "user:a@x.com",
            "roles/viewer",
            "123",
            "organization",
        )];
        let records = importer.convert(&bindings, &HashSet::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].what[0].resource, "gcp-org-123");
        assert_eq!(records[0].name, "organization_gcp-org-123_roles_viewer");
    }

    #[test]
    fn test_special_group_who_comes_from_project_ownership() {
        let config = config();
        let catalog = default_catalog();
        let importer = BindingImporter::new(&config, &catalog);

        let bindings = vec![
            Binding::new("user:owner@x.com", "roles/owner", "p1", "project"),
            Binding::new("group:admins@x.com", "roles/owner", "p1", "project"),
            Binding::new(
                "special_group:projectOwners",
                "roles/bigquery.dataOwner",
                "p1",
                "project",
            ),
        ];
        let records = importer.convert(&bindings, &HashSet::new());

        let special = records
            .iter()
            .find(|r| r.name == "special_group_owner")
            .unwrap();
        assert!(special.not_internalizable);
        assert_eq!(special.who.users, vec!["owner@x.com"]);
        assert_eq!(special.who.groups, vec!["admins@x.com"]);
        assert_eq!(special.what[0].permissions, vec!["roles/bigquery.dataOwner"]);
    }

    #[test]
    fn test_unknown_special_group_role_dropped() {
        let config = config();
        let catalog = default_catalog();
        let importer = BindingImporter::new(&config, &catalog);

        let bindings = vec![Binding::new(
            "special_group:projectOwners",
            "roles/bigquery.admin",
            "p1",
            "project",
        )];
        let records = importer.convert(&bindings, &HashSet::new());
        assert!(records.is_empty());
    }

    #[test]
    fn test_unparseable_member_skipped() {
        let config = config();
        let catalog = default_catalog();
        let importer = BindingImporter::new(&config, &catalog);

        let bindings = vec![
            Binding::new("allUsers", "roles/viewer", "p1", "project"),
            Binding::new("user:a@x.com", "roles/viewer", "p1", "project"),
        ];
        let records = importer.convert(&bindings, &HashSet::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].who.users, vec!["a@x.com"]);
    }
}
