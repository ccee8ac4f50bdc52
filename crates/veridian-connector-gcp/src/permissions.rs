//! Role catalog content for the GCP data model.

use veridian_access::catalog::PermissionCatalog;

use crate::resource::GcpResourceType;

/// Project-membership kinds expanded from special-group members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProjectRoleKind {
    /// Project owners.
    Owner,
    /// Project editors.
    Editor,
    /// Project viewers.
    Viewer,
}

impl ProjectRoleKind {
    /// Display name used in synthesized record names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectRoleKind::Owner => "owner",
            ProjectRoleKind::Editor => "editor",
            ProjectRoleKind::Viewer => "viewer",
        }
    }

    /// The basic project role whose membership backs this kind.
    #[must_use]
    pub fn backing_role(self) -> &'static str {
        match self {
            ProjectRoleKind::Owner => "roles/owner",
            ProjectRoleKind::Editor => "roles/editor",
            ProjectRoleKind::Viewer => "roles/viewer",
        }
    }
}

/// Maps a special-group binding's role onto a membership kind.
///
/// The table is deliberately closed: only the three data roles are
/// meaningful for special groups, anything else is dropped by the caller.
#[must_use]
pub fn special_group_kind(role: &str) -> Option<ProjectRoleKind> {
    match role.to_lowercase().as_str() {
        "roles/bigquery.dataviewer" => Some(ProjectRoleKind::Viewer),
        "roles/bigquery.dataeditor" => Some(ProjectRoleKind::Editor),
        "roles/bigquery.dataowner" => Some(ProjectRoleKind::Owner),
        _ => None,
    }
}

/// Builds the permission catalog the platform data model manages on GCP.
#[must_use]
pub fn default_catalog() -> PermissionCatalog {
    let mut catalog = PermissionCatalog::new();

    let basic: [(&str, &[&str]); 3] = [
        (
            "roles/owner",
            &["resourcemanager.projects.update", "iam.roles.update"],
        ),
        ("roles/editor", &["resourcemanager.projects.get", "bigquery.tables.updateData"]),
        ("roles/viewer", &["resourcemanager.projects.get", "bigquery.tables.getData"]),
    ];

    for resource_type in [
        GcpResourceType::Organization,
        GcpResourceType::Folder,
        GcpResourceType::Project,
    ] {
        for (role, permissions) in basic {
            catalog.register(resource_type.as_str(), role, permissions.iter().copied());
        }
    }

    let project_only: [(&str, &[&str]); 5] = [
        ("roles/bigquery.admin", &["bigquery.datasets.update", "bigquery.tables.update"]),
        ("roles/bigquery.dataowner", &["bigquery.datasets.update", "bigquery.tables.setIamPolicy"]),
        ("roles/bigquery.dataeditor", &["bigquery.tables.updateData"]),
        ("roles/bigquery.dataviewer", &["bigquery.tables.getData"]),
        ("roles/bigquery.jobuser", &["bigquery.jobs.create"]),
    ];

    for (role, permissions) in project_only {
        catalog.register(
            GcpResourceType::Project.as_str(),
            role,
            permissions.iter().copied(),
        );
    }

    catalog
}
