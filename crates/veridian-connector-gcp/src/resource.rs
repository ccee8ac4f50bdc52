//! Resource hierarchy nodes yielded by the tree walker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Kind of a resource-manager node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GcpResourceType {
    /// The single hierarchy root.
    Organization,
    /// Intermediate container, may nest.
    Folder,
    /// Terminal container holding the actual data resources.
    Project,
}

impl GcpResourceType {
    /// Stable lowercase string form, used in record names and catalog keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GcpResourceType::Organization => "organization",
            GcpResourceType::Folder => "folder",
            GcpResourceType::Project => "project",
        }
    }

    /// API name prefix for this resource type (`projects`, `folders`, ...).
    #[must_use]
    pub fn api_prefix(self) -> &'static str {
        match self {
            GcpResourceType::Organization => "organizations",
            GcpResourceType::Folder => "folders",
            GcpResourceType::Project => "projects",
        }
    }
}

impl std::fmt::Display for GcpResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GcpResourceType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "organization" => Ok(GcpResourceType::Organization),
            "folder" => Ok(GcpResourceType::Folder),
            "project" => Ok(GcpResourceType::Project),
            _ => Err(()),
        }
    }
}

/// One node of the resource hierarchy.
///
/// Nodes form a tree rooted at the organization. The parent link is a
/// non-owning back-reference used for lookups only; nodes are immutable
/// after creation and discarded at the end of a run.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// API entry name, for example `projects/demo-1`.
    pub entry_name: String,
    /// Bare resource id.
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Slash-joined id path from the root, for example `123/456/demo-1`.
    pub full_name: String,
    /// Node kind.
    pub resource_type: GcpResourceType,
    /// Immediate parent, absent only on the organization node.
    pub parent: Option<Arc<ResourceNode>>,
}

impl ResourceNode {
    /// Builds the organization root node.
    #[must_use]
    pub fn organization(org_id: &str, display_name: &str) -> Self {
        Self {
            entry_name: format!("organizations/{org_id}"),
            id: org_id.to_string(),
            display_name: display_name.to_string(),
            full_name: org_id.to_string(),
            resource_type: GcpResourceType::Organization,
            parent: None,
        }
    }

    /// Builds a child node under `parent` from an API entry name.
    ///
    /// `entry_name` is the API form (`folders/123`); the bare id is its
    /// final path segment.
    #[must_use]
    pub fn child(
        resource_type: GcpResourceType,
        entry_name: &str,
        display_name: &str,
        parent: &Arc<ResourceNode>,
    ) -> Self {
        let id = entry_name
            .rsplit_once('/')
            .map_or(entry_name, |(_, id)| id)
            .to_string();
        Self {
            entry_name: entry_name.to_string(),
            full_name: format!("{}/{}", parent.full_name, id),
            id,
            display_name: display_name.to_string(),
            resource_type,
            parent: Some(Arc::clone(parent)),
        }
    }
}
