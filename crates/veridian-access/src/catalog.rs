//! Permission catalog: the (resource type, role) pairs the platform manages.

use std::collections::BTreeMap;

/// Catalog key, normalized to lowercase so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CatalogKey {
    resource_type: String,
    role: String,
}

impl CatalogKey {
    fn new(resource_type: &str, role: &str) -> Self {
        Self {
            resource_type: resource_type.to_lowercase(),
            role: role.to_lowercase(),
        }
    }
}

/// Registry of the native roles the platform data model knows per resource
/// type.
///
/// A native binding whose (resource type, role) pair is absent here is not
/// managed: the importer drops it, or keeps it as informational only when
/// the connector is configured to include non-applicable permissions.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    entries: BTreeMap<CatalogKey, Vec<String>>,
}

impl PermissionCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a role for a resource type with the permissions it implies.
    pub fn register(
        &mut self,
        resource_type: &str,
        role: &str,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.entries.insert(
            CatalogKey::new(resource_type, role),
            permissions.into_iter().map(Into::into).collect(),
        );
    }

    /// Whether the platform manages this (resource type, role) pair.
    #[must_use]
    pub fn is_managed(&self, resource_type: &str, role: &str) -> bool {
        self.entries
            .contains_key(&CatalogKey::new(resource_type, role))
    }

    /// The permissions a managed role implies, if registered.
    #[must_use]
    pub fn permissions_for(&self, resource_type: &str, role: &str) -> Option<&[String]> {
        self.entries
            .get(&CatalogKey::new(resource_type, role))
            .map(Vec::as_slice)
    }

    /// Number of registered (resource type, role) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
