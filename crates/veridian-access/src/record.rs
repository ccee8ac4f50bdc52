//! The platform-neutral access record model.

use serde::{Deserialize, Serialize};

/// Maximum length of a record name.
///
/// Generated names that exceed this keep only their trailing characters so
/// the most specific suffix of a hierarchical name survives.
pub const MAX_RECORD_NAME_LEN: usize = 128;

/// The action an access record expresses on its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A plain permission grant.
    Grant,
    /// A column-masking policy.
    Mask,
}

impl Action {
    /// Stable string form used in feedback messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Grant => "grant",
            Action::Mask => "mask",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership of a record, split by identity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Who {
    /// Bare user identifiers (emails), service accounts included.
    #[serde(default)]
    pub users: Vec<String>,
    /// Bare group identifiers (emails).
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Who {
    /// Returns true when both membership lists are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// One resource scope entry with the permissions held on it.
///
/// The permission list is never empty for a well-formed record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WhatItem {
    /// Resource identifier within the target system.
    pub resource: String,
    /// Resource type within the target system.
    pub resource_type: String,
    /// Native permission (role) names granted on the resource.
    pub permissions: Vec<String>,
}

impl WhatItem {
    /// Creates a scope entry.
    pub fn new(
        resource: impl Into<String>,
        resource_type: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            resource: resource.into(),
            resource_type: resource_type.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Record fields the platform must not overwrite on re-import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSet {
    /// Membership is connector-owned.
    pub who: bool,
    /// Resource scope is connector-owned.
    pub what: bool,
    /// Name is connector-owned.
    pub name: bool,
    /// Deletion is connector-owned.
    pub delete: bool,
}

impl LockSet {
    /// Lock every field, used for records synthesized purely for display.
    #[must_use]
    pub fn all() -> Self {
        Self {
            who: true,
            what: true,
            name: true,
            delete: true,
        }
    }
}

/// The platform-neutral unit describing who has what permission on what
/// resource.
///
/// Records flow in both directions: connectors produce them when importing
/// native grants, and receive them as desired state when exporting. A record
/// marked `not_internalizable` was synthesized for informational purposes
/// only and is never round-tripped back into a native write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Stable identity of the record; equals the generated name on import.
    pub external_id: String,
    /// Record name, at most [`MAX_RECORD_NAME_LEN`] characters.
    pub name: String,
    /// Hint the platform may use when renaming the record.
    pub naming_hint: String,
    /// What the record expresses.
    pub action: Action,
    /// Current membership.
    pub who: Who,
    /// Membership removed since the last apply, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_who: Option<Who>,
    /// Current resource scope. Every entry carries at least one permission.
    pub what: Vec<WhatItem>,
    /// Scope entries to tear down regardless of current membership.
    #[serde(default)]
    pub delete_what: Vec<WhatItem>,
    /// Whether the whole record is being deleted.
    #[serde(default)]
    pub delete: bool,
    /// Informational record that must never produce a native write.
    #[serde(default)]
    pub not_internalizable: bool,
    /// Fields the platform must not overwrite.
    #[serde(default)]
    pub locks: LockSet,
    /// Masking expression type for [`Action::Mask`] records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_type: Option<String>,
}

impl AccessRecord {
    /// Creates an empty record with the given name for the given action.
    ///
    /// The name is truncated to its trailing [`MAX_RECORD_NAME_LEN`]
    /// characters and doubles as the external id.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        let name = truncate_name(&name.into());
        Self {
            external_id: name.clone(),
            naming_hint: name.clone(),
            name,
            action,
            who: Who::default(),
            deleted_who: None,
            what: Vec::new(),
            delete_what: Vec::new(),
            delete: false,
            not_internalizable: false,
            locks: LockSet::default(),
            mask_type: None,
        }
    }

    /// Creates an empty [`Action::Grant`] record.
    pub fn grant(name: impl Into<String>) -> Self {
        Self::new(name, Action::Grant)
    }

    /// Creates an empty [`Action::Mask`] record.
    pub fn mask(name: impl Into<String>) -> Self {
        Self::new(name, Action::Mask)
    }

    /// Adds a user to the current membership.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.who.users.push(user.into());
        self
    }

    /// Adds a group to the current membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.who.groups.push(group.into());
        self
    }

    /// Adds a scope entry.
    #[must_use]
    pub fn with_what(mut self, what: WhatItem) -> Self {
        self.what.push(what);
        self
    }

    /// Marks the record as informational only.
    #[must_use]
    pub fn not_internalizable(mut self) -> Self {
        self.not_internalizable = true;
        self
    }
}

/// Truncates a record name to its trailing [`MAX_RECORD_NAME_LEN`]
/// characters.
///
/// Generated names are hierarchical with the most specific part last, so
/// the tail is kept.
#[must_use]
pub fn truncate_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= MAX_RECORD_NAME_LEN {
        return name.to_string();
    }
    chars[chars.len() - MAX_RECORD_NAME_LEN..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_name_keeps_tail() {
        let name = "x".repeat(72) + &"y".repeat(128);
        let truncated = truncate_name(&name);
        assert_eq!(truncated.len(), MAX_RECORD_NAME_LEN);
        assert_eq!(truncated, "y".repeat(128));
    }

    #[test]
    fn test_truncate_short_name_untouched() {
        let name = "a".repeat(50);
        assert_eq!(truncate_name(&name), name);
    }

    #[test]
    fn test_truncate_exact_length_untouched() {
        let name = "a".repeat(MAX_RECORD_NAME_LEN);
        assert_eq!(truncate_name(&name), name);
    }

    #[test]
    fn test_new_record_truncates_name_and_external_id() {
        let record = AccessRecord::grant("p".repeat(200));
        assert_eq!(record.name.len(), MAX_RECORD_NAME_LEN);
        assert_eq!(record.external_id, record.name);
    }

    #[test]
    fn test_builder_accumulates_membership() {
        let record = AccessRecord::grant("r")
            .with_user("a@x.com")
            .with_group("g@x.com")
            .with_what(WhatItem::new("p1", "project", ["roles/viewer"]));

        assert_eq!(record.who.users, vec!["a@x.com"]);
        assert_eq!(record.who.groups, vec!["g@x.com"]);
        assert_eq!(record.what.len(), 1);
        assert_eq!(record.what[0].permissions, vec!["roles/viewer"]);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Grant.to_string(), "grant");
        assert_eq!(Action::Mask.to_string(), "mask");
    }
}
