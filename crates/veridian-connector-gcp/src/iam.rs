//! Native IAM policy wire types and the flattened binding value object.

use serde::{Deserialize, Serialize};

use crate::resource::GcpResourceType;

/// One role entry of a native IAM policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamBinding {
    /// Role name, for example `roles/viewer`.
    pub role: String,
    /// Prefix-tagged member strings holding the role.
    #[serde(default)]
    pub members: Vec<String>,
}

/// A native IAM policy as returned by the resource-manager API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamPolicy {
    /// Role bindings; absent on an empty policy.
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
    /// Concurrency control tag, echoed back on writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Policy format version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

impl IamPolicy {
    /// Whether a member holds a role in this policy.
    #[must_use]
    pub fn has_member(&self, role: &str, member: &str) -> bool {
        self.bindings.iter().any(|b| {
            b.role.eq_ignore_ascii_case(role)
                && b.members.iter().any(|m| m.eq_ignore_ascii_case(member))
        })
    }

    /// Adds a member under a role, creating the role entry when missing.
    ///
    /// Returns false when the member was already present.
    pub fn add_member(&mut self, role: &str, member: &str) -> bool {
        if self.has_member(role, member) {
            return false;
        }
        if let Some(binding) = self
            .bindings
            .iter_mut()
            .find(|b| b.role.eq_ignore_ascii_case(role))
        {
            binding.members.push(member.to_string());
        } else {
            self.bindings.push(IamBinding {
                role: role.to_string(),
                members: vec![member.to_string()],
            });
        }
        true
    }

    /// Removes a member from a role, dropping the role entry when it
    /// becomes empty.
    ///
    /// Returns false when the member was not present.
    pub fn remove_member(&mut self, role: &str, member: &str) -> bool {
        let mut removed = false;
        for binding in &mut self.bindings {
            if binding.role.eq_ignore_ascii_case(role) {
                let before = binding.members.len();
                binding.members.retain(|m| !m.eq_ignore_ascii_case(member));
                removed |= binding.members.len() != before;
            }
        }
        self.bindings.retain(|b| !b.members.is_empty());
        removed
    }
}

/// A single flattened (member, role, resource) grant.
///
/// Value object with no lifecycle of its own; two bindings are the same
/// grant when all four fields match case-insensitively, see
/// [`Binding::key`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    /// Prefix-tagged identity string.
    pub member: String,
    /// Native role name.
    pub role: String,
    /// Bare resource id the grant applies to.
    pub resource: String,
    /// Resource type name (`organization`, `folder`, `project`).
    pub resource_type: String,
}

impl Binding {
    /// Creates a binding.
    pub fn new(
        member: impl Into<String>,
        role: impl Into<String>,
        resource: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            member: member.into(),
            role: role.into(),
            resource: resource.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Case-insensitive identity of this grant.
    #[must_use]
    pub fn key(&self) -> BindingKey {
        BindingKey {
            member: self.member.to_lowercase(),
            role: self.role.to_lowercase(),
            resource: self.resource.to_lowercase(),
            resource_type: self.resource_type.to_lowercase(),
        }
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} on {} {}",
            self.member, self.role, self.resource_type, self.resource
        )
    }
}

/// Lowercase-normalized binding identity, usable as a set or map key.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BindingKey {
    member: String,
    role: String,
    resource: String,
    resource_type: String,
}

/// Flattens a native policy into one binding per (role, member) pair.
#[must_use]
pub fn flatten_policy(
    resource: &str,
    resource_type: GcpResourceType,
    policy: &IamPolicy,
) -> Vec<Binding> {
    let mut bindings = Vec::new();
    for entry in &policy.bindings {
        for member in &entry.members {
            bindings.push(Binding::new(
                member.clone(),
                entry.role.clone(),
                resource,
                resource_type.as_str(),
            ));
        }
    }
    bindings
}
