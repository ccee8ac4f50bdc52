//! Identity kinds carried in native IAM member strings.
//!
//! Native members are prefix-tagged (`user:alice@example.com`,
//! `group:eng@example.com`). Parsing happens once at the boundary; the
//! conversion logic matches on [`Identity`] instead of re-inspecting
//! prefixes.

use serde::{Deserialize, Serialize};

/// Domain marker distinguishing service accounts from plain users.
const SERVICE_ACCOUNT_MARKER: &str = ".gserviceaccount.com";

/// A parsed native IAM member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Human user, by email.
    User(String),
    /// Service account, by email.
    ServiceAccount(String),
    /// Group, by email.
    Group(String),
    /// Every identity in a domain.
    Domain(String),
    /// Synthetic project-membership group (for example `projectOwners`).
    SpecialGroup(String),
}

impl Identity {
    /// Parses a prefix-tagged member string.
    ///
    /// Returns `None` for prefixes this connector does not model.
    #[must_use]
    pub fn parse(member: &str) -> Option<Identity> {
        let (prefix, rest) = member.split_once(':')?;
        let rest = rest.to_string();
        match prefix {
            "user" => Some(Identity::User(rest)),
            "serviceAccount" => Some(Identity::ServiceAccount(rest)),
            "group" => Some(Identity::Group(rest)),
            "domain" => Some(Identity::Domain(rest)),
            "special_group" => Some(Identity::SpecialGroup(rest)),
            _ => None,
        }
    }

    /// The bare identifier without its prefix.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Identity::User(id)
            | Identity::ServiceAccount(id)
            | Identity::Group(id)
            | Identity::Domain(id)
            | Identity::SpecialGroup(id) => id,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{id}"),
            Identity::ServiceAccount(id) => write!(f, "serviceAccount:{id}"),
            Identity::Group(id) => write!(f, "group:{id}"),
            Identity::Domain(id) => write!(f, "domain:{id}"),
            Identity::SpecialGroup(id) => write!(f, "special_group:{id}"),
        }
    }
}

/// Builds the native member string for a platform user identifier.
///
/// A user whose email carries the service-account domain marker is a
/// service account.
#[must_use]
pub fn native_user_member(user: &str) -> String {
    if user.contains(SERVICE_ACCOUNT_MARKER) {
        format!("serviceAccount:{user}")
    } else {
        format!("user:{user}")
    }
}

/// Builds the native member string for a platform group identifier.
#[must_use]
pub fn native_group_member(group: &str) -> String {
    format!("group:{group}")
}
