//! # Access Model Framework
//!
//! Platform-neutral access-control model shared by veridian connectors.
//!
//! A connector translates a target system's native grants into
//! [`AccessRecord`]s (the pull direction) and applies desired
//! [`AccessRecord`]s back onto the target system (the push direction).
//! This crate owns the record model, the permission catalog used to decide
//! which native roles the platform manages, the host-facing sync traits,
//! and the per-record feedback types connectors report through.
//!
//! ## Architecture
//!
//! - [`AccessRecord`] - who holds which permissions on what resources
//! - [`PermissionCatalog`] - the (resource type, role) pairs the platform manages
//! - [`AccessSource`] / [`AccessTarget`] - the two sync directions a connector implements
//! - [`RecordSink`] / [`FeedbackSink`] - host callbacks for records and feedback
//!
//! ## Example
//!
//! ```
//! use veridian_access::prelude::*;
//!
//! let record = AccessRecord::grant("project_demo_roles_viewer")
//!     .with_user("alice@example.com")
//!     .with_what(WhatItem::new("demo", "project", ["roles/viewer"]));
//!
//! assert_eq!(record.action, Action::Grant);
//! assert!(!record.not_internalizable);
//! ```

pub mod catalog;
pub mod error;
pub mod feedback;
pub mod record;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use veridian_access::prelude::*;
/// ```
pub mod prelude {
    pub use crate::catalog::PermissionCatalog;
    pub use crate::error::{AccessError, AccessResult};
    pub use crate::feedback::AccessFeedback;
    pub use crate::record::{
        truncate_name, AccessRecord, Action, LockSet, WhatItem, Who, MAX_RECORD_NAME_LEN,
    };
    pub use crate::traits::{AccessSource, AccessTarget, FeedbackSink, RecordSink};
}

// Re-export async_trait for trait implementors
pub use async_trait::async_trait;
