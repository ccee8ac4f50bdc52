//! Connector configuration and credentials.

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{GcpError, GcpResult};

/// Default resource-manager endpoint.
const DEFAULT_CRM_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com/v3";
/// Default data-catalog endpoint (masked columns, policy tags).
const DEFAULT_CATALOG_ENDPOINT: &str = "https://datacatalog.googleapis.com/v1";
/// Default data-policy endpoint (masking expressions).
const DEFAULT_DATAPOLICY_ENDPOINT: &str = "https://bigquerydatapolicy.googleapis.com/v1";
/// Default token endpoint for the service-account assertion flow.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Per-call ceiling on outbound API requests.
pub const API_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Service-account credentials.
#[derive(Debug, Clone)]
pub struct GcpCredentials {
    /// Service-account email.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: SecretString,
    /// Token endpoint; overridable for tests.
    pub token_uri: String,
}

impl GcpCredentials {
    /// Creates credentials against the default token endpoint.
    pub fn new(client_email: impl Into<String>, private_key: SecretString) -> Self {
        Self {
            client_email: client_email.into(),
            private_key,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }
}

/// Validated connector configuration.
#[derive(Debug, Clone)]
pub struct GcpConfig {
    /// Organization id anchoring the resource hierarchy.
    pub organization_id: String,
    /// Keep bindings whose role is outside the permission catalog as
    /// informational records instead of dropping them.
    pub include_unknown_roles: bool,
    /// Roles grouped into one record per identity instead of per resource,
    /// lowercase-normalized.
    pub group_by_identity_roles: HashSet<String>,
    /// Whether the column-masking catalog is available on this org.
    pub enable_masking: bool,
    /// Page size for child-resource enumeration.
    pub page_size: usize,
    /// Resource-manager endpoint.
    pub crm_endpoint: String,
    /// Data-catalog endpoint.
    pub catalog_endpoint: String,
    /// Data-policy endpoint.
    pub datapolicy_endpoint: String,
}

impl GcpConfig {
    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> GcpConfigBuilder {
        GcpConfigBuilder::default()
    }

    /// Canonical synthetic data-source name the organization's own
    /// bindings are rewritten to.
    ///
    /// Stable across runs for a fixed organization id.
    #[must_use]
    pub fn organization_datasource_name(&self) -> String {
        format!("gcp-org-{}", self.organization_id)
    }

    /// Whether a role is configured to be grouped by identity.
    #[must_use]
    pub fn is_group_by_identity_role(&self, role: &str) -> bool {
        self.group_by_identity_roles.contains(&role.to_lowercase())
    }
}

/// Builder for [`GcpConfig`].
#[derive(Debug, Default, Clone)]
pub struct GcpConfigBuilder {
    organization_id: Option<String>,
    include_unknown_roles: bool,
    group_by_identity_roles: HashSet<String>,
    enable_masking: bool,
    page_size: Option<usize>,
    crm_endpoint: Option<String>,
    catalog_endpoint: Option<String>,
    datapolicy_endpoint: Option<String>,
}

impl GcpConfigBuilder {
    /// Sets the organization id (required).
    #[must_use]
    pub fn organization_id(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }

    /// Keeps unmanaged roles as informational records.
    #[must_use]
    pub fn include_unknown_roles(mut self, include: bool) -> Self {
        self.include_unknown_roles = include;
        self
    }

    /// Parses the comma-separated list of roles to group by identity.
    #[must_use]
    pub fn group_by_identity_roles_csv(mut self, csv: &str) -> Self {
        self.group_by_identity_roles = csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();
        self
    }

    /// Enables the column-masking catalog.
    #[must_use]
    pub fn enable_masking(mut self, enable: bool) -> Self {
        self.enable_masking = enable;
        self
    }

    /// Overrides the enumeration page size.
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Overrides the resource-manager endpoint.
    #[must_use]
    pub fn crm_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.crm_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the data-catalog endpoint.
    #[must_use]
    pub fn catalog_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.catalog_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the data-policy endpoint.
    #[must_use]
    pub fn datapolicy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.datapolicy_endpoint = Some(endpoint.into());
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the organization id is missing or empty, or
    /// the page size is zero.
    pub fn build(self) -> GcpResult<GcpConfig> {
        let organization_id = self
            .organization_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GcpError::Config("organization id is required".into()))?;

        let page_size = self.page_size.unwrap_or(500);
        if page_size == 0 {
            return Err(GcpError::Config("page size must be positive".into()));
        }

        Ok(GcpConfig {
            organization_id,
            include_unknown_roles: self.include_unknown_roles,
            group_by_identity_roles: self.group_by_identity_roles,
            enable_masking: self.enable_masking,
            page_size,
            crm_endpoint: self
                .crm_endpoint
                .unwrap_or_else(|| DEFAULT_CRM_ENDPOINT.to_string()),
            catalog_endpoint: self
                .catalog_endpoint
                .unwrap_or_else(|| DEFAULT_CATALOG_ENDPOINT.to_string()),
            datapolicy_endpoint: self
                .datapolicy_endpoint
                .unwrap_or_else(|| DEFAULT_DATAPOLICY_ENDPOINT.to_string()),
        })
    }
}
