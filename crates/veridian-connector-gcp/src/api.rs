//! Provider API boundary.
//!
//! The walker, collector, reconciler, and masking manager talk to GCP
//! through these capability traits; [`HttpGcpApi`] is the production
//! implementation, tests substitute in-memory fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::client::ApiClient;
use crate::config::GcpConfig;
use crate::error::GcpResult;
use crate::iam::IamPolicy;
use crate::masking::{DataPolicyInfo, MaskType, PolicyTagInfo, TaggedColumn};

/// Role granting read access through a masking policy tag.
pub const FINE_GRAINED_READER_ROLE: &str = "roles/datacatalog.categoryFineGrainedReader";

/// Basic organization attributes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationInfo {
    /// API entry name, `organizations/{id}`.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
}

/// One enumerated child resource.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    /// API entry name, for example `projects/demo-1`.
    pub name: String,
    /// Display name.
    pub display_name: String,
}

/// One page of child resources.
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    /// Entries on this page.
    pub entries: Vec<ChildEntry>,
    /// Token for the next page, absent on the last page.
    pub next_page_token: Option<String>,
}

/// Hierarchy enumeration operations.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetches the organization's attributes.
    async fn get_organization(&self, org_id: &str) -> GcpResult<OrganizationInfo>;

    /// Lists one page of child projects of `parent`.
    async fn list_projects(&self, parent: &str, page_token: Option<&str>)
        -> GcpResult<ResourcePage>;

    /// Lists one page of child folders of `parent`.
    async fn list_folders(&self, parent: &str, page_token: Option<&str>)
        -> GcpResult<ResourcePage>;
}

/// Native IAM policy operations.
#[async_trait]
pub trait PolicyApi: Send + Sync {
    /// Fetches the policy of a resource (`organizations/1`, `folders/2`,
    /// `projects/3`).
    async fn get_iam_policy(&self, resource: &str) -> GcpResult<IamPolicy>;

    /// Replaces the policy of a resource, returning the server's
    /// post-mutation policy.
    async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> GcpResult<IamPolicy>;
}

/// Column-masking catalog operations.
#[async_trait]
pub trait MaskingApi: Send + Sync {
    /// Lists every column carrying a policy tag.
    async fn list_masked_columns(&self) -> GcpResult<Vec<TaggedColumn>>;

    /// Fetches a policy tag by id.
    async fn get_policy_tag(&self, tag_id: &str) -> GcpResult<PolicyTagInfo>;

    /// Creates a policy tag in a storage location.
    async fn create_policy_tag(&self, location: &str, display_name: &str)
        -> GcpResult<PolicyTagInfo>;

    /// Deletes a policy tag.
    async fn delete_policy_tag(&self, tag_id: &str) -> GcpResult<()>;

    /// Resolves the data policy attached to a policy tag, if any.
    async fn get_data_policy_for_tag(&self, tag_id: &str) -> GcpResult<Option<DataPolicyInfo>>;

    /// Creates a data policy bound to a policy tag.
    async fn create_data_policy(
        &self,
        location: &str,
        display_name: &str,
        mask_type: MaskType,
        tag_id: &str,
    ) -> GcpResult<DataPolicyInfo>;

    /// Updates a data policy's masking expression.
    async fn update_data_policy(
        &self,
        policy_id: &str,
        mask_type: MaskType,
    ) -> GcpResult<DataPolicyInfo>;

    /// Deletes a data policy.
    async fn delete_data_policy(&self, policy_id: &str) -> GcpResult<()>;

    /// Reads the fine-grained-reader membership of a policy tag.
    async fn get_fine_grained_readers(&self, tag_id: &str) -> GcpResult<Vec<String>>;

    /// Replaces the fine-grained-reader membership of a policy tag.
    async fn set_fine_grained_readers(&self, tag_id: &str, members: &[String]) -> GcpResult<()>;

    /// Attaches a policy tag to a column, or detaches with `None`.
    async fn set_column_policy_tag(&self, column: &str, tag_id: Option<&str>) -> GcpResult<()>;

    /// Maps data-object full names to their storage locations.
    async fn resolve_locations(&self, columns: &[String])
        -> GcpResult<BTreeMap<String, String>>;
}

// Wire shapes for the HTTP implementation.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPage {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    name: String,
    project_id: Option<String>,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderPage {
    #[serde(default)]
    folders: Vec<FolderEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderEntry {
    name: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaskedColumnPage {
    #[serde(default)]
    columns: Vec<TaggedColumn>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataPolicyList {
    #[serde(default)]
    data_policies: Vec<DataPolicyInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationMap {
    #[serde(default)]
    locations: BTreeMap<String, String>,
}

/// Production API implementation over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpGcpApi {
    client: ApiClient,
    config: GcpConfig,
}

impl HttpGcpApi {
    /// Creates the API facade.
    #[must_use]
    pub fn new(client: ApiClient, config: GcpConfig) -> Self {
        Self { client, config }
    }

    fn page_query(&self, page_token: Option<&str>) -> String {
        let mut query = format!("pageSize={}", self.config.page_size);
        if let Some(token) = page_token {
            query.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        query
    }
}

#[async_trait]
impl ResourceApi for HttpGcpApi {
    #[instrument(skip(self))]
    async fn get_organization(&self, org_id: &str) -> GcpResult<OrganizationInfo> {
        let url = format!("{}/organizations/{org_id}", self.config.crm_endpoint);
        self.client.get(&url).await
    }

    #[instrument(skip(self))]
    async fn list_projects(
        &self,
        parent: &str,
        page_token: Option<&str>,
    ) -> GcpResult<ResourcePage> {
        let url = format!(
            "{}/projects?parent={}&{}",
            self.config.crm_endpoint,
            urlencoding::encode(parent),
            self.page_query(page_token)
        );
        let page: ProjectPage = self.client.get(&url).await?;
        Ok(ResourcePage {
            entries: page
                .projects
                .into_iter()
                .map(|p| {
                    let name = p
                        .project_id
                        .map_or(p.name, |id| format!("projects/{id}"));
                    ChildEntry {
                        display_name: p.display_name,
                        name,
                    }
                })
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn list_folders(
        &self,
        parent: &str,
        page_token: Option<&str>,
    ) -> GcpResult<ResourcePage> {
        let url = format!(
            "{}/folders?parent={}&{}",
            self.config.crm_endpoint,
            urlencoding::encode(parent),
            self.page_query(page_token)
        );
        let page: FolderPage = self.client.get(&url).await?;
        Ok(ResourcePage {
            entries: page
                .folders
                .into_iter()
                .map(|f| ChildEntry {
                    name: f.name,
                    display_name: f.display_name,
                })
                .collect(),
            next_page_token: page.next_page_token,
        })
    }
}

#[async_trait]
impl PolicyApi for HttpGcpApi {
    #[instrument(skip(self))]
    async fn get_iam_policy(&self, resource: &str) -> GcpResult<IamPolicy> {
        let url = format!("{}/{resource}:getIamPolicy", self.config.crm_endpoint);
        self.client.post(&url, &serde_json::json!({})).await
    }

    #[instrument(skip(self, policy))]
    async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> GcpResult<IamPolicy> {
        let url = format!("{}/{resource}:setIamPolicy", self.config.crm_endpoint);
        self.client
            .post(&url, &serde_json::json!({ "policy": policy }))
            .await
    }
}

#[async_trait]
impl MaskingApi for HttpGcpApi {
    #[instrument(skip(self))]
    async fn list_masked_columns(&self) -> GcpResult<Vec<TaggedColumn>> {
        let base = format!(
            "{}/organizations/{}/maskedColumns",
            self.config.catalog_endpoint, self.config.organization_id
        );

        let mut columns = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = format!("{base}?{}", self.page_query(page_token.as_deref()));
            let page: MaskedColumnPage = self.client.get(&url).await?;
            columns.extend(page.columns);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(columns),
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_policy_tag(&self, tag_id: &str) -> GcpResult<PolicyTagInfo> {
        let url = format!("{}/{tag_id}", self.config.catalog_endpoint);
        self.client.get(&url).await
    }

    #[instrument(skip(self))]
    async fn create_policy_tag(
        &self,
        location: &str,
        display_name: &str,
    ) -> GcpResult<PolicyTagInfo> {
        let url = format!(
            "{}/organizations/{}/locations/{location}/policyTags",
            self.config.catalog_endpoint, self.config.organization_id
        );
        self.client
            .post(&url, &serde_json::json!({ "displayName": display_name }))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_policy_tag(&self, tag_id: &str) -> GcpResult<()> {
        let url = format!("{}/{tag_id}", self.config.catalog_endpoint);
        self.client.delete(&url).await
    }

    #[instrument(skip(self))]
    async fn get_data_policy_for_tag(&self, tag_id: &str) -> GcpResult<Option<DataPolicyInfo>> {
        let url = format!(
            "{}/dataPolicies?policyTag={}",
            self.config.datapolicy_endpoint,
            urlencoding::encode(tag_id)
        );
        let list: DataPolicyList = self.client.get(&url).await?;
        Ok(list.data_policies.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn create_data_policy(
        &self,
        location: &str,
        display_name: &str,
        mask_type: MaskType,
        tag_id: &str,
    ) -> GcpResult<DataPolicyInfo> {
        let url = format!(
            "{}/organizations/{}/locations/{location}/dataPolicies",
            self.config.datapolicy_endpoint, self.config.organization_id
        );
        self.client
            .post(
                &url,
                &serde_json::json!({
                    "displayName": display_name,
                    "policyTag": tag_id,
                    "dataMaskingPolicy": { "predefinedExpression": mask_type.as_str() },
                }),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn update_data_policy(
        &self,
        policy_id: &str,
        mask_type: MaskType,
    ) -> GcpResult<DataPolicyInfo> {
        let url = format!("{}/{policy_id}", self.config.datapolicy_endpoint);
        self.client
            .patch(
                &url,
                &serde_json::json!({
                    "dataMaskingPolicy": { "predefinedExpression": mask_type.as_str() },
                }),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn delete_data_policy(&self, policy_id: &str) -> GcpResult<()> {
        let url = format!("{}/{policy_id}", self.config.datapolicy_endpoint);
        self.client.delete(&url).await
    }

    #[instrument(skip(self))]
    async fn get_fine_grained_readers(&self, tag_id: &str) -> GcpResult<Vec<String>> {
        let url = format!("{}/{tag_id}:getIamPolicy", self.config.catalog_endpoint);
        let policy: IamPolicy = self.client.post(&url, &serde_json::json!({})).await?;
        Ok(policy
            .bindings
            .into_iter()
            .filter(|b| b.role.eq_ignore_ascii_case(FINE_GRAINED_READER_ROLE))
            .flat_map(|b| b.members)
            .collect())
    }

    #[instrument(skip(self, members))]
    async fn set_fine_grained_readers(&self, tag_id: &str, members: &[String]) -> GcpResult<()> {
        let url = format!("{}/{tag_id}:setIamPolicy", self.config.catalog_endpoint);
        let policy = IamPolicy {
            bindings: vec![crate::iam::IamBinding {
                role: FINE_GRAINED_READER_ROLE.to_string(),
                members: members.to_vec(),
            }],
            etag: None,
            version: None,
        };
        let _: IamPolicy = self
            .client
            .post(&url, &serde_json::json!({ "policy": policy }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_column_policy_tag(&self, column: &str, tag_id: Option<&str>) -> GcpResult<()> {
        let url = format!(
            "{}/columns/{}:setPolicyTag",
            self.config.catalog_endpoint,
            urlencoding::encode(column)
        );
        let _: serde_json::Value = self
            .client
            .post(&url, &serde_json::json!({ "policyTag": tag_id }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, columns))]
    async fn resolve_locations(
        &self,
        columns: &[String],
    ) -> GcpResult<BTreeMap<String, String>> {
        let url = format!("{}/columns:resolveLocations", self.config.catalog_endpoint);
        let map: LocationMap = self
            .client
            .post(&url, &serde_json::json!({ "columns": columns }))
            .await?;
        Ok(map.locations)
    }
}
