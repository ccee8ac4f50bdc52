//! Shared test fixtures: an in-memory GCP API fake.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use veridian_connector_gcp::api::{
    ChildEntry, MaskingApi, OrganizationInfo, PolicyApi, ResourceApi, ResourcePage,
};
use veridian_connector_gcp::error::{GcpError, GcpResult};
use veridian_connector_gcp::iam::{IamBinding, IamPolicy};
use veridian_connector_gcp::masking::{
    DataMaskingPolicy, DataPolicyInfo, MaskType, PolicyTagInfo, TaggedColumn,
};

/// Builds a policy from (role, members) pairs.
pub fn policy(entries: &[(&str, &[&str])]) -> IamPolicy {
    IamPolicy {
        bindings: entries
            .iter()
            .map(|(role, members)| IamBinding {
                role: (*role).to_string(),
                members: members.iter().map(|m| (*m).to_string()).collect(),
            })
            .collect(),
        etag: Some("etag-1".to_string()),
        version: Some(1),
    }
}

fn denied() -> GcpError {
    GcpError::api(403, "PERMISSION_DENIED", "the caller does not have permission")
}

/// In-memory fake of the three provider API capabilities.
///
/// Tracks every mutating call in an ordered log so tests can assert
/// ordering and fan-out.
#[derive(Default)]
pub struct FakeGcp {
    pub org_display_name: String,
    pub deny_org_lookup: bool,
    /// Child pages split at this size; zero means a single page.
    pub page_size: usize,

    pub projects: Mutex<BTreeMap<String, Vec<ChildEntry>>>,
    pub folders: Mutex<BTreeMap<String, Vec<ChildEntry>>>,
    pub denied_project_lists: Mutex<BTreeSet<String>>,
    pub denied_folder_lists: Mutex<BTreeSet<String>>,

    pub policies: Mutex<BTreeMap<String, IamPolicy>>,
    pub denied_policies: Mutex<BTreeSet<String>>,
    pub failing_writes: Mutex<BTreeSet<String>>,

    pub columns: Mutex<Vec<TaggedColumn>>,
    pub tags: Mutex<BTreeMap<String, PolicyTagInfo>>,
    pub data_policies: Mutex<BTreeMap<String, DataPolicyInfo>>,
    pub readers: Mutex<BTreeMap<String, Vec<String>>>,
    pub locations: Mutex<BTreeMap<String, String>>,
    next_id: Mutex<u32>,

    pub calls: Mutex<Vec<String>>,
}

impl FakeGcp {
    pub fn new() -> Self {
        Self {
            org_display_name: "Acme".to_string(),
            ..Self::default()
        }
    }

    pub fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn add_project(&self, parent: &str, id: &str) {
        self.projects
            .lock()
            .unwrap()
            .entry(parent.to_string())
            .or_default()
            .push(ChildEntry {
                name: format!("projects/{id}"),
                display_name: id.to_string(),
            });
    }

    pub fn add_folder(&self, parent: &str, id: &str) {
        self.folders
            .lock()
            .unwrap()
            .entry(parent.to_string())
            .or_default()
            .push(ChildEntry {
                name: format!("folders/{id}"),
                display_name: id.to_string(),
            });
    }

    pub fn set_policy_fixture(&self, resource: &str, policy: IamPolicy) {
        self.policies
            .lock()
            .unwrap()
            .insert(resource.to_string(), policy);
    }

    pub fn add_tagged_column(&self, column: &str, tag_id: &str, location: &str) {
        self.columns.lock().unwrap().push(TaggedColumn {
            column: column.to_string(),
            policy_tag: tag_id.to_string(),
            location: location.to_string(),
        });
        self.locations
            .lock()
            .unwrap()
            .insert(column.to_string(), location.to_string());
    }

    pub fn add_tag(&self, tag_id: &str, display_name: &str, location: &str) {
        self.tags.lock().unwrap().insert(
            tag_id.to_string(),
            PolicyTagInfo {
                id: tag_id.to_string(),
                display_name: display_name.to_string(),
                location: location.to_string(),
            },
        );
    }

    pub fn add_data_policy(&self, policy_id: &str, tag_id: &str, location: &str, mask: MaskType) {
        self.data_policies.lock().unwrap().insert(
            policy_id.to_string(),
            DataPolicyInfo {
                id: policy_id.to_string(),
                display_name: policy_id.to_string(),
                policy_tag: tag_id.to_string(),
                location: location.to_string(),
                data_masking_policy: DataMaskingPolicy {
                    predefined_expression: mask.as_str().to_string(),
                },
            },
        );
    }

    pub fn set_readers(&self, tag_id: &str, members: &[&str]) {
        self.readers.lock().unwrap().insert(
            tag_id.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
    }

    pub fn set_column_location(&self, column: &str, location: &str) {
        self.locations
            .lock()
            .unwrap()
            .insert(column.to_string(), location.to_string());
    }

    fn fresh_id(&self) -> u32 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    fn page(&self, entries: &[ChildEntry], page_token: Option<&str>) -> ResourcePage {
        if self.page_size == 0 {
            return ResourcePage {
                entries: entries.to_vec(),
                next_page_token: None,
            };
        }
        let offset: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let end = (offset + self.page_size).min(entries.len());
        ResourcePage {
            entries: entries[offset..end].to_vec(),
            next_page_token: (end < entries.len()).then(|| end.to_string()),
        }
    }
}

#[async_trait]
impl ResourceApi for FakeGcp {
    async fn get_organization(&self, org_id: &str) -> GcpResult<OrganizationInfo> {
        self.log(format!("get_organization:{org_id}"));
        if self.deny_org_lookup {
            return Err(denied());
        }
        Ok(OrganizationInfo {
            name: format!("organizations/{org_id}"),
            display_name: self.org_display_name.clone(),
        })
    }

    async fn list_projects(
        &self,
        parent: &str,
        page_token: Option<&str>,
    ) -> GcpResult<ResourcePage> {
        self.log(format!("list_projects:{parent}"));
        if self.denied_project_lists.lock().unwrap().contains(parent) {
            return Err(denied());
        }
        let projects = self.projects.lock().unwrap();
        let entries = projects.get(parent).cloned().unwrap_or_default();
        Ok(self.page(&entries, page_token))
    }

    async fn list_folders(
        &self,
        parent: &str,
        page_token: Option<&str>,
    ) -> GcpResult<ResourcePage> {
        self.log(format!("list_folders:{parent}"));
        if self.denied_folder_lists.lock().unwrap().contains(parent) {
            return Err(denied());
        }
        let folders = self.folders.lock().unwrap();
        let entries = folders.get(parent).cloned().unwrap_or_default();
        Ok(self.page(&entries, page_token))
    }
}

#[async_trait]
impl PolicyApi for FakeGcp {
    async fn get_iam_policy(&self, resource: &str) -> GcpResult<IamPolicy> {
        self.log(format!("get_policy:{resource}"));
        if self.denied_policies.lock().unwrap().contains(resource) {
            return Err(denied());
        }
        Ok(self
            .policies
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_iam_policy(&self, resource: &str, policy: &IamPolicy) -> GcpResult<IamPolicy> {
        self.log(format!("set_policy:{resource}"));
        if self.failing_writes.lock().unwrap().contains(resource) {
            return Err(GcpError::api(409, "ABORTED", "concurrent policy change"));
        }
        let mut stored = policy.clone();
        stored.etag = Some(format!("etag-{}", self.fresh_id()));
        self.policies
            .lock()
            .unwrap()
            .insert(resource.to_string(), stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl MaskingApi for FakeGcp {
    async fn list_masked_columns(&self) -> GcpResult<Vec<TaggedColumn>> {
        self.log("list_masked_columns");
        Ok(self.columns.lock().unwrap().clone())
    }

    async fn get_policy_tag(&self, tag_id: &str) -> GcpResult<PolicyTagInfo> {
        self.tags
            .lock()
            .unwrap()
            .get(tag_id)
            .cloned()
            .ok_or_else(|| GcpError::api(404, "NOT_FOUND", format!("no policy tag {tag_id}")))
    }

    async fn create_policy_tag(
        &self,
        location: &str,
        display_name: &str,
    ) -> GcpResult<PolicyTagInfo> {
        let tag = PolicyTagInfo {
            id: format!("organizations/1/locations/{location}/policyTags/t{}", self.fresh_id()),
            display_name: display_name.to_string(),
            location: location.to_string(),
        };
        self.log(format!("create_tag:{}", tag.id));
        self.tags
            .lock()
            .unwrap()
            .insert(tag.id.clone(), tag.clone());
        Ok(tag)
    }

    async fn delete_policy_tag(&self, tag_id: &str) -> GcpResult<()> {
        self.log(format!("delete_tag:{tag_id}"));
        self.tags.lock().unwrap().remove(tag_id);
        self.readers.lock().unwrap().remove(tag_id);
        Ok(())
    }

    async fn get_data_policy_for_tag(&self, tag_id: &str) -> GcpResult<Option<DataPolicyInfo>> {
        Ok(self
            .data_policies
            .lock()
            .unwrap()
            .values()
            .find(|p| p.policy_tag == tag_id)
            .cloned())
    }

    async fn create_data_policy(
        &self,
        location: &str,
        display_name: &str,
        mask_type: MaskType,
        tag_id: &str,
    ) -> GcpResult<DataPolicyInfo> {
        let policy = DataPolicyInfo {
            id: format!("organizations/1/locations/{location}/dataPolicies/dp{}", self.fresh_id()),
            display_name: display_name.to_string(),
            policy_tag: tag_id.to_string(),
            location: location.to_string(),
            data_masking_policy: DataMaskingPolicy {
                predefined_expression: mask_type.as_str().to_string(),
            },
        };
        self.log(format!("create_data_policy:{}", policy.id));
        self.data_policies
            .lock()
            .unwrap()
            .insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    async fn update_data_policy(
        &self,
        policy_id: &str,
        mask_type: MaskType,
    ) -> GcpResult<DataPolicyInfo> {
        self.log(format!("update_data_policy:{policy_id}"));
        let mut policies = self.data_policies.lock().unwrap();
        let policy = policies
            .get_mut(policy_id)
            .ok_or_else(|| GcpError::api(404, "NOT_FOUND", format!("no data policy {policy_id}")))?;
        policy.data_masking_policy.predefined_expression = mask_type.as_str().to_string();
        Ok(policy.clone())
    }

    async fn delete_data_policy(&self, policy_id: &str) -> GcpResult<()> {
        self.log(format!("delete_data_policy:{policy_id}"));
        self.data_policies.lock().unwrap().remove(policy_id);
        Ok(())
    }

    async fn get_fine_grained_readers(&self, tag_id: &str) -> GcpResult<Vec<String>> {
        Ok(self
            .readers
            .lock()
            .unwrap()
            .get(tag_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_fine_grained_readers(&self, tag_id: &str, members: &[String]) -> GcpResult<()> {
        self.log(format!("set_readers:{tag_id}:{}", members.join("|")));
        self.readers
            .lock()
            .unwrap()
            .insert(tag_id.to_string(), members.to_vec());
        Ok(())
    }

    async fn set_column_policy_tag(&self, column: &str, tag_id: Option<&str>) -> GcpResult<()> {
        self.log(format!(
            "set_column_tag:{column}:{}",
            tag_id.unwrap_or("none")
        ));
        let mut columns = self.columns.lock().unwrap();
        columns.retain(|c| c.column != column);
        if let Some(tag_id) = tag_id {
            let location = self
                .locations
                .lock()
                .unwrap()
                .get(column)
                .cloned()
                .unwrap_or_default();
            columns.push(TaggedColumn {
                column: column.to_string(),
                policy_tag: tag_id.to_string(),
                location,
            });
        }
        Ok(())
    }

    async fn resolve_locations(
        &self,
        columns: &[String],
    ) -> GcpResult<BTreeMap<String, String>> {
        let locations = self.locations.lock().unwrap();
        Ok(columns
            .iter()
            .filter_map(|c| locations.get(c).map(|l| (c.clone(), l.clone())))
            .collect())
    }
}
