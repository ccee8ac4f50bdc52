//! Depth-first traversal of the resource hierarchy.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::api::{ChildEntry, ResourceApi};
use crate::error::GcpResult;
use crate::resource::{GcpResourceType, ResourceNode};

/// Walks the organization tree, yielding every node exactly once.
///
/// Traversal is depth-first with parents before children; within one
/// parent, all child projects are visited before any subfolder's contents.
/// An explicit work stack avoids recursion-depth concerns on deep folder
/// trees.
#[derive(Debug)]
pub struct ResourceWalker<'a, R: ResourceApi> {
    api: &'a R,
    organization_id: &'a str,
}

impl<'a, R: ResourceApi> ResourceWalker<'a, R> {
    /// Creates a walker rooted at the configured organization.
    #[must_use]
    pub fn new(api: &'a R, organization_id: &'a str) -> Self {
        Self {
            api,
            organization_id,
        }
    }

    /// Runs the traversal, invoking `visit` per node.
    ///
    /// An error from `visit` aborts the walk and propagates; there is no
    /// partial continuation. An authorization rejection on a child
    /// enumeration degrades that parent to zero children of that kind.
    #[instrument(skip(self, visit), fields(organization_id = %self.organization_id))]
    pub async fn walk<F>(&self, mut visit: F) -> GcpResult<()>
    where
        F: FnMut(&Arc<ResourceNode>) -> GcpResult<()>,
    {
        let display_name = self.organization_display_name().await?;
        let root = Arc::new(ResourceNode::organization(
            self.organization_id,
            &display_name,
        ));

        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            visit(&parent)?;
            debug!(parent = %parent.entry_name, "Enumerating children");

            // Projects are terminal: visited immediately, never expanded.
            for entry in self.enumerate(&parent, GcpResourceType::Project).await? {
                let node = Arc::new(ResourceNode::child(
                    GcpResourceType::Project,
                    &entry.name,
                    &entry.display_name,
                    &parent,
                ));
                visit(&node)?;
            }

            // Folders become pending parents; reversed push keeps the
            // first-listed folder's subtree first.
            let folders = self.enumerate(&parent, GcpResourceType::Folder).await?;
            for entry in folders.into_iter().rev() {
                stack.push(Arc::new(ResourceNode::child(
                    GcpResourceType::Folder,
                    &entry.name,
                    &entry.display_name,
                    &parent,
                )));
            }
        }

        Ok(())
    }

    /// Fetches the organization's display name, degrading to the bare id
    /// when the lookup is denied.
    async fn organization_display_name(&self) -> GcpResult<String> {
        match self.api.get_organization(self.organization_id).await {
            Ok(info) if !info.display_name.is_empty() => Ok(info.display_name),
            Ok(_) => Ok(self.organization_id.to_string()),
            Err(e) if e.is_permission_denied() => {
                warn!(
                    organization_id = %self.organization_id,
                    "Organization lookup denied, using bare id"
                );
                Ok(self.organization_id.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Enumerates all pages of one child kind under a parent.
    async fn enumerate(
        &self,
        parent: &Arc<ResourceNode>,
        kind: GcpResourceType,
    ) -> GcpResult<Vec<ChildEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let result = match kind {
                GcpResourceType::Project => {
                    self.api
                        .list_projects(&parent.entry_name, page_token.as_deref())
                        .await
                }
                GcpResourceType::Folder => {
                    self.api
                        .list_folders(&parent.entry_name, page_token.as_deref())
                        .await
                }
                GcpResourceType::Organization => return Ok(entries),
            };

            let page = match result {
                Ok(page) => page,
                Err(e) if e.is_permission_denied() => {
                    warn!(
                        parent = %parent.entry_name,
                        kind = %kind,
                        "Child enumeration denied, treating as empty"
                    );
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };

            entries.extend(page.entries);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(entries),
            }
        }
    }
}
