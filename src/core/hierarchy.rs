use tracing::debug;

use crate::domain::model::{
    HierarchyNode, RecordId, GROUP_IDENTIFIER_KEY, GROUP_KIND, STATUS_PUBLISHED,
};
use crate::domain::ports::RecordStore;
use crate::utils::error::{Result, ToolkitError};

/// Walks the published descendants of one root group.
///
/// Every visited node is returned, not only the ones missing an identifier;
/// callers filter for display. The walk trusts the stored parent graph to be
/// acyclic; a cycle in the data keeps the traversal running.
pub struct GroupHierarchyReporter<S> {
    store: S,
}

impl<S: RecordStore> GroupHierarchyReporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Pre-order walk of all descendants of `root`, root excluded. Each
    /// child's subtree precedes the next sibling; siblings come back in
    /// store order.
    pub async fn descendants(&self, root: RecordId) -> Result<Vec<HierarchyNode>> {
        match self.store.get(root).await? {
            Some(record) if record.kind == GROUP_KIND => {}
            _ => return Err(ToolkitError::GroupNotFoundError { id: root }),
        }

        let mut nodes = Vec::new();
        // Explicit stack instead of recursion; children are pushed reversed
        // so the first sibling is expanded before the next.
        let mut pending = self
            .store
            .children(root, GROUP_KIND, STATUS_PUBLISHED)
            .await?;
        pending.reverse();

        while let Some(record) = pending.pop() {
            let identifier = self
                .store
                .get_meta(record.id, GROUP_IDENTIFIER_KEY)
                .await?
                .unwrap_or_default();
            let mut children = self
                .store
                .children(record.id, GROUP_KIND, STATUS_PUBLISHED)
                .await?;
            children.reverse();
            pending.append(&mut children);
            nodes.push(HierarchyNode {
                id: record.id,
                name: record.name,
                parent: record.parent,
                identifier,
            });
        }

        debug!("Walked {} descendants of group {}", nodes.len(), root);
        Ok(nodes)
    }

    /// Descendants of `root` that have no identifier assigned, in walk order.
    pub async fn missing_identifier(&self, root: RecordId) -> Result<Vec<HierarchyNode>> {
        let nodes = self.descendants(root).await?;
        Ok(nodes
            .into_iter()
            .filter(|node| !node.has_identifier())
            .collect())
    }
}
