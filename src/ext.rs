use async_trait::async_trait;
use sea_orm::ConnectionTrait;

use crate::error::HierarchyError;
use crate::repository::HierarchyRepository;
use crate::traits::HierarchyModel;
use crate::tree::TreeNode;

/// Hierarchy accessors directly on model values.
///
/// Blanket-implemented for every [`HierarchyModel`]; each method delegates to
/// a fresh [`HierarchyRepository`].
#[async_trait]
pub trait HierarchyNodeExt: HierarchyModel + Sized {
    /// Direct parent, or `None` for a root.
    async fn parent<C: ConnectionTrait>(&self, conn: &C) -> Result<Option<Self>, HierarchyError> {
        HierarchyRepository::<Self>::new().parent(conn, self).await
    }

    /// Direct children only.
    async fn children<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<Self>, HierarchyError> {
        HierarchyRepository::<Self>::new().children(conn, self).await
    }

    /// Full ancestor chain, nearest first.
    async fn ancestors<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<Self>, HierarchyError> {
        HierarchyRepository::<Self>::new().ancestors(conn, self).await
    }

    /// Full subtree below this node, as a flat list.
    async fn descendants<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<Self>, HierarchyError> {
        HierarchyRepository::<Self>::new()
            .descendants(conn, self)
            .await
    }

    /// Full subtree anchored at this node, as a nested tree.
    async fn subtree<C: ConnectionTrait>(&self, conn: &C) -> Result<TreeNode<Self>, HierarchyError> {
        HierarchyRepository::<Self>::new().subtree(conn, self).await
    }
}

impl<M: HierarchyModel> HierarchyNodeExt for M {}
