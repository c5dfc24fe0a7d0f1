//! Write half of [`HierarchyRepository`]: create, re-parent, destroy and the
//! bulk variants, each keeping the ancestor-edge table transitively
//! consistent with the `parent_id` pointer.
//!
//! Every operation here exists in two forms: the plain name opens its own
//! transaction (plus the configured advisory lock) on a
//! [`DatabaseConnection`] and guarantees commit-or-rollback on every exit
//! path, while the `*_in` twin runs on a caller-supplied connection or open
//! transaction and never begins a second one.

use std::collections::HashMap;

use sea_orm::{
    entity::prelude::*, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder,
};

use sea_orm::sea_query::Expr;

use crate::config::DeleteBehavior;
use crate::error::HierarchyError;
use crate::lock::LockedTransaction;
use crate::repository::HierarchyRepository;
use crate::traits::HierarchyModel;

/// Rows inserted per `INSERT` statement when writing edges in bulk.
pub(crate) const EDGE_INSERT_CHUNK: usize = 1_000;

/// Outcome of a re-parent: the moved node plus its shifted subtree.
#[derive(Debug)]
pub struct Reparented<M> {
    pub node: M,
    pub descendants: Vec<M>,
}

pub(crate) async fn finish<T>(
    guard: LockedTransaction,
    result: Result<T, HierarchyError>,
) -> Result<T, HierarchyError> {
    match result {
        Ok(value) => {
            guard.commit().await?;
            Ok(value)
        }
        Err(err) => {
            let _ = guard.rollback().await;
            Err(err.into_aborted())
        }
    }
}

impl<M> HierarchyRepository<M>
where
    M: HierarchyModel,
{
    /// Insert a new node under `parent_id` (`None` for a root).
    ///
    /// The level and the ancestor edges are derived here; whatever the caller
    /// set on `attrs` for those fields is overwritten.
    pub async fn create(
        &self,
        db: &DatabaseConnection,
        attrs: M::ActiveModel,
        parent_id: Option<M::Id>,
    ) -> Result<M, HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self.create_in(guard.connection(), attrs, parent_id).await;
        finish(guard, result).await
    }

    /// [`create`](Self::create) on a caller-held transaction.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        mut attrs: M::ActiveModel,
        parent_id: Option<M::Id>,
    ) -> Result<M, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let (level, upward) = match &parent_id {
            None => (0, Vec::new()),
            Some(parent_id) => {
                let parent = M::Entity::find()
                    .filter(M::id_column().eq(M::id_to_value(parent_id)))
                    .one(conn)
                    .await?
                    .ok_or(HierarchyError::InvalidParent)?;
                let mut upward = vec![parent_id.clone()];
                upward.extend(self.ancestor_ids(conn, parent_id).await?);
                (parent.level() + 1, upward)
            }
        };

        M::set_parent(&mut attrs, parent_id);
        M::set_level(&mut attrs, level);
        let model = attrs.insert(conn).await?;

        let model_id = model.id();
        let rows = upward
            .into_iter()
            .map(|ancestor| M::edge_row(model_id.clone(), ancestor))
            .collect();
        self.insert_edges(conn, rows).await?;

        tracing::debug!(level, "created hierarchy node {:?}", model_id);
        Ok(model)
    }

    /// Move `id` under `new_parent_id`, shifting its whole subtree.
    ///
    /// Rejects with [`CyclicParent`](HierarchyError::CyclicParent) when the
    /// new parent is the node itself or inside its subtree, before any write.
    pub async fn reparent(
        &self,
        db: &DatabaseConnection,
        id: M::Id,
        new_parent_id: Option<M::Id>,
    ) -> Result<Reparented<M>, HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self
            .reparent_in(guard.connection(), id, new_parent_id)
            .await;
        finish(guard, result).await
    }

    /// [`reparent`](Self::reparent) on a caller-held transaction.
    pub async fn reparent_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: M::Id,
        new_parent_id: Option<M::Id>,
    ) -> Result<Reparented<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let node = self.get_node(conn, &id).await?;

        let new_parent = match &new_parent_id {
            None => None,
            Some(parent_id) => {
                if *parent_id == id {
                    return Err(HierarchyError::CyclicParent);
                }
                let parent = M::Entity::find()
                    .filter(M::id_column().eq(M::id_to_value(parent_id)))
                    .one(conn)
                    .await?
                    .ok_or(HierarchyError::InvalidParent)?;
                let probe = M::EdgeEntity::find()
                    .filter(M::edge_descendant_column().eq(M::edge_id_to_value(parent_id)))
                    .filter(M::edge_ancestor_column().eq(M::edge_id_to_value(&id)))
                    .one(conn)
                    .await?;
                if probe.is_some() {
                    return Err(HierarchyError::CyclicParent);
                }
                Some(parent)
            }
        };

        let old_upward = self.ancestor_ids(conn, &id).await?;
        let descendant_ids = self.descendant_ids(conn, &id).await?;
        let new_upward = match &new_parent_id {
            None => Vec::new(),
            Some(parent_id) => {
                let mut upward = vec![parent_id.clone()];
                upward.extend(self.ancestor_ids(conn, parent_id).await?);
                upward
            }
        };

        let mut affected = Vec::with_capacity(descendant_ids.len() + 1);
        affected.push(id.clone());
        affected.extend(descendant_ids.iter().cloned());

        // The subtree's internal shape is unchanged; only the upward portion
        // of each affected node's edge set is rewritten.
        if !old_upward.is_empty() {
            let affected_values = affected
                .iter()
                .map(|id| M::edge_id_to_value(id))
                .collect::<Vec<_>>();
            let old_values = old_upward
                .iter()
                .map(|id| M::edge_id_to_value(id))
                .collect::<Vec<_>>();
            M::EdgeEntity::delete_many()
                .filter(M::edge_descendant_column().is_in(affected_values))
                .filter(M::edge_ancestor_column().is_in(old_values))
                .exec(conn)
                .await?;
        }

        let mut rows = Vec::with_capacity(affected.len() * new_upward.len());
        for member in &affected {
            for ancestor in &new_upward {
                rows.push(M::edge_row(member.clone(), ancestor.clone()));
            }
        }
        self.insert_edges(conn, rows).await?;

        let new_parent_level = new_parent.as_ref().map(|p| p.level()).unwrap_or(-1);
        let new_level = new_parent_level + 1;
        let level_delta = new_level - node.level();

        if level_delta != 0 && !descendant_ids.is_empty() {
            let values = descendant_ids
                .iter()
                .map(|id| M::id_to_value(id))
                .collect::<Vec<_>>();
            M::Entity::update_many()
                .col_expr(
                    M::level_column(),
                    Expr::col(M::level_column()).add(level_delta),
                )
                .filter(M::id_column().is_in(values))
                .exec(conn)
                .await?;
        }

        let mut active = node.into_active_model();
        M::set_parent(&mut active, new_parent_id);
        M::set_level(&mut active, new_level);
        let node = active.update(conn).await?;

        let descendants = if descendant_ids.is_empty() {
            Vec::new()
        } else {
            let values = descendant_ids
                .iter()
                .map(|id| M::id_to_value(id))
                .collect::<Vec<_>>();
            let mut query = M::Entity::find()
                .filter(M::id_column().is_in(values))
                .order_by_asc(M::level_column());
            query = self.apply_sibling_order(query);
            query.all(conn).await?
        };

        tracing::debug!(
            level_delta,
            subtree = affected.len(),
            "re-parented hierarchy node {:?}",
            node.id()
        );
        Ok(Reparented { node, descendants })
    }

    /// Remove `id` according to the configured [`DeleteBehavior`].
    ///
    /// Returns the number of node rows removed.
    pub async fn destroy(
        &self,
        db: &DatabaseConnection,
        id: M::Id,
    ) -> Result<u64, HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self.destroy_in(guard.connection(), id).await;
        finish(guard, result).await
    }

    /// [`destroy`](Self::destroy) on a caller-held transaction.
    pub async fn destroy_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: M::Id,
    ) -> Result<u64, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let node = self.get_node(conn, &id).await?;
        match self.config().delete_behavior() {
            DeleteBehavior::Cascade => self.destroy_cascade(conn, node).await,
            DeleteBehavior::Detach => self.destroy_detach(conn, node).await,
        }
    }

    async fn destroy_cascade<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: M,
    ) -> Result<u64, HierarchyError> {
        let id = node.id();
        let descendant_ids = self.descendant_ids(conn, &id).await?;
        let mut affected = vec![id];
        affected.extend(descendant_ids);

        let edge_values = affected
            .iter()
            .map(|id| M::edge_id_to_value(id))
            .collect::<Vec<_>>();
        M::EdgeEntity::delete_many()
            .filter(
                Condition::any()
                    .add(M::edge_descendant_column().is_in(edge_values.clone()))
                    .add(M::edge_ancestor_column().is_in(edge_values)),
            )
            .exec(conn)
            .await?;

        let node_values = affected
            .iter()
            .map(|id| M::id_to_value(id))
            .collect::<Vec<_>>();
        let result = M::Entity::delete_many()
            .filter(M::id_column().is_in(node_values))
            .exec(conn)
            .await?;

        tracing::debug!(removed = result.rows_affected, "cascade-destroyed subtree");
        Ok(result.rows_affected)
    }

    async fn destroy_detach<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: M,
    ) -> Result<u64, HierarchyError> {
        let id = node.id();
        let new_parent = node.parent_id();

        let children = M::Entity::find()
            .filter(M::parent_column().eq(M::id_to_value(&id)))
            .all(conn)
            .await?;
        for child in children {
            self.reparent_in(conn, child.id(), new_parent.clone()).await?;
        }

        let edge_value = M::edge_id_to_value(&id);
        M::EdgeEntity::delete_many()
            .filter(
                Condition::any()
                    .add(M::edge_descendant_column().eq(edge_value.clone()))
                    .add(M::edge_ancestor_column().eq(edge_value)),
            )
            .exec(conn)
            .await?;
        M::Entity::delete_many()
            .filter(M::id_column().eq(M::id_to_value(&id)))
            .exec(conn)
            .await?;

        tracing::debug!("detach-destroyed hierarchy node {:?}", id);
        Ok(1)
    }

    /// Insert many nodes in one transaction, all-or-nothing.
    ///
    /// A parent created earlier in the same batch is visible to later
    /// entries. Edge rows are accumulated and written in chunked batches.
    pub async fn bulk_create(
        &self,
        db: &DatabaseConnection,
        entries: Vec<(M::ActiveModel, Option<M::Id>)>,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self.bulk_create_in(guard.connection(), entries).await;
        finish(guard, result).await
    }

    /// [`bulk_create`](Self::bulk_create) on a caller-held transaction.
    pub async fn bulk_create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        entries: Vec<(M::ActiveModel, Option<M::Id>)>,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let mut created = Vec::with_capacity(entries.len());
        let mut levels: HashMap<M::Id, i32> = HashMap::new();
        let mut chains: HashMap<M::Id, Vec<M::Id>> = HashMap::new();
        let mut edge_rows = Vec::new();

        for (mut attrs, parent_id) in entries {
            let (level, upward) = match &parent_id {
                None => (0, Vec::new()),
                Some(parent_id) => {
                    if let (Some(parent_level), Some(parent_chain)) =
                        (levels.get(parent_id), chains.get(parent_id))
                    {
                        let mut upward = Vec::with_capacity(parent_chain.len() + 1);
                        upward.push(parent_id.clone());
                        upward.extend(parent_chain.iter().cloned());
                        (parent_level + 1, upward)
                    } else {
                        let parent = M::Entity::find()
                            .filter(M::id_column().eq(M::id_to_value(parent_id)))
                            .one(conn)
                            .await?
                            .ok_or(HierarchyError::InvalidParent)?;
                        let parent_chain = self.ancestor_ids(conn, parent_id).await?;
                        let mut upward = Vec::with_capacity(parent_chain.len() + 1);
                        upward.push(parent_id.clone());
                        upward.extend(parent_chain.iter().cloned());
                        levels.insert(parent_id.clone(), parent.level());
                        chains.insert(parent_id.clone(), parent_chain);
                        (parent.level() + 1, upward)
                    }
                }
            };

            M::set_parent(&mut attrs, parent_id);
            M::set_level(&mut attrs, level);
            let model = attrs.insert(conn).await?;
            let model_id = model.id();

            for ancestor in &upward {
                edge_rows.push(M::edge_row(model_id.clone(), ancestor.clone()));
            }
            levels.insert(model_id.clone(), level);
            chains.insert(model_id, upward);
            created.push(model);
        }

        self.insert_edges(conn, edge_rows).await?;

        tracing::debug!(count = created.len(), "bulk-created hierarchy nodes");
        Ok(created)
    }

    /// Apply many re-parent moves in one transaction, all-or-nothing.
    ///
    /// The first validation failure aborts the whole batch.
    pub async fn bulk_reparent(
        &self,
        db: &DatabaseConnection,
        moves: Vec<(M::Id, Option<M::Id>)>,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self.bulk_reparent_in(guard.connection(), moves).await;
        finish(guard, result).await
    }

    /// [`bulk_reparent`](Self::bulk_reparent) on a caller-held transaction.
    pub async fn bulk_reparent_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        moves: Vec<(M::Id, Option<M::Id>)>,
    ) -> Result<Vec<M>, HierarchyError> {
        let mut updated = Vec::with_capacity(moves.len());
        for (id, new_parent_id) in moves {
            let outcome = self.reparent_in(conn, id, new_parent_id).await?;
            updated.push(outcome.node);
        }
        Ok(updated)
    }

    pub(crate) async fn insert_edges<C: ConnectionTrait>(
        &self,
        conn: &C,
        mut rows: Vec<M::EdgeActiveModel>,
    ) -> Result<(), HierarchyError> {
        while !rows.is_empty() {
            let rest = rows.split_off(rows.len().min(EDGE_INSERT_CHUNK));
            M::EdgeEntity::insert_many(rows).exec(conn).await?;
            rows = rest;
        }
        Ok(())
    }
}
