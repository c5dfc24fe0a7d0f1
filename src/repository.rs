use std::marker::PhantomData;

use sea_orm::{
    entity::prelude::*, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder,
};

use sea_orm::sea_query::Expr;

use crate::config::{HierarchyConfig, OrderStrategy};
use crate::error::HierarchyError;
use crate::lock::LockedTransaction;
use crate::traits::HierarchyModel;
use crate::tree::{build_forest, TreeNode};

/// Repository exposing the hierarchy operations for a given model.
///
/// This is the only sanctioned write path to the node and edge tables;
/// callers needing framework integration wrap this facade. Read accessors are
/// generic over [`ConnectionTrait`] so they run equally against a plain
/// connection or inside a caller-held transaction.
#[derive(Debug, Default)]
pub struct HierarchyRepository<M>
where
    M: HierarchyModel,
{
    _marker: PhantomData<M>,
}

impl<M> HierarchyRepository<M>
where
    M: HierarchyModel,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub(crate) fn config(&self) -> &'static HierarchyConfig {
        M::hierarchy_config()
    }

    pub(crate) fn ensure_postgres(conn: &impl ConnectionTrait) -> Result<(), HierarchyError> {
        if conn.get_database_backend() == DbBackend::Postgres {
            Ok(())
        } else {
            Err(HierarchyError::UnsupportedBackend)
        }
    }

    pub async fn parent<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Option<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        match model.parent_id() {
            Some(parent_id) => {
                let parent = M::Entity::find()
                    .filter(M::id_column().eq(M::id_to_value(&parent_id)))
                    .one(conn)
                    .await?;
                Ok(parent)
            }
            None => Ok(None),
        }
    }

    pub async fn children<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let id = model.id();
        let parent_value = M::id_to_value(&id);
        let mut query = M::Entity::find().filter(M::parent_column().eq(parent_value));
        query = self.apply_sibling_order(query);
        let rows = query.all(conn).await?;
        Ok(rows)
    }

    pub async fn roots<C: ConnectionTrait>(&self, conn: &C) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let rows = M::Entity::find()
            .filter(M::parent_column().is_null())
            .order_by_asc(M::name_column())
            .all(conn)
            .await?;
        Ok(rows)
    }

    /// Full ancestor chain of `model`, nearest ancestor first.
    pub async fn ancestors<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let ancestor_ids = self.ancestor_ids(conn, &model.id()).await?;
        if ancestor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let values = ancestor_ids
            .iter()
            .map(|id| M::id_to_value(id))
            .collect::<Vec<_>>();
        let rows = M::Entity::find()
            .filter(M::id_column().is_in(values))
            .order_by_desc(M::level_column())
            .all(conn)
            .await?;
        Ok(rows)
    }

    /// Flat subtree below `model`, excluding the node itself, shallowest first.
    pub async fn descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        self.descendant_models(conn, &model.id()).await
    }

    pub async fn self_and_descendants<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<Vec<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let mut nodes = Vec::with_capacity(1);
        nodes.push(model.clone());
        let mut descendants = self.descendant_models(conn, &model.id()).await?;
        nodes.append(&mut descendants);
        Ok(nodes)
    }

    /// The subtree anchored at `model`, reconstructed as a nested tree.
    pub async fn subtree<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: &M,
    ) -> Result<TreeNode<M>, HierarchyError> {
        let rows = self.self_and_descendants(conn, model).await?;
        let mut forest = build_forest(rows);
        if forest.len() != 1 {
            return Err(HierarchyError::invariant(
                "subtree reconstruction produced more than one root",
            ));
        }
        Ok(forest.remove(0))
    }

    /// The whole table reconstructed as a nested forest, one tree per root.
    pub async fn forest<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<TreeNode<M>>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        let rows = M::Entity::find()
            .order_by_asc(M::level_column())
            .order_by_asc(M::name_column())
            .all(conn)
            .await?;
        Ok(build_forest(rows))
    }

    pub async fn find_by_path<S: AsRef<str>>(
        &self,
        conn: &DatabaseConnection,
        segments: &[S],
    ) -> Result<Option<M>, HierarchyError> {
        Self::ensure_postgres(conn)?;
        self.find_by_path_in(conn, segments).await
    }

    pub async fn find_or_create_by_path<S: AsRef<str>>(
        &self,
        conn: &DatabaseConnection,
        segments: &[S],
    ) -> Result<M, HierarchyError> {
        Self::ensure_postgres(conn)?;

        if segments.is_empty() {
            return Err(HierarchyError::EmptyPath);
        }

        let strategy = self.config().advisory_lock_strategy();
        let guard = LockedTransaction::acquire(strategy, conn).await?;
        let result = self
            .find_or_create_by_path_in(guard.connection(), segments)
            .await;
        crate::mutate::finish(guard, result).await
    }

    /// Path lookup on a caller-supplied connection or open transaction.
    pub async fn find_by_path_in<S: AsRef<str>, C: ConnectionTrait>(
        &self,
        conn: &C,
        segments: &[S],
    ) -> Result<Option<M>, HierarchyError> {
        if segments.is_empty() {
            return Ok(None);
        }

        let mut current_parent: Option<M::Id> = None;
        let mut current: Option<M> = None;

        for segment in segments {
            let name = segment.as_ref();
            let node = self
                .find_child_by_name(conn, current_parent.as_ref(), name)
                .await?;

            match node {
                Some(model) => {
                    current_parent = Some(model.id());
                    current = Some(model);
                }
                None => return Ok(None),
            }
        }

        Ok(current)
    }

    /// Find-or-create on a caller-supplied transaction; the caller owns the
    /// transaction scope and any locking.
    pub async fn find_or_create_by_path_in<S: AsRef<str>, C: ConnectionTrait>(
        &self,
        conn: &C,
        segments: &[S],
    ) -> Result<M, HierarchyError> {
        let mut current_parent: Option<M::Id> = None;
        let mut current: Option<M> = None;

        for segment in segments {
            let name = segment.as_ref();
            match self
                .find_child_by_name(conn, current_parent.as_ref(), name)
                .await?
            {
                Some(model) => {
                    current_parent = Some(model.id());
                    current = Some(model);
                }
                None => {
                    let mut active = M::ActiveModel::default();
                    M::set_name(&mut active, name);
                    let created = self
                        .create_in(conn, active, current_parent.clone())
                        .await?;
                    current_parent = Some(created.id());
                    current = Some(created);
                }
            }
        }

        current.ok_or_else(|| HierarchyError::invariant("path segments produced no model"))
    }

    async fn find_child_by_name<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent_id: Option<&M::Id>,
        name: &str,
    ) -> Result<Option<M>, HierarchyError> {
        let mut condition = Condition::all().add(M::name_column().eq(name));

        if let Some(parent_id) = parent_id {
            condition = condition.add(M::parent_column().eq(M::id_to_value(parent_id)));
        } else {
            condition = condition.add(M::parent_column().is_null());
        }

        let model = M::Entity::find().filter(condition).one(conn).await?;
        Ok(model)
    }

    pub(crate) fn apply_sibling_order(
        &self,
        mut query: sea_orm::Select<M::Entity>,
    ) -> sea_orm::Select<M::Entity> {
        if let Some(OrderStrategy::NumericColumn { column }) = self.config().order_strategy() {
            query = query.order_by_asc(Expr::cust(column.clone()));
        }
        query.order_by_asc(M::name_column())
    }

    pub(crate) async fn get_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<M, HierarchyError> {
        M::Entity::find()
            .filter(M::id_column().eq(M::id_to_value(id)))
            .one(conn)
            .await?
            .ok_or(HierarchyError::NotFound)
    }

    /// Ids on the upward chain of `id` (parent first is not guaranteed; the
    /// edge table is unordered).
    pub(crate) async fn ancestor_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, HierarchyError> {
        let rows = M::EdgeEntity::find()
            .filter(M::edge_descendant_column().eq(M::edge_id_to_value(id)))
            .all(conn)
            .await?;
        Ok(rows.iter().map(M::edge_ancestor).collect())
    }

    /// Ids of every node strictly below `id`.
    pub(crate) async fn descendant_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M::Id>, HierarchyError> {
        let rows = M::EdgeEntity::find()
            .filter(M::edge_ancestor_column().eq(M::edge_id_to_value(id)))
            .all(conn)
            .await?;
        Ok(rows.iter().map(M::edge_descendant).collect())
    }

    pub(crate) async fn descendant_models<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &M::Id,
    ) -> Result<Vec<M>, HierarchyError> {
        let descendant_ids = self.descendant_ids(conn, id).await?;
        if descendant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let values = descendant_ids
            .iter()
            .map(|id| M::id_to_value(id))
            .collect::<Vec<_>>();

        let mut query = M::Entity::find()
            .filter(M::id_column().is_in(values))
            .order_by_asc(M::level_column());
        query = self.apply_sibling_order(query);

        let models = query.all(conn).await?;
        Ok(models)
    }
}
