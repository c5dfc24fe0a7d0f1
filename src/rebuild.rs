//! Full-table repair: recompute every level and the entire ancestor-edge
//! table from `parent_id` alone, replacing whatever is currently stored.
//!
//! Safe to run against a table with no prior ancestry data, and idempotent:
//! two consecutive runs produce identical edge contents.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};

use sea_orm::sea_query::Expr;

use crate::error::HierarchyError;
use crate::lock::LockedTransaction;
use crate::mutate::finish;
use crate::repository::HierarchyRepository;
use crate::traits::HierarchyModel;

#[derive(Debug)]
struct Layering<Id> {
    levels: HashMap<Id, i32>,
    chains: HashMap<Id, Vec<Id>>,
}

/// Breadth-first layering from the roots: a node's level is its parent's
/// level plus one and its chain is the parent's chain plus the parent,
/// nearest ancestor first. Processing in level order guarantees every parent
/// is finalized before its children.
fn layer<Id>(rows: &[(Id, Option<Id>)]) -> Result<Layering<Id>, HierarchyError>
where
    Id: Clone + Eq + Hash + Debug,
{
    let mut children: HashMap<&Id, Vec<&Id>> = HashMap::new();
    let mut queue: VecDeque<&Id> = VecDeque::new();
    let mut levels: HashMap<Id, i32> = HashMap::with_capacity(rows.len());
    let mut chains: HashMap<Id, Vec<Id>> = HashMap::with_capacity(rows.len());

    for (id, parent) in rows {
        match parent {
            Some(parent) => children.entry(parent).or_default().push(id),
            None => {
                levels.insert(id.clone(), 0);
                chains.insert(id.clone(), Vec::new());
                queue.push_back(id);
            }
        }
    }

    while let Some(id) = queue.pop_front() {
        let level = levels[id];
        let chain = chains[id].clone();
        let Some(kids) = children.get(id) else {
            continue;
        };
        for kid in kids {
            let mut kid_chain = Vec::with_capacity(chain.len() + 1);
            kid_chain.push(id.clone());
            kid_chain.extend(chain.iter().cloned());
            levels.insert((*kid).clone(), level + 1);
            chains.insert((*kid).clone(), kid_chain);
            queue.push_back(*kid);
        }
    }

    if levels.len() != rows.len() {
        let stranded: Vec<&Id> = rows
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !levels.contains_key(*id))
            .take(8)
            .collect();
        return Err(HierarchyError::corrupt(format!(
            "{} node(s) whose parent chain never reaches a root, starting with {:?}",
            rows.len() - levels.len(),
            stranded,
        )));
    }

    Ok(Layering { levels, chains })
}

impl<M> HierarchyRepository<M>
where
    M: HierarchyModel,
{
    /// Recompute `level` and the whole edge table from `parent_id`.
    ///
    /// Takes no parameters, tolerates a corrupt or empty edge table, and runs
    /// as one transaction with replace-all semantics. Fails with
    /// [`CorruptHierarchy`](HierarchyError::CorruptHierarchy) before any
    /// write when some parent chain cannot reach a root.
    pub async fn rebuild(&self, db: &DatabaseConnection) -> Result<(), HierarchyError> {
        Self::ensure_postgres(db)?;
        let guard =
            LockedTransaction::acquire(self.config().advisory_lock_strategy(), db).await?;
        let result = self.rebuild_in(guard.connection()).await;
        finish(guard, result).await
    }

    /// [`rebuild`](Self::rebuild) on a caller-held transaction.
    pub async fn rebuild_in<C: ConnectionTrait>(&self, conn: &C) -> Result<(), HierarchyError> {
        Self::ensure_postgres(conn)?;
        let nodes = M::Entity::find().all(conn).await?;
        let rows: Vec<(M::Id, Option<M::Id>)> =
            nodes.iter().map(|n| (n.id(), n.parent_id())).collect();
        let layering = layer(&rows)?;

        M::EdgeEntity::delete_many().exec(conn).await?;

        let mut edge_rows = Vec::new();
        for (id, chain) in &layering.chains {
            for ancestor in chain {
                edge_rows.push(M::edge_row(id.clone(), ancestor.clone()));
            }
        }
        let edge_count = edge_rows.len();
        self.insert_edges(conn, edge_rows).await?;

        // Only rewrite level values that are actually wrong, one statement
        // per distinct level.
        let mut stale: HashMap<i32, Vec<sea_orm::Value>> = HashMap::new();
        for node in &nodes {
            let computed = layering.levels[&node.id()];
            if node.level() != computed {
                stale
                    .entry(computed)
                    .or_default()
                    .push(M::id_to_value(&node.id()));
            }
        }
        for (level, ids) in stale {
            M::Entity::update_many()
                .col_expr(M::level_column(), Expr::value(level))
                .filter(M::id_column().is_in(ids))
                .exec(conn)
                .await?;
        }

        tracing::info!(
            nodes = nodes.len(),
            edges = edge_count,
            "rebuilt hierarchy from parent pointers"
        );
        Ok(())
    }
}
