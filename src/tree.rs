//! In-memory reconstruction of nested forests from flat query results.
//!
//! The nesting step only ever looks at `id` and `parent_id`, so it works the
//! same whether the rows came from a full-table fetch, a single anchored
//! subtree, or a filtered query joined with non-hierarchical data. Callers
//! wanting a particular sibling order pre-sort the flat rows; relative input
//! order is preserved at every level.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::traits::HierarchyModel;

/// Minimal view of a row participating in forest reconstruction.
///
/// Blanket-implemented for every [`HierarchyModel`]; implement it by hand for
/// partial-column or joined [`FromQueryResult`](sea_orm::FromQueryResult)
/// structs that still carry an id and a parent id.
pub trait TreeRecord {
    type Id: Clone + Eq + Hash;

    fn record_id(&self) -> Self::Id;
    fn record_parent_id(&self) -> Option<Self::Id>;
}

impl<M: HierarchyModel> TreeRecord for M {
    type Id = M::Id;

    fn record_id(&self) -> Self::Id {
        self.id()
    }

    fn record_parent_id(&self) -> Option<Self::Id> {
        self.parent_id()
    }
}

/// One node of a reconstructed forest: the original record plus the records
/// that matched as its children, recursively.
///
/// Serializes as the record's own fields with a `children` array appended.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode<R> {
    #[serde(flatten)]
    pub record: R,
    pub children: Vec<TreeNode<R>>,
}

impl<R> TreeNode<R> {
    /// Depth-first flattening, self before children.
    pub fn flatten(self) -> Vec<R> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<R>) {
        out.push(self.record);
        for child in self.children {
            child.flatten_into(out);
        }
    }
}

/// Nest a flat sequence of records into an ordered forest.
///
/// Single linear pass: a record whose `parent_id` refers to another record in
/// the input becomes a child of that record (in input order); every other
/// record is a top-level root of the result. Records caught in a parent cycle
/// are unreachable from any top-level record and are omitted;
/// `HierarchyRepository::rebuild` is the repair path for such data.
pub fn build_forest<R: TreeRecord>(rows: Vec<R>) -> Vec<TreeNode<R>> {
    let mut index: HashMap<R::Id, usize> = HashMap::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        index.entry(row.record_id()).or_insert(position);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (position, row) in rows.iter().enumerate() {
        let parent = row
            .record_parent_id()
            .and_then(|parent_id| index.get(&parent_id).copied());
        match parent {
            Some(parent_position) if parent_position != position => {
                children[parent_position].push(position);
            }
            _ => roots.push(position),
        }
    }

    let mut slots: Vec<Option<R>> = rows.into_iter().map(Some).collect();
    roots
        .into_iter()
        .map(|root| assemble(root, &mut slots, &children))
        .collect()
}

/// Depth-first flattening of a whole forest, self before children.
pub fn flatten_forest<R>(forest: Vec<TreeNode<R>>) -> Vec<R> {
    let mut out = Vec::new();
    for tree in forest {
        tree.flatten_into(&mut out);
    }
    out
}

fn assemble<R>(position: usize, slots: &mut [Option<R>], children: &[Vec<usize>]) -> TreeNode<R> {
    let record = slots[position].take().expect("record assembled twice");
    let nested = children[position]
        .clone()
        .into_iter()
        .map(|child| assemble(child, slots, children))
        .collect();
    TreeNode {
        record,
        children: nested,
    }
}
