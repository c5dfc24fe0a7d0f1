//! SeaORM-centric materialized-ancestry hierarchies.
//!
//! This crate keeps a mutable tree of rows (a `parent_id` pointer per row)
//! transitively indexed in an ancestor-edge table, so "whole subtree" and
//! "whole ancestor chain" are single queries instead of recursive round
//! trips. It also reconstructs nested forests from arbitrary flat query
//! results, and can re-derive the whole index from the parent pointers when
//! the stored ancestry is suspect. At this stage the implementation focuses
//! on PostgreSQL support; the public API is kept backend agnostic so MySQL
//! can follow.

pub mod config;
pub mod error;
pub mod ext;
pub mod lock;
pub mod mutate;
pub mod repository;
pub mod traits;
pub mod tree;

mod rebuild;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{
        AdvisoryLockStrategy, DeleteBehavior, HierarchyConfig, HierarchyOptions, OrderStrategy,
    };
    pub use crate::ext::HierarchyNodeExt;
    pub use crate::traits::HierarchyModel;
    pub use crate::tree::{TreeNode, TreeRecord};
}

pub use sea_hierarchy_macros::HierarchyModel as HierarchyModelDerive;
#[doc(hidden)]
pub use sea_hierarchy_macros::HierarchyModel;

pub use config::{
    AdvisoryLockKey, AdvisoryLockStrategy, DeleteBehavior, HierarchyConfig, HierarchyOptions,
    OrderStrategy,
};
pub use error::HierarchyError;
pub use ext::HierarchyNodeExt;
pub use mutate::Reparented;
pub use repository::HierarchyRepository;
pub use traits::HierarchyModel;
pub use tree::{build_forest, flatten_forest, TreeNode, TreeRecord};
