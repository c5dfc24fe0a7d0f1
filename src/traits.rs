use std::fmt::Debug;
use std::hash::Hash;

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, EntityTrait, FromQueryResult, IntoActiveModel, Value,
};

use crate::config::HierarchyConfig;

/// Trait implemented by SeaORM `Model` types that participate in a
/// materialized-ancestry hierarchy.
///
/// Implementations are normally provided by the `#[derive(HierarchyModel)]`
/// macro. The associated edge entity stores one `(descendant, ancestor)` row
/// per strict ancestor of each node; depth is tracked on the node itself via
/// the level column.
pub trait HierarchyModel:
    Clone + Send + Sync + 'static + IntoActiveModel<Self::ActiveModel> + FromQueryResult
{
    type Entity: EntityTrait<Model = Self>;
    type ActiveModel: ActiveModelTrait<Entity = Self::Entity> + ActiveModelBehavior + Send;
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    type EdgeEntity: EntityTrait<Model = Self::EdgeModel>;
    type EdgeModel: Clone + Send + Sync + 'static + FromQueryResult;
    type EdgeActiveModel: ActiveModelTrait<Entity = Self::EdgeEntity> + ActiveModelBehavior + Send;

    fn hierarchy_config() -> &'static HierarchyConfig;

    fn id(&self) -> Self::Id;
    fn parent_id(&self) -> Option<Self::Id>;
    fn level(&self) -> i32;
    fn set_parent(active: &mut Self::ActiveModel, parent: Option<Self::Id>);
    fn set_level(active: &mut Self::ActiveModel, level: i32);
    fn id_to_value(id: &Self::Id) -> Value;

    fn name(&self) -> &str;
    fn set_name(active: &mut Self::ActiveModel, name: &str);

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
    fn parent_column() -> <Self::Entity as EntityTrait>::Column;
    fn level_column() -> <Self::Entity as EntityTrait>::Column;
    fn name_column() -> <Self::Entity as EntityTrait>::Column;

    fn edge_descendant_column() -> <Self::EdgeEntity as EntityTrait>::Column;
    fn edge_ancestor_column() -> <Self::EdgeEntity as EntityTrait>::Column;

    fn edge_id_to_value(id: &Self::Id) -> Value;
    fn edge_descendant(model: &Self::EdgeModel) -> Self::Id;
    fn edge_ancestor(model: &Self::EdgeModel) -> Self::Id;
    fn edge_row(descendant: Self::Id, ancestor: Self::Id) -> Self::EdgeActiveModel;
}
