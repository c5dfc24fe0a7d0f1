//! Entities shared by the integration test binaries.

#![allow(dead_code)]

pub mod entity {
    pub mod node {
        use sea_hierarchy::HierarchyModelDerive as HierarchyModel;
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel, HierarchyModel)]
        #[sea_orm(table_name = "nodes")]
        #[hierarchy(
            edge_module = "crate::common::entity::node_edge",
            edge_table = "node_edges"
        )]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub parent_id: Option<i32>,
            pub level: i32,
            pub name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod node_edge {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "node_edges")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub descendant_id: i32,
            #[sea_orm(primary_key)]
            pub ancestor_id: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    /// Same shape as `node`, but destroying a row detaches its children
    /// instead of cascading over the subtree.
    pub mod folder {
        use sea_hierarchy::HierarchyModelDerive as HierarchyModel;
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel, HierarchyModel)]
        #[sea_orm(table_name = "folders")]
        #[hierarchy(
            edge_module = "crate::common::entity::folder_edge",
            edge_table = "folder_edges",
            delete_behavior = "detach"
        )]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub parent_id: Option<i32>,
            pub level: i32,
            pub name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod folder_edge {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
        #[sea_orm(table_name = "folder_edges")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub descendant_id: i32,
            #[sea_orm(primary_key)]
            pub ancestor_id: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}
