use crc32fast::Hasher;

/// Static configuration describing how a SeaORM model and its ancestor-edge
/// entity map onto the hierarchy engine.
#[derive(Clone, Debug)]
pub struct HierarchyConfig {
    entity_name: String,
    edge_name: String,
    parent_column: String,
    level_column: String,
    name_column: String,
    edge_table: String,
    delete_behavior: DeleteBehavior,
    order_strategy: Option<OrderStrategy>,
    advisory_lock_strategy: AdvisoryLockStrategy,
}

impl HierarchyConfig {
    /// Create a new configuration using the logical entity and edge names.
    pub fn new(entity_name: impl Into<String>, edge_name: impl Into<String>) -> Self {
        let entity_name = entity_name.into();
        let edge_name = edge_name.into();

        let default_lock = AdvisoryLockStrategy::Namespaced(AdvisoryLockKey::derived_from(
            &entity_name,
            &edge_name,
        ));

        Self {
            entity_name,
            edge_name,
            parent_column: "parent_id".to_string(),
            level_column: "level".to_string(),
            name_column: "name".to_string(),
            edge_table: String::new(),
            delete_behavior: DeleteBehavior::default(),
            order_strategy: None,
            advisory_lock_strategy: default_lock,
        }
    }

    /// Merge options produced by [`HierarchyOptions`].
    pub(crate) fn apply_options(mut self, options: HierarchyOptions) -> Self {
        if let Some(parent_column) = options.parent_column {
            self.parent_column = parent_column;
        }
        if let Some(level_column) = options.level_column {
            self.level_column = level_column;
        }
        if let Some(name_column) = options.name_column {
            self.name_column = name_column;
        }
        if let Some(edge_table) = options.edge_table {
            self.edge_table = edge_table;
        }
        if let Some(behavior) = options.delete_behavior {
            self.delete_behavior = behavior;
        }
        if let Some(order_strategy) = options.order_strategy {
            self.order_strategy = Some(order_strategy);
        }
        if let Some(strategy) = options.advisory_lock_strategy {
            self.advisory_lock_strategy = strategy;
        }
        self
    }

    /// Human-readable Rust struct name for the base entity.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Associated SeaORM entity name for the ancestor-edge model.
    pub fn edge_name(&self) -> &str {
        &self.edge_name
    }

    /// Column name storing the parent foreign key.
    pub fn parent_column(&self) -> &str {
        &self.parent_column
    }

    /// Column name storing the derived depth (root = 0).
    pub fn level_column(&self) -> &str {
        &self.level_column
    }

    /// Column name storing the display name.
    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    /// Table backing the ancestor-edge entity.
    pub fn edge_table(&self) -> &str {
        &self.edge_table
    }

    /// Behavior applied to a node's subtree when the node is destroyed.
    pub fn delete_behavior(&self) -> DeleteBehavior {
        self.delete_behavior
    }

    /// Ordering strategy to apply when returning children or descendants.
    pub fn order_strategy(&self) -> Option<&OrderStrategy> {
        self.order_strategy.as_ref()
    }

    /// Advisory lock strategy (PostgreSQL only).
    pub fn advisory_lock_strategy(&self) -> &AdvisoryLockStrategy {
        &self.advisory_lock_strategy
    }
}

/// Builder-style options consumed by the derive macro.
#[derive(Clone, Debug, Default)]
pub struct HierarchyOptions {
    parent_column: Option<String>,
    level_column: Option<String>,
    name_column: Option<String>,
    edge_table: Option<String>,
    delete_behavior: Option<DeleteBehavior>,
    order_strategy: Option<OrderStrategy>,
    advisory_lock_strategy: Option<AdvisoryLockStrategy>,
}

impl HierarchyOptions {
    pub fn parent_column(mut self, value: impl Into<String>) -> Self {
        self.parent_column = Some(value.into());
        self
    }

    pub fn level_column(mut self, value: impl Into<String>) -> Self {
        self.level_column = Some(value.into());
        self
    }

    pub fn name_column(mut self, value: impl Into<String>) -> Self {
        self.name_column = Some(value.into());
        self
    }

    pub fn edge_table(mut self, value: impl Into<String>) -> Self {
        self.edge_table = Some(value.into());
        self
    }

    pub fn delete_behavior(mut self, behavior: DeleteBehavior) -> Self {
        self.delete_behavior = Some(behavior);
        self
    }

    pub fn order_strategy(mut self, strategy: OrderStrategy) -> Self {
        self.order_strategy = Some(strategy);
        self
    }

    pub fn advisory_lock_strategy(mut self, strategy: AdvisoryLockStrategy) -> Self {
        self.advisory_lock_strategy = Some(strategy);
        self
    }

    pub fn apply(self, base: HierarchyConfig) -> HierarchyConfig {
        base.apply_options(self)
    }
}

/// Behaviour applied to dependent nodes when destroying a record.
///
/// `Cascade` removes the entire subtree. `Detach` re-parents direct children
/// onto the destroyed node's own parent (re-leveling them and rewriting their
/// ancestor edges) before removing the single node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeleteBehavior {
    Cascade,
    Detach,
}

impl Default for DeleteBehavior {
    fn default() -> Self {
        Self::Cascade
    }
}

/// Strategy used to generate deterministic ordering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OrderStrategy {
    Manual,
    NumericColumn { column: String },
}

impl OrderStrategy {
    pub fn numeric_column(column: impl Into<String>) -> Self {
        Self::NumericColumn {
            column: column.into(),
        }
    }
}

/// Key used for PostgreSQL advisory locks.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AdvisoryLockKey(String);

impl AdvisoryLockKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn derived_from(entity: &str, edge: &str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(entity.as_bytes());
        hasher.update(b"/");
        hasher.update(edge.as_bytes());
        let crc = hasher.finalize();
        Self(format!("sea-hierarchy::{entity}::{edge}::{crc:x}"))
    }
}

/// Configuration describing how to acquire advisory locks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvisoryLockStrategy {
    Disabled,
    Namespaced(AdvisoryLockKey),
}

impl AdvisoryLockStrategy {
    pub fn key(&self) -> Option<&AdvisoryLockKey> {
        match self {
            AdvisoryLockStrategy::Disabled => None,
            AdvisoryLockStrategy::Namespaced(key) => Some(key),
        }
    }
}
