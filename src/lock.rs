use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait, Value,
};

use crate::config::AdvisoryLockStrategy;
use crate::error::HierarchyError;

/// A transaction paired with an optional namespaced advisory lock.
///
/// The lock is taken with `pg_advisory_xact_lock`, so PostgreSQL releases it
/// when the transaction commits or rolls back; there is no unlock bookkeeping
/// on the exit paths.
pub struct LockedTransaction {
    txn: Option<DatabaseTransaction>,
}

impl LockedTransaction {
    pub async fn acquire(
        strategy: &AdvisoryLockStrategy,
        db: &DatabaseConnection,
    ) -> Result<Self, HierarchyError> {
        let txn = db.begin().await?;

        if let Some(key) = strategy.key() {
            if let Err(err) = acquire_xact_lock(&txn, key.as_str()).await {
                let _ = txn.rollback().await;
                return Err(err);
            }
        }

        Ok(Self { txn: Some(txn) })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        self.txn.as_ref().expect("transaction already consumed")
    }

    pub async fn commit(mut self) -> Result<(), HierarchyError> {
        if let Some(txn) = self.txn.take() {
            txn.commit()
                .await
                .map_err(HierarchyError::TransactionAborted)?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), HierarchyError> {
        if let Some(txn) = self.txn.take() {
            txn.rollback()
                .await
                .map_err(HierarchyError::TransactionAborted)?;
        }
        Ok(())
    }
}

async fn acquire_xact_lock(
    txn: &DatabaseTransaction,
    key: &str,
) -> Result<(), HierarchyError> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1), 0)",
        vec![Value::from(key)],
    ))
    .await?;
    Ok(())
}
