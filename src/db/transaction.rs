/*!
 * Transaction helper
 *
 * Runs a unit of work inside one database transaction. The closure's own
 * `ServiceError` is returned unchanged so callers can match on business
 * failures such as `InsufficientStock` after the rollback.
 */

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};
use uuid::Uuid;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// Commits when the closure returns `Ok`, rolls back on any `Err`.
///
/// ```rust,ignore
/// let order = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let order = order::Entity::insert(active).exec_with_returning(txn).await?;
///         catalog.decrement_stock(txn, product_id, 2).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(db: &DatabaseConnection, f: F) -> Result<T, ServiceError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    let start = std::time::Instant::now();
    debug!(transaction_id = %transaction_id, "Starting database transaction");

    let result = db.transaction::<_, T, ServiceError>(f).await;

    let elapsed = start.elapsed();
    histogram!("atelier_db.transaction.duration", elapsed);

    match result {
        Ok(value) => {
            counter!("atelier_db.transaction.committed", 1);
            debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
            Ok(value)
        }
        Err(err) => {
            counter!("atelier_db.transaction.rolled_back", 1);
            warn!(transaction_id = %transaction_id, "Transaction rolled back after {:?}", elapsed);
            Err(match err {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement};

    async fn scratch_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            "CREATE TABLE ledger (id INTEGER PRIMARY KEY, note TEXT NOT NULL)".to_string(),
        ))
        .await
        .unwrap();
        db
    }

    async fn row_count(db: &DatabaseConnection) -> i64 {
        let row = db
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM ledger".to_string(),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get::<i64>("", "n").unwrap()
    }

    #[tokio::test]
    async fn commits_on_success() {
        let db = scratch_db().await;

        let value = with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO ledger (note) VALUES ('kept')".to_string(),
                ))
                .await?;
                Ok(7)
            })
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_and_preserves_business_error() {
        let db = scratch_db().await;

        let result: Result<(), ServiceError> = with_transaction(&db, |txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DbBackend::Sqlite,
                    "INSERT INTO ledger (note) VALUES ('discarded')".to_string(),
                ))
                .await?;
                Err(ServiceError::InsufficientStock("Wool Coat".into()))
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));
        assert_eq!(row_count(&db).await, 0);
    }
}
