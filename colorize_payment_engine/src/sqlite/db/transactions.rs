use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewTransaction, OrderId, Transaction};

/// Creates the SUCCESS transaction for the order unless one already exists.
///
/// The partial unique index on `transactions(order_id) WHERE status = 'Success'` makes this an atomic
/// insert-if-absent: a concurrent duplicate is ignored and `None` is returned.
pub async fn insert_success_if_absent(
    tx: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let order_id = tx.order_id.clone();
    let result: Option<Transaction> = sqlx::query_as(
        r#"
            INSERT OR IGNORE INTO transactions (
                order_id,
                user_id,
                amount,
                currency,
                tx_type,
                status,
                provider_payment_id
            ) VALUES ($1, $2, $3, $4, $5, 'Success', $6)
            RETURNING *;
        "#,
    )
    .bind(tx.order_id)
    .bind(tx.user_id)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.tx_type)
    .bind(tx.provider_payment_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    match &result {
        Some(t) => debug!("🗃️ SUCCESS transaction {} recorded for order {order_id}", t.id),
        None => debug!("🗃️ Order {order_id} already has a SUCCESS transaction"),
    }
    Ok(result)
}

pub async fn fetch_success_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1 AND status = 'Success'")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(tx)
}

pub async fn fetch_transactions_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(txs)
}
