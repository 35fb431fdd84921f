use chrono::Duration;
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use super::is_trigger_abort;
use crate::{
    db_types::{JobId, NewOrder, Order, OrderId},
    traits::SettlementDatabaseError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
///
/// Concurrent inserts of the same `order_id` are safe: the loser gets the winner's order back.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), SettlementDatabaseError> {
    let order_id = order.order_id.clone();
    let inserted = match insert_order(order, conn).await? {
        Some(order) => {
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
        None => {
            let order = fetch_order_by_order_id(&order_id, conn)
                .await?
                .ok_or_else(|| SettlementDatabaseError::InvariantViolation(format!("order {order_id} vanished")))?;
            trace!("🗃️ Order [{order_id}] already exists");
            (order, false)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders are always `Pending`. The job reference in the metadata is copied to the indexed `job_id` column.
/// Returns `None` if an order with the same `order_id` already exists.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let job_id = order.job_id().cloned();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                amount,
                currency,
                job_id,
                metadata
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.user_id)
    .bind(order.amount)
    .bind(order.currency)
    .bind(job_id)
    .bind(Json(order.metadata))
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(order)
}

/// Returns the most relevant order referencing the job: `Paid` first, then the newest `Pending`, then the newest
/// `Failed`. No recency cutoff is applied, since a late confirmation must still be resolvable.
pub async fn fetch_order_for_job(job_id: &JobId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            SELECT * FROM orders WHERE job_id = $1
            ORDER BY
                CASE status WHEN 'Paid' THEN 0 WHEN 'Pending' THEN 1 ELSE 2 END,
                unixepoch(created_at) DESC,
                id DESC
            LIMIT 1
        "#,
    )
    .bind(job_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

pub async fn attach_gateway_order_id(
    order_id: &OrderId,
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementDatabaseError> {
    let result = sqlx::query_as(
        r#"
            UPDATE orders SET gateway_order_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND gateway_order_id IS NULL
            RETURNING *
        "#,
    )
    .bind(gateway_order_id)
    .bind(order_id.as_str())
    .fetch_all(&mut *conn)
    .await
    .map(|rows: Vec<Order>| rows.into_iter().next());
    match result {
        Ok(Some(order)) => Ok(order),
        Ok(None) => {
            let order = fetch_order_by_order_id(order_id, conn)
                .await?
                .ok_or_else(|| SettlementDatabaseError::OrderNotFound(order_id.clone()))?;
            match order.gateway_order_id.as_deref() {
                Some(existing) if existing == gateway_order_id => {
                    trace!("🗃️ Order {order_id} already has gateway order id {existing}");
                    Ok(order)
                },
                Some(existing) => Err(SettlementDatabaseError::GatewayOrderIdConflict {
                    order_id: order_id.clone(),
                    existing: existing.to_string(),
                }),
                None => Err(SettlementDatabaseError::InvariantViolation(format!(
                    "gateway order id for {order_id} could not be set"
                ))),
            }
        },
        Err(e) if is_trigger_abort(&e, "gateway order id cannot change") => {
            Err(SettlementDatabaseError::GatewayOrderIdConflict {
                order_id: order_id.clone(),
                existing: "(concurrently assigned)".to_string(),
            })
        },
        Err(e) => Err(e.into()),
    }
}

/// Guarded transition `Pending -> Paid`. Returns `None` if the order was not `Pending` (or does not exist).
pub async fn mark_order_paid(
    order_id: &OrderId,
    payment_ref: Option<&str>,
    payment_method: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'Paid',
                payment_ref = COALESCE($1, payment_ref),
                payment_method = COALESCE($2, payment_method),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3 AND status = 'Pending'
            RETURNING *
        "#,
    )
    .bind(payment_ref)
    .bind(payment_method)
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

/// Guarded transition `Pending -> Failed`. Returns `None` if the order was not `Pending` (or does not exist).
pub async fn mark_order_failed(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Failed', updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND status = 'Pending'
            RETURNING *
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(order)
}

pub async fn fetch_stale_pending_orders(
    grace_period: Duration,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let grace = grace_period.num_seconds();
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Pending'
              AND gateway_order_id IS NOT NULL
              AND unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at) >= $1
            ORDER BY unixepoch(created_at) ASC, id ASC
            LIMIT $2
        "#,
    )
    .bind(grace)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} pending orders are older than {grace}s", orders.len());
    Ok(orders)
}

pub async fn fetch_paid_orders_with_locked_jobs(
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT orders.* FROM orders
            JOIN asset_jobs ON asset_jobs.job_id = orders.job_id
            WHERE orders.status = 'Paid' AND asset_jobs.is_paid = 0
            ORDER BY unixepoch(orders.created_at) ASC, orders.id ASC
            LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
