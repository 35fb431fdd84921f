//! `SqliteDatabase` is a concrete implementation of a colorize payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`](crate::traits)
//! module.
use std::fmt::Debug;

use chrono::Duration;
use cpg_common::PaymentObservation;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, jobs, new_pool, orders, transactions};
use crate::{
    db_types::{
        AssetJob,
        JobId,
        JobStatus,
        NewAssetJob,
        NewOrder,
        NewTransaction,
        Order,
        OrderId,
        OrderStatusType,
        Transaction,
    },
    traits::{
        FailOutcome,
        InsertOrderResult,
        JobManagement,
        OrderManagement,
        SettlementDatabase,
        SettlementDatabaseError,
        SettlementResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(InsertOrderResult { order, inserted })
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_for_job(&self, job_id: &JobId) -> Result<Option<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_for_job(job_id, &mut conn).await?;
        Ok(order)
    }

    async fn attach_gateway_order_id(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
    ) -> Result<Order, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::attach_gateway_order_id(order_id, gateway_order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_transactions_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<Transaction>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let txs = transactions::fetch_transactions_for_order(order_id, &mut conn).await?;
        Ok(txs)
    }

    async fn fetch_stale_pending_orders(
        &self,
        grace_period: Duration,
        limit: i64,
    ) -> Result<Vec<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_stale_pending_orders(grace_period, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_paid_orders_with_locked_jobs(&self, limit: i64) -> Result<Vec<Order>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_paid_orders_with_locked_jobs(limit, &mut conn).await?;
        Ok(orders)
    }
}

impl JobManagement for SqliteDatabase {
    async fn insert_job(&self, job: NewAssetJob) -> Result<AssetJob, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let job = jobs::idempotent_insert(job, &mut tx).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn fetch_job(&self, job_id: &JobId) -> Result<Option<AssetJob>, SettlementDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let job = jobs::fetch_job(job_id, &mut conn).await?;
        Ok(job)
    }

    async fn mark_job_paid(&self, job_id: &JobId) -> Result<AssetJob, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let job = jobs::mark_job_paid(job_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementDatabaseError::JobNotFound(job_id.clone()))?;
        tx.commit().await?;
        trace!("🗃️ Asset job {job_id} is_paid = {}", job.is_paid);
        Ok(job)
    }

    async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<AssetJob, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let job = jobs::update_job_status(job_id, status, result_url, &mut tx)
            .await?
            .ok_or_else(|| SettlementDatabaseError::JobNotFound(job_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Asset job {job_id} is now {}", job.status);
        Ok(job)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// The guarded `Pending -> Paid` update is the first statement of the transaction, so the write lock is taken
    /// immediately and concurrent settlements of the same order serialise behind it. The loser finds the order
    /// already `Paid`, and the SUCCESS insert is ignored by the partial unique index.
    async fn settle_order(
        &self,
        order_id: &OrderId,
        observation: &PaymentObservation,
    ) -> Result<SettlementResult, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let payment_ref = observation.provider_payment_id.as_deref();
        let payment_method = observation.payment_method.as_deref();
        let order = match orders::mark_order_paid(order_id, payment_ref, payment_method, &mut tx).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} moved from Pending to Paid");
                order
            },
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementDatabaseError::OrderNotFound(order_id.clone()))?;
                match order.status {
                    OrderStatusType::Paid => {
                        trace!("🗃️ Order {order_id} was already Paid");
                        order
                    },
                    OrderStatusType::Failed => {
                        return Err(SettlementDatabaseError::OrderAlreadyFailed(order_id.clone()))
                    },
                    OrderStatusType::Pending => {
                        return Err(SettlementDatabaseError::InvariantViolation(format!(
                            "order {order_id} is Pending but could not be marked Paid"
                        )))
                    },
                }
            },
        };
        let (transaction, newly_settled) =
            match transactions::insert_success_if_absent(NewTransaction::success_for(&order), &mut tx).await? {
                Some(t) => (t, true),
                None => {
                    let t = transactions::fetch_success_for_order(order_id, &mut tx).await?.ok_or_else(|| {
                        SettlementDatabaseError::InvariantViolation(format!(
                            "SUCCESS transaction for {order_id} was neither inserted nor found"
                        ))
                    })?;
                    (t, false)
                },
            };
        tx.commit().await?;
        Ok(SettlementResult { order, transaction, newly_settled })
    }

    async fn mark_order_failed(
        &self,
        order_id: &OrderId,
        raw_state: &str,
    ) -> Result<FailOutcome, SettlementDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let outcome = match orders::mark_order_failed(order_id, &mut tx).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} moved from Pending to Failed (gateway state {raw_state})");
                FailOutcome::Failed { order, newly_failed: true }
            },
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| SettlementDatabaseError::OrderNotFound(order_id.clone()))?;
                match order.status {
                    OrderStatusType::Paid => FailOutcome::AlreadyPaid(order),
                    OrderStatusType::Failed => FailOutcome::Failed { order, newly_failed: false },
                    OrderStatusType::Pending => {
                        return Err(SettlementDatabaseError::InvariantViolation(format!(
                            "order {order_id} is Pending but could not be marked Failed"
                        )))
                    },
                }
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}
