use std::fmt::Debug;

use log::*;

use crate::{
    cpe_api::errors::OrderFlowError,
    db_types::{NewOrder, Order, OrderId, Transaction, TransactionType},
    traits::{InsertOrderResult, JobManagement, OrderManagement},
};

/// `OrderFlowApi` records checkout intents: the order a customer is about to pay for, and the reference the gateway
/// assigns to it.
///
/// Orders are created `Pending`. Nothing in this API moves an order out of `Pending`; only the settlement engine may
/// do that.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + JobManagement
{
    /// Creates a new `Pending` order.
    ///
    /// Re-submitting an existing `order_id` returns the stored order unchanged with `inserted = false`, so the
    /// checkout can be safely retried. A new purchase for a job that has already been paid for is refused.
    pub async fn create_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderFlowError> {
        if !order.amount.is_positive() {
            return Err(OrderFlowError::InvalidAmount);
        }
        if let Some(existing) = self.db.fetch_order_by_order_id(&order.order_id).await? {
            debug!("🔄️📦️ Order {} already exists. Returning it unchanged", existing.order_id);
            return Ok(InsertOrderResult { order: existing, inserted: false });
        }
        if let Some(job_id) = order.job_id() {
            let job = self.db.fetch_job(job_id).await?.ok_or_else(|| OrderFlowError::JobNotFound(job_id.clone()))?;
            if job.is_paid && order.metadata.tx_type == TransactionType::Purchase {
                info!("🔄️📦️ Refusing order {}: asset job {job_id} is already paid for", order.order_id);
                return Err(OrderFlowError::JobAlreadyPaid(job_id.clone()));
            }
        }
        let result = self.db.insert_order(order).await?;
        if result.inserted {
            info!("🔄️📦️ Order {} created for {}", result.order.order_id, result.order.amount);
        }
        Ok(result)
    }

    /// Links the order to the gateway's order reference. The link can be made once.
    pub async fn attach_gateway_order_id(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.attach_gateway_order_id(order_id, gateway_order_id).await?;
        debug!("🔄️📦️ Order {order_id} is gateway order {gateway_order_id}");
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let order = self.db.fetch_order_by_order_id(order_id).await?;
        Ok(order)
    }

    pub async fn fetch_transactions_for_order(&self, order_id: &OrderId) -> Result<Vec<Transaction>, OrderFlowError> {
        let txs = self.db.fetch_transactions_for_order(order_id).await?;
        Ok(txs)
    }
}
