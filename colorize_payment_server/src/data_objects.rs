use chrono::{DateTime, Utc};
use colorize_payment_engine::{
    cpe_api::settlement_objects::ReleasedAsset,
    db_types::{
        JobId,
        MinorUnits,
        NewOrder,
        Order,
        OrderId,
        OrderMetadata,
        OrderStatusType,
        TrackingInfo,
        TransactionType,
    },
    DecisionCode,
};
use gateway_tools::CustomerDetails;
use serde::{Deserialize, Serialize};

//----------------------------------------------   Checkout  ----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutCustomer {
    /// Falls back to the order's `user_id`, or `guest`.
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub order_id: OrderId,
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// In minor units, e.g. 7900 for ₹79.00
    pub amount: MinorUnits,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tx_type: TransactionType,
    pub customer: CheckoutCustomer,
    #[serde(default)]
    pub gclid: Option<String>,
    #[serde(default)]
    pub fbclid: Option<String>,
    #[serde(default)]
    pub fbp: Option<String>,
    #[serde(default)]
    pub fbc: Option<String>,
}

/// What the checkout route learns about the request itself, as opposed to what the client tells it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl CheckoutParams {
    /// Splits the request into the order to store and the customer details the gateway needs.
    pub fn into_order(self, context: RequestContext, now: DateTime<Utc>) -> (NewOrder, CustomerDetails) {
        let tracking = TrackingInfo {
            client_ip: context.client_ip,
            user_agent: context.user_agent,
            referrer: context.referrer,
            gclid: self.gclid,
            fbclid: self.fbclid,
            fbp: self.fbp,
            fbc: self.fbc,
            captured_at: Some(now),
        };
        let metadata = OrderMetadata { job_id: self.job_id, ..Default::default() }
            .with_tx_type(self.tx_type)
            .with_tracking(tracking);
        let mut order = NewOrder::new(self.order_id, self.amount).with_metadata(metadata);
        if let Some(currency) = self.currency {
            order = order.with_currency(currency);
        }
        let customer_id = self
            .customer
            .customer_id
            .or_else(|| self.user_id.clone())
            .unwrap_or_else(|| "guest".to_string());
        if let Some(user_id) = self.user_id {
            order = order.with_user_id(user_id);
        }
        let customer = CustomerDetails {
            customer_id,
            customer_phone: self.customer.customer_phone,
            customer_email: self.customer.customer_email,
            customer_name: self.customer.customer_name,
        };
        (order, customer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: Order,
    pub gateway_order_id: String,
    pub payment_session_id: String,
}

//----------------------------------------------   Resolution  ----------------------------------------------------
/// Query parameters of the success-page verifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    /// How many times the client has already polled for this order.
    #[serde(default)]
    pub attempt: Option<u32>,
}

impl VerifyParams {
    pub fn order_id(&self) -> Option<OrderId> {
        non_empty(&self.order_id).map(OrderId::from)
    }

    pub fn job_id(&self) -> Option<JobId> {
        non_empty(&self.job_id).map(JobId::from)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub order_id: Option<String>,
}

impl DownloadParams {
    pub fn order_id(&self) -> Option<OrderId> {
        non_empty(&self.order_id).map(OrderId::from)
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Body of the untrusted mark-paid call. The order id is required: a job is only ever unlocked by a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPaidParams {
    pub order_id: OrderId,
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedMarkPaidParams {
    pub job_id: JobId,
}

/// The successful answer of the verify and mark-paid routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResponse {
    pub code: DecisionCode,
    /// Absent for a job that was unlocked by a trusted caller without an order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatusType>,
    /// The job's `is_paid` flag as last seen.
    pub unlocked: bool,
    /// The flag could not be written yet. The download still works.
    #[serde(default)]
    pub unlock_deferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl SettlementResponse {
    pub fn paid(released: &ReleasedAsset, download_url: Option<String>) -> Self {
        Self {
            code: DecisionCode::Paid,
            order_id: released.order_id().cloned(),
            job_id: released.job_id().cloned(),
            order_status: released.order.as_ref().map(|o| o.status),
            unlocked: released.job.as_ref().map_or(false, |j| j.is_paid),
            unlock_deferred: released.unlock_deferred,
            download_url,
        }
    }
}

//----------------------------------------------   Status  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub amount: MinorUnits,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub tx_type: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        let tx_type = order.metadata.tx_type;
        Self {
            order_id: order.order_id,
            status: order.status,
            amount: order.amount,
            currency: order.currency,
            job_id: order.job_id,
            tx_type,
            gateway_order_id: order.gateway_order_id,
            payment_ref: order.payment_ref,
            payment_method: order.payment_method,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
