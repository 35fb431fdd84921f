use std::{collections::HashMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cpg_common::MinorUnits;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The caller-chosen, externally visible order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------         JobId         ---------------------------------------------------------
/// Identifies one asset processing job (a colorization or an upscale).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct JobId(pub String);

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and the customer has been sent to the gateway.
    Pending,
    /// The gateway confirmed the payment. Terminal.
    Paid,
    /// The gateway reported a failed, cancelled or expired payment. Terminal.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    TransactionType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionType {
    /// Unlocks a colorized image.
    #[default]
    Purchase,
    /// Unlocks an upscaled version of an image.
    Upscale,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Purchase => write!(f, "Purchase"),
            TransactionType::Upscale => write!(f, "Upscale"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "purchase" => Ok(Self::Purchase),
            "upscale" => Ok(Self::Upscale),
            s => Err(ConversionError(format!("transaction type: {s}"))),
        }
    }
}

//--------------------------------------   TransactionStatus   ---------------------------------------------------------
/// Only successful settlements are recorded. At most one `Success` row exists per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    Success,
}

//--------------------------------------       JobStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// `Done` and `Failed` are reached exactly once and never left.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Processing => write!(f, "Processing"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("job status: {s}"))),
        }
    }
}

//--------------------------------------     TrackingInfo      ---------------------------------------------------------
/// Captured once, when the order is created, for later conversion tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// Google Ads click id
    pub gclid: Option<String>,
    /// Meta click id
    pub fbclid: Option<String>,
    /// Meta browser id cookie
    pub fbp: Option<String>,
    /// Meta click cookie
    pub fbc: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl TrackingInfo {
    pub fn has_attribution(&self) -> bool {
        self.gclid.is_some() || self.fbclid.is_some() || self.fbp.is_some() || self.fbc.is_some()
    }
}

//--------------------------------------     OrderMetadata     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMetadata {
    /// The asset job this order unlocks.
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub tx_type: TransactionType,
    #[serde(default)]
    pub tracking: Option<TrackingInfo>,
    /// Anything else the checkout wanted to remember.
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl OrderMetadata {
    pub fn for_job(job_id: JobId) -> Self {
        Self { job_id: Some(job_id), ..Default::default() }
    }

    pub fn with_tx_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingInfo) -> Self {
        self.tracking = Some(tracking);
        self
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// Assigned by the gateway once the checkout session exists.
    pub gateway_order_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    /// The gateway's identifier for the captured payment.
    pub payment_ref: Option<String>,
    pub payment_method: Option<String>,
    /// Denormalised copy of `metadata.job_id`, so that orders can be looked up by job.
    pub job_id: Option<JobId>,
    pub metadata: Json<OrderMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn references_job(&self, job_id: &JobId) -> bool {
        self.job_id.as_ref() == Some(job_id)
    }

    pub fn tracking(&self) -> Option<&TrackingInfo> {
        self.metadata.tracking.as_ref()
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    /// Purchases may be anonymous.
    pub user_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub metadata: OrderMetadata,
}

impl NewOrder {
    pub fn new(order_id: OrderId, amount: MinorUnits) -> Self {
        Self {
            order_id,
            user_id: None,
            amount,
            currency: cpg_common::DEFAULT_CURRENCY_CODE.to_string(),
            metadata: OrderMetadata::default(),
        }
    }

    pub fn for_job(order_id: OrderId, job_id: JobId, amount: MinorUnits) -> Self {
        Self::new(order_id, amount).with_metadata(OrderMetadata::for_job(job_id))
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_metadata(mut self, metadata: OrderMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.metadata.job_id.as_ref()
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
/// The idempotency receipt of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_id: OrderId,
    pub user_id: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub tx_type: TransactionType,
    pub provider_payment_id: Option<String>,
}

impl NewTransaction {
    /// A SUCCESS transaction for the given (paid) order.
    pub fn success_for(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            tx_type: order.metadata.tx_type,
            provider_payment_id: order.payment_ref.clone(),
        }
    }
}

//--------------------------------------        AssetJob       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AssetJob {
    pub id: i64,
    pub job_id: JobId,
    pub user_id: Option<String>,
    pub source_url: String,
    pub result_url: Option<String>,
    pub status: JobStatus,
    /// Gates release of the result. Once true it is never reset.
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssetJob {
    pub fn is_ready(&self) -> bool {
        self.status == JobStatus::Done && self.result_url.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssetJob {
    pub job_id: JobId,
    pub user_id: Option<String>,
    pub source_url: String,
}

impl NewAssetJob {
    pub fn new<S: Into<String>>(job_id: JobId, source_url: S) -> Self {
        Self { job_id, user_id: None, source_url: source_url.into() }
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
