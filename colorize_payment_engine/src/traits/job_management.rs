use crate::{
    db_types::{AssetJob, JobId, JobStatus, NewAssetJob},
    traits::SettlementDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait JobManagement: Clone {
    /// Stores a new asset job. Re-submitting an existing `job_id` returns the stored job unchanged.
    async fn insert_job(&self, job: NewAssetJob) -> Result<AssetJob, SettlementDatabaseError>;

    async fn fetch_job(&self, job_id: &JobId) -> Result<Option<AssetJob>, SettlementDatabaseError>;

    /// Sets `is_paid = true`. Naturally idempotent. Returns `JobNotFound` if there is no such job.
    async fn mark_job_paid(&self, job_id: &JobId) -> Result<AssetJob, SettlementDatabaseError>;

    /// Persists a processing status update (and the result location, once there is one).
    async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<AssetJob, SettlementDatabaseError>;
}
