use std::fmt::Debug;

use log::*;

use crate::{
    cpe_api::errors::AssetJobError,
    db_types::{AssetJob, JobId, JobStatus, NewAssetJob},
    traits::JobManagement,
};

/// `AssetJobApi` records the processing jobs whose results are sold, and carries the trusted mark-paid path.
///
/// The processing pipeline itself lives elsewhere. This API only persists what the pipeline reports.
pub struct AssetJobApi<B> {
    db: B,
}

impl<B> Debug for AssetJobApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetJobApi")
    }
}

impl<B: Clone> Clone for AssetJobApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> AssetJobApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AssetJobApi<B>
where B: JobManagement
{
    /// Stores a new job. Submitting the same `job_id` twice returns the original job.
    pub async fn submit_job(&self, job: NewAssetJob) -> Result<AssetJob, AssetJobError> {
        let job = self.db.insert_job(job).await?;
        debug!("🗃️ Asset job {} submitted", job.job_id);
        Ok(job)
    }

    /// Persists a status update from the processing pipeline. A job that has finished (`Done` or `Failed`) cannot be
    /// updated again.
    pub async fn record_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<AssetJob, AssetJobError> {
        let job = self.fetch_job(job_id).await?.ok_or_else(|| AssetJobError::JobNotFound(job_id.clone()))?;
        if job.status.is_finished() {
            warn!("🗃️ Ignoring a {status} update for asset job {job_id}, which is already {}", job.status);
            return Err(AssetJobError::StatusIsFinal(job_id.clone()));
        }
        let job = self.db.update_job_status(job_id, status, result_url).await?;
        Ok(job)
    }

    pub async fn fetch_job(&self, job_id: &JobId) -> Result<Option<AssetJob>, AssetJobError> {
        let job = self.db.fetch_job(job_id).await?;
        Ok(job)
    }

    /// Sets `is_paid` without consulting the payment gateway.
    ///
    /// Only trusted, authenticated internal callers may reach this method. Untrusted callers must go through
    /// [`SettlementApi::resolve`](crate::SettlementApi::resolve) instead.
    pub async fn mark_paid_trusted(&self, job_id: &JobId) -> Result<AssetJob, AssetJobError> {
        let job = self.db.mark_job_paid(job_id).await?;
        info!("🔐️ Asset job {job_id} was marked as paid by a trusted caller");
        Ok(job)
    }
}
