use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AssetJob, JobId, JobStatus, NewAssetJob},
    traits::SettlementDatabaseError,
};

/// Inserts the job, or returns the existing job with the same `job_id` unchanged.
pub async fn idempotent_insert(
    job: NewAssetJob,
    conn: &mut SqliteConnection,
) -> Result<AssetJob, SettlementDatabaseError> {
    let job_id = job.job_id.clone();
    let inserted: Option<AssetJob> = sqlx::query_as(
        r#"
            INSERT INTO asset_jobs (job_id, user_id, source_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(job.job_id)
    .bind(job.user_id)
    .bind(job.source_url)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    match inserted {
        Some(job) => {
            debug!("🗃️ Asset job {} inserted with id {}", job.job_id, job.id);
            Ok(job)
        },
        None => {
            debug!("🗃️ Asset job {job_id} already exists");
            fetch_job(&job_id, conn).await?.ok_or(SettlementDatabaseError::JobNotFound(job_id))
        },
    }
}

pub async fn fetch_job(job_id: &JobId, conn: &mut SqliteConnection) -> Result<Option<AssetJob>, sqlx::Error> {
    let job = sqlx::query_as("SELECT * FROM asset_jobs WHERE job_id = $1")
        .bind(job_id.as_str())
        .fetch_all(conn)
        .await?
        .into_iter()
        .next();
    Ok(job)
}

/// Sets `is_paid`. Setting it again is harmless and leaves `updated_at` alone.
pub async fn mark_job_paid(job_id: &JobId, conn: &mut SqliteConnection) -> Result<Option<AssetJob>, sqlx::Error> {
    let job = sqlx::query_as(
        r#"
            UPDATE asset_jobs SET
                updated_at = CASE WHEN is_paid = 1 THEN updated_at ELSE CURRENT_TIMESTAMP END,
                is_paid = 1
            WHERE job_id = $1
            RETURNING *
        "#,
    )
    .bind(job_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(job)
}

pub async fn update_job_status(
    job_id: &JobId,
    status: JobStatus,
    result_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<AssetJob>, sqlx::Error> {
    let job = sqlx::query_as(
        r#"
            UPDATE asset_jobs SET
                status = $1,
                result_url = COALESCE($2, result_url),
                updated_at = CURRENT_TIMESTAMP
            WHERE job_id = $3
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(result_url)
    .bind(job_id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(job)
}
