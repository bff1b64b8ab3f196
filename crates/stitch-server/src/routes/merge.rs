//! `POST /merge`: run one playlist merge job for the duration of the request.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use stitch_core::{ArtifactDescriptor, Error, JobRequest};

use crate::context::AppContext;
use crate::error::AppError;

/// Merge every item of a playlist into one downloadable file.
///
/// The job runs inside the request. A malformed body is reported in the same
/// `{error, code}` shape as every other failure.
pub async fn merge_playlist(
    State(ctx): State<AppContext>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<ArtifactDescriptor>, AppError> {
    let Json(request) =
        payload.map_err(|rejection| Error::Validation(rejection.body_text()))?;

    tracing::info!(playlist_url = %request.playlist_url, format = %request.format, "Merge requested");

    let descriptor = ctx.runner.run_job(request).await.into_result()?;
    Ok(Json(descriptor))
}
