//! Internal attachment scanning endpoints.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::scanning::{AttachmentScanResult, ScanCompletion, ScanError, ScanStatus};

#[derive(Debug, Deserialize)]
pub struct InlineParams {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceRequest {
    pub object_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub status: ScanStatus,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionAccepted {
    pub scan_id: Uuid,
    pub queued: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub scan_id: Uuid,
    pub deliverable: bool,
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ScanError> for GatewayError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NotFound(_) => GatewayError::NotFound(err.to_string()),
            ScanError::InvalidTransition { .. } => GatewayError::Conflict(err.to_string()),
            ScanError::QueueClosed => GatewayError::Unavailable(err.to_string()),
            ScanError::Pending(_) | ScanError::Infected(_) => GatewayError::Conflict(err.to_string()),
        }
    }
}

pub async fn scan_inline(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<InlineParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<AttachmentScanResult>), GatewayError> {
    let filename = params.filename.trim();
    if filename.is_empty() {
        return Err(GatewayError::BadRequest("filename is required".into()));
    }
    let result = state.scans.scan_inline(&body, filename);
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn scan_reference(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReferenceRequest>,
) -> Result<(StatusCode, Json<AttachmentScanResult>), GatewayError> {
    let key = request.object_key.trim();
    if key.is_empty() {
        return Err(GatewayError::BadRequest("object_key is required".into()));
    }
    let result = state.scans.scan_by_reference(key).await;
    Ok((StatusCode::ACCEPTED, Json(result)))
}

pub async fn get_scan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<AttachmentScanResult>, GatewayError> {
    state
        .scans
        .status(id)
        .map(Json)
        .ok_or_else(|| ScanError::NotFound(id).into())
}

/// Pending and infected are answers here, not failures.
pub async fn delivery(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<DeliveryStatus>, GatewayError> {
    match state.scans.ensure_deliverable(id) {
        Ok(result) => Ok(Json(DeliveryStatus {
            scan_id: id,
            deliverable: true,
            status: result.status,
            reason: None,
        })),
        Err(e @ (ScanError::Pending(_) | ScanError::Infected(_))) => {
            let status = if matches!(e, ScanError::Pending(_)) {
                ScanStatus::Pending
            } else {
                ScanStatus::Infected
            };
            Ok(Json(DeliveryStatus {
                scan_id: id,
                deliverable: false,
                status,
                reason: Some(e.to_string()),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// Engine webhook. The transition is applied by the completion worker.
pub async fn complete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CompletionRequest>,
) -> Result<(StatusCode, Json<CompletionAccepted>), GatewayError> {
    if !request.status.is_terminal() {
        return Err(GatewayError::BadRequest(
            "status must be clean or infected".into(),
        ));
    }

    let current = state.scans.status(id).ok_or(ScanError::NotFound(id))?;
    if current.status.is_terminal() {
        return Err(GatewayError::Conflict(format!(
            "attachment scan {} already {}",
            id, current.status
        )));
    }

    state
        .scans
        .submit_completion(ScanCompletion {
            scan_id: id,
            status: request.status,
            details: request.details,
        })
        .await?;

    tracing::debug!(scan_id = %id, status = %request.status, "Queued scan completion");
    Ok((
        StatusCode::ACCEPTED,
        Json(CompletionAccepted { scan_id: id, queued: true }),
    ))
}
