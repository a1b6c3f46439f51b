//! Internal OTP endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::http::extract::ApiJson;
use crate::http::response::GatewayError;
use crate::http::server::AppState;
use crate::otp::VerifyOutcome;

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueRequest {
    pub subject: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedPasscode {
    pub subject: String,
    pub code: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub subject: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: VerifyOutcome,
}

fn required(field: &'static str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

pub async fn issue(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<IssueRequest>,
) -> Result<(StatusCode, Json<IssuedPasscode>), GatewayError> {
    required("subject", &request.subject)?;

    let passcode = state.otp.issue(request.subject.trim());
    Ok((
        StatusCode::CREATED,
        Json(IssuedPasscode {
            subject: passcode.subject().to_string(),
            code: passcode.code().to_string(),
            expires_in_secs: passcode.ttl().as_secs(),
        }),
    ))
}

pub async fn verify(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    required("subject", &request.subject)?;
    required("code", &request.code)?;

    let outcome = state.otp.verify(request.subject.trim(), request.code.trim());
    match outcome.into_result() {
        Ok(()) => Ok(Json(VerifyResponse { status: outcome })),
        Err(e) if outcome == VerifyOutcome::Expired => Err(GatewayError::Gone(e.to_string())),
        Err(e) => Err(GatewayError::BadRequest(e.to_string())),
    }
}
