use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::directory::UserDirectory;
use super::domain::{ApplicantId, LoanType};
use super::responder::ResponseGenerator;
use super::service::{LoanConversationService, WorkflowError};
use super::session::SessionStore;

#[derive(Debug, Deserialize)]
struct ApplicantRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LoanTypeRequest {
    user_id: String,
    loan_type: String,
}

#[derive(Debug, Deserialize)]
struct LoanAmountRequest {
    user_id: String,
    loan_amount: f64,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    user_id: String,
    message: String,
}

/// HTTP surface for the loan conversation. One POST route per transition,
/// plus the free-text chat side channel.
pub fn loan_router<D, S, G>(service: Arc<LoanConversationService<D, S, G>>) -> Router
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    Router::new()
        .route("/api/v1/loans/greet", post(greet_endpoint))
        .route("/api/v1/loans/select_type", post(select_type_endpoint))
        .route("/api/v1/loans/confirm", post(confirm_endpoint))
        .route("/api/v1/loans/amount", post(amount_endpoint))
        .route("/api/v1/loans/eligibility", post(eligibility_endpoint))
        .route("/api/v1/loans/finalize", post(finalize_endpoint))
        .route("/api/v1/loans/chat", post(chat_endpoint))
        .with_state(service)
}

pub(crate) fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::UserNotFound(_) | WorkflowError::SessionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Directory(_) | WorkflowError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Error payloads carry a stable `error_code` for programmatic callers.
/// Infrastructure failures are logged in full but reported generically.
fn error_response(err: &WorkflowError) -> Response {
    let status = status_for(err);
    let body = match err {
        WorkflowError::UserNotFound(id) => json!({
            "error_code": "USER_NOT_FOUND",
            "user_id": id.0,
            "error": err.to_string(),
        }),
        WorkflowError::SessionNotFound(id) => json!({
            "error_code": "SESSION_NOT_FOUND",
            "user_id": id.0,
            "error": err.to_string(),
        }),
        WorkflowError::Validation(validation) => json!({
            "error_code": "VALIDATION_ERROR",
            "field": validation.field,
            "value": validation.value,
            "error": validation.reason,
        }),
        WorkflowError::Directory(_) | WorkflowError::Store(_) => {
            error!(error = %err, "loan workflow infrastructure failure");
            json!({
                "error_code": "INTERNAL_ERROR",
                "error": "an internal error occurred",
            })
        }
    };

    (status, Json(body)).into_response()
}

fn invalid_loan_type(raw: &str) -> Response {
    let body = json!({
        "error_code": "VALIDATION_ERROR",
        "field": "loan_type",
        "value": raw,
        "error": "loan type must be one of: personal, home, auto, business",
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

async fn greet_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<ApplicantRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.greet(&applicant) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn select_type_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<LoanTypeRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let Some(loan_type) = LoanType::parse(&request.loan_type) else {
        return invalid_loan_type(&request.loan_type);
    };

    let applicant = ApplicantId(request.user_id);
    match service.select_loan_type(&applicant, loan_type) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn confirm_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<ApplicantRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.confirm_data(&applicant) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn amount_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<ApplicantRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.request_loan_amount(&applicant) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn eligibility_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<LoanAmountRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.calculate_eligibility(&applicant, request.loan_amount) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn finalize_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<ApplicantRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.final_confirmation(&applicant) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn chat_endpoint<D, S, G>(
    State(service): State<Arc<LoanConversationService<D, S, G>>>,
    Json(request): Json<ChatRequest>,
) -> Response
where
    D: UserDirectory + 'static,
    S: SessionStore + 'static,
    G: ResponseGenerator + 'static,
{
    let applicant = ApplicantId(request.user_id);
    match service.chat(&applicant, &request.message) {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => error_response(&err),
    }
}
