// src/handlers/fund_requests.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermFundRequestApprove, PermFundRequestRead, PermFundRequestWrite, RequirePermission},
    },
    models::fund_request::{ApprovalLogEntry, ApprovalLogSubmission, FundRequest, FundRequestPayload},
    services::fund_request_service::{summarize, FundRequestDetail, FundRequestSummary},
};

// GET /api/fund-requests
#[utoipa::path(
    get,
    path = "/api/fund-requests",
    tag = "Fund Requests",
    responses(
        (status = 200, description = "Todas as solicitações com o status derivado", body = Vec<FundRequestSummary>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_all(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFundRequestRead>,
) -> Result<impl IntoResponse, ApiError> {
    let requests = app_state.fund_request_service
        .list_all()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    let summaries: Vec<FundRequestSummary> = requests.into_iter().map(summarize).collect();
    Ok(Json(summaries))
}

// GET /api/fund-requests/pending (fila do cargo do usuário)
#[utoipa::path(
    get,
    path = "/api/fund-requests/pending",
    tag = "Fund Requests",
    responses(
        (status = 200, description = "Solicitações aguardando o cargo do usuário", body = Vec<FundRequestSummary>),
        (status = 403, description = "Cargo desconhecido")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_pending(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermFundRequestRead>,
) -> Result<impl IntoResponse, ApiError> {
    let role = user.role().map_err(|e| e.to_api_error(&locale))?;

    let requests = app_state.fund_request_service
        .list_pending_for_role(role)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    let summaries: Vec<FundRequestSummary> = requests.into_iter().map(summarize).collect();
    Ok(Json(summaries))
}

// GET /api/fund-requests/{id}
#[utoipa::path(
    get,
    path = "/api/fund-requests/{id}",
    tag = "Fund Requests",
    params(("id" = i64, Path, description = "ID da solicitação")),
    responses(
        (status = 200, description = "Detalhe com timeline e ações disponíveis", body = FundRequestDetail),
        (status = 404, description = "Solicitação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_detail(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermFundRequestRead>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let request = app_state.fund_request_service
        .get(id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    // Cargo fora da cadeia só perde as ações, não a leitura
    Ok(Json(FundRequestDetail::build(request, user.role().ok())))
}

// POST /api/fund-requests
#[utoipa::path(
    post,
    path = "/api/fund-requests",
    tag = "Fund Requests",
    request_body = FundRequestPayload,
    responses(
        (status = 201, description = "Solicitação criada e submetida", body = FundRequest),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Código já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermFundRequestWrite>,
    Json(mut payload): Json<FundRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.id = None;
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let actor = user.actor().map_err(|e| e.to_api_error(&locale))?;

    let saved = app_state.fund_request_service
        .create_or_update(&payload, &actor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(saved)))
}

// PUT /api/fund-requests/{id}
#[utoipa::path(
    put,
    path = "/api/fund-requests/{id}",
    tag = "Fund Requests",
    request_body = FundRequestPayload,
    params(("id" = i64, Path, description = "ID da solicitação")),
    responses(
        (status = 200, description = "Solicitação atualizada", body = FundRequest),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Solicitação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermFundRequestWrite>,
    Path(id): Path<i64>,
    Json(mut payload): Json<FundRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    // O id da rota manda
    payload.id = Some(id);
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let actor = user.actor().map_err(|e| e.to_api_error(&locale))?;

    let saved = app_state.fund_request_service
        .create_or_update(&payload, &actor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(saved))
}

// POST /api/approval-logs
#[utoipa::path(
    post,
    path = "/api/approval-logs",
    tag = "Fund Requests",
    request_body = ApprovalLogSubmission,
    responses(
        (status = 201, description = "Etapa registrada", body = ApprovalLogEntry),
        (status = 400, description = "Nota longa demais"),
        (status = 403, description = "Cargo sem etapa na cadeia"),
        (status = 404, description = "Solicitação não encontrada"),
        (status = 409, description = "Fora da vez ou etapa já registrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn append_approval_log(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermFundRequestApprove>,
    Json(submission): Json<ApprovalLogSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    submission.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let actor = user.actor().map_err(|e| e.to_api_error(&locale))?;

    let entry = app_state.fund_request_service
        .append_approval_log(&submission, &actor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(entry)))
}
