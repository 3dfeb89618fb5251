// src/handlers/finance_items.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermFinanceItemWrite, PermFundRequestRead, RequirePermission},
    },
    models::fund_request::{CreateFinanceItemPayload, FinanceItem},
};

#[utoipa::path(
    get,
    path = "/api/finance-items",
    tag = "Finance Items",
    responses(
        (status = 200, description = "Itens financeiros", body = Vec<FinanceItem>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_finance_items(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFundRequestRead>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state.fund_request_service
        .list_finance_items()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/api/finance-items",
    tag = "Finance Items",
    request_body = CreateFinanceItemPayload,
    responses(
        (status = 201, description = "Item financeiro criado", body = FinanceItem),
        (status = 409, description = "Nome já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_finance_item(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFinanceItemWrite>,
    Json(payload): Json<CreateFinanceItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state.fund_request_service
        .create_finance_item(&payload.name)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(item)))
}
