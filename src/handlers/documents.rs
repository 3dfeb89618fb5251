// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        i18n::Locale,
        rbac::{PermFundRequestRead, RequirePermission},
    },
};

#[utoipa::path(
    get,
    path = "/api/fund-requests/{id}/pdf",
    tag = "Fund Requests",
    params(("id" = i64, Path, description = "ID da solicitação")),
    responses(
        (status = 200, description = "PDF da solicitação", content_type = "application/pdf"),
        (status = 404, description = "Solicitação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn fund_request_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    _perm: RequirePermission<PermFundRequestRead>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let pdf_bytes = app_state.document_service
        .generate_fund_request_pdf(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"fund_request_{}.pdf\"", id)),
    ];

    Ok((headers, pdf_bytes).into_response())
}
