// src/handlers/rbac.rs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{PermUsersManage, RequirePermission},
    },
    models::{
        approval::Role,
        rbac::{AssignRolePayload, MyPermissionsResponse, PermissionCheckResponse},
    },
    services::rbac_service::permission_slug,
};

// GET /api/users/me/permissions (o frontend decide o que mostrar)
#[utoipa::path(
    get,
    path = "/api/users/me/permissions",
    tag = "RBAC",
    responses(
        (status = 200, description = "Permissões do cargo do usuário", body = MyPermissionsResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn my_permissions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let response = app_state.rbac_service
        .permissions_for(&user.0.role)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(response))
}

// GET /api/users/me/permissions/{resource}/{action}
#[utoipa::path(
    get,
    path = "/api/users/me/permissions/{resource}/{action}",
    tag = "RBAC",
    params(
        ("resource" = String, Path, description = "Recurso, ex.: fund_request"),
        ("action" = String, Path, description = "Ação, ex.: approve")
    ),
    responses(
        (status = 200, description = "Resultado da checagem", body = PermissionCheckResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn check_permission(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path((resource, action)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let allowed = app_state.rbac_service
        .has_resource_permission(&user.0.role, &resource, &action)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(PermissionCheckResponse {
        permission: permission_slug(&resource, &action),
        allowed,
    }))
}

// PUT /api/users/{id}/role
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "RBAC",
    request_body = AssignRolePayload,
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses(
        (status = 200, description = "Cargo atribuído", body = crate::models::auth::User),
        (status = 400, description = "Cargo desconhecido"),
        (status = 403, description = "Sem permissão users:manage"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn assign_role(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _perm: RequirePermission<PermUsersManage>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<AssignRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let role: Role = payload.role.parse().map_err(|e: crate::models::approval::UnknownRole| {
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new("role");
        err.message = Some(e.to_string().into());
        errors.add("role", err);
        AppError::ValidationError(errors).to_api_error(&locale)
    })?;

    let updated = app_state.auth_service
        .assign_role(user_id, role)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    tracing::info!(by = %user.0.email, target = %updated.email, role = %role, "Atribuição de cargo");

    Ok(Json(updated))
}
