// src/models/rbac.rs

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

// Permissões do usuário logado (o frontend decide o que mostrar)
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyPermissionsResponse {
    #[schema(example = "FINANCE")]
    pub role: String,

    #[schema(example = json!(["fund_request:read", "fund_request:approve"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolePayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "MANAGER FIN")]
    pub role: String,
}

// Resposta de `hasPermission(recurso, ação)`
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckResponse {
    #[schema(example = "fund_request:approve")]
    pub permission: String,
    pub allowed: bool,
}
