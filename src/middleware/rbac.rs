// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
};

/// 1. O Trait que define o que é uma Permissão (`recurso:ação`)
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        // A. Extrai Usuário (colocado pelo auth_guard)
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        // B. Verifica no Banco pelo cargo do usuário
        let required_perm = T::slug();
        let allowed = app_state
            .rbac_service
            .has_permission(&user.0.role, required_perm)
            .await?;

        if !allowed {
            tracing::warn!(user = %user.0.email, role = %user.0.role, perm = required_perm, "Acesso negado");
            return Err(AppError::Forbidden(required_perm.to_string()));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

pub struct PermFundRequestRead;
impl PermissionDef for PermFundRequestRead {
    fn slug() -> &'static str { "fund_request:read" }
}

pub struct PermFundRequestWrite;
impl PermissionDef for PermFundRequestWrite {
    fn slug() -> &'static str { "fund_request:write" }
}

pub struct PermFundRequestApprove;
impl PermissionDef for PermFundRequestApprove {
    fn slug() -> &'static str { "fund_request:approve" }
}

pub struct PermFinanceItemWrite;
impl PermissionDef for PermFinanceItemWrite {
    fn slug() -> &'static str { "finance_item:write" }
}

pub struct PermUsersManage;
impl PermissionDef for PermUsersManage {
    fn slug() -> &'static str { "users:manage" }
}
