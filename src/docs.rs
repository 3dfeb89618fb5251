// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- RBAC ---
        handlers::rbac::my_permissions,
        handlers::rbac::check_permission,
        handlers::rbac::assign_role,

        // --- Finance Items ---
        handlers::finance_items::list_finance_items,
        handlers::finance_items::create_finance_item,

        // --- Fund Requests ---
        handlers::fund_requests::list_all,
        handlers::fund_requests::list_pending,
        handlers::fund_requests::get_detail,
        handlers::fund_requests::create,
        handlers::fund_requests::update,
        handlers::fund_requests::append_approval_log,
        handlers::documents::fund_request_pdf,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- RBAC ---
            models::rbac::MyPermissionsResponse,
            models::rbac::PermissionCheckResponse,
            models::rbac::AssignRolePayload,

            // --- Approval chain ---
            models::approval::ApprovalStage,
            models::approval::Role,

            // --- Fund Requests ---
            models::fund_request::FinanceItem,
            models::fund_request::FundRequestItem,
            models::fund_request::ApprovalLogEntry,
            models::fund_request::FundRequest,
            models::fund_request::FundRequestItemPayload,
            models::fund_request::FundRequestPayload,
            models::fund_request::ApprovalLogSubmission,
            models::fund_request::CreateFinanceItemPayload,

            // --- Status derivado ---
            services::status_resolver::CompletedStage,
            services::status_resolver::ResolvedStatus,
            services::status_resolver::StepState,
            services::status_resolver::StepView,
            services::transition_authority::ApprovalAction,
            services::transition_authority::AvailableActions,
            services::fund_request_service::FundRequestSummary,
            services::fund_request_service::FundRequestDetail,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "RBAC", description = "Permissões por cargo"),
        (name = "Finance Items", description = "Catálogo de itens financeiros"),
        (name = "Fund Requests", description = "Solicitações de fundos e cadeia de aprovação")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_approval_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/approval-logs"));
        assert!(doc.paths.paths.contains_key("/api/fund-requests/{id}/pdf"));
    }
}
