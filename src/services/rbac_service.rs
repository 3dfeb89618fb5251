// src/services/rbac_service.rs

use crate::common::error::AppError;
use crate::db::RbacRepository;
use crate::models::rbac::MyPermissionsResponse;

/// `hasPermission(recurso, ação)`: decide se a interface oferece a ação.
/// Não tem nada a ver com a vez do cargo na cadeia (isso é da autoridade de transição).
#[derive(Clone)]
pub struct RbacService {
    repo: RbacRepository,
}

impl RbacService {
    pub fn new(repo: RbacRepository) -> Self {
        Self { repo }
    }

    pub async fn has_permission(&self, role: &str, slug: &str) -> Result<bool, AppError> {
        self.repo.role_has_permission(role, slug).await
    }

    pub async fn has_resource_permission(
        &self,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, AppError> {
        self.has_permission(role, &permission_slug(resource, action)).await
    }

    pub async fn permissions_for(&self, role: &str) -> Result<MyPermissionsResponse, AppError> {
        let permissions = self.repo.list_permissions_for_role(role).await?;
        Ok(MyPermissionsResponse {
            role: role.to_string(),
            permissions,
        })
    }
}

pub fn permission_slug(resource: &str, action: &str) -> String {
    format!("{}:{}", resource.trim().to_lowercase(), action.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_resource_colon_action() {
        assert_eq!(permission_slug("fund_request", "approve"), "fund_request:approve");
        assert_eq!(permission_slug(" Fund_Request ", "READ"), "fund_request:read");
    }
}
