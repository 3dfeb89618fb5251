// src/db/rbac_repo.rs

use sqlx::PgPool;

use crate::common::error::AppError;

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
}

impl RbacRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Slugs liberados para um cargo
    pub async fn list_permissions_for_role(&self, role: &str) -> Result<Vec<String>, AppError> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT permission FROM role_permissions WHERE role = $1 ORDER BY permission",
        )
            .bind(role)
            .fetch_all(&self.pool)
            .await?;

        Ok(slugs)
    }

    pub async fn role_has_permission(
        &self,
        role: &str,
        permission_slug: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM role_permissions
                WHERE role = $1
                  AND permission = $2
            )
            "#,
        )
            .bind(role)
            .bind(permission_slug)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
