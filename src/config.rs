// src/config.rs

use crate::{
    db::{FundRequestRepository, RbacRepository, UserRepository},
    services::{
        auth::AuthService, document_service::DocumentService,
        fund_request_service::FundRequestService, rbac_service::RbacService,
    },
};
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

/// Configuração lida do ambiente (.env é opcional).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub fonts_dir: String,
    pub font_family: String,
    pub company_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {}", raw))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            db_max_connections,
            fonts_dir: var_or("FONTS_DIR", "./fonts"),
            font_family: var_or("FONT_FAMILY", "Roboto"),
            company_name: var_or("COMPANY_NAME", "Fund Requests"),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub auth_service: AuthService,
    pub rbac_service: RbacService,
    pub fund_request_service: FundRequestService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar no banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let auth_service = AuthService::new(user_repo, config.jwt_secret.clone(), db_pool.clone());

        let rbac_service = RbacService::new(RbacRepository::new(db_pool.clone()));

        let fund_request_service = FundRequestService::new(FundRequestRepository::new(), db_pool.clone());

        let document_service = DocumentService::new(
            fund_request_service.clone(),
            config.fonts_dir.clone(),
            config.font_family.clone(),
            config.company_name.clone(),
        );

        Ok(Self {
            db_pool,
            config,
            auth_service,
            rbac_service,
            fund_request_service,
            document_service,
        })
    }
}
