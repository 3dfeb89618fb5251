//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use fund_approval::{
    config::{AppState, Config},
    docs::ApiDoc,
    handlers,
    middleware::auth::auth_guard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG, padrão "info")
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Define as rotas de usuário (protegidas pelo middleware)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/me/permissions", get(handlers::rbac::my_permissions))
        .route("/me/permissions/{resource}/{action}", get(handlers::rbac::check_permission))
        .route("/{id}/role", put(handlers::rbac::assign_role))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let fund_request_routes = Router::new()
        .route("/fund-requests"
               ,get(handlers::fund_requests::list_all)
               .post(handlers::fund_requests::create)
        )
        .route("/fund-requests/pending"
               ,get(handlers::fund_requests::list_pending)
        )
        .route("/fund-requests/{id}"
               ,get(handlers::fund_requests::get_detail)
               .put(handlers::fund_requests::update)
        )
        .route("/fund-requests/{id}/pdf"
               ,get(handlers::documents::fund_request_pdf)
        )
        .route("/approval-logs"
               ,post(handlers::fund_requests::append_approval_log)
        )
        .route("/finance-items"
               ,get(handlers::finance_items::list_finance_items)
               .post(handlers::finance_items::create_finance_item)
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api", fund_request_routes)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
