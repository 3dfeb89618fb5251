// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    middleware::i18n::Locale,
    models::approval::ApprovalStage,
    services::transition_authority::TransitionError,
};

// Nosso tipo de erro, agora com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Permissão negada: {0}")]
    Forbidden(String),

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Transição inválida: {0}")]
    TransitionNotAllowed(#[from] TransitionError),

    // Perdedor da corrida: outro usuário já gravou a etapa
    #[error("Etapa {0} já registrada")]
    StageAlreadyRecorded(ApprovalStage),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Falha ao gerar o PDF: {0}")]
    DocumentRender(String),

    // Variante para erros de banco de dados (exemplo com sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// O erro que vai de fato para o cliente (já traduzido).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

fn pick(locale: &Locale, pt: &str, en: &str) -> String {
    if locale.is_portuguese() { pt.to_string() } else { en.to_string() }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::EmailAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::UniqueConstraintViolation(_) | AppError::StageAlreadyRecorded(_) => StatusCode::CONFLICT,
            AppError::TransitionNotAllowed(TransitionError::NotesTooLong { .. }) => StatusCode::BAD_REQUEST,
            AppError::TransitionNotAllowed(TransitionError::RoleHasNoStage(_)) => StatusCode::FORBIDDEN,
            AppError::TransitionNotAllowed(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta do cliente no idioma pedido.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status();
        let mut details = None;

        let error = match self {
            AppError::ValidationError(errors) => {
                let mut fields = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    fields.insert(field.to_string(), json!(messages));
                }
                for (field, kind) in errors.errors() {
                    if !matches!(kind, validator::ValidationErrorsKind::Field(_)) {
                        fields
                            .entry(field.to_string())
                            .or_insert_with(|| json!([pick(locale, "Conteúdo inválido.", "Invalid content.")]));
                    }
                }
                details = Some(Value::Object(fields));
                pick(locale, "Um ou mais campos são inválidos.", "One or more fields are invalid.")
            }
            AppError::EmailAlreadyExists => pick(locale, "Este e-mail já está em uso.", "This e-mail is already in use."),
            AppError::InvalidCredentials => pick(locale, "E-mail ou senha inválidos.", "Invalid e-mail or password."),
            AppError::InvalidToken => pick(
                locale,
                "Token de autenticação inválido ou ausente.",
                "Missing or invalid authentication token.",
            ),
            AppError::UserNotFound => pick(locale, "Usuário não encontrado.", "User not found."),
            AppError::Forbidden(what) => match locale.is_portuguese() {
                true => format!("Você precisa da permissão '{}' para realizar esta ação.", what),
                false => format!("You need the '{}' permission to perform this action.", what),
            },
            AppError::ResourceNotFound(what) => match locale.is_portuguese() {
                true => format!("{} não encontrado.", what),
                false => format!("{} not found.", what),
            },
            AppError::UniqueConstraintViolation(msg) => msg.clone(),
            AppError::StageAlreadyRecorded(stage) => match locale.is_portuguese() {
                true => format!("A etapa {} já foi registrada por outro usuário. Atualize a lista.", stage),
                false => format!("Stage {} was already recorded by someone else. Refresh the list.", stage),
            },
            AppError::TransitionNotAllowed(reason) => {
                details = Some(json!({ "reason": reason.to_string() }));
                pick(
                    locale,
                    "Esta ação não está disponível para a solicitação.",
                    "This action is not available for the request.",
                )
            }
            // Todos os outros erros viram 500. O `tracing` loga a mensagem detalhada.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                pick(locale, "Ocorreu um erro inesperado.", "An unexpected error occurred.")
            }
        };

        ApiError { status, error, details }
    }
}

// Middlewares (sem extrator de idioma) respondem no idioma padrão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

/// Traduz violações do Postgres nos nossos erros de domínio.
pub fn map_constraint_error(e: sqlx::Error, unique_msg: &str) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::UniqueConstraintViolation(unique_msg.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::ResourceNotFound("Finance item".to_string());
        }
    }
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "required"))]
        name: String,
    }

    #[test]
    fn validation_errors_carry_field_details() {
        let errors = Probe { name: String::new() }.validate().unwrap_err();
        let api = AppError::ValidationError(errors).to_api_error(&Locale("en".into()));
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details.unwrap()["name"][0], "required");
    }

    #[test]
    fn messages_follow_locale() {
        let err = AppError::ResourceNotFound("Fund request 7".into());
        assert_eq!(err.to_api_error(&Locale("pt".into())).error, "Fund request 7 não encontrado.");
        assert_eq!(err.to_api_error(&Locale("en".into())).error, "Fund request 7 not found.");
    }

    #[test]
    fn transition_failures_map_to_client_errors() {
        let out_of_turn = AppError::from(TransitionError::AlreadyRejected);
        assert_eq!(out_of_turn.status(), StatusCode::CONFLICT);
        let too_long = AppError::from(TransitionError::NotesTooLong { max: 500, len: 501 });
        assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::StageAlreadyRecorded(ApprovalStage::ReviewedByFinance).status(),
            StatusCode::CONFLICT
        );
    }
}
