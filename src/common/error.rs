// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Erros internos da aplicação. Os handlers convertem para ApiError
// (já traduzido) antes de responder.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Cliente {0} não encontrado")]
    CustomerNotFound(i64),

    #[error("Filtro desconhecido: {0}")]
    UnknownFilter(String),

    // --- Atualização em lote (validação local, nenhuma chamada de rede) ---
    #[error("Nenhum cliente selecionado")]
    EmptySelection,

    #[error("Nenhuma placa encontrada para os clientes selecionados")]
    NoResolvablePlates,

    #[error("Já existe uma operação em andamento")]
    OperationInProgress,

    // --- Webhook de assinaturas ---
    #[error("Webhook respondeu {status}: {message}")]
    WebhookStatus { status: u16, message: String },

    #[error("Falha de comunicação com o webhook: {0}")]
    WebhookTransport(#[from] reqwest::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::UnknownFilter(_)
            | AppError::EmptySelection
            | AppError::NoResolvablePlates => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
            AppError::OperationInProgress => StatusCode::CONFLICT,
            AppError::WebhookStatus { .. } | AppError::WebhookTransport(_) => StatusCode::BAD_GATEWAY,
            AppError::InternalServerError(_) | AppError::BcryptError(_) | AppError::JwtError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Código estável usado como chave no catálogo de mensagens.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::CustomerNotFound(_) => "customer_not_found",
            AppError::UnknownFilter(_) => "unknown_filter",
            AppError::EmptySelection => "empty_selection",
            AppError::NoResolvablePlates => "no_resolvable_plates",
            AppError::OperationInProgress => "operation_in_progress",
            AppError::WebhookStatus { .. } | AppError::WebhookTransport(_) => "webhook_failed",
            _ => "internal_error",
        }
    }

    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let status = self.status_code();
        let mut error = store.translate(&locale.0, self.code());

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            let code = e.message.as_deref().unwrap_or(&*e.code);
                            Value::String(store.translate(&locale.0, code))
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            AppError::CustomerNotFound(id) => Some(json!({ "id": id })),
            AppError::UnknownFilter(key) => Some(json!({
                "filter": key,
                "allowed": ["all", "ontime", "due", "1", "2", "3plus", "inactive"],
            })),
            AppError::WebhookStatus { status, message } => {
                error = format!("{error}: {message}");
                Some(json!({ "upstreamStatus": status }))
            }
            AppError::WebhookTransport(e) => {
                error = format!("{error}: {e}");
                None
            }
            _ => None,
        };

        if status.is_server_error() {
            tracing::error!("Erro ao processar requisição: {}", self);
        }

        ApiError { status, error, details }
    }
}

// Erro já pronto para o cliente (mensagem traduzida).
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

// Sem Accept-Language disponível, responde no idioma padrão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), &I18nStore::new())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_validation_errors_are_bad_requests() {
        assert_eq!(AppError::EmptySelection.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NoResolvablePlates.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnknownFilter("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn webhook_status_keeps_remote_message() {
        let err = AppError::WebhookStatus {
            status: 503,
            message: "mantenimiento".into(),
        };
        let api = err.to_api_error(&Locale("en".into()), &I18nStore::new());

        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert!(api.error.ends_with(": mantenimiento"));
        assert_eq!(api.details, Some(json!({ "upstreamStatus": 503 })));
    }

    #[test]
    fn busy_gate_maps_to_conflict() {
        let api = AppError::OperationInProgress.to_api_error(&Locale::default(), &I18nStore::new());
        assert_eq!(api.status, StatusCode::CONFLICT);
    }
}
