// src/clients/membership.rs
//
// Webhook de assinaturas (fonte remota dos clientes). Consumido como caixa-preta:
//   GET <base>?accion=memberships
//   GET <base>?accion=by-plate&plate=P1,P2&target_status=active|inactive

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA},
    Client, Url,
};
use serde_json::Value;

use crate::{
    common::error::AppError,
    models::customer::{AccountStatus, Customer},
    services::batch_status::{extract_error_message, StatusUpdateReply},
};

/// De onde vem a coleção de clientes e para onde vão as mudanças de status.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Nunca falha: qualquer problema vira lista vazia (e log).
    async fn fetch_memberships(&self) -> Vec<Customer>;

    async fn set_status_by_plate(
        &self,
        plates: &[String],
        target: AccountStatus,
    ) -> Result<StatusUpdateReply, AppError>;

    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct WebhookMembershipSource {
    client: Client,
    base_url: Url,
}

impl WebhookMembershipSource {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, AppError> {
        let mut builder = Client::builder().default_headers(no_cache_headers());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { client: builder.build()?, base_url })
    }
}

// O operador precisa ver o estado real do servidor, nunca uma cópia em cache.
fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

#[async_trait]
impl MembershipSource for WebhookMembershipSource {
    async fn fetch_memberships(&self) -> Vec<Customer> {
        let response = match self
            .client
            .get(self.base_url.clone())
            .query(&[("accion", "memberships")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("🔥 Falha ao buscar clientes no webhook: {}", e);
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!("🔥 Webhook respondeu {} ao listar clientes", status);
            return Vec::new();
        }

        match response.json::<Value>().await {
            Ok(body) => ingest_memberships(body),
            Err(e) => {
                tracing::error!("🔥 Resposta de clientes não é JSON válido: {}", e);
                Vec::new()
            }
        }
    }

    async fn set_status_by_plate(
        &self,
        plates: &[String],
        target: AccountStatus,
    ) -> Result<StatusUpdateReply, AppError> {
        let joined = plates.join(",");

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("accion", "by-plate"),
                ("plate", joined.as_str()),
                ("target_status", target.as_param()),
            ])
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            // Corpo ilegível cai na mensagem genérica com o status
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebhookStatus {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }

        let body = response.text().await?;
        Ok(StatusUpdateReply::from_body(&body))
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Converte o envelope `{success, data}` em clientes. Registros que não
/// decodificam são descartados. O webhook não é a autoridade sobre
/// `is_active`: todo registro entra como ativo.
pub fn ingest_memberships(body: Value) -> Vec<Customer> {
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        tracing::error!("Resposta de clientes sem sucesso ou em formato inesperado");
        return Vec::new();
    }

    let Some(Value::Array(records)) = body.get("data").cloned() else {
        tracing::error!("Resposta de clientes sem o array `data`");
        return Vec::new();
    };

    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Customer>(record) {
            Ok(mut customer) => {
                customer.is_active = true;
                Some(customer)
            }
            Err(e) => {
                tracing::warn!("Registro de cliente ignorado: {}", e);
                None
            }
        })
        .collect()
}
