// src/config.rs

pub mod settings;
pub use settings::Settings;

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};

use crate::{
    clients::{FixtureMembershipSource, MembershipSource, WebhookMembershipSource},
    common::i18n::I18nStore,
    services::{
        auth::{Authenticator, StaticCredentialAuthenticator},
        AuthService, CustomerService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth_service: AuthService,
    pub customer_service: CustomerService,
    pub i18n_store: I18nStore,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let source = membership_source(&settings).await?;

        let authenticator = StaticCredentialAuthenticator::from_plain(
            &settings.operator_credentials,
            bcrypt::DEFAULT_COST,
        )
        .map_err(|e| anyhow::anyhow!("Falha ao preparar credenciais: {}", e))?;

        Ok(Self::from_parts(settings, source, Arc::new(authenticator)))
    }

    // --- Monta o gráfico de dependências ---
    pub fn from_parts(
        settings: Settings,
        source: Arc<dyn MembershipSource>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let auth_service = AuthService::new(
            authenticator,
            settings.jwt_secret.clone(),
            Duration::hours(settings.session_ttl_hours),
        );
        let customer_service = CustomerService::new(source, settings.page_size, settings.business_offset);

        Self {
            settings: Arc::new(settings),
            auth_service,
            customer_service,
            i18n_store: I18nStore::new(),
        }
    }
}

// Webhook quando configurado; senão arquivo de fixture ou a coleção de demonstração.
async fn membership_source(settings: &Settings) -> anyhow::Result<Arc<dyn MembershipSource>> {
    if let Some(url) = &settings.webhook_url {
        tracing::info!("🌐 Fonte de clientes: webhook {}", url);
        let source = WebhookMembershipSource::new(url.clone(), settings.webhook_timeout)
            .map_err(|e| anyhow::anyhow!("Falha ao criar cliente HTTP: {}", e))?;
        return Ok(Arc::new(source));
    }

    if let Some(path) = &settings.fixture_path {
        let source = FixtureMembershipSource::from_file(path)
            .await
            .with_context(|| format!("Falha ao ler fixture {}", path.display()))?;
        return Ok(Arc::new(source));
    }

    tracing::warn!("⚠️ Nenhum webhook configurado, usando clientes de demonstração");
    let today = Utc::now().with_timezone(&settings.business_offset).date_naive();
    Ok(Arc::new(FixtureMembershipSource::demo(today, settings.business_offset)))
}
