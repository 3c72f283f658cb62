// src/services/auth.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{AuthResponse, Claims, Operator, Session},
};

/// Verifica credenciais. `Ok(None)` significa credencial recusada.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Operator>, AppError>;
}

/// Lista fixa de operadores vinda da configuração.
pub struct StaticCredentialAuthenticator {
    // e-mail (minúsculo) -> hash bcrypt
    credentials: HashMap<String, String>,
}

impl StaticCredentialAuthenticator {
    /// Gera o hash de cada senha uma única vez, na inicialização.
    pub fn from_plain(credentials: &[(String, String)], cost: u32) -> Result<Self, AppError> {
        let mut hashed = HashMap::new();
        for (email, password) in credentials {
            hashed.insert(email.trim().to_lowercase(), hash(password, cost)?);
        }
        Ok(Self { credentials: hashed })
    }
}

#[async_trait]
impl Authenticator for StaticCredentialAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Operator>, AppError> {
        let email = email.trim().to_lowercase();
        let Some(password_hash) = self.credentials.get(&email).cloned() else {
            return Ok(None);
        };

        let password_clone = password.to_owned();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        Ok(is_password_valid.then_some(Operator { email }))
    }
}

#[derive(Clone)]
pub struct AuthService {
    authenticator: Arc<dyn Authenticator>,
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    jwt_secret: String,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(authenticator: Arc<dyn Authenticator>, jwt_secret: String, session_ttl: Duration) -> Self {
        Self {
            authenticator,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            jwt_secret,
            session_ttl,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let operator = self
            .authenticator
            .authenticate(email, password)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            operator,
            expires_at: now + self.session_ttl,
        };

        let claims = Claims {
            sub: session.operator.email.clone(),
            sid: session.id,
            exp: session.expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?;

        tracing::info!("🔑 Sessão aberta para {}", session.operator.email);

        let expires_at = session.expires_at;
        self.sessions.write().await.insert(session.id, session);

        Ok(AuthResponse { token, expires_at })
    }

    /// Token válido = assinatura ok, não expirado e sessão ainda aberta.
    pub async fn validate_token(&self, token: &str) -> Result<Session, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let sessions = self.sessions.read().await;
        sessions
            .get(&token_data.claims.sid)
            .filter(|s| s.operator.email == token_data.claims.sub && s.expires_at > Utc::now())
            .cloned()
            .ok_or(AppError::InvalidToken)
    }

    /// Remove as sessões vencidas e devolve seus ids.
    pub async fn expire_sessions(&self) -> Vec<Uuid> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.expires_at <= now)
            .map(|s| s.id)
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    pub async fn logout(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id);
        if let Some(session) = &removed {
            tracing::info!("👋 Sessão encerrada para {}", session.operator.email);
        }
        removed.is_some()
    }
}
