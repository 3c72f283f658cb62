// src/config/settings.rs

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use chrono::FixedOffset;
use reqwest::Url;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    // (e-mail, senha em texto) dos operadores
    pub operator_credentials: Vec<(String, String)>,
    pub webhook_url: Option<Url>,
    pub fixture_path: Option<PathBuf>,
    pub webhook_timeout: Option<Duration>,
    pub page_size: usize,
    pub business_offset: FixedOffset,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Separado de `from_env` para os testes não mexerem no ambiente do processo
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let credentials = var("OPERATOR_CREDENTIALS").context("OPERATOR_CREDENTIALS deve ser definido")?;

        let webhook_url = var("MEMBERSHIP_WEBHOOK_URL")
            .map(|raw| Url::parse(&raw).with_context(|| format!("MEMBERSHIP_WEBHOOK_URL inválida: {raw}")))
            .transpose()?;

        let page_size: usize = parse_or(&var, "PAGE_SIZE", 5)?;
        if page_size == 0 {
            bail!("PAGE_SIZE deve ser maior que zero");
        }

        let offset_hours: i32 = parse_or(&var, "BUSINESS_UTC_OFFSET_HOURS", 0)?;
        let business_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| anyhow!("BUSINESS_UTC_OFFSET_HOURS fora do intervalo: {offset_hours}"))?;

        let webhook_timeout = var("WEBHOOK_TIMEOUT_SECS")
            .map(|raw| raw.parse::<u64>().with_context(|| format!("WEBHOOK_TIMEOUT_SECS inválido: {raw}")))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            jwt_secret,
            session_ttl_hours: parse_or(&var, "SESSION_TTL_HOURS", 12)?,
            operator_credentials: parse_credentials(&credentials)?,
            webhook_url,
            fixture_path: var("CUSTOMER_FIXTURE_PATH").map(PathBuf::from),
            webhook_timeout,
            page_size,
            business_offset,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} inválido: {raw}")),
        None => Ok(default),
    }
}

/// `email:senha;email:senha`. A senha pode conter `:`.
fn parse_credentials(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    let pairs = raw
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (email, password) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("credencial sem ':' em OPERATOR_CREDENTIALS"))?;
            if email.trim().is_empty() || password.is_empty() {
                bail!("credencial incompleta em OPERATOR_CREDENTIALS");
            }
            Ok((email.trim().to_string(), password.to_string()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if pairs.is_empty() {
        bail!("OPERATOR_CREDENTIALS não tem nenhum operador");
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("JWT_SECRET", "segredo"),
        ("OPERATOR_CREDENTIALS", "ana@empresa.pe:abc:123;luis@empresa.pe:xyz"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_missing() {
        let settings = load(&REQUIRED).unwrap();

        assert_eq!(settings.bind_addr, "0.0.0.0:3000");
        assert_eq!(settings.session_ttl_hours, 12);
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.business_offset.local_minus_utc(), 0);
        assert!(settings.webhook_url.is_none());
        assert!(settings.webhook_timeout.is_none());
        assert_eq!(
            settings.operator_credentials,
            vec![
                ("ana@empresa.pe".to_string(), "abc:123".to_string()),
                ("luis@empresa.pe".to_string(), "xyz".to_string()),
            ]
        );
    }

    #[test]
    fn optional_vars_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("MEMBERSHIP_WEBHOOK_URL", "https://hooks.example.com/webhook/memberships"),
            ("WEBHOOK_TIMEOUT_SECS", "15"),
            ("PAGE_SIZE", "10"),
            ("BUSINESS_UTC_OFFSET_HOURS", "-5"),
        ]);
        let settings = load(&vars).unwrap();

        assert_eq!(settings.webhook_url.unwrap().host_str(), Some("hooks.example.com"));
        assert_eq!(settings.webhook_timeout, Some(Duration::from_secs(15)));
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.business_offset.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn missing_or_invalid_values_fail_startup() {
        assert!(load(&[("JWT_SECRET", "x")]).is_err());

        let mut zero_page = REQUIRED.to_vec();
        zero_page.push(("PAGE_SIZE", "0"));
        assert!(load(&zero_page).is_err());

        assert!(load(&[("JWT_SECRET", "x"), ("OPERATOR_CREDENTIALS", "sem-separador")]).is_err());
    }
}
