// src/models/customer.rs

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::common::error::AppError;

// --- CLIENTE (espelha o registro do webhook de assinaturas) ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Customer {
    #[schema(example = 399)]
    pub id: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(example = "CHOQUEHUANCA NUÑEZ ROCIO MILAGROS")]
    pub customer_name: String,

    // Às vezes chega como número
    #[serde(default, deserialize_with = "string_or_number")]
    #[schema(example = "191")]
    pub customer_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(example = "X4V-928")]
    pub license_plate: String,

    #[serde(default)]
    pub date_init: Option<String>,

    // Âncora do cálculo de atraso. Nunca guardamos o atraso em si.
    #[serde(default)]
    #[schema(example = "2025-01-23T05:00:00.000Z")]
    pub date_next_payment: Option<String>,

    #[serde(default)]
    #[schema(example = "year")]
    pub type_period: Option<String>,

    #[serde(default)]
    pub count_period: Option<i64>,

    // Texto decimal ou número; só para exibição
    #[serde(default, deserialize_with = "lenient_amount")]
    #[schema(value_type = Option<f64>, example = 432)]
    pub value: Option<Decimal>,

    #[serde(default, deserialize_with = "lenient_amount")]
    #[schema(value_type = Option<f64>, example = 0)]
    pub total: Option<Decimal>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub apply_notyfication: i64,

    // Array JSON serializado como string, ex: "[\"981900200\"]"
    #[serde(default, deserialize_with = "null_as_default")]
    pub phones: String,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub nv_pendings: u32,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

// Valor inválido vira None em vez de derrubar o registro inteiro.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let parse = |raw: &str| {
        let raw = raw.trim();
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .ok()
    };

    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => parse(&s),
        Value::Number(n) => parse(&n.to_string()),
        _ => None,
    })
}

// --- STATUS ---

/// Situação da conta. Dimensão independente da situação de pagamento.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn from_flag(is_active: bool) -> Self {
        if is_active { AccountStatus::Active } else { AccountStatus::Inactive }
    }

    pub fn is_active(self) -> bool {
        self == AccountStatus::Active
    }

    /// Valor esperado pelo webhook em `target_status`.
    pub fn as_param(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum PaymentSeverity {
    #[serde(rename = "invalid")]
    Invalid,
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "overdue-1")]
    Overdue1,
    #[serde(rename = "overdue-2")]
    Overdue2,
    #[serde(rename = "overdue-3plus")]
    Overdue3Plus,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverdueStatus {
    pub months_overdue: u32,
    #[schema(example = "2 meses venc. (1 pend.)")]
    pub label: String,
    pub severity: PaymentSeverity,
}

// --- FILTRO DE ATRASO ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverdueFilter {
    #[default]
    All,
    OnTime,
    Due,
    OneMonth,
    TwoMonths,
    ThreePlus,
    Inactive,
}

impl OverdueFilter {
    pub fn key(self) -> &'static str {
        match self {
            OverdueFilter::All => "all",
            OverdueFilter::OnTime => "ontime",
            OverdueFilter::Due => "due",
            OverdueFilter::OneMonth => "1",
            OverdueFilter::TwoMonths => "2",
            OverdueFilter::ThreePlus => "3plus",
            OverdueFilter::Inactive => "inactive",
        }
    }
}

impl FromStr for OverdueFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(OverdueFilter::All),
            "ontime" => Ok(OverdueFilter::OnTime),
            "due" => Ok(OverdueFilter::Due),
            "1" => Ok(OverdueFilter::OneMonth),
            "2" => Ok(OverdueFilter::TwoMonths),
            "3plus" => Ok(OverdueFilter::ThreePlus),
            "inactive" => Ok(OverdueFilter::Inactive),
            other => Err(AppError::UnknownFilter(other.to_string())),
        }
    }
}

impl fmt::Display for OverdueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for OverdueFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

// --- RESPOSTAS DA API ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRow {
    #[serde(flatten)]
    pub customer: Customer,
    pub account_status: AccountStatus,
    // None enquanto a data de referência não foi capturada
    pub payment_status: Option<OverdueStatus>,
    pub selected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListResponse {
    pub items: Vec<CustomerRow>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub search: String,
    #[schema(value_type = String, example = "3plus")]
    pub filter: OverdueFilter,
    pub overdue_filter_available: bool,
    #[schema(value_type = Option<String>, format = Date)]
    pub today: Option<NaiveDate>,
    pub selected_count: usize,
    pub all_visible_selected: bool,
    pub some_visible_selected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub account_status: AccountStatus,
    pub payment_status: Option<OverdueStatus>,
    #[schema(value_type = Option<String>, format = Date)]
    pub next_payment_date: Option<NaiveDate>,
    pub phone_list: Vec<String>,
    #[schema(example = "1 año(s)")]
    pub period_description: Option<String>,
    #[schema(example = "S/ 432.00")]
    pub formatted_value: Option<String>,
    pub formatted_total: Option<String>,
    pub notifications_enabled: bool,
    pub selected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub selected_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub loaded: usize,
    #[schema(value_type = Option<String>, format = Date)]
    pub today: Option<NaiveDate>,
}

/// Resultado da reconciliação de um lote de ativação/desativação.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub kind: ReconciliationKind,
    pub target_status: AccountStatus,
    // Ids locais efetivamente alterados
    pub updated_ids: Vec<i64>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReconciliationKind {
    /// Todas as placas pedidas foram aplicadas
    Applied,
    /// Parte das placas falhou no servidor remoto
    Partial,
    /// O servidor recusou o lote inteiro
    Rejected,
    /// Resposta 2xx sem efeito atribuível
    NoChanges,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCustomersQuery {
    /// Nome, placa ou código do cliente
    pub search: Option<String>,
    /// all | ontime | due | 1 | 2 | 3plus | inactive
    pub filter: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = json!([399, 400]))]
    pub ids: Vec<i64>,
    pub selected: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisibleSelectionPayload {
    pub selected: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusPayload {
    #[schema(example = false)]
    pub active: bool,
}
