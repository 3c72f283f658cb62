// src/clients/fixture.rs
//
// Fonte estática de clientes: arquivo JSON ou a coleção de demonstração.
// Usada quando nenhum webhook está configurado (desenvolvimento e testes).

use std::{collections::HashSet, path::Path};

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, Months, NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::{
    clients::membership::MembershipSource,
    common::error::AppError,
    models::customer::{AccountStatus, Customer},
    services::batch_status::StatusUpdateReply,
};

pub struct FixtureMembershipSource {
    customers: RwLock<Vec<Customer>>,
}

impl FixtureMembershipSource {
    pub fn new(customers: Vec<Customer>) -> Self {
        Self { customers: RwLock::new(customers) }
    }

    /// Aceita um array de clientes ou o envelope `{success, data}` do webhook.
    /// Aqui o `is_active` do arquivo é respeitado.
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let body: Value = serde_json::from_str(&raw)?;
        let records = match body {
            Value::Array(records) => Value::Array(records),
            Value::Object(mut envelope) => envelope.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        let customers: Vec<Customer> = serde_json::from_value(records)?;

        tracing::info!("📄 {} clientes carregados de {}", customers.len(), path.display());
        Ok(Self::new(customers))
    }

    /// Clientes de demonstração com datas relativas ao dia informado.
    pub fn demo(today: NaiveDate, offset: FixedOffset) -> Self {
        let at_noon = |date: NaiveDate| {
            date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default())
                .and_local_timezone(offset)
                .single()
                .map(|moment| moment.to_rfc3339())
        };
        let months_ago = |n: u32| today.checked_sub_months(Months::new(n)).and_then(at_noon);
        let days_from_today = |n: i64| today.checked_add_signed(Duration::days(n)).and_then(at_noon);

        let records = vec![
            json!({
                "id": 399, "customer_name": "CHOQUEHUANCA NUÑEZ ROCIO MILAGROS", "customer_id": "191",
                "license_plate": "X4V-928", "date_init": "2023-03-30T22:00:00.000Z",
                "date_next_payment": days_from_today(30), "type_period": "year", "count_period": 1,
                "value": "432", "total": 0, "apply_notyfication": 1, "phones": "[\"981900200\"]",
                "created_at": "2023-04-30T10:34:26.000Z", "updated_at": "2023-04-30T10:34:26.000Z",
                "nv_pendings": 0, "is_active": true
            }),
            json!({
                "id": 400, "customer_name": "PEREZ GONZALES JUAN CARLOS", "customer_id": "205",
                "license_plate": "A1B-123", "date_init": "2023-01-15T10:00:00.000Z",
                "date_next_payment": months_ago(4), "type_period": "year", "count_period": 1,
                "value": "500", "total": 0, "apply_notyfication": 1,
                "phones": "[\"999888777\", \"911222333\"]",
                "created_at": "2023-01-10T09:20:15.000Z", "updated_at": "2023-06-01T11:45:00.000Z",
                "nv_pendings": 2, "is_active": true
            }),
            json!({
                "id": 401, "customer_name": "RAMIREZ LOPEZ ANA SOFIA", "customer_id": "310",
                "license_plate": "C2D-456", "date_init": "2024-07-01T14:30:00.000Z",
                "date_next_payment": months_ago(1), "type_period": "month", "count_period": 1,
                "value": "150", "total": 0, "apply_notyfication": 0, "phones": "[\"977666555\"]",
                "created_at": "2024-06-25T18:00:42.000Z", "updated_at": "2024-06-25T18:00:42.000Z",
                "nv_pendings": 0, "is_active": true
            }),
            json!({
                "id": 402, "customer_name": "TORRES VARGAS LUIS MIGUEL", "customer_id": "415",
                "license_plate": "E3F-789", "date_init": "2023-11-10T08:00:00.000Z",
                "date_next_payment": months_ago(8), "type_period": "year", "count_period": 1,
                "value": "380", "total": 0, "apply_notyfication": 1, "phones": "[\"966555444\"]",
                "created_at": "2023-11-05T12:10:55.000Z", "updated_at": "2023-11-05T12:10:55.000Z",
                "nv_pendings": 1, "is_active": false
            }),
            json!({
                "id": 403, "customer_name": "GUTIERREZ FLORES MARIA ELENA", "customer_id": "520",
                "license_plate": "G4H-012", "date_init": "2024-02-20T16:45:00.000Z",
                "date_next_payment": days_from_today(90), "type_period": "year", "count_period": 1,
                "value": "600", "total": 0, "apply_notyfication": 1,
                "phones": "[\"955444333\", \"944333222\"]",
                "created_at": "2024-02-18T11:30:10.000Z", "updated_at": "2024-02-18T11:30:10.000Z",
                "nv_pendings": 0, "is_active": true
            }),
            json!({
                "id": 404, "customer_name": "DIAZ MENDOZA CARLOS ALBERTO", "customer_id": "625",
                "license_plate": "I5J-345", "date_init": "2024-05-05T09:15:00.000Z",
                "date_next_payment": months_ago(2), "type_period": "month", "count_period": 1,
                "value": "120", "total": 0, "apply_notyfication": 0, "phones": "[\"933222111\"]",
                "created_at": "2024-05-01T15:20:30.000Z", "updated_at": "2024-05-01T15:20:30.000Z",
                "nv_pendings": 0, "is_active": true
            }),
            json!({
                "id": 405, "customer_name": "QUISPE LIMA SANDRA PATRICIA", "customer_id": "730",
                "license_plate": "K6L-678", "date_init": "2024-08-01T11:00:00.000Z",
                "date_next_payment": days_from_today(-15), "type_period": "month", "count_period": 1,
                "value": "100", "total": 0, "apply_notyfication": 1, "phones": "[\"922111000\"]",
                "created_at": "2024-07-28T10:05:00.000Z", "updated_at": "2024-07-28T10:05:00.000Z",
                "nv_pendings": 1, "is_active": true
            }),
        ];

        let customers = records
            .into_iter()
            .filter_map(|record| serde_json::from_value(record).ok())
            .collect();
        Self::new(customers)
    }
}

#[async_trait]
impl MembershipSource for FixtureMembershipSource {
    async fn fetch_memberships(&self) -> Vec<Customer> {
        self.customers.read().await.clone()
    }

    // Simula o webhook: placas conhecidas têm sucesso, desconhecidas falham.
    async fn set_status_by_plate(
        &self,
        plates: &[String],
        target: AccountStatus,
    ) -> Result<StatusUpdateReply, AppError> {
        let mut customers = self.customers.write().await;
        let known: HashSet<String> = customers.iter().map(|c| c.license_plate.clone()).collect();

        let (succeeded, failed): (Vec<String>, Vec<String>) =
            plates.iter().cloned().partition(|plate| known.contains(plate));

        for customer in customers.iter_mut().filter(|c| succeeded.contains(&c.license_plate)) {
            customer.is_active = target.is_active();
        }

        Ok(StatusUpdateReply::PerItem { succeeded, failed })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
