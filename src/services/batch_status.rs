// src/services/batch_status.rs
//
// Ativação/desativação em lote via webhook. O servidor remoto não é
// atômico: pode aplicar só parte das placas, então a reconciliação local
// é feita placa a placa.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::{
    common::error::AppError,
    models::customer::{AccountStatus, Customer, Reconciliation, ReconciliationKind},
};

/// Formatos de resposta 2xx que o webhook devolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateReply {
    /// `{success: [..], error: [..]}`
    PerItem { succeeded: Vec<String>, failed: Vec<String> },
    /// `{success: bool, message?: ..}`
    Flag { ok: bool, message: Option<String> },
    /// Nenhum formato reconhecível
    NoOp,
}

impl StatusUpdateReply {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(_) => StatusUpdateReply::NoOp,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value.get("success") {
            Some(Value::Array(succeeded)) => StatusUpdateReply::PerItem {
                succeeded: plate_list(succeeded),
                failed: value
                    .get("error")
                    .and_then(Value::as_array)
                    .map(|failed| plate_list(failed))
                    .unwrap_or_default(),
            },
            Some(Value::Bool(ok)) => StatusUpdateReply::Flag {
                ok: *ok,
                message: text_field(value, "message").or_else(|| text_field(value, "error")),
            },
            _ => StatusUpdateReply::NoOp,
        }
    }
}

fn plate_list(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(|plate| plate.trim().to_string())
        .filter(|plate| !plate.is_empty())
        .collect()
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Mensagem de erro de uma resposta não-2xx: `message`, depois `error`,
/// depois o corpo cru; por último, uma mensagem genérica.
pub fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = text_field(&value, "message").or_else(|| text_field(&value, "error")) {
            return message;
        }
    }

    let raw = body.trim();
    if raw.is_empty() {
        format!("server error {status}")
    } else {
        raw.to_string()
    }
}

/// Placas (chave externa do webhook) dos clientes selecionados, na ordem da
/// coleção e sem repetição. Placas em branco são ignoradas.
pub fn resolve_plates(customers: &[Customer], selected: &BTreeSet<i64>) -> Result<Vec<String>, AppError> {
    if selected.is_empty() {
        return Err(AppError::EmptySelection);
    }

    let mut seen = HashSet::new();
    let plates: Vec<String> = customers
        .iter()
        .filter(|c| selected.contains(&c.id))
        .map(|c| c.license_plate.trim())
        .filter(|plate| !plate.is_empty())
        .filter(|plate| seen.insert(plate.to_string()))
        .map(str::to_string)
        .collect();

    if plates.is_empty() {
        return Err(AppError::NoResolvablePlates);
    }
    Ok(plates)
}

/// Aplica o resultado remoto na coleção local. Só clientes selecionados são
/// tocados.
pub fn reconcile(
    customers: &mut [Customer],
    selected: &BTreeSet<i64>,
    requested_plates: &[String],
    reply: StatusUpdateReply,
    target: AccountStatus,
) -> Reconciliation {
    let target_active = target.is_active();

    match reply {
        StatusUpdateReply::PerItem { succeeded, failed } => {
            // Placas que não foram pedidas não entram no relatório
            let requested: HashSet<&str> = requested_plates.iter().map(String::as_str).collect();
            let succeeded: Vec<String> =
                succeeded.into_iter().filter(|p| requested.contains(p.as_str())).collect();
            let failed: Vec<String> =
                failed.into_iter().filter(|p| requested.contains(p.as_str())).collect();

            if succeeded.is_empty() && failed.is_empty() {
                return no_changes(target);
            }

            let accepted: HashSet<&str> = succeeded.iter().map(String::as_str).collect();
            let updated_ids = apply(customers, target_active, |c| {
                selected.contains(&c.id) && accepted.contains(c.license_plate.trim())
            });

            let kind = match (succeeded.is_empty(), failed.is_empty()) {
                (false, true) => ReconciliationKind::Applied,
                (true, false) => ReconciliationKind::Rejected,
                _ => ReconciliationKind::Partial,
            };

            Reconciliation {
                kind,
                target_status: target,
                updated_ids,
                succeeded_count: succeeded.len(),
                failed_count: failed.len(),
                succeeded,
                failed,
                message: None,
            }
        }
        StatusUpdateReply::Flag { ok: true, message } => {
            let updated_ids = apply(customers, target_active, |c| selected.contains(&c.id));
            Reconciliation {
                kind: ReconciliationKind::Applied,
                target_status: target,
                updated_ids,
                succeeded_count: requested_plates.len(),
                failed_count: 0,
                succeeded: requested_plates.to_vec(),
                failed: Vec::new(),
                message,
            }
        }
        StatusUpdateReply::Flag { ok: false, message } => Reconciliation {
            kind: ReconciliationKind::Rejected,
            target_status: target,
            updated_ids: Vec::new(),
            succeeded_count: 0,
            failed_count: requested_plates.len(),
            succeeded: Vec::new(),
            failed: requested_plates.to_vec(),
            message: Some(message.unwrap_or_else(|| "rechazado por el servidor".to_string())),
        },
        StatusUpdateReply::NoOp => no_changes(target),
    }
}

fn apply<F>(customers: &mut [Customer], target_active: bool, should_apply: F) -> Vec<i64>
where
    F: Fn(&Customer) -> bool,
{
    customers
        .iter_mut()
        .filter(|c| should_apply(c))
        .map(|c| {
            c.is_active = target_active;
            c.id
        })
        .collect()
}

fn no_changes(target: AccountStatus) -> Reconciliation {
    Reconciliation {
        kind: ReconciliationKind::NoChanges,
        target_status: target,
        updated_ids: Vec::new(),
        succeeded: Vec::new(),
        failed: Vec::new(),
        succeeded_count: 0,
        failed_count: 0,
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer(id: i64, plate: &str, active: bool) -> Customer {
        serde_json::from_value(json!({
            "id": id,
            "customer_name": format!("CLIENTE {id}"),
            "license_plate": plate,
            "is_active": active,
        }))
        .unwrap()
    }

    fn selection(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    fn plates(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn reply_shapes_are_told_apart() {
        assert_eq!(
            StatusUpdateReply::from_body(r#"{"success":["P1"],"error":["P2"]}"#),
            StatusUpdateReply::PerItem { succeeded: plates(&["P1"]), failed: plates(&["P2"]) }
        );
        assert_eq!(
            StatusUpdateReply::from_body(r#"{"success":["P1"]}"#),
            StatusUpdateReply::PerItem { succeeded: plates(&["P1"]), failed: vec![] }
        );
        assert_eq!(
            StatusUpdateReply::from_body(r#"{"success":false,"error":"placa bloqueada"}"#),
            StatusUpdateReply::Flag { ok: false, message: Some("placa bloqueada".into()) }
        );
        assert_eq!(
            StatusUpdateReply::from_body(r#"{"success":true}"#),
            StatusUpdateReply::Flag { ok: true, message: None }
        );
        assert_eq!(StatusUpdateReply::from_body(r#"{"ok":1}"#), StatusUpdateReply::NoOp);
        assert_eq!(StatusUpdateReply::from_body("Workflow was started"), StatusUpdateReply::NoOp);
        assert_eq!(StatusUpdateReply::from_body(""), StatusUpdateReply::NoOp);
    }

    #[test]
    fn error_message_extraction_order() {
        assert_eq!(extract_error_message(500, r#"{"message":"m","error":"e"}"#), "m");
        assert_eq!(extract_error_message(500, r#"{"error":"e"}"#), "e");
        assert_eq!(extract_error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(extract_error_message(503, "   "), "server error 503");
        assert_eq!(extract_error_message(404, r#"{"code":404}"#), r#"{"code":404}"#);
    }

    #[test]
    fn empty_selection_is_rejected_locally() {
        let customers = vec![customer(1, "P1", true)];
        assert!(matches!(
            resolve_plates(&customers, &BTreeSet::new()),
            Err(AppError::EmptySelection)
        ));
    }

    #[test]
    fn selection_without_plates_fails_fast() {
        let customers = vec![customer(1, "  ", true), customer(2, "P2", true)];
        assert!(matches!(
            resolve_plates(&customers, &selection(&[1, 99])),
            Err(AppError::NoResolvablePlates)
        ));
    }

    #[test]
    fn plates_follow_collection_order_without_duplicates() {
        let customers = vec![
            customer(1, "P1", true),
            customer(2, "P2", true),
            customer(3, "P1", true),
        ];
        let resolved = resolve_plates(&customers, &selection(&[3, 2, 1])).unwrap();
        assert_eq!(resolved, plates(&["P1", "P2"]));
    }

    #[test]
    fn per_item_reply_updates_only_succeeded_plates() {
        let mut customers = vec![customer(1, "P1", true), customer(2, "P2", true), customer(3, "P3", true)];
        let selected = selection(&[1, 2]);
        let reply = StatusUpdateReply::PerItem { succeeded: plates(&["P1"]), failed: plates(&["P2"]) };

        let report = reconcile(&mut customers, &selected, &plates(&["P1", "P2"]), reply, AccountStatus::Inactive);

        assert!(!customers[0].is_active);
        assert!(customers[1].is_active);
        assert!(customers[2].is_active);
        assert_eq!(report.kind, ReconciliationKind::Partial);
        assert_eq!((report.succeeded_count, report.failed_count), (1, 1));
        assert_eq!(report.updated_ids, vec![1]);
        assert_eq!(report.failed, plates(&["P2"]));
    }

    #[test]
    fn per_item_success_never_touches_unselected_rows() {
        let mut customers = vec![customer(1, "P1", false), customer(2, "P1", false)];
        let reply = StatusUpdateReply::PerItem { succeeded: plates(&["P1"]), failed: vec![] };

        let report = reconcile(&mut customers, &selection(&[1]), &plates(&["P1"]), reply, AccountStatus::Active);

        assert_eq!(report.kind, ReconciliationKind::Applied);
        assert!(customers[0].is_active);
        assert!(!customers[1].is_active);
    }

    #[test]
    fn plates_that_were_not_requested_are_ignored() {
        let mut customers = vec![customer(1, "P1", true), customer(2, "PX", true)];
        let reply = StatusUpdateReply::PerItem {
            succeeded: plates(&["P1", "PX"]),
            failed: plates(&["PY"]),
        };

        let report = reconcile(&mut customers, &selection(&[1, 2]), &plates(&["P1"]), reply, AccountStatus::Inactive);

        assert_eq!(report.kind, ReconciliationKind::Applied);
        assert_eq!((report.succeeded_count, report.failed_count), (1, 0));
        assert_eq!(report.succeeded, plates(&["P1"]));
        assert_eq!(report.updated_ids, vec![1]);
        assert!(customers[1].is_active);
    }

    #[test]
    fn flag_true_applies_to_every_selected_customer() {
        let mut customers = vec![customer(1, "P1", true), customer(2, "P2", true), customer(3, "P3", true)];
        let reply = StatusUpdateReply::Flag { ok: true, message: None };

        let report = reconcile(&mut customers, &selection(&[1, 3]), &plates(&["P1", "P3"]), reply, AccountStatus::Inactive);

        assert_eq!(report.kind, ReconciliationKind::Applied);
        assert_eq!(report.updated_ids, vec![1, 3]);
        assert!(!customers[0].is_active && customers[1].is_active && !customers[2].is_active);
        assert_eq!(report.succeeded_count, 2);
    }

    #[test]
    fn flag_false_changes_nothing_and_reports_reason() {
        let mut customers = vec![customer(1, "P1", true)];
        let before = customers.clone();
        let reply = StatusUpdateReply::Flag { ok: false, message: Some("sin permisos".into()) };

        let report = reconcile(&mut customers, &selection(&[1]), &plates(&["P1"]), reply, AccountStatus::Inactive);

        assert_eq!(customers, before);
        assert_eq!(report.kind, ReconciliationKind::Rejected);
        assert_eq!(report.message.as_deref(), Some("sin permisos"));
        assert_eq!(report.failed_count, 1);
    }

    #[test]
    fn unrecognised_reply_is_a_neutral_no_op() {
        let mut customers = vec![customer(1, "P1", true)];
        let before = customers.clone();

        for reply in [
            StatusUpdateReply::NoOp,
            StatusUpdateReply::PerItem { succeeded: vec![], failed: vec![] },
        ] {
            let report = reconcile(&mut customers, &selection(&[1]), &plates(&["P1"]), reply, AccountStatus::Inactive);
            assert_eq!(report.kind, ReconciliationKind::NoChanges);
            assert!(report.updated_ids.is_empty());
        }
        assert_eq!(customers, before);
    }
}
