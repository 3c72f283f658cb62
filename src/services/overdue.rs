// src/services/overdue.rs
//
// Classificação de atraso de pagamento. Funções puras: a data de
// referência ("hoje") sempre vem de quem chama.

use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime};

use crate::models::customer::{Customer, OverdueStatus, PaymentSeverity};

/// Converte a data do webhook para o dia-calendário no fuso do negócio.
/// Aceita RFC 3339, data-hora sem fuso e `YYYY-MM-DD`. Qualquer outra coisa é None.
pub fn parse_payment_date(raw: &str, offset: FixedOffset) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(moment) = DateTime::parse_from_rfc3339(raw) {
        return Some(moment.with_timezone(&offset).date_naive());
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Meses-calendário completos entre o vencimento e hoje.
/// Um mês só conta quando o dia do mês é alcançado (23/01 -> 22/02 = 0).
pub fn months_overdue(due: NaiveDate, today: NaiveDate) -> u32 {
    if due >= today {
        return 0;
    }

    let mut months = (today.year() - due.year()) * 12 + today.month() as i32 - due.month() as i32;
    while months > 0 {
        match due.checked_add_months(Months::new(months as u32)) {
            Some(anniversary) if anniversary <= today => break,
            _ => months -= 1,
        }
    }

    months.max(0) as u32
}

pub fn classify(next_payment: Option<NaiveDate>, pending_count: u32, today: NaiveDate) -> OverdueStatus {
    let (months, severity, label) = match next_payment {
        None => (0, PaymentSeverity::Invalid, "Fecha Inválida".to_string()),
        Some(due) => {
            let months = months_overdue(due, today);
            let (severity, label) = match months {
                0 => (PaymentSeverity::Current, "Al día".to_string()),
                1 => (PaymentSeverity::Overdue1, "1 mes venc.".to_string()),
                2 => (PaymentSeverity::Overdue2, "2 meses venc.".to_string()),
                n => (PaymentSeverity::Overdue3Plus, format!("{n} meses venc.")),
            };
            (months, severity, label)
        }
    };

    let label = if pending_count > 0 {
        format!("{label} ({pending_count} pend.)")
    } else {
        label
    };

    OverdueStatus { months_overdue: months, label, severity }
}

/// Atalho usado pela listagem e pelo filtro. `is_active` não participa.
pub fn classify_customer(customer: &Customer, today: NaiveDate, offset: FixedOffset) -> OverdueStatus {
    let due = customer
        .date_next_payment
        .as_deref()
        .and_then(|raw| parse_payment_date(raw, offset));
    classify(due, customer.nv_pendings, today)
}
