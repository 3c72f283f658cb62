// src/common/format.rs

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

// Valores monetários são exibidos em soles (PEN), formato es-PE.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}S/ {grouped}.{fraction}")
}

/// "1 año(s)", "3 mes(es)", "15 día(s)".
pub fn describe_period(type_period: Option<&str>, count_period: Option<i64>) -> Option<String> {
    let count = count_period?;
    let unit = match type_period? {
        "year" => "año(s)",
        "month" => "mes(es)",
        _ => "día(s)",
    };
    Some(format!("{count} {unit}"))
}

// O campo `phones` chega como uma string com um array JSON dentro.
pub fn parse_phones(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(phone) => Some(phone),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn currency_groups_thousands_and_keeps_two_decimals() {
        assert_eq!(format_currency(Decimal::from(432)), "S/ 432.00");
        assert_eq!(format_currency(Decimal::from_str("1234567.5").unwrap()), "S/ 1,234,567.50");
        assert_eq!(format_currency(Decimal::from_str("-12.345").unwrap()), "-S/ 12.35");
    }

    #[test]
    fn period_description_by_unit() {
        assert_eq!(describe_period(Some("year"), Some(1)).as_deref(), Some("1 año(s)"));
        assert_eq!(describe_period(Some("month"), Some(3)).as_deref(), Some("3 mes(es)"));
        assert_eq!(describe_period(Some("day"), Some(15)).as_deref(), Some("15 día(s)"));
        assert_eq!(describe_period(None, Some(1)), None);
    }

    #[test]
    fn phones_tolerate_garbage() {
        assert_eq!(parse_phones(r#"["999888777", "911222333"]"#), vec!["999888777", "911222333"]);
        assert_eq!(parse_phones("[981900200]"), vec!["981900200"]);
        assert!(parse_phones("not json").is_empty());
        assert!(parse_phones(r#"{"a": 1}"#).is_empty());
    }
}
