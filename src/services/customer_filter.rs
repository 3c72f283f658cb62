// src/services/customer_filter.rs

use chrono::{FixedOffset, NaiveDate};

use crate::{
    models::customer::{Customer, OverdueFilter},
    services::overdue::classify_customer,
};

// Busca: nome ou placa sem diferenciar maiúsculas; código do cliente por substring.
pub fn matches_search(customer: &Customer, search_term: &str) -> bool {
    if search_term.is_empty() {
        return true;
    }
    let needle = search_term.to_lowercase();
    customer.customer_name.to_lowercase().contains(&needle)
        || customer.license_plate.to_lowercase().contains(&needle)
        || customer.customer_id.contains(search_term)
}

pub fn matches_overdue(
    customer: &Customer,
    filter: OverdueFilter,
    today: NaiveDate,
    offset: FixedOffset,
) -> bool {
    if filter == OverdueFilter::All {
        return true;
    }

    // Data inválida conta como 0 meses, igual ao "em dia"
    let months = classify_customer(customer, today, offset).months_overdue;
    let active = customer.is_active;

    match filter {
        OverdueFilter::All => true,
        OverdueFilter::OnTime => months == 0 && active,
        OverdueFilter::Due => months == 0 && !active,
        OverdueFilter::OneMonth => months == 1 && active,
        OverdueFilter::TwoMonths => months == 2 && active,
        OverdueFilter::ThreePlus => months >= 3 && active,
        OverdueFilter::Inactive => !active,
    }
}

/// Filtro estável (mantém a ordem original). Sem `today` o filtro de atraso
/// é ignorado e só a busca se aplica.
pub fn filter_customers<'a>(
    customers: &'a [Customer],
    search_term: &str,
    filter: OverdueFilter,
    today: Option<NaiveDate>,
    offset: FixedOffset,
) -> Vec<&'a Customer> {
    customers
        .iter()
        .filter(|c| matches_search(c, search_term))
        .filter(|c| match today {
            Some(today) => matches_overdue(c, filter, today, offset),
            None => true,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Fatia pura. Zero itens => zero páginas; página pedida fora do intervalo é ajustada.
pub fn paginate<T>(items: Vec<T>, requested_page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let page = requested_page.clamp(1, total_pages.max(1));

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page { items, page, page_size, total_items, total_pages }
}
