// src/services/customer_service.rs

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{FixedOffset, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    clients::MembershipSource,
    common::{
        error::AppError,
        format::{describe_period, format_currency, parse_phones},
    },
    models::customer::{
        AccountStatus, Customer, CustomerDetail, CustomerListResponse, CustomerRow,
        ListCustomersQuery, OverdueFilter, Reconciliation, RefreshResponse, SelectionResponse,
    },
    services::{
        batch_status::{reconcile, resolve_plates},
        customer_filter::{filter_customers, paginate, Page},
        overdue::{classify_customer, parse_payment_date},
    },
};

/// Fornece a data de referência ("hoje") no fuso do negócio.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

// Coleção carregada da fonte + o "hoje" capturado no momento da carga.
#[derive(Debug, Default)]
struct CustomerBook {
    customers: Vec<Customer>,
    today: Option<NaiveDate>,
}

// Estado de tela de cada sessão de operador.
#[derive(Debug, Clone)]
struct ViewState {
    search: String,
    filter: OverdueFilter,
    page: usize,
    selected: BTreeSet<i64>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search: String::new(),
            filter: OverdueFilter::All,
            page: 1,
            selected: BTreeSet::new(),
        }
    }
}

#[derive(Clone)]
pub struct CustomerService {
    source: Arc<dyn MembershipSource>,
    book: Arc<RwLock<CustomerBook>>,
    views: Arc<RwLock<HashMap<Uuid, ViewState>>>,
    // Atualização em lote e recarga não rodam em paralelo
    operation_gate: Arc<Mutex<()>>,
    page_size: usize,
    offset: FixedOffset,
    clock: Clock,
}

impl CustomerService {
    pub fn new(source: Arc<dyn MembershipSource>, page_size: usize, offset: FixedOffset) -> Self {
        let clock: Clock = Arc::new(move || Utc::now().with_timezone(&offset).date_naive());
        Self {
            source,
            book: Arc::new(RwLock::new(CustomerBook::default())),
            views: Arc::new(RwLock::new(HashMap::new())),
            operation_gate: Arc::new(Mutex::new(())),
            page_size: page_size.max(1),
            offset,
            clock,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    // =========================================================================
    //  CARGA
    // =========================================================================

    /// Recarrega a coleção e recaptura "hoje". Seleções ficam restritas aos
    /// ids que ainda existem.
    pub async fn refresh(&self) -> Result<RefreshResponse, AppError> {
        let _guard = self
            .operation_gate
            .try_lock()
            .map_err(|_| AppError::OperationInProgress)?;

        let customers = self.source.fetch_memberships().await;
        let today = (self.clock)();
        let loaded = customers.len();
        let present: BTreeSet<i64> = customers.iter().map(|c| c.id).collect();

        {
            let mut book = self.book.write().await;
            book.customers = customers;
            book.today = Some(today);
        }

        let mut views = self.views.write().await;
        for view in views.values_mut() {
            view.selected.retain(|id| present.contains(id));
        }

        tracing::info!(
            "🔄 {} clientes carregados da fonte '{}' (hoje = {})",
            loaded,
            self.source.name(),
            today
        );

        Ok(RefreshResponse { loaded, today: Some(today) })
    }

    // =========================================================================
    //  LISTAGEM E DETALHE
    // =========================================================================

    /// Mudar busca ou filtro volta para a página 1 e limpa a seleção.
    pub async fn list(
        &self,
        session: Uuid,
        query: ListCustomersQuery,
    ) -> Result<CustomerListResponse, AppError> {
        let filter = match query.filter.as_deref() {
            Some(raw) => Some(raw.parse::<OverdueFilter>()?),
            None => None,
        };

        let mut views = self.views.write().await;
        let view = views.entry(session).or_default();

        let search = query.search.map(|s| s.trim().to_string());
        let criteria_changed = search.as_ref().is_some_and(|s| *s != view.search)
            || filter.is_some_and(|f| f != view.filter);

        if let Some(search) = search {
            view.search = search;
        }
        if let Some(filter) = filter {
            view.filter = filter;
        }
        if criteria_changed {
            view.page = 1;
            view.selected.clear();
        }
        if let Some(page) = query.page {
            view.page = page;
        }

        let book = self.book.read().await;
        let page = self.visible_page(&book, view);
        view.page = page.page;

        let today = book.today;
        let items: Vec<CustomerRow> = page
            .items
            .iter()
            .map(|customer| CustomerRow {
                customer: (*customer).clone(),
                account_status: AccountStatus::from_flag(customer.is_active),
                payment_status: today.map(|today| classify_customer(customer, today, self.offset)),
                selected: view.selected.contains(&customer.id),
            })
            .collect();

        let visible_selected = items.iter().filter(|row| row.selected).count();

        Ok(CustomerListResponse {
            all_visible_selected: !items.is_empty() && visible_selected == items.len(),
            some_visible_selected: visible_selected > 0 && visible_selected < items.len(),
            items,
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages,
            search: view.search.clone(),
            filter: view.filter,
            overdue_filter_available: today.is_some(),
            today,
            selected_count: view.selected.len(),
        })
    }

    pub async fn detail(&self, session: Uuid, id: i64) -> Result<CustomerDetail, AppError> {
        let selected = self.is_selected(session, id).await;

        let book = self.book.read().await;
        let customer = book
            .customers
            .iter()
            .find(|c| c.id == id)
            .ok_or(AppError::CustomerNotFound(id))?;

        Ok(CustomerDetail {
            account_status: AccountStatus::from_flag(customer.is_active),
            payment_status: book
                .today
                .map(|today| classify_customer(customer, today, self.offset)),
            next_payment_date: customer
                .date_next_payment
                .as_deref()
                .and_then(|raw| parse_payment_date(raw, self.offset)),
            phone_list: parse_phones(&customer.phones),
            period_description: describe_period(customer.type_period.as_deref(), customer.count_period),
            formatted_value: customer.value.map(format_currency),
            formatted_total: customer.total.map(format_currency),
            notifications_enabled: customer.apply_notyfication == 1,
            selected,
            customer: customer.clone(),
        })
    }

    // =========================================================================
    //  SELEÇÃO
    // =========================================================================

    pub async fn selection(&self, session: Uuid) -> SelectionResponse {
        let views = self.views.read().await;
        let selected_ids = views
            .get(&session)
            .map(|view| view.selected.iter().copied().collect())
            .unwrap_or_default();
        SelectionResponse { selected_ids }
    }

    /// Marca ou desmarca ids. Um id desconhecido rejeita a operação inteira.
    pub async fn toggle_selection(
        &self,
        session: Uuid,
        ids: &[i64],
        selected: bool,
    ) -> Result<SelectionResponse, AppError> {
        {
            let book = self.book.read().await;
            if let Some(missing) = ids
                .iter()
                .find(|id| !book.customers.iter().any(|c| c.id == **id))
            {
                return Err(AppError::CustomerNotFound(*missing));
            }
        }

        let mut views = self.views.write().await;
        let view = views.entry(session).or_default();
        for id in ids {
            if selected {
                view.selected.insert(*id);
            } else {
                view.selected.remove(id);
            }
        }
        Ok(SelectionResponse { selected_ids: view.selected.iter().copied().collect() })
    }

    /// Marca ou desmarca todas as linhas da página atual.
    pub async fn select_visible(&self, session: Uuid, selected: bool) -> SelectionResponse {
        let mut views = self.views.write().await;
        let view = views.entry(session).or_default();

        let book = self.book.read().await;
        let visible: Vec<i64> = self.visible_page(&book, view).items.iter().map(|c| c.id).collect();

        for id in visible {
            if selected {
                view.selected.insert(id);
            } else {
                view.selected.remove(&id);
            }
        }
        SelectionResponse { selected_ids: view.selected.iter().copied().collect() }
    }

    pub async fn clear_selection(&self, session: Uuid) -> SelectionResponse {
        let mut views = self.views.write().await;
        if let Some(view) = views.get_mut(&session) {
            view.selected.clear();
        }
        SelectionResponse { selected_ids: Vec::new() }
    }

    pub async fn drop_session(&self, session: Uuid) {
        self.views.write().await.remove(&session);
    }

    /// Descarta o estado de tela de sessões que expiraram sem logout.
    pub async fn drop_sessions(&self, sessions: &[Uuid]) {
        if sessions.is_empty() {
            return;
        }
        let mut views = self.views.write().await;
        for session in sessions {
            views.remove(session);
        }
    }

    // =========================================================================
    //  ATIVAÇÃO / DESATIVAÇÃO EM LOTE
    // =========================================================================

    /// Aplica o status alvo aos clientes selecionados da sessão.
    /// Os ids enviados saem da seleção só quando o webhook responde 2xx.
    pub async fn set_selected_status(
        &self,
        session: Uuid,
        active: bool,
    ) -> Result<Reconciliation, AppError> {
        let _guard = self
            .operation_gate
            .try_lock()
            .map_err(|_| AppError::OperationInProgress)?;

        let target = AccountStatus::from_flag(active);
        let selected = {
            let views = self.views.read().await;
            views.get(&session).map(|v| v.selected.clone()).unwrap_or_default()
        };

        let plates = {
            let book = self.book.read().await;
            resolve_plates(&book.customers, &selected)?
        };

        tracing::info!(
            "📤 Enviando {} placa(s) para '{}' via {}",
            plates.len(),
            target.as_param(),
            self.source.name()
        );

        let reply = self.source.set_status_by_plate(&plates, target).await?;

        let report = {
            let mut book = self.book.write().await;
            reconcile(&mut book.customers, &selected, &plates, reply, target)
        };

        // Só sai da seleção o que foi enviado; marcações feitas durante a
        // chamada continuam valendo
        if let Some(view) = self.views.write().await.get_mut(&session) {
            view.selected.retain(|id| !selected.contains(id));
        }

        tracing::info!(
            "✅ Lote concluído ({:?}): {} ok, {} com falha",
            report.kind,
            report.succeeded_count,
            report.failed_count
        );

        Ok(report)
    }

    // =========================================================================
    //  AUXILIARES
    // =========================================================================

    fn visible_page<'a>(&self, book: &'a CustomerBook, view: &ViewState) -> Page<&'a Customer> {
        let matches = filter_customers(&book.customers, &view.search, view.filter, book.today, self.offset);
        paginate(matches, view.page, self.page_size)
    }

    async fn is_selected(&self, session: Uuid, id: i64) -> bool {
        self.views
            .read()
            .await
            .get(&session)
            .is_some_and(|view| view.selected.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::customer::ReconciliationKind,
        services::batch_status::StatusUpdateReply,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct MockSource {
        customers: Vec<Customer>,
        reply: Result<StatusUpdateReply, u16>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MembershipSource for MockSource {
        async fn fetch_memberships(&self) -> Vec<Customer> {
            self.customers.clone()
        }

        async fn set_status_by_plate(
            &self,
            _plates: &[String],
            _target: AccountStatus,
        ) -> Result<StatusUpdateReply, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(status) => Err(AppError::WebhookStatus {
                    status: *status,
                    message: "falha".into(),
                }),
            }
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn customer(id: i64, plate: &str, due: &str) -> Customer {
        serde_json::from_value(json!({
            "id": id,
            "customer_name": format!("CLIENTE {id}"),
            "customer_id": id.to_string(),
            "license_plate": plate,
            "date_next_payment": due,
            "value": "100",
            "type_period": "month",
            "count_period": 1,
            "phones": "[\"999888777\"]",
            "apply_notyfication": 1,
        }))
        .unwrap()
    }

    fn collection() -> Vec<Customer> {
        vec![
            customer(1, "P1", "2025-07-10"),
            customer(2, "P2", "2025-02-10"),
            customer(3, "P3", "2025-05-10"),
            customer(4, "P4", "2025-06-10"),
            customer(5, "P5", "2025-04-10"),
            customer(6, "P6", "2025-06-20"),
            customer(7, "P7", "2025-06-30"),
        ]
    }

    async fn service_with(reply: Result<StatusUpdateReply, u16>) -> (CustomerService, Arc<MockSource>) {
        let source = Arc::new(MockSource {
            customers: collection(),
            reply,
            calls: AtomicUsize::new(0),
        });
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let service = CustomerService::new(source.clone(), 5, FixedOffset::east_opt(0).unwrap())
            .with_clock(Arc::new(move || today));
        service.refresh().await.unwrap();
        (service, source)
    }

    fn query(search: Option<&str>, filter: Option<&str>, page: Option<usize>) -> ListCustomersQuery {
        ListCustomersQuery {
            search: search.map(str::to_string),
            filter: filter.map(str::to_string),
            page,
        }
    }

    #[tokio::test]
    async fn list_pages_and_classifies() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let session = Uuid::new_v4();

        let first = service.list(session, query(None, None, None)).await.unwrap();
        assert_eq!(first.items.len(), 5);
        assert_eq!((first.total_items, first.total_pages), (7, 2));
        assert!(first.overdue_filter_available);

        let second = service.list(session, query(None, None, Some(2))).await.unwrap();
        assert_eq!(second.items.iter().map(|r| r.customer.id).collect::<Vec<_>>(), vec![6, 7]);

        let overdue = service.list(session, query(None, Some("3plus"), None)).await.unwrap();
        assert_eq!(overdue.page, 1);
        assert_eq!(overdue.items.len(), 1);
        assert_eq!(overdue.items[0].payment_status.as_ref().unwrap().months_overdue, 4);
    }

    #[tokio::test]
    async fn unknown_filter_is_rejected() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let err = service.list(Uuid::new_v4(), query(None, Some("4"), None)).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownFilter(_)));
    }

    #[tokio::test]
    async fn changing_search_clears_selection() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let session = Uuid::new_v4();

        service.toggle_selection(session, &[1, 2], true).await.unwrap();
        let same = service.list(session, query(None, None, None)).await.unwrap();
        assert_eq!(same.selected_count, 2);
        assert!(same.some_visible_selected);

        let changed = service.list(session, query(Some("cliente 1"), None, None)).await.unwrap();
        assert_eq!(changed.selected_count, 0);
    }

    #[tokio::test]
    async fn select_visible_only_touches_current_page() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let session = Uuid::new_v4();

        service.list(session, query(None, None, Some(2))).await.unwrap();
        let selection = service.select_visible(session, true).await;
        assert_eq!(selection.selected_ids, vec![6, 7]);

        let page = service.list(session, query(None, None, None)).await.unwrap();
        assert!(page.all_visible_selected);
    }

    #[tokio::test]
    async fn toggling_unknown_id_is_not_found() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let session = Uuid::new_v4();
        let err = service.toggle_selection(session, &[1, 99], true).await.unwrap_err();
        assert!(matches!(err, AppError::CustomerNotFound(99)));
        assert!(service.selection(session).await.selected_ids.is_empty());
    }

    #[tokio::test]
    async fn empty_selection_never_calls_the_network() {
        let (service, source) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let err = service.set_selected_status(Uuid::new_v4(), false).await.unwrap_err();
        assert!(matches!(err, AppError::EmptySelection));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_reply_updates_only_succeeded_plates_and_clears_selection() {
        let reply = StatusUpdateReply::PerItem {
            succeeded: vec!["P1".into()],
            failed: vec!["P2".into()],
        };
        let (service, _) = service_with(Ok(reply)).await;
        let session = Uuid::new_v4();
        service.toggle_selection(session, &[1, 2], true).await.unwrap();

        let report = service.set_selected_status(session, false).await.unwrap();

        assert_eq!(report.kind, ReconciliationKind::Partial);
        assert_eq!((report.succeeded_count, report.failed_count), (1, 1));
        assert_eq!(service.detail(session, 1).await.unwrap().account_status, AccountStatus::Inactive);
        assert_eq!(service.detail(session, 2).await.unwrap().account_status, AccountStatus::Active);
        assert!(service.selection(session).await.selected_ids.is_empty());
    }

    #[tokio::test]
    async fn non_2xx_leaves_collection_and_selection_untouched() {
        let (service, _) = service_with(Err(500)).await;
        let session = Uuid::new_v4();
        service.toggle_selection(session, &[1, 3], true).await.unwrap();

        let err = service.set_selected_status(session, false).await.unwrap_err();

        assert!(matches!(err, AppError::WebhookStatus { status: 500, .. }));
        for id in [1, 3] {
            assert_eq!(service.detail(session, id).await.unwrap().account_status, AccountStatus::Active);
        }
        assert_eq!(service.selection(session).await.selected_ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn busy_gate_rejects_concurrent_operations() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let _held = service.operation_gate.lock().await;

        assert!(matches!(service.refresh().await, Err(AppError::OperationInProgress)));
        assert!(matches!(
            service.set_selected_status(Uuid::new_v4(), true).await,
            Err(AppError::OperationInProgress)
        ));
    }

    // Fonte cuja coleção pode ser trocada entre duas cargas
    struct ReloadableSource {
        customers: RwLock<Vec<Customer>>,
    }

    #[async_trait]
    impl MembershipSource for ReloadableSource {
        async fn fetch_memberships(&self) -> Vec<Customer> {
            self.customers.read().await.clone()
        }

        async fn set_status_by_plate(
            &self,
            plates: &[String],
            _target: AccountStatus,
        ) -> Result<StatusUpdateReply, AppError> {
            Ok(StatusUpdateReply::PerItem { succeeded: plates.to_vec(), failed: vec![] })
        }

        fn name(&self) -> &'static str {
            "reloadable"
        }
    }

    // Segura a chamada de status até receber `release`
    struct HeldSource {
        customers: Vec<Customer>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MembershipSource for HeldSource {
        async fn fetch_memberships(&self) -> Vec<Customer> {
            self.customers.clone()
        }

        async fn set_status_by_plate(
            &self,
            plates: &[String],
            _target: AccountStatus,
        ) -> Result<StatusUpdateReply, AppError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(StatusUpdateReply::PerItem { succeeded: plates.to_vec(), failed: vec![] })
        }

        fn name(&self) -> &'static str {
            "held"
        }
    }

    #[tokio::test]
    async fn selection_made_during_a_batch_survives_it() {
        let source = Arc::new(HeldSource {
            customers: collection(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let service = CustomerService::new(source.clone(), 5, FixedOffset::east_opt(0).unwrap())
            .with_clock(Arc::new(move || today));
        service.refresh().await.unwrap();

        let session = Uuid::new_v4();
        service.toggle_selection(session, &[1], true).await.unwrap();

        let batch = tokio::spawn({
            let service = service.clone();
            async move { service.set_selected_status(session, false).await }
        });

        source.entered.notified().await;
        service.toggle_selection(session, &[2], true).await.unwrap();
        source.release.notify_one();

        let report = batch.await.unwrap().unwrap();
        assert_eq!(report.updated_ids, vec![1]);
        assert_eq!(service.selection(session).await.selected_ids, vec![2]);
        assert_eq!(service.detail(session, 2).await.unwrap().account_status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn refresh_replaces_collection_recaptures_today_and_prunes_selection() {
        let source = Arc::new(ReloadableSource { customers: RwLock::new(collection()) });
        let day = Arc::new(std::sync::Mutex::new(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()));
        let clock_day = day.clone();
        let service = CustomerService::new(source.clone(), 5, FixedOffset::east_opt(0).unwrap())
            .with_clock(Arc::new(move || *clock_day.lock().unwrap()));
        service.refresh().await.unwrap();

        let session = Uuid::new_v4();
        let other = Uuid::new_v4();
        service.toggle_selection(session, &[1, 2, 3], true).await.unwrap();
        service.toggle_selection(other, &[2], true).await.unwrap();

        *source.customers.write().await = vec![
            customer(1, "P1", "2025-07-10"),
            customer(3, "P3", "2025-05-10"),
            customer(8, "P8", "2025-08-01"),
        ];
        *day.lock().unwrap() = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();

        let refreshed = service.refresh().await.unwrap();
        assert_eq!(refreshed.loaded, 3);
        assert_eq!(refreshed.today, NaiveDate::from_ymd_opt(2025, 7, 10));

        assert_eq!(service.selection(session).await.selected_ids, vec![1, 3]);
        assert!(service.selection(other).await.selected_ids.is_empty());

        let page = service.list(session, query(None, None, None)).await.unwrap();
        assert_eq!(page.today, NaiveDate::from_ymd_opt(2025, 7, 10));
        assert_eq!(page.items.iter().map(|r| r.customer.id).collect::<Vec<_>>(), vec![1, 3, 8]);

        let detail = service.detail(session, 3).await.unwrap();
        assert_eq!(detail.payment_status.unwrap().months_overdue, 2);
        assert!(matches!(service.detail(session, 2).await, Err(AppError::CustomerNotFound(2))));
    }

    #[tokio::test]
    async fn dropping_sessions_discards_their_view_state() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for session in [a, b, c] {
            service.toggle_selection(session, &[1], true).await.unwrap();
        }
        service.list(a, query(Some("cliente"), None, None)).await.unwrap();

        service.drop_session(a).await;
        service.drop_sessions(&[b]).await;

        assert!(service.selection(a).await.selected_ids.is_empty());
        assert!(service.selection(b).await.selected_ids.is_empty());
        assert_eq!(service.selection(c).await.selected_ids, vec![1]);
        assert!(!service.views.read().await.contains_key(&a));
        assert!(!service.views.read().await.contains_key(&b));

        let fresh = service.list(a, query(None, None, None)).await.unwrap();
        assert_eq!(fresh.search, "");
    }

    #[tokio::test]
    async fn detail_formats_display_fields() {
        let (service, _) = service_with(Ok(StatusUpdateReply::NoOp)).await;
        let detail = service.detail(Uuid::new_v4(), 2).await.unwrap();

        assert_eq!(detail.phone_list, vec!["999888777".to_string()]);
        assert_eq!(detail.formatted_value.as_deref(), Some("S/ 100.00"));
        assert_eq!(detail.period_description.as_deref(), Some("1 mes(es)"));
        assert_eq!(detail.next_payment_date, NaiveDate::from_ymd_opt(2025, 2, 10));
        assert!(detail.notifications_enabled);
        assert!(!detail.selected);
    }
}
