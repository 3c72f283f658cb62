// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::get_me,

        // --- Customers ---
        handlers::customers::list_customers,
        handlers::customers::get_customer,
        handlers::customers::refresh_customers,
        handlers::customers::set_selected_status,

        // --- Selection ---
        handlers::customers::get_selection,
        handlers::customers::update_selection,
        handlers::customers::select_visible,
        handlers::customers::clear_selection,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Operator,
            models::auth::Session,
            models::auth::LoginPayload,
            models::auth::AuthResponse,

            // --- Customers ---
            models::customer::Customer,
            models::customer::AccountStatus,
            models::customer::PaymentSeverity,
            models::customer::OverdueStatus,
            models::customer::CustomerRow,
            models::customer::CustomerListResponse,
            models::customer::CustomerDetail,
            models::customer::RefreshResponse,
            models::customer::Reconciliation,
            models::customer::ReconciliationKind,

            // --- Payloads ---
            models::customer::SelectionPayload,
            models::customer::SelectionResponse,
            models::customer::VisibleSelectionPayload,
            models::customer::SetStatusPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Sessão do operador"),
        (name = "Customers", description = "Clientes, situação de pagamento e ativação em lote"),
        (name = "Selection", description = "Seleção de clientes da sessão")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
