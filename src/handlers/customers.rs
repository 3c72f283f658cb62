// src/handlers/customers.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedOperator, i18n::Locale},
    models::customer::{
        CustomerDetail, CustomerListResponse, ListCustomersQuery, Reconciliation, RefreshResponse,
        SelectionPayload, SelectionResponse, SetStatusPayload, VisibleSelectionPayload,
    },
};

// =============================================================================
//  ÁREA 1: LISTAGEM E DETALHE
// =============================================================================

// GET /api/customers
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    params(ListCustomersQuery),
    responses(
        (status = 200, description = "Página de clientes com situação de pagamento", body = CustomerListResponse),
        (status = 400, description = "Filtro desconhecido")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedOperator(session): AuthenticatedOperator,
    Query(query): Query<ListCustomersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .customer_service
        .list(session.id, query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(page)))
}

// GET /api/customers/{id}
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "Customers",
    params(("id" = i64, Path, description = "Id do cliente no webhook")),
    responses(
        (status = 200, description = "Detalhe do cliente", body = CustomerDetail),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_customer(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedOperator(session): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .customer_service
        .detail(session.id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detail)))
}

// POST /api/customers/refresh
#[utoipa::path(
    post,
    path = "/api/customers/refresh",
    tag = "Customers",
    responses(
        (status = 200, description = "Coleção recarregada", body = RefreshResponse),
        (status = 409, description = "Outra operação em andamento")
    ),
    security(("api_jwt" = []))
)]
pub async fn refresh_customers(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let refreshed = app_state
        .customer_service
        .refresh()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(refreshed)))
}

// =============================================================================
//  ÁREA 2: SELEÇÃO
// =============================================================================

// GET /api/customers/selection
#[utoipa::path(
    get,
    path = "/api/customers/selection",
    tag = "Selection",
    responses((status = 200, description = "Ids selecionados", body = SelectionResponse)),
    security(("api_jwt" = []))
)]
pub async fn get_selection(
    State(app_state): State<AppState>,
    AuthenticatedOperator(session): AuthenticatedOperator,
) -> Json<SelectionResponse> {
    Json(app_state.customer_service.selection(session.id).await)
}

// POST /api/customers/selection
#[utoipa::path(
    post,
    path = "/api/customers/selection",
    tag = "Selection",
    request_body = SelectionPayload,
    responses(
        (status = 200, description = "Seleção atualizada", body = SelectionResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_selection(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedOperator(session): AuthenticatedOperator,
    Json(payload): Json<SelectionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let selection = app_state
        .customer_service
        .toggle_selection(session.id, &payload.ids, payload.selected)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(selection)))
}

// POST /api/customers/selection/visible
#[utoipa::path(
    post,
    path = "/api/customers/selection/visible",
    tag = "Selection",
    request_body = VisibleSelectionPayload,
    responses((status = 200, description = "Página atual marcada/desmarcada", body = SelectionResponse)),
    security(("api_jwt" = []))
)]
pub async fn select_visible(
    State(app_state): State<AppState>,
    AuthenticatedOperator(session): AuthenticatedOperator,
    Json(payload): Json<VisibleSelectionPayload>,
) -> Json<SelectionResponse> {
    Json(
        app_state
            .customer_service
            .select_visible(session.id, payload.selected)
            .await,
    )
}

// DELETE /api/customers/selection
#[utoipa::path(
    delete,
    path = "/api/customers/selection",
    tag = "Selection",
    responses((status = 200, description = "Seleção limpa", body = SelectionResponse)),
    security(("api_jwt" = []))
)]
pub async fn clear_selection(
    State(app_state): State<AppState>,
    AuthenticatedOperator(session): AuthenticatedOperator,
) -> Json<SelectionResponse> {
    Json(app_state.customer_service.clear_selection(session.id).await)
}

// =============================================================================
//  ÁREA 3: ATIVAÇÃO / DESATIVAÇÃO EM LOTE
// =============================================================================

// POST /api/customers/status
#[utoipa::path(
    post,
    path = "/api/customers/status",
    tag = "Customers",
    request_body = SetStatusPayload,
    responses(
        (status = 200, description = "Resultado da reconciliação (inclui falhas parciais)", body = Reconciliation),
        (status = 400, description = "Seleção vazia ou sem placas"),
        (status = 409, description = "Outra operação em andamento"),
        (status = 502, description = "Webhook falhou ou respondeu não-2xx")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_selected_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedOperator(session): AuthenticatedOperator,
    Json(payload): Json<SetStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .customer_service
        .set_selected_status(session.id, payload.active)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(report)))
}
