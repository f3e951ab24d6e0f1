// Partner API Handlers
// Listing goes straight to the Sankhya client; saves run through the partner
// form so they get the same validation and normalization as the UI path

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{PartnerPage, PartnerRecord};
use crate::services::erp::SankhyaClient;
use crate::services::partner_form::{PartnerForm, SaveOutcome};
use crate::utils::log_sanitizer::sanitize_for_log;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<SankhyaClient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPartnersQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub search: String,
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// List customer partners
/// GET /api/partners?page=1&pageSize=50&search=acme
pub async fn list_partners(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListPartnersQuery>, QueryRejection>,
) -> Result<Json<PartnerPage>> {
    let Query(query) = query?;

    tracing::debug!(
        page = query.page,
        page_size = query.page_size,
        search = %sanitize_for_log(&query.search),
        "Listing partners"
    );

    let page = state
        .client
        .list_partners(query.page, query.page_size, &query.search)
        .await?;

    Ok(Json(page))
}

/// Create (no `code`) or update (with `code`) a partner
/// POST /api/partners
pub async fn save_partner(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PartnerRecord>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(record) = payload?;
    let is_update = record.is_update();

    let mut form = PartnerForm::new();
    if is_update {
        form.open(Some(&record));
    } else {
        form.open(None);
        form.set_name(record.name);
        form.set_tax_id(record.tax_id);
        form.set_city_code(record.city_code);
        form.set_active(record.active);
    }

    match form.submit(&*state.client).await {
        SaveOutcome::Saved(result) => {
            let status = if is_update { StatusCode::OK } else { StatusCode::CREATED };
            Ok((status, Json(json!({ "success": true, "result": result }))))
        }
        SaveOutcome::Failed(err) => Err(AppError::Sankhya(err)),
        SaveOutcome::Invalid(errors) => Err(AppError::Validation(errors)),
    }
}
