//! HTTP handlers for the stock ledger and posted stock movements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{LedgerKey, NewStockMovement, StockLedgerEntry, StockMovement};
use crate::services::{LedgerService, StockMovementService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    #[serde(alias = "categoryId")]
    pub category_id: Option<String>,
}

fn ledger(state: &AppState) -> LedgerService {
    LedgerService::new(
        state.store.clone(),
        state.config.inventory.default_minimum_quantity,
    )
}

/// List a shop's ledger entries
pub async fn list_ledger_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id)): Path<(String, String)>,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<StockLedgerEntry>>> {
    user.ensure_company(&company_id)?;
    let entries = ledger(&state)
        .list_entries(&company_id, &shop_id, query.category_id.as_deref())
        .await?;
    Ok(Json(entries))
}

/// Get the ledger entry of one product
pub async fn get_ledger_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id, category_id, product_id)): Path<(String, String, String, String)>,
) -> AppResult<Json<StockLedgerEntry>> {
    user.ensure_company(&company_id)?;
    let key = LedgerKey::new(company_id, shop_id, category_id, product_id);
    let entry = ledger(&state).get_entry(&key).await?;
    Ok(Json(entry))
}

/// Post a movement from the selling or stock engines
pub async fn post_stock_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<NewStockMovement>,
) -> AppResult<(StatusCode, Json<StockMovement>)> {
    let service = StockMovementService::new(
        state.store.clone(),
        state.config.inventory.default_minimum_quantity,
    );
    let movement = service.post_movement(&user, input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}
