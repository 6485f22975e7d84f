//! HTTP handlers for goods receipts

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::{CurrentUser, Role};
use crate::models::{
    parse_report_date, CreateReceiptInput, ReceiptDetails, ReceiptFilter, ReceiptHeader,
    ReceiptWithLines, ReportWindow, UpdateReceiptInput,
};
use crate::services::GrnService;
use crate::AppState;

fn service(state: &AppState) -> GrnService {
    GrnService::new(state.store.clone(), state.config.inventory.clone())
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    #[serde(alias = "perPage")]
    pub per_page: Option<u32>,
}

impl PageQuery {
    fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(alias = "companyId")]
    pub company_id: Option<String>,
    #[serde(alias = "shopId")]
    pub shop_id: Option<String>,
    #[serde(alias = "supplierId")]
    pub supplier_id: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "perPage")]
    pub per_page: Option<u32>,
}

/// Create a goods receipt
pub async fn create_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<(StatusCode, Json<ReceiptWithLines>)> {
    let receipt = service(&state).create_receipt(&user, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Cancel a goods receipt
pub async fn cancel_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((code, company_id, shop_id)): Path<(String, String, String)>,
) -> AppResult<Json<ReceiptHeader>> {
    let header = service(&state)
        .cancel_receipt(&user, &code, &company_id, &shop_id)
        .await?;
    Ok(Json(header))
}

/// Settle a goods receipt
pub async fn settle_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((code, company_id, shop_id)): Path<(String, String, String)>,
) -> AppResult<Json<ReceiptHeader>> {
    let header = service(&state)
        .settle_receipt(&user, &code, &company_id, &shop_id)
        .await?;
    Ok(Json(header))
}

/// Replace the lines of a pending goods receipt
pub async fn update_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((code, company_id, shop_id)): Path<(String, String, String)>,
    Json(input): Json<UpdateReceiptInput>,
) -> AppResult<Json<ReceiptWithLines>> {
    let receipt = service(&state)
        .update_receipt(&user, &code, &company_id, &shop_id, input)
        .await?;
    Ok(Json(receipt))
}

/// List receipts; super admins see every company
pub async fn list_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ReceiptHeader>>> {
    let service = service(&state);
    let headers = if user.role == Role::SuperAdmin {
        service.list_all().await?
    } else {
        service.list_by_company(&user.company_id).await?
    };
    Ok(Json(query.pagination().paginate(headers)))
}

pub async fn list_company_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(company_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ReceiptHeader>>> {
    user.ensure_company(&company_id)?;
    let headers = service(&state).list_by_company(&company_id).await?;
    Ok(Json(query.pagination().paginate(headers)))
}

pub async fn list_shop_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ReceiptHeader>>> {
    user.ensure_company(&company_id)?;
    let headers = service(&state).list_by_shop(&company_id, &shop_id).await?;
    Ok(Json(query.pagination().paginate(headers)))
}

pub async fn list_supplier_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id, supplier_id)): Path<(String, String, String)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<ReceiptHeader>>> {
    user.ensure_company(&company_id)?;
    let headers = service(&state)
        .list_by_supplier(&company_id, &shop_id, &supplier_id)
        .await?;
    Ok(Json(query.pagination().paginate(headers)))
}

/// Search receipts by supplier and transaction date
pub async fn search_grns(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<ReceiptHeader>>> {
    let company_id = query
        .company_id
        .clone()
        .unwrap_or_else(|| user.company_id.clone());
    user.ensure_company(&company_id)?;

    let start = query.start_date.as_deref().map(parse_report_date).transpose()?;
    let end = query.end_date.as_deref().map(parse_report_date).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        ReportWindow::new(start, end)?;
    }

    let filter = ReceiptFilter {
        company_id: Some(company_id),
        shop_id: query.shop_id.clone(),
        supplier_id: query.supplier_id.clone(),
        from: start
            .map(ReportWindow::daily)
            .transpose()?
            .map(|w| w.starts_at()),
        to: end
            .map(ReportWindow::daily)
            .transpose()?
            .map(|w| w.ends_before()),
    };

    let headers = service(&state).list_filtered(&filter).await?;
    let pagination = Pagination::from_query(query.page, query.per_page);
    Ok(Json(pagination.paginate(headers)))
}

/// Get a receipt with its lines
pub async fn get_grn(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id, code)): Path<(String, String, String)>,
) -> AppResult<Json<ReceiptWithLines>> {
    user.ensure_company(&company_id)?;
    let receipt = service(&state)
        .get_with_lines(&company_id, &shop_id, &code)
        .await?;
    Ok(Json(receipt))
}

/// Get a receipt with its lines and company, shop and supplier details
pub async fn get_grn_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((company_id, shop_id, code)): Path<(String, String, String)>,
) -> AppResult<Json<ReceiptDetails>> {
    user.ensure_company(&company_id)?;
    let details = service(&state)
        .get_with_lines_and_details(&company_id, &shop_id, &code)
        .await?;
    Ok(Json(details))
}
