//! Stock movement report handlers
//!
//! Company and shop come from the caller's token.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::models::{parse_report_date, ReportWindow, StockReport};
use crate::services::StockReportService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    #[serde(alias = "categoryId")]
    pub category_id: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(alias = "categoryId")]
    pub category_id: Option<String>,
    pub format: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> AppResult<&'a str> {
    value.as_deref().ok_or_else(|| AppError::Validation {
        field: field.to_string(),
        message: format!("{} is required", field),
    })
}

/// Missing date means today
fn date_or_today(value: &Option<String>) -> AppResult<NaiveDate> {
    match value.as_deref() {
        Some(date) => Ok(parse_report_date(date)?),
        None => Ok(Utc::now().date_naive()),
    }
}

fn wants_csv(format: &Option<String>) -> bool {
    format.as_deref() == Some("csv")
}

fn csv_response(csv: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response()
}

fn report_response(
    report: StockReport,
    format: &Option<String>,
    filename: &str,
) -> AppResult<Response> {
    if wants_csv(format) {
        let csv = StockReportService::export_to_csv(&report.rows)?;
        Ok(csv_response(csv, filename))
    } else {
        Ok(Json(report).into_response())
    }
}

/// Stock report over an explicit date range
pub async fn get_stock_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<Response> {
    let shop_id = user.require_shop()?;
    let start = parse_report_date(required(&query.start_date, "start_date")?)?;
    let end = parse_report_date(required(&query.end_date, "end_date")?)?;
    let window = ReportWindow::new(start, end)?;

    let report = StockReportService::new(state.store.clone())
        .compute_stock_report(
            &user.company_id,
            shop_id,
            window,
            query.category_id.as_deref(),
            &user.user_id,
        )
        .await?;
    report_response(report, &query.format, "stock_report.csv")
}

/// Stock report for one day
pub async fn get_daily_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DayQuery>,
) -> AppResult<Response> {
    let shop_id = user.require_shop()?;
    let date = date_or_today(&query.date)?;

    let report = StockReportService::new(state.store.clone())
        .daily(
            &user.company_id,
            shop_id,
            date,
            query.category_id.as_deref(),
            &user.user_id,
        )
        .await?;
    report_response(report, &query.format, "daily_stock_report.csv")
}

/// Stock report for the Sunday to Saturday week containing the date
pub async fn get_weekly_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DayQuery>,
) -> AppResult<Response> {
    let shop_id = user.require_shop()?;
    let date = date_or_today(&query.date)?;

    let report = StockReportService::new(state.store.clone())
        .weekly(
            &user.company_id,
            shop_id,
            date,
            query.category_id.as_deref(),
            &user.user_id,
        )
        .await?;
    report_response(report, &query.format, "weekly_stock_report.csv")
}

/// Stock report for a calendar month
pub async fn get_monthly_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<MonthQuery>,
) -> AppResult<Response> {
    let shop_id = user.require_shop()?;
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let report = StockReportService::new(state.store.clone())
        .monthly(
            &user.company_id,
            shop_id,
            year,
            month,
            query.category_id.as_deref(),
            &user.user_id,
        )
        .await?;
    report_response(report, &query.format, "monthly_stock_report.csv")
}

/// Products at or below their minimum quantity
pub async fn get_low_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Response> {
    let shop_id = user.require_shop()?;

    let rows = StockReportService::new(state.store.clone())
        .low_stock(
            &user.company_id,
            shop_id,
            query.category_id.as_deref(),
            &user.user_id,
        )
        .await?;

    if wants_csv(&query.format) {
        let csv = StockReportService::export_to_csv(&rows)?;
        Ok(csv_response(csv, "low_stock.csv"))
    } else {
        Ok(Json(rows).into_response())
    }
}
