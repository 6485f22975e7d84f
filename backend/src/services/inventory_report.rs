//! Stock movement reporting
//!
//! Reports replay the shop's movements against the live ledger. Sibling
//! movements count once they are completed or partially returned; receipt
//! lines count unless cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use super::AuditLog;
use crate::error::{AppError, AppResult};
use crate::models::{
    build_report_row, low_stock_row, sort_low_stock, LowStockRow, ProductInfo, ReportWindow,
    StockMovement, StockReport,
};
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct StockReportService {
    store: Arc<dyn InventoryStore>,
    audit: AuditLog,
}

impl StockReportService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    /// Opening, movement and closing quantities per product over `window`
    #[tracing::instrument(skip(self))]
    pub async fn compute_stock_report(
        &self,
        company_id: &str,
        shop_id: &str,
        window: ReportWindow,
        category_id: Option<&str>,
        requested_by: &str,
    ) -> AppResult<StockReport> {
        let entries = self
            .store
            .list_ledger_entries(company_id, shop_id, category_id)
            .await?;
        let movements = self.shop_movements(company_id, shop_id).await?;
        let products = self.products_for(entries.iter().map(|e| e.product_id.as_str())).await?;

        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            match products.get(&entry.product_id) {
                Some(product) => rows.push(build_report_row(entry, product, &movements, &window)),
                None => tracing::warn!("Skipping unknown product {} in stock report", entry.product_id),
            }
        }
        rows.sort_by(|a, b| a.product_name.cmp(&b.product_name));

        self.audit
            .record(
                company_id,
                shop_id,
                requested_by,
                &format!(
                    "Stock report generated: {} to {} ({} products)",
                    window.start,
                    window.end,
                    rows.len()
                ),
            )
            .await;

        Ok(StockReport {
            company_id: company_id.to_string(),
            shop_id: shop_id.to_string(),
            start_date: window.start,
            end_date: window.end,
            category_id: category_id.map(str::to_string),
            generated_at: Utc::now(),
            rows,
        })
    }

    pub async fn daily(
        &self,
        company_id: &str,
        shop_id: &str,
        date: NaiveDate,
        category_id: Option<&str>,
        requested_by: &str,
    ) -> AppResult<StockReport> {
        self.compute_stock_report(
            company_id,
            shop_id,
            ReportWindow::daily(date)?,
            category_id,
            requested_by,
        )
        .await
    }

    /// Sunday to Saturday week containing `date`
    pub async fn weekly(
        &self,
        company_id: &str,
        shop_id: &str,
        date: NaiveDate,
        category_id: Option<&str>,
        requested_by: &str,
    ) -> AppResult<StockReport> {
        self.compute_stock_report(
            company_id,
            shop_id,
            ReportWindow::weekly(date)?,
            category_id,
            requested_by,
        )
        .await
    }

    pub async fn monthly(
        &self,
        company_id: &str,
        shop_id: &str,
        year: i32,
        month: u32,
        category_id: Option<&str>,
        requested_by: &str,
    ) -> AppResult<StockReport> {
        let window = ReportWindow::monthly(year, month)?;
        self.compute_stock_report(company_id, shop_id, window, category_id, requested_by)
            .await
    }

    /// Products at or below their minimum, largest deficit first
    #[tracing::instrument(skip(self))]
    pub async fn low_stock(
        &self,
        company_id: &str,
        shop_id: &str,
        category_id: Option<&str>,
        requested_by: &str,
    ) -> AppResult<Vec<LowStockRow>> {
        let entries = self
            .store
            .list_ledger_entries(company_id, shop_id, category_id)
            .await?;
        let products = self
            .products_for(
                entries
                    .iter()
                    .filter(|e| e.is_low_stock())
                    .map(|e| e.product_id.as_str()),
            )
            .await?;

        let mut rows: Vec<LowStockRow> = entries
            .iter()
            .filter_map(|entry| {
                products
                    .get(&entry.product_id)
                    .and_then(|product| low_stock_row(entry, product))
            })
            .collect();
        sort_low_stock(&mut rows);

        self.audit
            .record(
                company_id,
                shop_id,
                requested_by,
                &format!("Low stock report generated: {} products", rows.len()),
            )
            .await;

        Ok(rows)
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }

    /// Sibling movements that affect stock plus the shop's receipt lines
    async fn shop_movements(&self, company_id: &str, shop_id: &str) -> AppResult<Vec<StockMovement>> {
        let mut movements: Vec<StockMovement> = self
            .store
            .list_movements(company_id, shop_id)
            .await?
            .into_iter()
            .filter(|m| m.status.counts_toward_stock())
            .collect();

        let lines = self.store.list_shop_lines(company_id, shop_id).await?;
        movements.extend(lines.iter().filter_map(StockMovement::from_receipt_line));

        Ok(movements)
    }

    async fn products_for<'a>(
        &self,
        product_ids: impl Iterator<Item = &'a str>,
    ) -> AppResult<HashMap<String, ProductInfo>> {
        let mut products = HashMap::new();
        for product_id in product_ids {
            if products.contains_key(product_id) {
                continue;
            }
            if let Some(product) = self.store.find_product(product_id).await? {
                products.insert(product_id.to_string(), product);
            }
        }
        Ok(products)
    }
}
