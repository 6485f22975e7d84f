//! Goods-receipt (GRN) service
//!
//! Create, cancel, settle and update each run as one unit of work: the code
//! allocation, header and line writes, ledger changes and outbox events all
//! commit together or not at all. Audit entries follow the commit.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use super::{enqueue, AuditLog, CodeAllocator, LedgerChange, LedgerService};
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    receipt_total, CreateReceiptInput, DomainEventKind, LineStatus,
    NewReceiptHeader, NewReceiptLine, ReceiptDetails, ReceiptFilter, ReceiptHeader, ReceiptLine,
    ReceiptLineInput, ReceiptWithLines, StockDirection, StockIn, StockOut, UpdateReceiptInput,
    ZeroStockCostPolicy,
};
use crate::store::{InventoryStore, UnitOfWork};

#[derive(Clone)]
pub struct GrnService {
    store: Arc<dyn InventoryStore>,
    config: InventoryConfig,
    ledger: LedgerService,
    codes: CodeAllocator,
    audit: AuditLog,
}

/// Where new receipt lines are written
struct LineTarget<'a> {
    transaction_code: &'a str,
    company_id: &'a str,
    shop_id: &'a str,
    supplier_id: &'a str,
    transaction_date_time: chrono::DateTime<Utc>,
    created_by: &'a str,
    status: LineStatus,
    line_event: DomainEventKind,
}

impl GrnService {
    pub fn new(store: Arc<dyn InventoryStore>, config: InventoryConfig) -> Self {
        Self {
            ledger: LedgerService::new(store.clone(), config.default_minimum_quantity),
            codes: CodeAllocator::new(store.clone()),
            audit: AuditLog::new(store.clone()),
            store,
            config,
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a pending receipt and receive its lines into the ledger
    #[tracing::instrument(skip_all, fields(company_id = %input.company_id, shop_id = %input.shop_id))]
    pub async fn create_receipt(
        &self,
        actor: &AuthUser,
        input: CreateReceiptInput,
    ) -> AppResult<ReceiptWithLines> {
        actor.require_stock_manager()?;
        actor.ensure_company(&input.company_id)?;
        input.validate()?;
        shared::validate_receipt_lines(&input.lines)?;
        self.ensure_products_eligible(&input.lines).await?;

        let created_by = input
            .created_by
            .clone()
            .unwrap_or_else(|| actor.user_id.clone());

        let mut uow = self.store.begin().await?;
        let issued = self
            .codes
            .allocate_in(
                uow.as_mut(),
                &input.company_id,
                &input.shop_id,
                &created_by,
                &self.config.grn_prefix,
            )
            .await?;

        let header = uow
            .insert_header(NewReceiptHeader {
                transaction_code: issued.code.clone(),
                company_id: input.company_id.clone(),
                shop_id: input.shop_id.clone(),
                supplier_id: input.supplier_id.clone(),
                transaction_date_time: input.transaction_date_time,
                total_cost: receipt_total(&input.lines),
                created_by: created_by.clone(),
            })
            .await?;

        let target = LineTarget {
            transaction_code: &header.transaction_code,
            company_id: &header.company_id,
            shop_id: &header.shop_id,
            supplier_id: &header.supplier_id,
            transaction_date_time: header.transaction_date_time,
            created_by: &created_by,
            status: LineStatus::Pending,
            line_event: DomainEventKind::NewGrnTransaction,
        };
        let lines = self.receive_lines(uow.as_mut(), &target, &input.lines).await?;

        let scope = (header.company_id.as_str(), header.shop_id.as_str());
        enqueue(uow.as_mut(), DomainEventKind::NewGrn, scope, &header).await?;
        uow.commit().await?;

        self.codes.record_issued(&issued).await;
        self.audit
            .record(
                &header.company_id,
                &header.shop_id,
                &created_by,
                &format!("GRN Created: {}", header.transaction_code),
            )
            .await;
        tracing::info!(
            "GRN {} created with {} lines, total {}",
            header.transaction_code,
            lines.len(),
            header.total_cost
        );

        Ok(ReceiptWithLines { header, lines })
    }

    /// Cancel a receipt and take its stock back out of the ledger
    #[tracing::instrument(skip(self, actor))]
    pub async fn cancel_receipt(
        &self,
        actor: &AuthUser,
        transaction_code: &str,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<ReceiptHeader> {
        actor.require_stock_manager()?;
        actor.ensure_company(company_id)?;
        let scope = (company_id, shop_id);

        let mut uow = self.store.begin().await?;
        let mut header = lock_header(uow.as_mut(), company_id, shop_id, transaction_code).await?;
        let next_status = header.status.cancel()?;
        let now = Utc::now();

        let lines = uow.lines_for(company_id, shop_id, transaction_code).await?;
        for mut line in lines {
            let key = line.ledger_key();
            let reversed = self
                .ledger
                .issue(
                    uow.as_mut(),
                    &key,
                    StockOut {
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                    },
                    ZeroStockCostPolicy::HoldPrevious,
                )
                .await?;
            match reversed {
                Some(entry) => {
                    enqueue(uow.as_mut(), DomainEventKind::UpdateInventory, scope, &entry).await?
                }
                None => tracing::warn!(
                    "No ledger entry for {} while cancelling {}",
                    key,
                    transaction_code
                ),
            }

            line.status = LineStatus::Cancelled;
            line.direction = StockDirection::Out;
            line.updated_at = now;
            uow.update_line(&line).await?;
            enqueue(uow.as_mut(), DomainEventKind::CancelGrnTransaction, scope, &line).await?;
        }

        header.status = next_status;
        header.updated_at = now;
        uow.update_header(&header).await?;
        enqueue(uow.as_mut(), DomainEventKind::CancelGrn, scope, &header).await?;
        uow.commit().await?;

        self.audit
            .record(
                company_id,
                shop_id,
                &actor.user_id,
                &format!("GRN Canceled: {}", transaction_code),
            )
            .await;
        tracing::info!("GRN {} cancelled", transaction_code);

        Ok(header)
    }

    /// Mark a pending receipt and its lines completed
    #[tracing::instrument(skip(self, actor))]
    pub async fn settle_receipt(
        &self,
        actor: &AuthUser,
        transaction_code: &str,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<ReceiptHeader> {
        actor.require_stock_manager()?;
        actor.ensure_company(company_id)?;
        let scope = (company_id, shop_id);

        let mut uow = self.store.begin().await?;
        let mut header = lock_header(uow.as_mut(), company_id, shop_id, transaction_code).await?;
        header.status = header.status.settle()?;
        let now = Utc::now();

        let lines = uow.lines_for(company_id, shop_id, transaction_code).await?;
        for mut line in lines {
            line.status = LineStatus::Completed;
            line.updated_at = now;
            uow.update_line(&line).await?;
            enqueue(uow.as_mut(), DomainEventKind::SettleGrnTransaction, scope, &line).await?;
        }

        header.updated_at = now;
        uow.update_header(&header).await?;
        enqueue(uow.as_mut(), DomainEventKind::SettleGrn, scope, &header).await?;
        uow.commit().await?;

        self.audit
            .record(
                company_id,
                shop_id,
                &actor.user_id,
                &format!("GRN Settled: {}", transaction_code),
            )
            .await;
        tracing::info!("GRN {} settled", transaction_code);

        Ok(header)
    }

    /// Replace the supplier, date and lines of a pending receipt
    #[tracing::instrument(skip(self, actor, input))]
    pub async fn update_receipt(
        &self,
        actor: &AuthUser,
        transaction_code: &str,
        company_id: &str,
        shop_id: &str,
        input: UpdateReceiptInput,
    ) -> AppResult<ReceiptWithLines> {
        actor.require_stock_manager()?;
        actor.ensure_company(company_id)?;
        let scope = (company_id, shop_id);
        input.validate()?;
        shared::validate_receipt_lines(&input.lines)?;

        self.ensure_products_eligible(&input.lines).await?;

        let mut uow = self.store.begin().await?;
        let mut header = lock_header(uow.as_mut(), company_id, shop_id, transaction_code).await?;
        header.status.ensure_editable()?;

        let created_by = input
            .created_by
            .clone()
            .unwrap_or_else(|| actor.user_id.clone());

        let previous = uow.lines_for(company_id, shop_id, transaction_code).await?;
        for line in previous.iter().filter(|l| l.status != LineStatus::Cancelled) {
            let key = line.ledger_key();
            let reversed = self
                .ledger
                .issue(
                    uow.as_mut(),
                    &key,
                    StockOut {
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                    },
                    self.config.update_reversal_zero_cost,
                )
                .await?;
            if let Some(entry) = reversed {
                enqueue(uow.as_mut(), DomainEventKind::ReverseInventoryUpdate, scope, &entry).await?;
            }
        }
        uow.delete_lines(company_id, shop_id, transaction_code).await?;

        let total = receipt_total(&input.lines);
        header.supplier_id = input.supplier_id.clone();
        header.transaction_date_time = input.transaction_date_time;
        header.total_cost = total;
        header.outstanding_amount = total;
        header.created_by = created_by.clone();
        header.updated_at = Utc::now();
        uow.update_header(&header).await?;
        enqueue(uow.as_mut(), DomainEventKind::UpdateGrn, scope, &header).await?;

        let target = LineTarget {
            transaction_code: &header.transaction_code,
            company_id: &header.company_id,
            shop_id: &header.shop_id,
            supplier_id: &header.supplier_id,
            transaction_date_time: header.transaction_date_time,
            created_by: &created_by,
            status: LineStatus::Updated,
            line_event: DomainEventKind::UpdateGrnTransaction,
        };
        let lines = self.receive_lines(uow.as_mut(), &target, &input.lines).await?;
        uow.commit().await?;

        self.audit
            .record(
                company_id,
                shop_id,
                &created_by,
                &format!("GRN Updated: {}", transaction_code),
            )
            .await;
        tracing::info!("GRN {} updated with {} lines", transaction_code, lines.len());

        Ok(ReceiptWithLines { header, lines })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn list_all(&self) -> AppResult<Vec<ReceiptHeader>> {
        self.list_filtered(&ReceiptFilter::default()).await
    }

    pub async fn list_by_company(&self, company_id: &str) -> AppResult<Vec<ReceiptHeader>> {
        self.list_filtered(&ReceiptFilter {
            company_id: Some(company_id.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn list_by_shop(
        &self,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<Vec<ReceiptHeader>> {
        self.list_filtered(&ReceiptFilter {
            company_id: Some(company_id.to_string()),
            shop_id: Some(shop_id.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn list_by_supplier(
        &self,
        company_id: &str,
        shop_id: &str,
        supplier_id: &str,
    ) -> AppResult<Vec<ReceiptHeader>> {
        self.list_filtered(&ReceiptFilter {
            company_id: Some(company_id.to_string()),
            shop_id: Some(shop_id.to_string()),
            supplier_id: Some(supplier_id.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn list_filtered(&self, filter: &ReceiptFilter) -> AppResult<Vec<ReceiptHeader>> {
        self.store.list_headers(filter).await
    }

    /// Get a receipt header with its lines
    pub async fn get_with_lines(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<ReceiptWithLines> {
        let header = self
            .store
            .find_header(company_id, shop_id, transaction_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("GRN {}", transaction_code)))?;
        let lines = self
            .store
            .list_lines(company_id, shop_id, transaction_code)
            .await?;

        Ok(ReceiptWithLines { header, lines })
    }

    /// Get a receipt with its company, shop and supplier details
    pub async fn get_with_lines_and_details(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<ReceiptDetails> {
        let ReceiptWithLines { header, lines } = self
            .get_with_lines(company_id, shop_id, transaction_code)
            .await?;

        let company = self.store.find_company(company_id).await?;
        let shop = self.store.find_shop(company_id, shop_id).await?;
        let supplier = self.store.find_supplier(&header.supplier_id).await?;

        Ok(ReceiptDetails {
            header,
            lines,
            company,
            shop,
            supplier,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Every product must exist and be tracked through goods receipts
    async fn ensure_products_eligible(&self, lines: &[ReceiptLineInput]) -> AppResult<()> {
        for line in lines {
            let product = self
                .store
                .find_product(&line.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Product with ID {}", line.product_id)))?;

            if !product.is_grn_eligible() {
                return Err(AppError::ProductNotGrnEligible {
                    product_id: product.product_id,
                    name: product.name,
                });
            }
        }
        Ok(())
    }

    /// Insert lines in input order and receive each into the ledger
    async fn receive_lines(
        &self,
        uow: &mut dyn UnitOfWork,
        target: &LineTarget<'_>,
        inputs: &[ReceiptLineInput],
    ) -> AppResult<Vec<ReceiptLine>> {
        let mut lines = Vec::with_capacity(inputs.len());

        for input in inputs {
            let line = uow
                .insert_line(NewReceiptLine {
                    transaction_code: target.transaction_code.to_string(),
                    company_id: target.company_id.to_string(),
                    shop_id: target.shop_id.to_string(),
                    supplier_id: target.supplier_id.to_string(),
                    category_id: input.category_id.clone(),
                    product_id: input.product_id.clone(),
                    unit_cost: input.unit_cost,
                    quantity: input.quantity,
                    direction: StockDirection::In,
                    status: target.status,
                    transaction_date_time: target.transaction_date_time,
                    created_by: target.created_by.to_string(),
                    remarks: input.remarks.clone(),
                })
                .await?;
            let scope = (target.company_id, target.shop_id);
            enqueue(uow, target.line_event, scope, &line).await?;

            let change: LedgerChange = self
                .ledger
                .receive(
                    uow,
                    &line.ledger_key(),
                    StockIn {
                        quantity: line.quantity,
                        unit_cost: line.unit_cost,
                        supplier_id: Some(target.supplier_id),
                    },
                    target.created_by,
                )
                .await?;
            enqueue(uow, change.event(), scope, &change.entry).await?;

            lines.push(line);
        }

        Ok(lines)
    }
}

async fn lock_header(
    uow: &mut dyn UnitOfWork,
    company_id: &str,
    shop_id: &str,
    transaction_code: &str,
) -> AppResult<ReceiptHeader> {
    uow.lock_header(company_id, shop_id, transaction_code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("GRN {}", transaction_code)))
}
