//! In-memory store
//!
//! Units of work hold the store-wide async mutex for their whole lifetime and
//! write into a private copy of the state, which replaces the shared state on
//! commit. Writers are therefore fully serialized and a dropped unit of work
//! leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{InventoryStore, UnitOfWork};
use crate::error::{AppError, AppResult};
use crate::models::{
    AuditEntry, CompanyDetails, IssuedCode, LedgerKey, NewAuditEntry, NewOutboxEvent,
    NewReceiptHeader, NewReceiptLine, OutboxEvent, ProductInfo, ReceiptFilter, ReceiptHeader,
    ReceiptLine, ReceiptStatus, ShopDetails, StockDirection, StockLedgerEntry, StockMovement,
    SupplierDetails, GRN_TRANSACTION_TYPE,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: HashMap<String, ProductInfo>,
    companies: HashMap<String, CompanyDetails>,
    shops: HashMap<(String, String), ShopDetails>,
    suppliers: HashMap<String, SupplierDetails>,
    ledger: BTreeMap<LedgerKey, StockLedgerEntry>,
    counters: HashMap<(String, String, String), i64>,
    codes: Vec<IssuedCode>,
    headers: Vec<ReceiptHeader>,
    lines: Vec<ReceiptLine>,
    movements: Vec<StockMovement>,
    audit: Vec<AuditEntry>,
    outbox: Vec<OutboxEvent>,
    last_header_id: i64,
    last_line_id: i64,
    last_movement_id: i64,
    last_audit_id: i64,
}

fn is_line_of(line: &ReceiptLine, company_id: &str, shop_id: &str, code: &str) -> bool {
    line.company_id == company_id && line.shop_id == shop_id && line.transaction_code == code
}

/// Store kept entirely in process memory; used by tests and local runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: ProductInfo) {
        let mut state = self.state.lock().await;
        state.products.insert(product.product_id.clone(), product);
    }

    pub async fn insert_company(&self, company: CompanyDetails) {
        let mut state = self.state.lock().await;
        state.companies.insert(company.company_id.clone(), company);
    }

    pub async fn insert_shop(&self, shop: ShopDetails) {
        let mut state = self.state.lock().await;
        state
            .shops
            .insert((shop.company_id.clone(), shop.shop_id.clone()), shop);
    }

    pub async fn insert_supplier(&self, supplier: SupplierDetails) {
        let mut state = self.state.lock().await;
        state.suppliers.insert(supplier.supplier_id.clone(), supplier);
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_product(&self, product_id: &str) -> AppResult<Option<ProductInfo>> {
        Ok(self.state.lock().await.products.get(product_id).cloned())
    }

    async fn find_company(&self, company_id: &str) -> AppResult<Option<CompanyDetails>> {
        Ok(self.state.lock().await.companies.get(company_id).cloned())
    }

    async fn find_shop(&self, company_id: &str, shop_id: &str) -> AppResult<Option<ShopDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .shops
            .get(&(company_id.to_string(), shop_id.to_string()))
            .cloned())
    }

    async fn find_supplier(&self, supplier_id: &str) -> AppResult<Option<SupplierDetails>> {
        Ok(self.state.lock().await.suppliers.get(supplier_id).cloned())
    }

    async fn get_ledger_entry(&self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>> {
        Ok(self.state.lock().await.ledger.get(key).cloned())
    }

    async fn list_ledger_entries(
        &self,
        company_id: &str,
        shop_id: &str,
        category_id: Option<&str>,
    ) -> AppResult<Vec<StockLedgerEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .ledger
            .values()
            .filter(|e| e.company_id == company_id && e.shop_id == shop_id)
            .filter(|e| category_id.map_or(true, |c| e.category_id == c))
            .cloned()
            .collect())
    }

    async fn find_header(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>> {
        let state = self.state.lock().await;
        Ok(find_header(&state.headers, company_id, shop_id, transaction_code).cloned())
    }

    async fn list_headers(&self, filter: &ReceiptFilter) -> AppResult<Vec<ReceiptHeader>> {
        let state = self.state.lock().await;
        let mut headers: Vec<ReceiptHeader> = state
            .headers
            .iter()
            .filter(|h| filter.matches(h))
            .cloned()
            .collect();
        headers.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(headers)
    }

    async fn list_lines(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        let state = self.state.lock().await;
        Ok(state
            .lines
            .iter()
            .filter(|l| is_line_of(l, company_id, shop_id, transaction_code))
            .cloned()
            .collect())
    }

    async fn list_shop_lines(
        &self,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        let state = self.state.lock().await;
        Ok(state
            .lines
            .iter()
            .filter(|l| l.company_id == company_id && l.shop_id == shop_id)
            .cloned()
            .collect())
    }

    async fn list_movements(
        &self,
        company_id: &str,
        shop_id: &str,
    ) -> AppResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.company_id == company_id && m.shop_id == shop_id)
            .cloned()
            .collect())
    }

    async fn list_issued_codes(
        &self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<Vec<IssuedCode>> {
        let state = self.state.lock().await;
        Ok(state
            .codes
            .iter()
            .filter(|c| c.company_id == company_id && c.shop_id == shop_id && c.prefix == prefix)
            .cloned()
            .collect())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> AppResult<AuditEntry> {
        let mut state = self.state.lock().await;
        state.last_audit_id += 1;
        let stored = AuditEntry {
            id: state.last_audit_id,
            company_id: entry.company_id,
            shop_id: entry.shop_id,
            created_by: entry.created_by,
            message: entry.message,
            created_at: Utc::now(),
        };
        state.audit.push(stored.clone());
        Ok(stored)
    }

    async fn list_audit(&self, company_id: &str, shop_id: &str) -> AppResult<Vec<AuditEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .filter(|a| a.company_id == company_id && a.shop_id == shop_id)
            .cloned()
            .collect())
    }

    async fn pending_events(&self, limit: i64) -> AppResult<Vec<OutboxEvent>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.dispatched_at.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_event_dispatched(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let event = state
            .outbox
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Outbox event {}", id)))?;
        event.dispatched_at = Some(Utc::now());
        Ok(())
    }
}

fn find_header<'a>(
    headers: &'a [ReceiptHeader],
    company_id: &str,
    shop_id: &str,
    transaction_code: &str,
) -> Option<&'a ReceiptHeader> {
    headers.iter().find(|h| {
        h.company_id == company_id && h.shop_id == shop_id && h.transaction_code == transaction_code
    })
}

/// Unit of work over a private copy of the store state
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn next_code_value(
        &mut self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<i64> {
        let counter = self
            .working
            .counters
            .entry((company_id.to_string(), shop_id.to_string(), prefix.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn record_code(&mut self, code: &IssuedCode) -> AppResult<()> {
        self.working.codes.push(code.clone());
        Ok(())
    }

    async fn lock_ledger_entry(&mut self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>> {
        Ok(self.working.ledger.get(key).cloned())
    }

    async fn put_ledger_entry(&mut self, entry: &StockLedgerEntry) -> AppResult<()> {
        self.working.ledger.insert(entry.key(), entry.clone());
        Ok(())
    }

    async fn lock_header(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>> {
        Ok(find_header(&self.working.headers, company_id, shop_id, transaction_code).cloned())
    }

    async fn insert_header(&mut self, header: NewReceiptHeader) -> AppResult<ReceiptHeader> {
        if find_header(
            &self.working.headers,
            &header.company_id,
            &header.shop_id,
            &header.transaction_code,
        )
        .is_some()
        {
            return Err(AppError::Conflict {
                resource: header.transaction_code,
                message: "A receipt with this code already exists".to_string(),
            });
        }

        self.working.last_header_id += 1;
        let now = Utc::now();
        let stored = ReceiptHeader {
            id: self.working.last_header_id,
            transaction_code: header.transaction_code,
            company_id: header.company_id,
            shop_id: header.shop_id,
            supplier_id: header.supplier_id,
            transaction_date_time: header.transaction_date_time,
            transaction_type: GRN_TRANSACTION_TYPE.to_string(),
            direction: StockDirection::In,
            status: ReceiptStatus::Pending,
            total_cost: header.total_cost,
            outstanding_amount: header.total_cost,
            created_by: header.created_by,
            created_at: now,
            updated_at: now,
        };
        self.working.headers.push(stored.clone());
        Ok(stored)
    }

    async fn update_header(&mut self, header: &ReceiptHeader) -> AppResult<()> {
        let slot = self
            .working
            .headers
            .iter_mut()
            .find(|h| h.id == header.id)
            .ok_or_else(|| AppError::NotFound(format!("GRN {}", header.transaction_code)))?;
        *slot = header.clone();
        Ok(())
    }

    async fn lines_for(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>> {
        Ok(self
            .working
            .lines
            .iter()
            .filter(|l| is_line_of(l, company_id, shop_id, transaction_code))
            .cloned()
            .collect())
    }

    async fn insert_line(&mut self, line: NewReceiptLine) -> AppResult<ReceiptLine> {
        self.working.last_line_id += 1;
        let now = Utc::now();
        let stored = ReceiptLine {
            id: self.working.last_line_id,
            total_cost: line.unit_cost * line.quantity,
            transaction_code: line.transaction_code,
            company_id: line.company_id,
            shop_id: line.shop_id,
            supplier_id: line.supplier_id,
            category_id: line.category_id,
            product_id: line.product_id,
            unit_cost: line.unit_cost,
            quantity: line.quantity,
            direction: line.direction,
            status: line.status,
            transaction_date_time: line.transaction_date_time,
            created_by: line.created_by,
            remarks: line.remarks,
            created_at: now,
            updated_at: now,
        };
        self.working.lines.push(stored.clone());
        Ok(stored)
    }

    async fn update_line(&mut self, line: &ReceiptLine) -> AppResult<()> {
        let slot = self
            .working
            .lines
            .iter_mut()
            .find(|l| l.id == line.id)
            .ok_or_else(|| AppError::NotFound(format!("GRN line {}", line.id)))?;
        *slot = line.clone();
        Ok(())
    }

    async fn delete_lines(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<u64> {
        let before = self.working.lines.len();
        self.working
            .lines
            .retain(|l| !is_line_of(l, company_id, shop_id, transaction_code));
        Ok((before - self.working.lines.len()) as u64)
    }

    async fn insert_movement(&mut self, mut movement: StockMovement) -> AppResult<StockMovement> {
        self.working.last_movement_id += 1;
        movement.id = self.working.last_movement_id;
        self.working.movements.push(movement.clone());
        Ok(movement)
    }

    async fn enqueue_event(&mut self, event: NewOutboxEvent) -> AppResult<()> {
        self.working.outbox.push(OutboxEvent {
            id: Uuid::new_v4(),
            event: event.event,
            company_id: event.company_id,
            shop_id: event.shop_id,
            payload: event.payload,
            created_at: Utc::now(),
            dispatched_at: None,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
