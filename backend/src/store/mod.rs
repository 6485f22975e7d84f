//! Persistence for the inventory engine
//!
//! [`InventoryStore`] answers read queries and opens units of work. Every
//! write goes through a [`UnitOfWork`]: nothing it does is visible to other
//! callers until [`UnitOfWork::commit`], and dropping it without committing
//! discards all of its writes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    AuditEntry, CompanyDetails, IssuedCode, LedgerKey, NewAuditEntry, NewOutboxEvent,
    NewReceiptHeader, NewReceiptLine, OutboxEvent, ProductInfo, ReceiptFilter,
    ReceiptHeader, ReceiptLine, ShopDetails, StockLedgerEntry, StockMovement, SupplierDetails,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Check that the backing store answers
    async fn ping(&self) -> AppResult<()>;

    // Catalog lookups
    async fn find_product(&self, product_id: &str) -> AppResult<Option<ProductInfo>>;
    async fn find_company(&self, company_id: &str) -> AppResult<Option<CompanyDetails>>;
    async fn find_shop(&self, company_id: &str, shop_id: &str) -> AppResult<Option<ShopDetails>>;
    async fn find_supplier(&self, supplier_id: &str) -> AppResult<Option<SupplierDetails>>;

    // Ledger
    async fn get_ledger_entry(&self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>>;
    async fn list_ledger_entries(
        &self,
        company_id: &str,
        shop_id: &str,
        category_id: Option<&str>,
    ) -> AppResult<Vec<StockLedgerEntry>>;

    // Receipts
    async fn find_header(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>>;
    /// Headers matching `filter`, newest first
    async fn list_headers(&self, filter: &ReceiptFilter) -> AppResult<Vec<ReceiptHeader>>;
    async fn list_lines(
        &self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>>;
    /// Every receipt line of a shop, for report replay
    async fn list_shop_lines(&self, company_id: &str, shop_id: &str)
        -> AppResult<Vec<ReceiptLine>>;

    // Movements posted by selling and stock engines
    async fn list_movements(&self, company_id: &str, shop_id: &str)
        -> AppResult<Vec<StockMovement>>;

    // Codes
    async fn list_issued_codes(
        &self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<Vec<IssuedCode>>;

    // Audit log
    async fn append_audit(&self, entry: NewAuditEntry) -> AppResult<AuditEntry>;
    async fn list_audit(&self, company_id: &str, shop_id: &str) -> AppResult<Vec<AuditEntry>>;

    // Outbox
    /// Undelivered events, oldest first
    async fn pending_events(&self, limit: i64) -> AppResult<Vec<OutboxEvent>>;
    async fn mark_event_dispatched(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    /// Increment and return the counter for (company, shop, prefix)
    async fn next_code_value(
        &mut self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<i64>;
    async fn record_code(&mut self, code: &IssuedCode) -> AppResult<()>;

    /// Read a ledger entry, holding it against concurrent writers until the
    /// unit of work ends
    async fn lock_ledger_entry(&mut self, key: &LedgerKey) -> AppResult<Option<StockLedgerEntry>>;
    /// Insert or replace a ledger entry
    async fn put_ledger_entry(&mut self, entry: &StockLedgerEntry) -> AppResult<()>;

    async fn lock_header(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Option<ReceiptHeader>>;
    async fn insert_header(&mut self, header: NewReceiptHeader) -> AppResult<ReceiptHeader>;
    async fn update_header(&mut self, header: &ReceiptHeader) -> AppResult<()>;

    async fn lines_for(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<Vec<ReceiptLine>>;
    async fn insert_line(&mut self, line: NewReceiptLine) -> AppResult<ReceiptLine>;
    async fn update_line(&mut self, line: &ReceiptLine) -> AppResult<()>;
    async fn delete_lines(
        &mut self,
        company_id: &str,
        shop_id: &str,
        transaction_code: &str,
    ) -> AppResult<u64>;

    /// Store a movement; its `id` is assigned by the store
    async fn insert_movement(&mut self, movement: StockMovement) -> AppResult<StockMovement>;

    async fn enqueue_event(&mut self, event: NewOutboxEvent) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
