//! Persistence models for the POS inventory engine
//!
//! Re-exports models from the shared crate and adds backend-specific records
//! for audit entries, the event outbox, issued codes and new receipt rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use shared::models::*;

/// One line of the append-only audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub company_id: String,
    pub shop_id: String,
    pub created_by: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub company_id: String,
    pub shop_id: String,
    pub created_by: String,
    pub message: String,
}

/// A domain event written in the same unit of work as the change it describes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event: DomainEventKind,
    pub company_id: String,
    pub shop_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub event: DomainEventKind,
    pub company_id: String,
    pub shop_id: String,
    pub payload: serde_json::Value,
}

impl NewOutboxEvent {
    pub fn new<T: Serialize>(
        event: DomainEventKind,
        company_id: &str,
        shop_id: &str,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event,
            company_id: company_id.to_string(),
            shop_id: shop_id.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// A code handed out by the allocator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCode {
    pub company_id: String,
    pub shop_id: String,
    pub prefix: String,
    pub value: i64,
    pub code: String,
    pub description: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Header row to insert; new headers start Pending with the full total outstanding
#[derive(Debug, Clone)]
pub struct NewReceiptHeader {
    pub transaction_code: String,
    pub company_id: String,
    pub shop_id: String,
    pub supplier_id: String,
    pub transaction_date_time: DateTime<Utc>,
    pub total_cost: Decimal,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct NewReceiptLine {
    pub transaction_code: String,
    pub company_id: String,
    pub shop_id: String,
    pub supplier_id: String,
    pub category_id: String,
    pub product_id: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
    pub direction: StockDirection,
    pub status: LineStatus,
    pub transaction_date_time: DateTime<Utc>,
    pub created_by: String,
    pub remarks: Option<String>,
}

/// Receipt header query; every field narrows the result
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub company_id: Option<String>,
    pub shop_id: Option<String>,
    pub supplier_id: Option<String>,
    /// Inclusive lower bound on the transaction date
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the transaction date
    pub to: Option<DateTime<Utc>>,
}

impl ReceiptFilter {
    pub fn matches(&self, header: &ReceiptHeader) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        eq(&self.company_id, &header.company_id)
            && eq(&self.shop_id, &header.shop_id)
            && eq(&self.supplier_id, &header.supplier_id)
            && self.from.map_or(true, |from| header.transaction_date_time >= from)
            && self.to.map_or(true, |to| header.transaction_date_time < to)
    }
}
