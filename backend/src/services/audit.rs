//! Audit log sink
//!
//! Audit entries are written after the change they describe has committed.
//! A failed write never fails the operation that triggered it.

use std::sync::Arc;

use crate::error::AppResult;
use crate::models::{AuditEntry, NewAuditEntry};
use crate::store::InventoryStore;

/// Append-only record of stock-changing activity
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn InventoryStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Record a message; failures are logged and swallowed
    pub async fn record(&self, company_id: &str, shop_id: &str, actor: &str, message: &str) {
        let entry = NewAuditEntry {
            company_id: company_id.to_string(),
            shop_id: shop_id.to_string(),
            created_by: actor.to_string(),
            message: message.to_string(),
        };

        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!(
                company_id,
                shop_id,
                "Failed to write audit entry '{}': {}",
                message,
                e
            );
        }
    }

    pub async fn list(&self, company_id: &str, shop_id: &str) -> AppResult<Vec<AuditEntry>> {
        self.store.list_audit(company_id, shop_id).await
    }
}
