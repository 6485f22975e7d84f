//! Stock ledger service
//!
//! The only code path that writes ledger entries. Every write happens inside a
//! caller-provided unit of work, after the entry's key has been locked.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};
use crate::models::{
    apply_incoming, apply_outgoing, DomainEventKind, EntryDefaults, LedgerKey, StockIn,
    StockLedgerEntry, StockOut, ZeroStockCostPolicy,
};
use crate::store::{InventoryStore, UnitOfWork};

/// Result of a ledger write
#[derive(Debug, Clone)]
pub struct LedgerChange {
    pub entry: StockLedgerEntry,
    /// The entry did not exist before this write
    pub created: bool,
}

impl LedgerChange {
    pub fn event(&self) -> DomainEventKind {
        if self.created {
            DomainEventKind::NewInventory
        } else {
            DomainEventKind::UpdateInventory
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn InventoryStore>,
    default_minimum_quantity: Decimal,
}

impl LedgerService {
    pub fn new(store: Arc<dyn InventoryStore>, default_minimum_quantity: Decimal) -> Self {
        Self {
            store,
            default_minimum_quantity,
        }
    }

    /// Get a single ledger entry
    pub async fn get_entry(&self, key: &LedgerKey) -> AppResult<StockLedgerEntry> {
        self.store
            .get_ledger_entry(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory for {}", key)))
    }

    /// List a shop's ledger entries, optionally for one category
    pub async fn list_entries(
        &self,
        company_id: &str,
        shop_id: &str,
        category_id: Option<&str>,
    ) -> AppResult<Vec<StockLedgerEntry>> {
        self.store
            .list_ledger_entries(company_id, shop_id, category_id)
            .await
    }

    /// Add stock, creating the entry on first receipt
    pub async fn receive(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &LedgerKey,
        stock: StockIn<'_>,
        created_by: &str,
    ) -> AppResult<LedgerChange> {
        let current = uow.lock_ledger_entry(key).await?;
        let defaults = EntryDefaults {
            minimum_quantity: self.default_minimum_quantity,
            created_by,
        };

        let entry = apply_incoming(current.as_ref(), key, stock, defaults, Utc::now())
            .map_err(|e| AppError::from_ledger(e, key))?;
        uow.put_ledger_entry(&entry).await?;

        tracing::debug!(
            "Ledger {} received {} @ {}: qty {} wac {}",
            key,
            stock.quantity,
            stock.unit_cost,
            entry.total_quantity,
            entry.weighted_average_cost
        );

        Ok(LedgerChange {
            entry,
            created: current.is_none(),
        })
    }

    /// Remove stock, reversing its cost contribution.
    /// Returns `None` when the key has no entry, leaving the decision to the caller.
    pub async fn issue(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &LedgerKey,
        stock: StockOut,
        zero_policy: ZeroStockCostPolicy,
    ) -> AppResult<Option<StockLedgerEntry>> {
        let Some(current) = uow.lock_ledger_entry(key).await? else {
            return Ok(None);
        };

        let entry = apply_outgoing(&current, stock, zero_policy, Utc::now())
            .map_err(|e| AppError::from_ledger(e, key))?;
        uow.put_ledger_entry(&entry).await?;

        tracing::debug!(
            "Ledger {} issued {} @ {}: qty {} wac {}",
            key,
            stock.quantity,
            stock.unit_cost,
            entry.total_quantity,
            entry.weighted_average_cost
        );

        Ok(Some(entry))
    }
}
