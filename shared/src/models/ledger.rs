//! Stock ledger entries and weighted-average-cost arithmetic
//!
//! Every change to a shop's stock level goes through [`apply_incoming`] or
//! [`apply_outgoing`]. Both are pure: they take the current entry and return
//! the next one, leaving the input untouched when the movement is rejected.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency precision of unit costs and presented averages
pub const COST_SCALE: u32 = 2;

/// Precision the running average cost is stored at. Reversing a receipt
/// must land back on the earlier cost once presented at [`COST_SCALE`].
pub const AVERAGE_COST_SCALE: u32 = 8;

/// Round a cost to currency precision
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn round_average_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AVERAGE_COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn serialize_cost<S: serde::Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    Serialize::serialize(&round_cost(*value), serializer)
}

/// Composite identity of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub company_id: String,
    pub shop_id: String,
    pub category_id: String,
    pub product_id: String,
}

impl LedgerKey {
    pub fn new(
        company_id: impl Into<String>,
        shop_id: impl Into<String>,
        category_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            shop_id: shop_id.into(),
            category_id: category_id.into(),
            product_id: product_id.into(),
        }
    }

    /// Stable text form, used as the lock key for serialized updates
    pub fn lock_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.company_id, self.shop_id, self.category_id, self.product_id
        )
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.shop_id, self.category_id, self.product_id)
    }
}

/// Whether a ledger entry is active for selling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerToggle {
    #[default]
    Enabled,
    Disabled,
}

impl LedgerToggle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerToggle::Enabled => "enabled",
            LedgerToggle::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(LedgerToggle::Enabled),
            "disabled" => Some(LedgerToggle::Disabled),
            _ => None,
        }
    }
}

/// What happens to the average cost when stock drops to exactly zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroStockCostPolicy {
    /// Keep the last average cost so an empty SKU still carries a cost
    #[default]
    HoldPrevious,
    /// Collapse the average cost to zero
    Reset,
}

/// Per-(company, shop, category, product) stock and cost record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    pub company_id: String,
    pub shop_id: String,
    pub category_id: String,
    pub product_id: String,
    pub total_quantity: Decimal,
    /// Stored at [`AVERAGE_COST_SCALE`], serialized at currency precision
    #[serde(serialize_with = "serialize_cost")]
    pub weighted_average_cost: Decimal,
    pub last_purchase_cost: Decimal,
    pub minimum_quantity: Decimal,
    /// Suppliers that have ever delivered this product, in first-seen order
    pub supplier_ids: Vec<String>,
    pub toggle: LedgerToggle,
    pub created_by: String,
    /// Incremented on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(
            &self.company_id,
            &self.shop_id,
            &self.category_id,
            &self.product_id,
        )
    }

    /// Average cost at currency precision
    pub fn average_cost(&self) -> Decimal {
        round_cost(self.weighted_average_cost)
    }

    /// Value of the stock on hand at average cost
    pub fn stock_value(&self) -> Decimal {
        round_cost(self.total_quantity * self.weighted_average_cost)
    }

    pub fn is_low_stock(&self) -> bool {
        self.total_quantity <= self.minimum_quantity
    }

    fn add_supplier(&mut self, supplier_id: &str) {
        if !self.supplier_ids.iter().any(|s| s == supplier_id) {
            self.supplier_ids.push(supplier_id.to_string());
        }
    }
}

/// Stock arriving into a shop
#[derive(Debug, Clone, Copy)]
pub struct StockIn<'a> {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Absent for stock coming back from customers
    pub supplier_id: Option<&'a str>,
}

/// Stock leaving a shop, or a receipt being reversed
#[derive(Debug, Clone, Copy)]
pub struct StockOut {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Attributes given to an entry created by its first receipt
#[derive(Debug, Clone, Copy)]
pub struct EntryDefaults<'a> {
    pub minimum_quantity: Decimal,
    pub created_by: &'a str,
}

/// Errors raised by ledger arithmetic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("unit cost cannot be negative, got {0}")]
    NegativeCost(Decimal),

    #[error("resulting quantity would be negative ({0})")]
    NegativeQuantity(Decimal),

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },
}

fn check_movement(quantity: Decimal, unit_cost: Decimal) -> Result<(), LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity(quantity));
    }
    if unit_cost < Decimal::ZERO {
        return Err(LedgerError::NegativeCost(unit_cost));
    }
    Ok(())
}

/// Apply a receipt of stock, creating the entry when none exists yet
pub fn apply_incoming(
    entry: Option<&StockLedgerEntry>,
    key: &LedgerKey,
    stock: StockIn<'_>,
    defaults: EntryDefaults<'_>,
    now: DateTime<Utc>,
) -> Result<StockLedgerEntry, LedgerError> {
    check_movement(stock.quantity, stock.unit_cost)?;

    let Some(current) = entry else {
        return Ok(StockLedgerEntry {
            company_id: key.company_id.clone(),
            shop_id: key.shop_id.clone(),
            category_id: key.category_id.clone(),
            product_id: key.product_id.clone(),
            total_quantity: stock.quantity,
            weighted_average_cost: round_average_cost(stock.unit_cost),
            last_purchase_cost: round_cost(stock.unit_cost),
            minimum_quantity: defaults.minimum_quantity,
            supplier_ids: stock.supplier_id.map(str::to_string).into_iter().collect(),
            toggle: LedgerToggle::Enabled,
            created_by: defaults.created_by.to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        });
    };

    let new_quantity = current.total_quantity + stock.quantity;
    if new_quantity < Decimal::ZERO {
        return Err(LedgerError::NegativeQuantity(new_quantity));
    }

    let mut next = current.clone();
    next.weighted_average_cost = if new_quantity.is_zero() {
        current.weighted_average_cost
    } else {
        let value = current.total_quantity * current.weighted_average_cost
            + stock.quantity * stock.unit_cost;
        round_average_cost(value / new_quantity)
    };
    next.total_quantity = new_quantity;
    next.last_purchase_cost = round_cost(stock.unit_cost);
    if let Some(supplier_id) = stock.supplier_id {
        next.add_supplier(supplier_id);
    }
    next.version += 1;
    next.updated_at = now;

    Ok(next)
}

/// Remove stock, reversing its contribution to the average cost
pub fn apply_outgoing(
    entry: &StockLedgerEntry,
    stock: StockOut,
    zero_policy: ZeroStockCostPolicy,
    now: DateTime<Utc>,
) -> Result<StockLedgerEntry, LedgerError> {
    check_movement(stock.quantity, stock.unit_cost)?;

    let new_quantity = entry.total_quantity - stock.quantity;
    if new_quantity < Decimal::ZERO {
        return Err(LedgerError::InsufficientStock {
            available: entry.total_quantity,
            requested: stock.quantity,
        });
    }

    let mut next = entry.clone();
    next.weighted_average_cost = if new_quantity.is_zero() {
        match zero_policy {
            ZeroStockCostPolicy::HoldPrevious => entry.weighted_average_cost,
            ZeroStockCostPolicy::Reset => Decimal::ZERO,
        }
    } else {
        let value = entry.total_quantity * entry.weighted_average_cost
            - stock.quantity * stock.unit_cost;
        // Removing stock priced above the running average can push the
        // residual value below zero; cost is floored at zero.
        round_average_cost(value / new_quantity).max(Decimal::ZERO)
    };
    next.total_quantity = new_quantity;
    next.version += 1;
    next.updated_at = now;

    Ok(next)
}
