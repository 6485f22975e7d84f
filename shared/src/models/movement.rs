//! Stock movements and their quantity impact on individual products
//!
//! A movement either moves a product directly (a receipt line, a sale of a
//! finished good) or consumes component products through its bill of
//! materials. Both kinds count toward the stock of every product they touch.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{LineStatus, ReceiptLine};

/// Direction of a movement relative to the shop's stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "In",
            StockDirection::Out => "Out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "In" => Some(StockDirection::In),
            "Out" => Some(StockDirection::Out),
            _ => None,
        }
    }

    /// Quantity with the sign of this direction
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            StockDirection::In => quantity,
            StockDirection::Out => -quantity,
        }
    }
}

/// Kind of transaction that moved stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    #[serde(rename = "GRN")]
    Grn,
    Purchase,
    Sales,
    Adjustment,
    Wastage,
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Grn => "GRN",
            MovementType::Purchase => "Purchase",
            MovementType::Sales => "Sales",
            MovementType::Adjustment => "Adjustment",
            MovementType::Wastage => "Wastage",
            MovementType::Return => "Return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GRN" => Some(MovementType::Grn),
            "Purchase" => Some(MovementType::Purchase),
            "Sales" => Some(MovementType::Sales),
            "Adjustment" => Some(MovementType::Adjustment),
            "Wastage" => Some(MovementType::Wastage),
            "Return" => Some(MovementType::Return),
            _ => None,
        }
    }
}

/// Lifecycle status of a movement posted by a selling or stock engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementStatus {
    Pending,
    Completed,
    Cancelled,
    Returned,
    #[serde(rename = "Partially Returned")]
    PartiallyReturned,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Pending => "Pending",
            MovementStatus::Completed => "Completed",
            MovementStatus::Cancelled => "Cancelled",
            MovementStatus::Returned => "Returned",
            MovementStatus::PartiallyReturned => "Partially Returned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(MovementStatus::Pending),
            "Completed" => Some(MovementStatus::Completed),
            "Cancelled" => Some(MovementStatus::Cancelled),
            "Returned" => Some(MovementStatus::Returned),
            "Partially Returned" => Some(MovementStatus::PartiallyReturned),
            _ => None,
        }
    }

    /// Only settled movements are replayed into stock reports
    pub fn counts_toward_stock(&self) -> bool {
        matches!(
            self,
            MovementStatus::Completed | MovementStatus::PartiallyReturned
        )
    }
}

/// A component product consumed through a bill of materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedProduct {
    pub product_id: String,
    pub quantity: Decimal,
    pub current_wac: Decimal,
}

/// A stock-affecting transaction as seen by reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub company_id: String,
    pub shop_id: String,
    pub transaction_code: String,
    pub movement_type: MovementType,
    pub direction: StockDirection,
    pub status: MovementStatus,
    /// Product moved directly, if any
    pub product_id: Option<String>,
    pub product_quantity: Decimal,
    pub consumed: Vec<ConsumedProduct>,
    pub transaction_date_time: DateTime<Utc>,
    pub created_by: String,
}

impl StockMovement {
    /// Signed quantity this movement applied to `product_id`
    pub fn quantity_impact(&self, product_id: &str) -> Decimal {
        if self.product_id.as_deref() == Some(product_id) {
            return self.direction.signed(self.product_quantity);
        }

        self.consumed
            .iter()
            .find(|c| c.product_id == product_id)
            .map(|c| self.direction.signed(c.quantity))
            .unwrap_or(Decimal::ZERO)
    }

    /// Receipt lines count as soon as they exist, because their stock is
    /// applied when the receipt is created; cancelled lines never count.
    pub fn from_receipt_line(line: &ReceiptLine) -> Option<Self> {
        if line.status == LineStatus::Cancelled {
            return None;
        }

        Some(Self {
            id: line.id,
            company_id: line.company_id.clone(),
            shop_id: line.shop_id.clone(),
            transaction_code: line.transaction_code.clone(),
            movement_type: MovementType::Grn,
            direction: line.direction,
            status: MovementStatus::Completed,
            product_id: Some(line.product_id.clone()),
            product_quantity: line.quantity,
            consumed: Vec::new(),
            transaction_date_time: line.transaction_date_time,
            created_by: line.created_by.clone(),
        })
    }
}

/// A movement posted by a sibling engine (sales, wastage, adjustment, returns)
#[derive(Debug, Clone, Deserialize)]
pub struct NewStockMovement {
    #[serde(alias = "companyId")]
    pub company_id: String,
    #[serde(alias = "shopId")]
    pub shop_id: String,
    #[serde(alias = "transactionCode")]
    pub transaction_code: String,
    #[serde(alias = "movementType")]
    pub movement_type: MovementType,
    pub direction: StockDirection,
    pub status: MovementStatus,
    /// Ledger category of the directly moved product
    #[serde(default, alias = "categoryId")]
    pub category_id: Option<String>,
    #[serde(default, alias = "productId")]
    pub product_id: Option<String>,
    #[serde(default, alias = "productQuantity")]
    pub product_quantity: Decimal,
    /// Unit cost used to extend the average cost of incoming stock
    #[serde(default, alias = "unitCost")]
    pub unit_cost: Decimal,
    #[serde(default, alias = "consumedProducts")]
    pub consumed: Vec<ConsumedLine>,
    #[serde(alias = "transactionDateTime")]
    pub transaction_date_time: DateTime<Utc>,
    #[serde(alias = "createdBy")]
    pub created_by: String,
}

/// A consumed component with the ledger category it is stocked under
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumedLine {
    #[serde(alias = "categoryId")]
    pub category_id: String,
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sale() -> StockMovement {
        StockMovement {
            id: 1,
            company_id: "CompanyID-1".to_string(),
            shop_id: "ShopID-1".to_string(),
            transaction_code: "ORD-1".to_string(),
            movement_type: MovementType::Sales,
            direction: StockDirection::Out,
            status: MovementStatus::Completed,
            product_id: Some("Burger".to_string()),
            product_quantity: dec("2"),
            consumed: vec![ConsumedProduct {
                product_id: "Bun".to_string(),
                quantity: dec("2"),
                current_wac: dec("0.50"),
            }],
            transaction_date_time: Utc::now(),
            created_by: "UserID-1".to_string(),
        }
    }

    #[test]
    fn test_direct_impact() {
        assert_eq!(sale().quantity_impact("Burger"), dec("-2"));
    }

    #[test]
    fn test_consumed_component_impact() {
        assert_eq!(sale().quantity_impact("Bun"), dec("-2"));
    }

    #[test]
    fn test_unrelated_product_has_no_impact() {
        assert_eq!(sale().quantity_impact("Patty"), Decimal::ZERO);
    }

    #[test]
    fn test_incoming_direction_is_positive() {
        let mut movement = sale();
        movement.direction = StockDirection::In;
        assert_eq!(movement.quantity_impact("Burger"), dec("2"));
    }

    #[test]
    fn test_counting_statuses() {
        assert!(MovementStatus::Completed.counts_toward_stock());
        assert!(MovementStatus::PartiallyReturned.counts_toward_stock());
        assert!(!MovementStatus::Pending.counts_toward_stock());
        assert!(!MovementStatus::Cancelled.counts_toward_stock());
        assert!(!MovementStatus::Returned.counts_toward_stock());
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            MovementStatus::Pending,
            MovementStatus::Completed,
            MovementStatus::Cancelled,
            MovementStatus::Returned,
            MovementStatus::PartiallyReturned,
        ] {
            assert_eq!(MovementStatus::parse(status.as_str()), Some(status));
        }
    }
}
