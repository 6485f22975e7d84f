//! Goods-receipt notes (GRN): headers, lines and their lifecycle

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use super::{CompanyDetails, LedgerKey, ShopDetails, StockDirection, SupplierDetails};

/// Transaction type recorded on every receipt header and line
pub const GRN_TRANSACTION_TYPE: &str = "GRN";

/// Receipt header status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Operations that move a receipt through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptAction {
    Settle,
    Cancel,
    Update,
}

impl std::fmt::Display for ReceiptAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReceiptAction::Settle => "settle",
            ReceiptAction::Cancel => "cancel",
            ReceiptAction::Update => "update",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a receipt that is {from}")]
    NotAllowed {
        from: ReceiptStatus,
        action: ReceiptAction,
    },
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "Pending",
            ReceiptStatus::Completed => "Completed",
            ReceiptStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(ReceiptStatus::Pending),
            "Completed" => Some(ReceiptStatus::Completed),
            "Cancelled" => Some(ReceiptStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending -> Completed
    pub fn settle(self) -> Result<Self, TransitionError> {
        match self {
            ReceiptStatus::Pending => Ok(ReceiptStatus::Completed),
            from => Err(TransitionError::NotAllowed {
                from,
                action: ReceiptAction::Settle,
            }),
        }
    }

    /// Pending | Completed -> Cancelled
    pub fn cancel(self) -> Result<Self, TransitionError> {
        match self {
            ReceiptStatus::Pending | ReceiptStatus::Completed => Ok(ReceiptStatus::Cancelled),
            from => Err(TransitionError::NotAllowed {
                from,
                action: ReceiptAction::Cancel,
            }),
        }
    }

    /// Only pending receipts may have their lines replaced
    pub fn ensure_editable(self) -> Result<Self, TransitionError> {
        match self {
            ReceiptStatus::Pending => Ok(self),
            from => Err(TransitionError::NotAllowed {
                from,
                action: ReceiptAction::Update,
            }),
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt line status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineStatus {
    Pending,
    Completed,
    Cancelled,
    Updated,
}

impl LineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Pending => "Pending",
            LineStatus::Completed => "Completed",
            LineStatus::Cancelled => "Cancelled",
            LineStatus::Updated => "Updated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(LineStatus::Pending),
            "Completed" => Some(LineStatus::Completed),
            "Cancelled" => Some(LineStatus::Cancelled),
            "Updated" => Some(LineStatus::Updated),
            _ => None,
        }
    }
}

/// Receipt header, one per transaction code within a shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptHeader {
    pub id: i64,
    pub transaction_code: String,
    pub company_id: String,
    pub shop_id: String,
    pub supplier_id: String,
    pub transaction_date_time: DateTime<Utc>,
    pub transaction_type: String,
    pub direction: StockDirection,
    pub status: ReceiptStatus,
    pub total_cost: Decimal,
    pub outstanding_amount: Decimal,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One received product on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub id: i64,
    pub transaction_code: String,
    pub company_id: String,
    pub shop_id: String,
    pub supplier_id: String,
    pub category_id: String,
    pub product_id: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub direction: StockDirection,
    pub status: LineStatus,
    pub transaction_date_time: DateTime<Utc>,
    pub created_by: String,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReceiptLine {
    pub fn ledger_key(&self) -> LedgerKey {
        LedgerKey::new(
            &self.company_id,
            &self.shop_id,
            &self.category_id,
            &self.product_id,
        )
    }
}

/// A requested receipt line
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ReceiptLineInput {
    #[serde(alias = "categoryId")]
    #[validate(length(min = 1, message = "category_id is required"))]
    pub category_id: String,
    #[serde(alias = "productId")]
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[serde(alias = "unitCost")]
    pub unit_cost: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl ReceiptLineInput {
    pub fn line_total(&self) -> Decimal {
        self.unit_cost * self.quantity
    }
}

/// Request to receive goods from a supplier
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateReceiptInput {
    #[serde(alias = "companyId")]
    #[validate(length(min = 1, message = "company_id is required"))]
    pub company_id: String,
    #[serde(alias = "shopId")]
    #[validate(length(min = 1, message = "shop_id is required"))]
    pub shop_id: String,
    #[serde(alias = "supplierId")]
    #[validate(length(min = 1, message = "supplier_id is required"))]
    pub supplier_id: String,
    #[serde(alias = "transactionDateTime")]
    pub transaction_date_time: DateTime<Utc>,
    /// Defaults to the authenticated user
    #[serde(default, alias = "createdBy")]
    pub created_by: Option<String>,
    #[serde(alias = "transactions")]
    pub lines: Vec<ReceiptLineInput>,
}

/// Replacement supplier, date and lines for a pending receipt
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateReceiptInput {
    #[serde(alias = "supplierId")]
    #[validate(length(min = 1, message = "supplier_id is required"))]
    pub supplier_id: String,
    #[serde(alias = "transactionDateTime")]
    pub transaction_date_time: DateTime<Utc>,
    #[serde(default, alias = "createdBy")]
    pub created_by: Option<String>,
    #[serde(alias = "transactions")]
    pub lines: Vec<ReceiptLineInput>,
}

/// Sum of `unit_cost * quantity` over all lines
pub fn receipt_total(lines: &[ReceiptLineInput]) -> Decimal {
    lines.iter().map(ReceiptLineInput::line_total).sum()
}

/// A header together with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptWithLines {
    pub header: ReceiptHeader,
    pub lines: Vec<ReceiptLine>,
}

/// A receipt with the reference data of its company, shop and supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDetails {
    pub header: ReceiptHeader,
    pub lines: Vec<ReceiptLine>,
    pub company: Option<CompanyDetails>,
    pub shop: Option<ShopDetails>,
    pub supplier: Option<SupplierDetails>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(product: &str, cost: &str, qty: &str) -> ReceiptLineInput {
        ReceiptLineInput {
            category_id: "CategoryID-1".to_string(),
            product_id: product.to_string(),
            unit_cost: dec(cost),
            quantity: dec(qty),
            remarks: None,
        }
    }

    #[test]
    fn test_settle_from_pending() {
        assert_eq!(ReceiptStatus::Pending.settle(), Ok(ReceiptStatus::Completed));
    }

    #[test]
    fn test_settle_rejected_twice_or_after_cancel() {
        assert!(ReceiptStatus::Completed.settle().is_err());
        assert!(ReceiptStatus::Cancelled.settle().is_err());
    }

    #[test]
    fn test_cancel_transitions() {
        assert_eq!(ReceiptStatus::Pending.cancel(), Ok(ReceiptStatus::Cancelled));
        assert_eq!(ReceiptStatus::Completed.cancel(), Ok(ReceiptStatus::Cancelled));
        assert_eq!(
            ReceiptStatus::Cancelled.cancel(),
            Err(TransitionError::NotAllowed {
                from: ReceiptStatus::Cancelled,
                action: ReceiptAction::Cancel,
            })
        );
    }

    #[test]
    fn test_only_pending_is_editable() {
        assert!(ReceiptStatus::Pending.ensure_editable().is_ok());
        assert!(ReceiptStatus::Completed.ensure_editable().is_err());
        assert!(ReceiptStatus::Cancelled.ensure_editable().is_err());
    }

    #[test]
    fn test_transition_error_message() {
        let err = ReceiptStatus::Cancelled.settle().unwrap_err();
        assert_eq!(err.to_string(), "cannot settle a receipt that is Cancelled");
    }

    #[test]
    fn test_receipt_total() {
        let lines = vec![line("P1", "10", "5"), line("P2", "20", "3")];
        assert_eq!(receipt_total(&lines), dec("110"));
    }

    #[test]
    fn test_create_input_accepts_client_field_names() {
        let json = r#"{
            "companyId": "CompanyID-1",
            "shopId": "ShopID-1",
            "supplierId": "SupplierID-1",
            "transactionDateTime": "2024-03-01T10:00:00Z",
            "transactions": [
                {"categoryId": "CategoryID-1", "productId": "P1", "unitCost": "10", "quantity": "5"}
            ]
        }"#;
        let input: CreateReceiptInput = serde_json::from_str(json).unwrap();

        assert_eq!(input.company_id, "CompanyID-1");
        assert_eq!(input.lines.len(), 1);
        assert_eq!(input.lines[0].unit_cost, dec("10"));
        assert!(input.created_by.is_none());
    }

    #[test]
    fn test_empty_ids_fail_validation() {
        let input = CreateReceiptInput {
            company_id: String::new(),
            shop_id: "ShopID-1".to_string(),
            supplier_id: "SupplierID-1".to_string(),
            transaction_date_time: Utc::now(),
            created_by: None,
            lines: vec![line("P1", "1", "1")],
        };
        assert!(input.validate().is_err());
    }
}
