//! Reference data owned by other parts of the platform
//!
//! Products, companies, shops and suppliers are maintained elsewhere; the
//! inventory engine only reads them.

use serde::{Deserialize, Serialize};

/// Product catalog view used for receipt eligibility and report labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_id: String,
    pub company_id: String,
    pub name: String,
    pub product_type: String,
    pub requires_grn: bool,
    pub uom_id: Option<String>,
    pub bom_id: Option<String>,
}

impl ProductInfo {
    /// Raw materials always arrive through goods receipts; anything else
    /// must be flagged for receipt tracking explicitly.
    pub fn is_grn_eligible(&self) -> bool {
        self.product_type.to_lowercase().contains("raw") || self.requires_grn
    }

    /// Unit of measure label for reports
    pub fn uom_label(&self) -> String {
        self.uom_id.clone().unwrap_or_else(|| "N/A".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub company_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopDetails {
    pub company_id: String,
    pub shop_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDetails {
    pub supplier_id: String,
    pub name: String,
    pub contact: Option<String>,
}
