//! Validation utilities for inventory requests

use rust_decimal::Decimal;

use crate::models::{code_prefix, ReceiptLineInput};

// ============================================================================
// Identifier Validations
// ============================================================================

/// Validate that an identifier (company, shop, product...) is present
pub fn validate_identifier(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Identifier cannot be empty");
    }
    if value.len() > 64 {
        return Err("Identifier cannot exceed 64 characters");
    }
    Ok(())
}

/// Validate a code description has a usable prefix (`GRN`, `GRN-Goods receipt`)
pub fn validate_code_prefix(description: &str) -> Result<(), &'static str> {
    let prefix = code_prefix(description);
    if prefix.is_empty() {
        return Err("Code prefix cannot be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Code prefix must be alphanumeric");
    }
    Ok(())
}

// ============================================================================
// Quantity and Cost Validations
// ============================================================================

/// Validate a moved quantity is strictly positive
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a unit cost is not negative
pub fn validate_unit_cost(unit_cost: Decimal) -> Result<(), &'static str> {
    if unit_cost < Decimal::ZERO {
        return Err("Unit cost cannot be negative");
    }
    Ok(())
}

/// Validate a calendar month number
pub fn validate_month(month: u32) -> Result<(), &'static str> {
    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12");
    }
    Ok(())
}

// ============================================================================
// Receipt Validations
// ============================================================================

/// A rejected receipt line; `index` is `None` when the line list itself is invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineValidationError {
    pub index: Option<usize>,
    pub field: &'static str,
    pub message: &'static str,
}

impl std::fmt::Display for LineValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "line {}: {}", index + 1, self.message),
            None => f.write_str(self.message),
        }
    }
}

/// Validate receipt lines: at least one, each with ids, positive quantity
/// and a non-negative unit cost
pub fn validate_receipt_lines(lines: &[ReceiptLineInput]) -> Result<(), LineValidationError> {
    if lines.is_empty() {
        return Err(LineValidationError {
            index: None,
            field: "lines",
            message: "At least one line is required",
        });
    }

    for (index, line) in lines.iter().enumerate() {
        let fail = |field, message| LineValidationError {
            index: Some(index),
            field,
            message,
        };
        validate_identifier(&line.category_id).map_err(|m| fail("category_id", m))?;
        validate_identifier(&line.product_id).map_err(|m| fail("product_id", m))?;
        validate_quantity(line.quantity).map_err(|m| fail("quantity", m))?;
        validate_unit_cost(line.unit_cost).map_err(|m| fail("unit_cost", m))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(qty: &str, cost: &str) -> ReceiptLineInput {
        ReceiptLineInput {
            category_id: "CategoryID-1".to_string(),
            product_id: "ProductID-1".to_string(),
            unit_cost: dec(cost),
            quantity: dec(qty),
            remarks: None,
        }
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("ShopID-1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_code_prefix() {
        assert!(validate_code_prefix("GRN").is_ok());
        assert!(validate_code_prefix("GRN-Goods receipt").is_ok());
        assert!(validate_code_prefix("").is_err());
        assert!(validate_code_prefix("-GRN").is_err());
        assert!(validate_code_prefix("G R N").is_err());
    }

    #[test]
    fn test_validate_quantity_and_cost() {
        assert!(validate_quantity(dec("0.5")).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(dec("-1")).is_err());
        assert!(validate_unit_cost(Decimal::ZERO).is_ok());
        assert!(validate_unit_cost(dec("-0.01")).is_err());
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(validate_month(0).is_err());
        assert!(validate_month(13).is_err());
    }

    #[test]
    fn test_validate_receipt_lines() {
        assert!(validate_receipt_lines(&[line("5", "10")]).is_ok());

        let empty = validate_receipt_lines(&[]).unwrap_err();
        assert_eq!(empty.field, "lines");

        let err = validate_receipt_lines(&[line("5", "10"), line("0", "10")]).unwrap_err();
        assert_eq!(err.index, Some(1));
        assert_eq!(err.field, "quantity");
        assert_eq!(err.to_string(), "line 2: Quantity must be greater than zero");

        let err = validate_receipt_lines(&[line("1", "-1")]).unwrap_err();
        assert_eq!(err.field, "unit_cost");
    }
}
