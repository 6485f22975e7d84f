//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use pos_inventory::config::{Config, InventoryConfig};
use pos_inventory::middleware::{AuthUser, Role};
use pos_inventory::models::{
    CompanyDetails, CreateReceiptInput, LedgerKey, ProductInfo, ReceiptLineInput, ShopDetails,
    SupplierDetails,
};
use pos_inventory::services::{GrnService, StockMovementService, StockReportService};
use pos_inventory::store::{InventoryStore, MemoryStore};

pub const COMPANY: &str = "CompanyID-1";
pub const SHOP: &str = "ShopID-1";
pub const CATEGORY: &str = "CategoryID-1";
pub const SUPPLIER: &str = "SupplierID-1";
pub const P1: &str = "ProductID-1";
pub const P2: &str = "ProductID-2";
/// Finished good that is not received through goods receipts
pub const FINISHED: &str = "ProductID-9";

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub fn key(product_id: &str) -> LedgerKey {
    LedgerKey::new(COMPANY, SHOP, CATEGORY, product_id)
}

fn product(product_id: &str, name: &str, product_type: &str) -> ProductInfo {
    ProductInfo {
        product_id: product_id.to_string(),
        company_id: COMPANY.to_string(),
        name: name.to_string(),
        product_type: product_type.to_string(),
        requires_grn: false,
        uom_id: Some("kg".to_string()),
        bom_id: None,
    }
}

/// Memory store with two raw materials, one finished good and reference data
pub async fn seeded_store() -> (MemoryStore, Arc<dyn InventoryStore>) {
    let memory = MemoryStore::new();
    memory.insert_product(product(P1, "Arabica Beans", "Raw Material")).await;
    memory.insert_product(product(P2, "Whole Milk", "Raw Material")).await;
    memory.insert_product(product(FINISHED, "Latte", "Finished Good")).await;
    memory
        .insert_company(CompanyDetails {
            company_id: COMPANY.to_string(),
            name: "Bean Counter Cafe".to_string(),
        })
        .await;
    memory
        .insert_shop(ShopDetails {
            company_id: COMPANY.to_string(),
            shop_id: SHOP.to_string(),
            name: "Main Street".to_string(),
        })
        .await;
    memory
        .insert_supplier(SupplierDetails {
            supplier_id: SUPPLIER.to_string(),
            name: "Highland Roasters".to_string(),
            contact: None,
        })
        .await;

    let store: Arc<dyn InventoryStore> = Arc::new(memory.clone());
    (memory, store)
}

pub fn inventory_config() -> InventoryConfig {
    Config::default().inventory
}

pub fn grn_service(store: &Arc<dyn InventoryStore>) -> GrnService {
    GrnService::new(store.clone(), inventory_config())
}

pub fn movement_service(store: &Arc<dyn InventoryStore>) -> StockMovementService {
    StockMovementService::new(store.clone(), inventory_config().default_minimum_quantity)
}

pub fn report_service(store: &Arc<dyn InventoryStore>) -> StockReportService {
    StockReportService::new(store.clone())
}

pub fn user(role: Role, company_id: &str) -> AuthUser {
    AuthUser {
        user_id: "UserID-1".to_string(),
        role,
        company_id: company_id.to_string(),
        shop_id: Some(SHOP.to_string()),
    }
}

pub fn stock_manager() -> AuthUser {
    user(Role::StockManager, COMPANY)
}

pub fn cashier() -> AuthUser {
    user(Role::Other("cashier".to_string()), COMPANY)
}

pub fn line(product_id: &str, quantity: &str, unit_cost: &str) -> ReceiptLineInput {
    ReceiptLineInput {
        category_id: CATEGORY.to_string(),
        product_id: product_id.to_string(),
        unit_cost: dec(unit_cost),
        quantity: dec(quantity),
        remarks: None,
    }
}

pub fn receipt(lines: Vec<ReceiptLineInput>) -> CreateReceiptInput {
    receipt_on(at(2024, 3, 5), lines)
}

pub fn receipt_on(date: DateTime<Utc>, lines: Vec<ReceiptLineInput>) -> CreateReceiptInput {
    CreateReceiptInput {
        company_id: COMPANY.to_string(),
        shop_id: SHOP.to_string(),
        supplier_id: SUPPLIER.to_string(),
        transaction_date_time: date,
        created_by: None,
        lines,
    }
}
