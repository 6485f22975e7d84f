//! Goods receipt tests
//!
//! Tests for receipt handling including:
//! - Receipt creation, cancellation, settlement and update against the ledger
//! - Status transitions
//! - Atomic rollback when a ledger guard fails
//! - Concurrent receipts against one product
//! - Outbox delivery after commit

mod common;

use std::time::Duration;

use common::*;
use pos_inventory::error::AppError;
use pos_inventory::middleware::Role;
use pos_inventory::models::{
    DomainEventKind, LineStatus, MovementStatus, MovementType, NewStockMovement, ReceiptStatus,
    StockDirection, UpdateReceiptInput,
};
use pos_inventory::services::{EventBus, LedgerService, OutboxDispatcher};
use pos_inventory::store::{InventoryStore, MemoryStore};

fn sale(product_id: &str, quantity: &str) -> NewStockMovement {
    NewStockMovement {
        company_id: COMPANY.to_string(),
        shop_id: SHOP.to_string(),
        transaction_code: "SAL-1".to_string(),
        movement_type: MovementType::Sales,
        direction: StockDirection::Out,
        status: MovementStatus::Completed,
        category_id: Some(CATEGORY.to_string()),
        product_id: Some(product_id.to_string()),
        product_quantity: dec(quantity),
        unit_cost: dec("0"),
        consumed: Vec::new(),
        transaction_date_time: at(2024, 3, 6),
        created_by: "UserID-2".to_string(),
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_receipt_applies_lines_to_ledger() {
    let (memory, store) = seeded_store().await;
    let grns = grn_service(&store);

    let created = grns
        .create_receipt(
            &stock_manager(),
            receipt(vec![line(P1, "5", "10"), line(P2, "3", "20")]),
        )
        .await
        .unwrap();

    assert_eq!(created.header.transaction_code, "GRN-1");
    assert_eq!(created.header.status, ReceiptStatus::Pending);
    assert_eq!(created.header.total_cost, dec("110"));
    assert_eq!(created.header.outstanding_amount, dec("110"));
    assert_eq!(created.header.created_by, "UserID-1");
    assert_eq!(created.lines.len(), 2);
    assert_eq!(created.lines[0].product_id, P1);
    assert!(created
        .lines
        .iter()
        .all(|l| l.status == LineStatus::Pending && l.direction == StockDirection::In));

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("5"));
    assert_eq!(p1.weighted_average_cost, dec("10"));
    assert_eq!(p1.supplier_ids, vec![SUPPLIER.to_string()]);
    assert_eq!(p1.minimum_quantity, dec("100"));

    let p2 = store.get_ledger_entry(&key(P2)).await.unwrap().unwrap();
    assert_eq!(p2.total_quantity, dec("3"));
    assert_eq!(p2.weighted_average_cost, dec("20"));

    let audit = memory_audit(&memory).await;
    assert!(audit.contains(&"New code number generated: GRN-1".to_string()));
    assert!(audit.contains(&"GRN Created: GRN-1".to_string()));
}

async fn memory_audit(memory: &MemoryStore) -> Vec<String> {
    memory
        .list_audit(COMPANY, SHOP)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.message)
        .collect()
}

#[tokio::test]
async fn test_second_receipt_weights_cost_and_cancel_restores_it() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10"), line(P2, "3", "20")]))
        .await
        .unwrap();
    let second = grns
        .create_receipt(&actor, receipt(vec![line(P1, "5", "20")]))
        .await
        .unwrap();
    assert_eq!(second.header.transaction_code, "GRN-2");

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("10"));
    assert_eq!(p1.weighted_average_cost, dec("15"));
    assert_eq!(p1.last_purchase_cost, dec("20"));

    let cancelled = grns
        .cancel_receipt(&actor, "GRN-2", COMPANY, SHOP)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ReceiptStatus::Cancelled);

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("5"));
    assert_eq!(p1.weighted_average_cost, dec("10"));

    let lines = store.list_lines(COMPANY, SHOP, "GRN-2").await.unwrap();
    assert!(lines
        .iter()
        .all(|l| l.status == LineStatus::Cancelled && l.direction == StockDirection::Out));
}

#[tokio::test]
async fn test_cancel_restores_cost_to_the_cent() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "3", "10.00")]))
        .await
        .unwrap();
    grns.create_receipt(&actor, receipt(vec![line(P1, "3", "10.01")]))
        .await
        .unwrap();
    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.average_cost(), dec("10.01"));

    grns.cancel_receipt(&actor, "GRN-2", COMPANY, SHOP)
        .await
        .unwrap();

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("3"));
    assert_eq!(p1.weighted_average_cost, dec("10.00"));
}

#[tokio::test]
async fn test_cancel_only_receipt_empties_entry() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();
    grns.cancel_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap();

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("0"));
    assert_eq!(p1.weighted_average_cost, dec("10"));
}

// ============================================================================
// Atomicity
// ============================================================================

#[tokio::test]
async fn test_cancel_blocked_by_sale_changes_nothing() {
    let (memory, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P2, "3", "20"), line(P1, "5", "10")]))
        .await
        .unwrap();
    movement_service(&store)
        .post_movement(&cashier(), sale(P1, "4"))
        .await
        .unwrap();
    let dispatcher =
        OutboxDispatcher::new(store.clone(), EventBus::new(), 100, Duration::from_millis(10));
    dispatcher.dispatch_pending().await.unwrap();

    let err = grns
        .cancel_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock {
            product_id,
            available,
            requested,
        } => {
            assert_eq!(product_id, P1);
            assert_eq!(available, dec("1"));
            assert_eq!(requested, dec("5"));
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    // P2 was reversed first inside the same unit of work; it must be untouched
    let p2 = store.get_ledger_entry(&key(P2)).await.unwrap().unwrap();
    assert_eq!(p2.total_quantity, dec("3"));
    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("1"));

    let header = store.find_header(COMPANY, SHOP, "GRN-1").await.unwrap().unwrap();
    assert_eq!(header.status, ReceiptStatus::Pending);
    let lines = store.list_lines(COMPANY, SHOP, "GRN-1").await.unwrap();
    assert!(lines.iter().all(|l| l.status == LineStatus::Pending));

    assert!(store.pending_events(100).await.unwrap().is_empty());
    assert!(!memory_audit(&memory)
        .await
        .iter()
        .any(|m| m.starts_with("GRN Canceled")));
}

#[tokio::test]
async fn test_failed_create_does_not_consume_code() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    let err = grns
        .create_receipt(&actor, receipt(vec![line(P1, "5", "10"), line(FINISHED, "1", "5")]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProductNotGrnEligible { .. }));
    assert!(store.get_ledger_entry(&key(P1)).await.unwrap().is_none());

    let created = grns
        .create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();
    assert_eq!(created.header.transaction_code, "GRN-1");
}

// ============================================================================
// Status transitions
// ============================================================================

#[tokio::test]
async fn test_settle_and_cancel_transitions() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();

    let settled = grns
        .settle_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap();
    assert_eq!(settled.status, ReceiptStatus::Completed);
    let lines = store.list_lines(COMPANY, SHOP, "GRN-1").await.unwrap();
    assert!(lines.iter().all(|l| l.status == LineStatus::Completed));

    // Settling has no ledger effect
    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("5"));

    let err = grns
        .settle_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let update = UpdateReceiptInput {
        supplier_id: SUPPLIER.to_string(),
        transaction_date_time: at(2024, 3, 7),
        created_by: None,
        lines: vec![line(P1, "1", "1")],
    };
    let err = grns
        .update_receipt(&actor, "GRN-1", COMPANY, SHOP, update)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    grns.cancel_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap();
    let err = grns
        .cancel_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
    let err = grns
        .settle_receipt(&actor, "GRN-1", COMPANY, SHOP)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_replaces_lines() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();

    let updated = grns
        .update_receipt(
            &actor,
            "GRN-1",
            COMPANY,
            SHOP,
            UpdateReceiptInput {
                supplier_id: "SupplierID-2".to_string(),
                transaction_date_time: at(2024, 3, 8),
                created_by: Some("UserID-3".to_string()),
                lines: vec![line(P2, "4", "25")],
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.header.supplier_id, "SupplierID-2");
    assert_eq!(updated.header.total_cost, dec("100"));
    assert_eq!(updated.header.outstanding_amount, dec("100"));
    assert_eq!(updated.header.created_by, "UserID-3");
    assert_eq!(updated.header.status, ReceiptStatus::Pending);
    assert_eq!(updated.lines.len(), 1);
    assert_eq!(updated.lines[0].status, LineStatus::Updated);

    let stored = store.list_lines(COMPANY, SHOP, "GRN-1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].product_id, P2);

    // The old line is reversed; an emptied entry keeps its last cost
    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("0"));
    assert_eq!(p1.weighted_average_cost, dec("10"));

    let p2 = store.get_ledger_entry(&key(P2)).await.unwrap().unwrap();
    assert_eq!(p2.total_quantity, dec("4"));
    assert_eq!(p2.weighted_average_cost, dec("25"));
    assert_eq!(p2.supplier_ids, vec!["SupplierID-2".to_string()]);
}

#[tokio::test]
async fn test_update_with_reset_policy_clears_cost() {
    let (_, store) = seeded_store().await;
    let mut config = inventory_config();
    config.update_reversal_zero_cost = pos_inventory::models::ZeroStockCostPolicy::Reset;
    let grns = pos_inventory::services::GrnService::new(store.clone(), config);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();
    grns.update_receipt(
        &actor,
        "GRN-1",
        COMPANY,
        SHOP,
        UpdateReceiptInput {
            supplier_id: SUPPLIER.to_string(),
            transaction_date_time: at(2024, 3, 8),
            created_by: None,
            lines: vec![line(P2, "1", "1")],
        },
    )
    .await
    .unwrap();

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("0"));
    assert_eq!(p1.weighted_average_cost, dec("0"));
}

#[tokio::test]
async fn test_update_blocked_by_sale_changes_nothing() {
    let (memory, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();
    movement_service(&store)
        .post_movement(&cashier(), sale(P1, "3"))
        .await
        .unwrap();
    let dispatcher =
        OutboxDispatcher::new(store.clone(), EventBus::new(), 100, Duration::from_millis(10));
    dispatcher.dispatch_pending().await.unwrap();

    let err = grns
        .update_receipt(
            &actor,
            "GRN-1",
            COMPANY,
            SHOP,
            UpdateReceiptInput {
                supplier_id: "SupplierID-2".to_string(),
                transaction_date_time: at(2024, 3, 8),
                created_by: None,
                lines: vec![line(P2, "4", "25")],
            },
        )
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock {
            product_id,
            available,
            requested,
        } => {
            assert_eq!(product_id, P1);
            assert_eq!(available, dec("2"));
            assert_eq!(requested, dec("5"));
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    let header = store.find_header(COMPANY, SHOP, "GRN-1").await.unwrap().unwrap();
    assert_eq!(header.supplier_id, SUPPLIER);
    assert_eq!(header.total_cost, dec("50"));
    assert_eq!(header.status, ReceiptStatus::Pending);

    let lines = store.list_lines(COMPANY, SHOP, "GRN-1").await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, P1);
    assert_eq!(lines[0].status, LineStatus::Pending);

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("2"));
    assert!(store.get_ledger_entry(&key(P2)).await.unwrap().is_none());

    assert!(store.pending_events(100).await.unwrap().is_empty());
    assert!(!memory_audit(&memory)
        .await
        .iter()
        .any(|m| m.starts_with("GRN Updated")));
}

// ============================================================================
// Authorization and validation
// ============================================================================

#[tokio::test]
async fn test_rejections_before_any_write() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);

    let err = grns
        .create_receipt(&cashier(), receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions));

    let outsider = user(Role::Admin, "CompanyID-2");
    let err = grns
        .create_receipt(&outsider, receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermissions));

    let err = grns
        .create_receipt(&stock_manager(), receipt(vec![line("ProductID-404", "5", "10")]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = grns
        .create_receipt(&stock_manager(), receipt(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = grns
        .create_receipt(&stock_manager(), receipt(vec![line(P1, "0", "10")]))
        .await
        .unwrap_err();
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "lines[0].quantity"),
        other => panic!("expected Validation, got {:?}", other),
    }

    let err = grns
        .cancel_receipt(&stock_manager(), "GRN-404", COMPANY, SHOP)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(store.get_ledger_entry(&key(P1)).await.unwrap().is_none());
    assert!(store.list_headers(&Default::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_super_admin_acts_across_companies() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);

    let admin = user(Role::SuperAdmin, "CompanyID-HQ");
    let created = grns
        .create_receipt(&admin, receipt(vec![line(P1, "2", "3")]))
        .await
        .unwrap();
    assert_eq!(created.header.company_id, COMPANY);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_queries() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let actor = stock_manager();

    grns.create_receipt(&actor, receipt(vec![line(P1, "1", "10")]))
        .await
        .unwrap();
    let mut other_supplier = receipt_on(at(2024, 4, 1), vec![line(P2, "1", "10")]);
    other_supplier.supplier_id = "SupplierID-2".to_string();
    grns.create_receipt(&actor, other_supplier).await.unwrap();

    let all = grns.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].transaction_code, "GRN-2");

    assert_eq!(grns.list_by_company(COMPANY).await.unwrap().len(), 2);
    assert_eq!(grns.list_by_shop(COMPANY, SHOP).await.unwrap().len(), 2);
    assert!(grns.list_by_shop(COMPANY, "ShopID-2").await.unwrap().is_empty());

    let by_supplier = grns.list_by_supplier(COMPANY, SHOP, SUPPLIER).await.unwrap();
    assert_eq!(by_supplier.len(), 1);
    assert_eq!(by_supplier[0].transaction_code, "GRN-1");

    let details = grns
        .get_with_lines_and_details(COMPANY, SHOP, "GRN-1")
        .await
        .unwrap();
    assert_eq!(details.lines.len(), 1);
    assert_eq!(details.company.unwrap().name, "Bean Counter Cafe");
    assert_eq!(details.shop.unwrap().name, "Main Street");
    assert_eq!(details.supplier.unwrap().name, "Highland Roasters");

    let details = grns
        .get_with_lines_and_details(COMPANY, SHOP, "GRN-2")
        .await
        .unwrap();
    assert!(details.supplier.is_none());

    let err = grns.get_with_lines(COMPANY, SHOP, "GRN-9").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receipts_keep_ledger_consistent() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);

    let mut handles = Vec::new();
    for i in 0..10 {
        let grns = grns.clone();
        handles.push(tokio::spawn(async move {
            let cost = (10 + i).to_string();
            grns.create_receipt(&stock_manager(), receipt(vec![line(P1, "1", &cost)]))
                .await
                .map(|r| r.header.transaction_code)
        }));
    }

    let mut codes = Vec::new();
    for handle in handles {
        codes.push(handle.await.unwrap().unwrap());
    }
    codes.sort_by_key(|c| shared::parse_code_suffix(c));
    let expected: Vec<String> = (1..=10).map(|n| format!("GRN-{}", n)).collect();
    assert_eq!(codes, expected);

    let p1 = store.get_ledger_entry(&key(P1)).await.unwrap().unwrap();
    assert_eq!(p1.total_quantity, dec("10"));
    // Exact mean of 10..=19 is 14.5; each step rounds to cents
    assert!((p1.weighted_average_cost - dec("14.5")).abs() <= dec("0.05"));
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_dispatched_after_commit() {
    let (_, store) = seeded_store().await;
    let grns = grn_service(&store);
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let dispatcher = OutboxDispatcher::new(store.clone(), bus, 100, Duration::from_millis(10));

    grns.create_receipt(&stock_manager(), receipt(vec![line(P1, "5", "10")]))
        .await
        .unwrap();

    let pending: Vec<DomainEventKind> = store
        .pending_events(100)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert_eq!(
        pending,
        vec![
            DomainEventKind::NewGrnTransaction,
            DomainEventKind::NewInventory,
            DomainEventKind::NewGrn,
        ]
    );

    assert_eq!(dispatcher.dispatch_pending().await.unwrap(), 3);
    assert!(store.pending_events(100).await.unwrap().is_empty());

    let first = receiver.recv().await.unwrap();
    assert_eq!(first.event, DomainEventKind::NewGrnTransaction);
    assert_eq!(first.company_id, COMPANY);
    assert_eq!(first.payload["transaction_code"], "GRN-1");

    // A second receipt for the same product updates rather than creates
    grns.create_receipt(&stock_manager(), receipt(vec![line(P1, "1", "10")]))
        .await
        .unwrap();
    let kinds: Vec<DomainEventKind> = store
        .pending_events(100)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(kinds.contains(&DomainEventKind::UpdateInventory));
    assert!(!kinds.contains(&DomainEventKind::NewInventory));
}

#[tokio::test]
async fn test_ledger_lookup_not_found() {
    let (_, store) = seeded_store().await;
    let ledger = LedgerService::new(store.clone(), dec("100"));

    let err = ledger.get_entry(&key(P1)).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
