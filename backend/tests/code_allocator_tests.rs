//! Sequential code allocator tests
//!
//! Tests for document codes including:
//! - Codes increase by one per (company, shop, prefix)
//! - Concurrent allocations never repeat a code
//! - Rolled-back allocations do not leave gaps

mod common;

use std::collections::HashSet;

use common::*;
use pos_inventory::error::AppError;
use pos_inventory::services::CodeAllocator;
use pos_inventory::store::InventoryStore;

#[tokio::test]
async fn test_sequential_codes_per_scope() {
    let (_, store) = seeded_store().await;
    let codes = CodeAllocator::new(store.clone());

    for expected in ["GRN-1", "GRN-2", "GRN-3"] {
        let code = codes.allocate(COMPANY, SHOP, "UserID-1", "GRN").await.unwrap();
        assert_eq!(code, expected);
    }

    // Other prefixes and shops count on their own
    let po = codes
        .allocate(COMPANY, SHOP, "UserID-1", "PO-Purchase order")
        .await
        .unwrap();
    assert_eq!(po, "PO-1");
    let other_shop = codes.allocate(COMPANY, "ShopID-2", "UserID-1", "GRN").await.unwrap();
    assert_eq!(other_shop, "GRN-1");

    let history = codes.history(COMPANY, SHOP, "GRN").await.unwrap();
    let values: Vec<i64> = history.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(history[0].description, "GRN");

    let audit = store.list_audit(COMPANY, SHOP).await.unwrap();
    assert!(audit
        .iter()
        .any(|a| a.message == "New code number generated: GRN-3"));
}

#[tokio::test]
async fn test_empty_prefix_rejected() {
    let (_, store) = seeded_store().await;
    let codes = CodeAllocator::new(store.clone());

    for description in ["", "-Goods receipt", "G R N"] {
        let err = codes
            .allocate(COMPANY, SHOP, "UserID-1", description)
            .await
            .unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "description"),
            other => panic!("expected Validation, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_dropped_unit_of_work_releases_code() {
    let (_, store) = seeded_store().await;
    let codes = CodeAllocator::new(store.clone());

    {
        let mut uow = store.begin().await.unwrap();
        let issued = codes
            .allocate_in(uow.as_mut(), COMPANY, SHOP, "UserID-1", "GRN")
            .await
            .unwrap();
        assert_eq!(issued.code, "GRN-1");
        // dropped without commit
    }

    let code = codes.allocate(COMPANY, SHOP, "UserID-1", "GRN").await.unwrap();
    assert_eq!(code, "GRN-1");
    assert_eq!(codes.history(COMPANY, SHOP, "GRN").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_are_distinct() {
    let (_, store) = seeded_store().await;
    let codes = CodeAllocator::new(store.clone());

    let mut handles = Vec::new();
    for _ in 0..20 {
        let codes = codes.clone();
        handles.push(tokio::spawn(async move {
            codes.allocate(COMPANY, SHOP, "UserID-1", "GRN").await
        }));
    }

    let mut issued = HashSet::new();
    for handle in handles {
        assert!(issued.insert(handle.await.unwrap().unwrap()));
    }

    let expected: HashSet<String> = (1..=20).map(|n| format!("GRN-{}", n)).collect();
    assert_eq!(issued, expected);
}
