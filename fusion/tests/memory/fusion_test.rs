use fusion::error::{ErrorKind, FusionResult};
use fusion::orchestrator::{FusionOrchestrator, FusionStage};
use fusion::rank::CompletenessRanker;
use fusion::reconcile::SchemaReconciler;
use fusion::select::FixedSelection;
use fusion::store::{MemoryStore, TableStore};
use fusion::types::{Cell, TableName, Type};
use fusion_telemetry::tracing::init_test_tracing;
use std::cell::Cell as Flag;
use std::collections::{BTreeMap, BTreeSet};

use crate::support::{int, row_list, seed, text};

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

/// `customers(product_id, event_type)` keyed A, B, C and `items(product_id, brand, price)`
/// keyed B, C, D.
async fn customers_and_items(store: &MemoryStore) -> (TableName, TableName) {
    let customers = seed(
        store,
        "customers",
        &[("product_id", Type::TEXT), ("event_type", Type::TEXT)],
        vec![
            vec![text("A"), text("view")],
            vec![text("B"), text("cart")],
            vec![text("C"), text("purchase")],
            vec![Cell::Null, text("view")],
        ],
    )
    .await;
    let items = seed(
        store,
        "items",
        &[
            ("product_id", Type::TEXT),
            ("brand", Type::TEXT),
            ("price", Type::FLOAT8),
        ],
        vec![
            vec![text("B"), text("acme"), Cell::F64(9.5)],
            vec![text("C"), text("globex"), Cell::Null],
            vec![text("D"), text("initech"), Cell::F64(1.0)],
        ],
    )
    .await;

    (customers, items)
}

#[tokio::test(flavor = "multi_thread")]
async fn fusion_respects_non_matching_keys() {
    init_test_tracing();

    let store = MemoryStore::new();
    let (customers, items) = customers_and_items(&store).await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let report = orchestrator
        .fuse_with_key(&customers, &items, "product_id")
        .await
        .unwrap();

    assert_eq!(report.key_column, "product_id");
    assert_eq!(report.added_columns, vec!["brand", "price"]);
    assert_eq!(report.matching_keys, 2);
    assert_eq!(report.rows_updated, 2);
    assert_eq!(
        report.stages,
        vec![
            FusionStage::KeySelection,
            FusionStage::SourceRanking,
            FusionStage::SchemaReconciliation,
            FusionStage::MatchSetComputation,
            FusionStage::BatchedUpdate,
            FusionStage::Done,
        ]
    );

    assert_eq!(
        row_list(&store, &customers).await,
        vec![
            vec![some("A"), some("view"), None, None],
            vec![some("B"), some("cart"), some("acme"), some("9.5")],
            vec![some("C"), some("purchase"), some("globex"), None],
            vec![None, some("view"), None, None],
        ]
    );
    assert_eq!(store.count_rows(&customers).await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconciliation_only_adds_columns() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(
        &store,
        "customers",
        &[("product_id", Type::INT4), ("price", Type::TEXT)],
        vec![vec![int(1), text("cheap")]],
    )
    .await;
    let items = seed(
        &store,
        "items",
        &[
            ("category", Type::JSONB),
            ("price", Type::FLOAT8),
            ("product_id", Type::INT4),
            ("brand", Type::VARCHAR),
        ],
        vec![],
    )
    .await;
    let before = store.table_columns(&customers).await.unwrap();

    let added = SchemaReconciler::new(store.clone())
        .reconcile(&customers, &items)
        .await
        .unwrap();

    assert_eq!(added, vec!["category", "brand"]);

    let after = store.table_columns(&customers).await.unwrap();
    assert_eq!(&after[..before.len()], &before[..]);
    let added_types: BTreeMap<&str, &Type> = after[before.len()..]
        .iter()
        .map(|column| (column.name.as_str(), &column.typ))
        .collect();
    assert_eq!(added_types["category"], &Type::TEXT);
    assert_eq!(added_types["brand"], &Type::VARCHAR);

    let again = SchemaReconciler::new(store.clone())
        .reconcile(&customers, &items)
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn ranking_leaves_one_row_per_key() {
    init_test_tracing();

    let store = MemoryStore::new();
    let items = seed(
        &store,
        "items",
        &[
            ("product_id", Type::INT4),
            ("brand", Type::TEXT),
            ("price", Type::FLOAT8),
        ],
        vec![
            vec![int(1), Cell::Null, Cell::Null],
            vec![int(1), text("acme"), Cell::F64(2.0)],
            vec![int(1), text("acme"), Cell::Null],
            vec![int(2), text("globex"), Cell::Null],
            vec![int(2), Cell::Null, Cell::F64(3.0)],
            vec![Cell::Null, Cell::Null, Cell::Null],
            vec![Cell::Null, Cell::Null, Cell::Null],
        ],
    )
    .await;

    let outcome = CompletenessRanker::new(store.clone(), 2)
        .unwrap()
        .keep_most_complete(&items, "product_id")
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected, 3);

    let rows = row_list(&store, &items).await;
    let keyed: Vec<&Option<String>> = rows.iter().map(|row| &row[0]).filter(|key| key.is_some()).collect();
    let distinct: BTreeSet<_> = keyed.iter().collect();
    assert_eq!(keyed.len(), distinct.len());

    // Highest score wins, ties go to the first row.
    assert_eq!(
        rows,
        vec![
            vec![some("1"), some("acme"), some("2")],
            vec![some("2"), some("globex"), None],
            vec![None, None, None],
            vec![None, None, None],
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_without_common_column_cannot_be_fused() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(&store, "customers", &[("user_id", Type::INT4)], vec![]).await;
    let items = seed(&store, "items", &[("brand", Type::TEXT)], vec![]).await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let err = orchestrator
        .fuse(&customers, &items, &FixedSelection::new().with_key("brand"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoCommonKey);
    assert_eq!(store.mutation_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_key_is_rejected_before_any_mutation() {
    init_test_tracing();

    let store = MemoryStore::new();
    let (customers, items) = customers_and_items(&store).await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let err = orchestrator
        .fuse_with_key(&customers, &items, "brand")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKey);

    let err = orchestrator
        .fuse_with_key(&customers, &customers, "product_id")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);

    assert_eq!(store.mutation_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_candidate_does_not_consult_the_selector() {
    init_test_tracing();

    let store = MemoryStore::new();
    let (customers, items) = customers_and_items(&store).await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let asked = Flag::new(false);
    let selector = |_: &[String]| -> FusionResult<String> {
        asked.set(true);
        Ok("event_type".to_string())
    };
    let report = orchestrator
        .fuse(&customers, &items, &selector)
        .await
        .unwrap();

    assert!(!asked.get());
    assert_eq!(report.key_column, "product_id");
}

#[tokio::test(flavor = "multi_thread")]
async fn several_candidates_are_resolved_by_the_selector() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(
        &store,
        "customers",
        &[("product_id", Type::INT4), ("user_id", Type::INT4)],
        vec![vec![int(1), int(10)], vec![int(2), int(20)]],
    )
    .await;
    let items = seed(
        &store,
        "items",
        &[
            ("user_id", Type::INT4),
            ("product_id", Type::INT4),
            ("brand", Type::TEXT),
        ],
        vec![vec![int(99), int(2), text("acme")]],
    )
    .await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let candidates = orchestrator.key_candidates(&customers, &items).await.unwrap();
    assert_eq!(candidates, vec!["product_id", "user_id"]);

    let offered = std::sync::Mutex::new(Vec::new());
    let selector = |candidates: &[String]| -> FusionResult<String> {
        offered.lock().unwrap().extend_from_slice(candidates);
        Ok("product_id".to_string())
    };
    let report = orchestrator
        .fuse(&customers, &items, &selector)
        .await
        .unwrap();

    assert_eq!(*offered.lock().unwrap(), candidates);
    assert_eq!(report.rows_updated, 1);
    assert_eq!(
        row_list(&store, &customers).await,
        vec![
            vec![some("1"), some("10"), None],
            vec![some("2"), some("20"), some("acme")],
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn selector_answer_outside_candidates_is_rejected() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(
        &store,
        "customers",
        &[("product_id", Type::INT4), ("user_id", Type::INT4)],
        vec![],
    )
    .await;
    let items = seed(
        &store,
        "items",
        &[("product_id", Type::INT4), ("user_id", Type::INT4), ("brand", Type::TEXT)],
        vec![],
    )
    .await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let err = orchestrator
        .fuse(&customers, &items, &FixedSelection::new().with_key("brand"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKey);

    let err = orchestrator
        .fuse(&customers, &items, &FixedSelection::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelectionFailed);

    assert_eq!(store.mutation_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn fusion_without_matching_keys_stops_after_reconciliation() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(
        &store,
        "customers",
        &[("product_id", Type::INT4)],
        vec![vec![int(1)], vec![Cell::Null]],
    )
    .await;
    let items = seed(
        &store,
        "items",
        &[("product_id", Type::INT4), ("brand", Type::TEXT)],
        vec![vec![int(2), text("acme")], vec![Cell::Null, text("globex")]],
    )
    .await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let report = orchestrator
        .fuse_with_key(&customers, &items, "product_id")
        .await
        .unwrap();

    assert_eq!(report.added_columns, vec!["brand"]);
    assert_eq!(report.matching_keys, 0);
    assert_eq!(report.rows_updated, 0);
    assert_eq!(report.stages.last(), Some(&FusionStage::Done));
    assert!(!report.stages.contains(&FusionStage::BatchedUpdate));
    assert_eq!(
        row_list(&store, &customers).await,
        vec![vec![some("1"), None], vec![None, None]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn fusion_ranks_the_source_before_updating() {
    init_test_tracing();

    let store = MemoryStore::new();
    let customers = seed(
        &store,
        "customers",
        &[("product_id", Type::INT4), ("event_type", Type::TEXT)],
        vec![vec![int(1), text("view")], vec![int(1), text("cart")]],
    )
    .await;
    let items = seed(
        &store,
        "items",
        &[
            ("product_id", Type::INT4),
            ("brand", Type::TEXT),
            ("price", Type::FLOAT8),
        ],
        vec![
            vec![int(1), text("acme"), Cell::Null],
            vec![int(1), text("globex"), Cell::F64(4.0)],
        ],
    )
    .await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    let report = orchestrator
        .fuse_with_key(&customers, &items, "product_id")
        .await
        .unwrap();

    assert_eq!(report.source_rows_removed, 1);
    assert_eq!(report.rows_updated, 2);
    assert_eq!(store.count_rows(&items).await.unwrap(), 1);
    assert_eq!(
        row_list(&store, &customers).await,
        vec![
            vec![some("1"), some("view"), some("globex"), some("4")],
            vec![some("1"), some("cart"), some("globex"), some("4")],
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn second_fusion_run_stops_after_reconciliation() {
    init_test_tracing();

    let store = MemoryStore::new();
    let (customers, items) = customers_and_items(&store).await;
    let orchestrator = FusionOrchestrator::new(store.clone(), 1000).unwrap();

    orchestrator
        .fuse_with_key(&customers, &items, "product_id")
        .await
        .unwrap();
    let fused = row_list(&store, &customers).await;

    let report = orchestrator
        .fuse_with_key(&customers, &items, "product_id")
        .await
        .unwrap();

    assert!(report.added_columns.is_empty());
    assert_eq!(report.rows_updated, 0);
    assert_eq!(
        report.stages,
        vec![
            FusionStage::KeySelection,
            FusionStage::SourceRanking,
            FusionStage::SchemaReconciliation,
            FusionStage::Done,
        ]
    );
    assert_eq!(row_list(&store, &customers).await, fused);
}
