use fusion::error::ErrorKind;
use fusion::store::{MemoryStore, TableStore};
use fusion::types::{TableName, Type};
use fusion::union::TableUnion;
use fusion_telemetry::tracing::init_test_tracing;
use std::collections::BTreeSet;

use crate::support::{at, int, row_set, seed, table, text};

async fn monthly_tables(store: &MemoryStore) -> Vec<TableName> {
    let october = seed(
        store,
        "data_2022_oct",
        &[
            ("event_time", Type::TIMESTAMP),
            ("event_type", Type::TEXT),
            ("product_id", Type::INT4),
        ],
        vec![
            vec![at("2022-10-01 00:00:00"), text("view"), int(1)],
            vec![at("2022-10-02 00:00:00"), text("cart"), int(2)],
        ],
    )
    .await;
    let november = seed(
        store,
        "data_2022_nov",
        &[
            ("product_id", Type::INT4),
            ("event_time", Type::TIMESTAMP),
            ("event_type", Type::TEXT),
        ],
        vec![vec![int(3), at("2022-11-01 00:00:00"), text("purchase")]],
    )
    .await;
    seed(store, "items", &[("product_id", Type::INT4)], vec![vec![int(1)]]).await;

    vec![november, october]
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_sharing_a_prefix_are_joined() {
    init_test_tracing();

    let store = MemoryStore::new();
    monthly_tables(&store).await;
    let customers = table("customers");
    let union = TableUnion::new(store.clone());

    let tables = union
        .tables_with_prefix("public", "data_202", &customers)
        .await
        .unwrap();
    assert_eq!(tables, vec![table("data_2022_nov"), table("data_2022_oct")]);

    let rows = union.union_into(&customers, &tables).await.unwrap();
    assert_eq!(rows, 3);

    // Columns follow the first table, whatever the order in the others.
    let columns: Vec<String> = store
        .table_columns(&customers)
        .await
        .unwrap()
        .into_iter()
        .map(|column| column.name)
        .collect();
    assert_eq!(columns, vec!["product_id", "event_time", "event_type"]);

    let expected: BTreeSet<Vec<Option<String>>> = [
        ["3", "2022-11-01 00:00:00", "purchase"],
        ["1", "2022-10-01 00:00:00", "view"],
        ["2", "2022-10-02 00:00:00", "cart"],
    ]
    .iter()
    .map(|row| row.iter().map(|value| Some(value.to_string())).collect())
    .collect();
    assert_eq!(row_set(&store, &customers).await, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn mismatched_columns_fail_before_any_write() {
    init_test_tracing();

    let store = MemoryStore::new();
    let mut tables = monthly_tables(&store).await;
    tables.push(table("items"));
    let customers = table("customers");

    let err = TableUnion::new(store.clone())
        .union_into(&customers, &tables)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(store.mutation_count().await, 0);
    assert!(
        !store
            .list_tables("public")
            .await
            .unwrap()
            .contains(&customers)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_table_list_is_a_no_op() {
    init_test_tracing();

    let store = MemoryStore::new();

    let rows = TableUnion::new(store.clone())
        .union_into(&table("customers"), &[])
        .await
        .unwrap();

    assert_eq!(rows, 0);
    assert_eq!(store.mutation_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn target_cannot_be_one_of_the_inputs() {
    init_test_tracing();

    let store = MemoryStore::new();
    let tables = monthly_tables(&store).await;

    let err = TableUnion::new(store.clone())
        .union_into(&tables[0], &tables)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert_eq!(store.count_rows(&tables[0]).await.unwrap(), 1);
}
