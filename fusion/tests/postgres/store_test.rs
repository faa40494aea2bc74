use fusion::batch::BatchExecutor;
use fusion::catalog::SchemaCatalog;
use fusion::error::ErrorKind;
use fusion::store::{TableStore, UpdateFromSource};
use fusion::test_utils::database::spawn_database;
use fusion::types::{ColumnDefinition, KeyValue, TableName, Type};
use fusion::union::TableUnion;
use fusion_telemetry::tracing::init_test_tracing;

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn catalog_reads_committed_schema() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table items (product_id int4 not null, dropped text, brand varchar(16));
            alter table items drop column dropped;
            create view items_view as select * from items;",
        )
        .await;
    let items = TableName::public("items");
    let catalog = SchemaCatalog::new(database.store.clone());

    assert_eq!(catalog.tables("public").await.unwrap(), vec![items.clone()]);

    let columns = catalog.columns(&items).await.unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "product_id");
    assert!(!columns[0].nullable);
    assert_eq!(columns[1].name, "brand");
    assert_eq!(columns[1].typ, Type::VARCHAR);

    database
        .store
        .add_columns(&items, &[ColumnDefinition::new("price", Type::FLOAT8)])
        .await
        .unwrap();
    assert!(
        catalog
            .column_names(&items)
            .await
            .unwrap()
            .contains("price")
    );

    let err = catalog
        .columns(&TableName::public("missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableNotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn batched_updates_and_deletes_apply_every_chunk() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table customers (product_id int4, brand text);
            insert into customers select i % 10, null from generate_series(1, 100) as i;
            create table items (product_id int4, brand text);
            insert into items select i, 'brand-' || i from generate_series(0, 9) as i;",
        )
        .await;
    let customers = TableName::public("customers");
    let items = TableName::public("items");
    let executor = BatchExecutor::new(database.store.clone(), 3).unwrap();

    let keys = database
        .store
        .matching_keys(&customers, &items, "product_id")
        .await
        .unwrap();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys[0], KeyValue::from("0"));

    let update = UpdateFromSource {
        source: items.clone(),
        key_column: "product_id".to_string(),
        columns: vec!["brand".to_string()],
    };
    let outcome = executor
        .update_columns(&customers, &update, &keys)
        .await
        .unwrap();
    assert_eq!(outcome.batches, 4);
    assert_eq!(outcome.rows_affected, 100);

    let outcome = executor
        .delete_keys(&customers, "product_id", &keys[..5])
        .await
        .unwrap();
    assert_eq!(outcome.batches, 2);
    assert_eq!(outcome.rows_affected, 50);
    assert_eq!(database.store.count_rows(&customers).await.unwrap(), 50);

    let rows = database
        .rows_as_text("customers", &["product_id", "brand"])
        .await;
    assert_eq!(rows.first(), Some(&vec![some("5"), some("brand-5")]));
}

#[tokio::test(flavor = "multi_thread")]
async fn monthly_tables_are_joined_into_one() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table data_2022_oct (event_time timestamp, event_type text, product_id int4);
            insert into data_2022_oct values
                ('2022-10-01 00:00:00', 'view', 1),
                ('2022-10-02 00:00:00', 'cart', 2);
            create table data_2022_nov (product_id int4, event_time timestamp, event_type text);
            insert into data_2022_nov values (3, '2022-11-01 00:00:00', 'purchase');
            create table customers (stale int4);
            create table items (product_id int4);",
        )
        .await;
    let customers = TableName::public("customers");
    let union = TableUnion::new(database.store.clone());

    let tables = union
        .tables_with_prefix("public", "data_202", &customers)
        .await
        .unwrap();
    assert_eq!(
        tables,
        vec![
            TableName::public("data_2022_nov"),
            TableName::public("data_2022_oct")
        ]
    );

    assert_eq!(union.union_into(&customers, &tables).await.unwrap(), 3);
    assert_eq!(
        database
            .rows_as_text("customers", &["product_id", "event_type", "event_time"])
            .await,
        vec![
            vec![some("1"), some("view"), some("2022-10-01 00:00:00")],
            vec![some("2"), some("cart"), some("2022-10-02 00:00:00")],
            vec![some("3"), some("purchase"), some("2022-11-01 00:00:00")],
        ]
    );

    let mut mismatched = tables.clone();
    mismatched.push(TableName::public("items"));
    let err = union
        .union_into(&TableName::public("all_events"), &mismatched)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert!(
        !database
            .store
            .list_tables("public")
            .await
            .unwrap()
            .contains(&TableName::public("all_events"))
    );
}
