use fusion::dedup::{DedupReport, Deduplicator, TemporalDuplicateDetector};
use fusion::error::ErrorKind;
use fusion::store::TableStore;
use fusion::test_utils::database::spawn_database;
use fusion::types::TableName;
use fusion_config::shared::{BatchConfig, DedupConfig};
use fusion_telemetry::tracing::init_test_tracing;
use std::time::Duration;

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

#[tokio::test(flavor = "multi_thread")]
async fn exact_duplicates_are_deleted() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table t (id int4, x text);
            insert into t values (1, 'a'), (2, 'b'), (2, 'b'), (3, null), (3, null);",
        )
        .await;
    let t = TableName::public("t");
    let deduplicator = Deduplicator::exact_only(database.store.clone(), 1).unwrap();

    assert_eq!(deduplicator.remove_exact(&t).await.unwrap(), 2);
    assert_eq!(
        database.rows_as_text("t", &["id", "x"]).await,
        vec![
            vec![some("1"), some("a")],
            vec![some("2"), some("b")],
            vec![some("3"), None],
        ]
    );

    assert_eq!(deduplicator.remove_exact(&t).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn columns_without_equality_are_compared_as_text() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table j (id int4, payload json, location point);
            insert into j values
                (1, '{\"a\": 1}', '(1,2)'),
                (1, '{\"a\": 1}', '(1,2)'),
                (1, '{\"a\": 2}', '(1,2)');",
        )
        .await;
    let j = TableName::public("j");
    let deduplicator = Deduplicator::exact_only(database.store.clone(), 1000).unwrap();

    assert_eq!(deduplicator.remove_exact(&j).await.unwrap(), 1);
    assert_eq!(
        database.rows_as_text("j", &["id", "payload"]).await,
        vec![
            vec![some("1"), some("{\"a\": 1}")],
            vec![some("1"), some("{\"a\": 2}")],
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn temporal_tolerance_is_inclusive() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table within (event_time timestamp, event_type text, user_id int4);
            insert into within values
                ('2022-10-01 00:00:00', 'view', 1),
                ('2022-10-01 00:00:01', 'view', 1);
            create table beyond (event_time timestamp, event_type text, user_id int4);
            insert into beyond values
                ('2022-10-01 00:00:00', 'view', 1),
                ('2022-10-01 00:00:01.001', 'view', 1);",
        )
        .await;
    let detector =
        TemporalDuplicateDetector::new(database.store.clone(), "event_time", Duration::from_secs(1));

    assert_eq!(
        detector
            .detect(&TableName::public("within"))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(
        detector
            .detect(&TableName::public("beyond"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dedup_run_handles_text_timestamps() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table events (event_time text, event_type text, product_id int4);
            insert into events values
                ('2022-10-01 00:00:00 UTC', 'view', 5),
                ('2022-10-01 00:00:00 UTC', 'view', 5),
                ('2022-10-01 00:00:00.800 UTC', 'view', 5),
                ('2022-10-01 00:00:01.600 UTC', 'view', 5),
                ('2022-10-01 00:00:00 UTC', 'cart', 5),
                (null, 'view', 5);",
        )
        .await;
    let events = TableName::public("events");
    let deduplicator = Deduplicator::from_config(
        database.store.clone(),
        &DedupConfig::default(),
        &BatchConfig::default(),
    )
    .unwrap();

    let report = deduplicator.run(&events).await.unwrap();

    assert_eq!(
        report,
        DedupReport {
            exact_removed: 1,
            temporal_removed: 2
        }
    );
    assert_eq!(
        database
            .rows_as_text("events", &["event_type", "event_time"])
            .await,
        vec![
            vec![some("cart"), some("2022-10-01 00:00:00 UTC")],
            vec![some("view"), some("2022-10-01 00:00:00 UTC")],
            vec![some("view"), None],
        ]
    );
    assert_eq!(database.store.count_rows(&events).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_timestamp_columns_are_reported() {
    init_test_tracing();
    let Some(database) = spawn_database().await else {
        return;
    };

    database
        .run(
            "create table events (happened text, price int4);
            insert into events values ('yesterday-ish', 1), ('yesterday-ish', 1);",
        )
        .await;
    let events = TableName::public("events");

    let err = TemporalDuplicateDetector::new(
        database.store.clone(),
        "event_time",
        Duration::from_secs(1),
    )
    .detect(&events)
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ColumnNotFound);

    let err = TemporalDuplicateDetector::new(database.store.clone(), "price", Duration::from_secs(1))
        .detect(&events)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimestampParse);

    let err = TemporalDuplicateDetector::new(
        database.store.clone(),
        "happened",
        Duration::from_secs(1),
    )
    .detect(&events)
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimestampParse);

    assert_eq!(database.store.count_rows(&events).await.unwrap(), 2);
}
