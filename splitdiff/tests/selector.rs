mod common;

use std::time::Duration;

use splitdiff::cleanup::{CleanupAction, CleanupStack};
use splitdiff::error::ErrorKind;
use splitdiff::topology::selector::{RdonlyTabletSelector, TabletSelector};
use splitdiff::types::TabletType;
use splitdiff_telemetry::init_test_tracing;

use crate::common::cluster::{
    CELL, DESTINATION_KEYSPACE, DESTINATION_RDONLY_UID, FakeCluster, SHARD, alias,
};

fn selector(cluster: &FakeCluster) -> RdonlyTabletSelector<FakeCluster, FakeCluster> {
    RdonlyTabletSelector::new(cluster.clone(), cluster.clone(), Duration::from_secs(1))
}

#[tokio::test]
async fn rdonly_tablet_becomes_worker() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    let cleaner = CleanupStack::new();

    let worker = selector(&cluster)
        .find_worker_tablet(&cleaner, CELL, DESTINATION_KEYSPACE, SHARD)
        .await
        .unwrap();

    assert_eq!(worker, alias(DESTINATION_RDONLY_UID));
    assert_eq!(cluster.tablet_type(DESTINATION_RDONLY_UID), TabletType::Worker);
    assert_eq!(
        cleaner.actions(),
        vec![CleanupAction::ChangeSlaveType {
            alias: alias(DESTINATION_RDONLY_UID),
            tablet_type: TabletType::Rdonly,
        }]
    );
}

#[tokio::test]
async fn shard_without_rdonly_has_no_worker() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    cluster.add_tablet(DESTINATION_RDONLY_UID, DESTINATION_KEYSPACE, TabletType::Replica);
    let cleaner = CleanupStack::new();

    let err = selector(&cluster)
        .find_worker_tablet(&cleaner, CELL, DESTINATION_KEYSPACE, SHARD)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoWorkerTablet);
    assert!(cleaner.is_empty());
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn other_cells_are_ignored() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    let cleaner = CleanupStack::new();

    let err = selector(&cluster)
        .find_worker_tablet(&cleaner, "zone2", DESTINATION_KEYSPACE, SHARD)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoWorkerTablet);
}

#[tokio::test]
async fn failed_type_change_records_nothing() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    cluster.fail_call("ChangeSlaveType", Some(DESTINATION_RDONLY_UID));
    let cleaner = CleanupStack::new();

    let err = selector(&cluster)
        .find_worker_tablet(&cleaner, CELL, DESTINATION_KEYSPACE, SHARD)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteCallFailed);
    assert!(cleaner.is_empty());
    assert_eq!(cluster.tablet_type(DESTINATION_RDONLY_UID), TabletType::Rdonly);
}
