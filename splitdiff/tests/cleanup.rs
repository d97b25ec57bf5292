mod common;

use std::time::Duration;

use splitdiff::cleanup::CleanupStack;
use splitdiff::error::ErrorKind;
use splitdiff::types::TabletType;
use splitdiff_telemetry::init_test_tracing;

use crate::common::cluster::{
    DESTINATION_MASTER_UID, FakeCluster, SOURCE_RDONLY_UID, alias,
};

const TIMEOUT: Duration = Duration::from_secs(1);

fn record_barrier_actions(cluster: &FakeCluster, stack: &CleanupStack) {
    stack.record_change_slave_type(&alias(SOURCE_RDONLY_UID), TabletType::Rdonly);
    stack.record_start_slave(&cluster.tablet(SOURCE_RDONLY_UID));
    stack.record_start_blp(&cluster.tablet(DESTINATION_MASTER_UID));
}

#[tokio::test]
async fn actions_run_in_reverse_order_exactly_once() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    cluster.add_tablet(SOURCE_RDONLY_UID, "commerce", TabletType::Worker);
    let stack = CleanupStack::new();
    record_barrier_actions(&cluster, &stack);

    stack.clean_up(&cluster, &cluster, TIMEOUT).await.unwrap();

    assert_eq!(
        cluster.calls(),
        vec![
            "StartBlp(zone1-0000000100)",
            "StartSlave(zone1-0000000201)",
            "ChangeSlaveType(zone1-0000000201)",
        ]
    );
    assert_eq!(cluster.tablet_type(SOURCE_RDONLY_UID), TabletType::Rdonly);
    assert!(stack.is_empty());

    // A second run has nothing left to execute.
    stack.clean_up(&cluster, &cluster, TIMEOUT).await.unwrap();
    assert_eq!(cluster.calls().len(), 3);
}

#[tokio::test]
async fn failing_action_does_not_stop_the_others() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    cluster.fail_call("StartSlave", None);
    let stack = CleanupStack::new();
    record_barrier_actions(&cluster, &stack);

    let err = stack.clean_up(&cluster, &cluster, TIMEOUT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CleanupFailed);
    assert!(err.to_string().contains("StartSlave failed"));
    assert_eq!(cluster.calls().len(), 3);
    assert_eq!(cluster.calls_named("ChangeSlaveType").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_action_times_out_and_the_rest_still_runs() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    cluster.set_latency("StartBlp", Duration::from_secs(5));
    let stack = CleanupStack::new();
    record_barrier_actions(&cluster, &stack);

    let err = stack.clean_up(&cluster, &cluster, TIMEOUT).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CleanupFailed);
    assert!(err.to_string().contains("RemoteCallTimeout"));
    assert_eq!(cluster.calls_named("StartSlave").len(), 1);
    assert_eq!(cluster.calls_named("ChangeSlaveType").len(), 1);
}

#[tokio::test]
async fn updated_tablet_type_is_restored() {
    init_test_tracing();
    let cluster = FakeCluster::vertical_split(&["customer"]);
    let stack = CleanupStack::new();
    record_barrier_actions(&cluster, &stack);
    stack
        .update_tablet_type(&alias(SOURCE_RDONLY_UID), TabletType::Spare)
        .unwrap();

    stack.clean_up(&cluster, &cluster, TIMEOUT).await.unwrap();

    assert_eq!(cluster.tablet_type(SOURCE_RDONLY_UID), TabletType::Spare);
    assert_eq!(cluster.calls_named("ChangeSlaveType").len(), 1);
}
