//! Collaborators giving access to the cluster: the topology service, the tablet
//! manager RPC client and the policy selecting worker tablets.

pub mod remote;
pub mod selector;

use std::future::Future;
use std::time::Duration;

use crate::error::SplitDiffResult;
use crate::schema::definition::SchemaDefinition;
use crate::types::{
    BlpPositionList, KeyspaceInfo, ReplicationPosition, ShardInfo, TabletAlias, TabletInfo,
    TabletType,
};

/// Read access to the cluster topology.
pub trait TopologyService: Send + Sync {
    fn get_keyspace(
        &self,
        keyspace: &str,
    ) -> impl Future<Output = SplitDiffResult<KeyspaceInfo>> + Send;

    fn get_shard(
        &self,
        keyspace: &str,
        shard: &str,
    ) -> impl Future<Output = SplitDiffResult<ShardInfo>> + Send;

    fn get_tablet(
        &self,
        alias: &TabletAlias,
    ) -> impl Future<Output = SplitDiffResult<TabletInfo>> + Send;

    /// Returns the tablets of `keyspace/shard` living in `cell`.
    fn get_tablets_by_shard(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> impl Future<Output = SplitDiffResult<Vec<TabletInfo>>> + Send;
}

/// Remote management calls issued to individual tablets.
///
/// Callers bound every call with their own timeout; the `wait_timeout` arguments tell the
/// tablet how long it may wait for replication to reach a position.
pub trait TabletManagerClient: Send + Sync {
    /// Pauses filtered replication on a destination master and returns the position of each
    /// of its streams.
    fn stop_blp(
        &self,
        tablet: &TabletInfo,
    ) -> impl Future<Output = SplitDiffResult<BlpPositionList>> + Send;

    /// Resumes filtered replication on a destination master.
    fn start_blp(&self, tablet: &TabletInfo) -> impl Future<Output = SplitDiffResult<()>> + Send;

    /// Runs filtered replication until every stream reaches its position in `positions`, then
    /// pauses it again and returns the master's own replication position.
    fn run_blp_until(
        &self,
        tablet: &TabletInfo,
        positions: &BlpPositionList,
        wait_timeout: Duration,
    ) -> impl Future<Output = SplitDiffResult<ReplicationPosition>> + Send;

    /// Stops inbound replication once it reached at least `position` and returns the exact
    /// position it stopped at.
    fn stop_slave_minimum(
        &self,
        tablet: &TabletInfo,
        position: ReplicationPosition,
        wait_timeout: Duration,
    ) -> impl Future<Output = SplitDiffResult<ReplicationPosition>> + Send;

    /// Resumes inbound replication.
    fn start_slave(&self, tablet: &TabletInfo) -> impl Future<Output = SplitDiffResult<()>> + Send;

    fn change_type(
        &self,
        tablet: &TabletInfo,
        tablet_type: TabletType,
    ) -> impl Future<Output = SplitDiffResult<()>> + Send;

    /// Returns the schema of the tablet's database.
    ///
    /// An empty `tables` list means every table; `exclude_tables` are left out.
    fn get_schema(
        &self,
        tablet: &TabletInfo,
        tables: &[String],
        exclude_tables: &[String],
        include_views: bool,
    ) -> impl Future<Output = SplitDiffResult<SchemaDefinition>> + Send;
}
