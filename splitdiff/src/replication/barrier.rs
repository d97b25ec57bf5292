use std::time::Duration;

use tracing::{info, warn};

use crate::bail;
use crate::cleanup::{CleanupActionName, CleanupStack};
use crate::error::{ErrorKind, SplitDiffResult};
use crate::topology::remote::remote_call;
use crate::topology::{TabletManagerClient, TopologyService};
use crate::types::{
    BlpPositionList, ReplicationPosition, ShardInfo, SourceShard, TabletAlias, TabletInfo,
    TabletType,
};

/// Positions observed while establishing the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierPositions {
    /// Position of the source shard's filtered replication stream when it was paused.
    pub paused_at: ReplicationPosition,
    /// Position the source worker tablet stopped replicating at.
    pub source_stopped_at: ReplicationPosition,
    /// Position of the destination master once filtered replication caught up with the source.
    pub master_position: ReplicationPosition,
    /// Position the destination worker tablet stopped replicating at.
    pub destination_stopped_at: ReplicationPosition,
}

/// Coordinates the destination master, the source worker tablet and the destination worker
/// tablet so that both worker tablets stop replicating at snapshots holding the same data.
///
/// Every change made to the cluster is paired with a compensating action in the cleanup
/// stack before the next step runs.
#[derive(Debug, Clone)]
pub struct ReplicationBarrier<T, M> {
    topology: T,
    tablet_manager: M,
    cleaner: CleanupStack,
    timeout: Duration,
}

impl<T, M> ReplicationBarrier<T, M>
where
    T: TopologyService,
    M: TabletManagerClient,
{
    pub fn new(topology: T, tablet_manager: M, cleaner: CleanupStack, timeout: Duration) -> Self {
        Self {
            topology,
            tablet_manager,
            cleaner,
            timeout,
        }
    }

    pub async fn synchronize(
        &self,
        shard: &ShardInfo,
        source_alias: &TabletAlias,
        destination_alias: &TabletAlias,
    ) -> SplitDiffResult<BarrierPositions> {
        let source_shard = single_source_shard(shard)?;
        let Some(master_alias) = &shard.master_alias else {
            bail!(
                ErrorKind::MissingShardMaster,
                "The destination shard has no master",
                format!("{}/{}", shard.keyspace, shard.shard)
            );
        };
        let master = self.topology.get_tablet(master_alias).await?;

        // 1. Pause filtered replication on the destination master.
        info!("stopping filtered replication on master {}", master.alias);
        let positions = remote_call(
            self.timeout,
            "StopBlp",
            &master.alias,
            self.tablet_manager.stop_blp(&master),
        )
        .await?;
        self.cleaner.record_start_blp(&master);
        info!("filtered replication on master {} paused at {positions}", master.alias);

        // 2. Find where the stream of our source shard was paused.
        let Some(paused_at) = positions.find_by_uid(source_shard.uid) else {
            bail!(
                ErrorKind::MissingBlpPosition,
                "No filtered replication position found for the source shard",
                format!("uid {} on master {}", source_shard.uid, master.alias)
            );
        };

        // 3. Stop the source tablet at or past that position.
        let source = self.topology.get_tablet(source_alias).await?;
        let source_stopped_at = self.stop_slave_at_least(&source, paused_at).await?;

        // 4. Let filtered replication catch up with the source tablet, and no further.
        let mut stop_positions = BlpPositionList::new();
        stop_positions.insert(source_shard.uid, source_stopped_at)?;
        info!(
            "running filtered replication on master {} until {stop_positions}",
            master.alias
        );
        let master_position = remote_call(
            self.timeout,
            "RunBlpUntil",
            &master.alias,
            self.tablet_manager
                .run_blp_until(&master, &stop_positions, self.timeout),
        )
        .await?;
        info!("master {} caught up at {master_position}", master.alias);

        // 5. Stop the destination tablet at or past the master position.
        let destination = self.topology.get_tablet(destination_alias).await?;
        let destination_stopped_at = self
            .stop_slave_at_least(&destination, master_position)
            .await?;

        // 6. Resume filtered replication, which no longer needs to be undone.
        info!("restarting filtered replication on master {}", master.alias);
        remote_call(
            self.timeout,
            "StartBlp",
            &master.alias,
            self.tablet_manager.start_blp(&master),
        )
        .await?;
        if let Err(err) = self
            .cleaner
            .remove_action(CleanupActionName::StartBlp, &master.alias)
        {
            warn!("failed to remove the filtered replication cleanup action: {err}");
        }

        Ok(BarrierPositions {
            paused_at,
            source_stopped_at,
            master_position,
            destination_stopped_at,
        })
    }

    /// Stops replication on `tablet` once it reached `position` and parks the tablet as
    /// `spare` instead of returning it to serving after the run.
    async fn stop_slave_at_least(
        &self,
        tablet: &TabletInfo,
        position: ReplicationPosition,
    ) -> SplitDiffResult<ReplicationPosition> {
        info!("stopping replication on tablet {} at a minimum of {position}", tablet.alias);
        let stopped_at = remote_call(
            self.timeout,
            "StopSlaveMinimum",
            &tablet.alias,
            self.tablet_manager
                .stop_slave_minimum(tablet, position, self.timeout),
        )
        .await?;
        self.cleaner.record_start_slave(tablet);
        self.cleaner
            .update_tablet_type(&tablet.alias, TabletType::Spare)?;

        if !stopped_at.at_least(&position) {
            bail!(
                ErrorKind::RemoteCallFailed,
                "Tablet stopped replicating before the requested position",
                format!("{} stopped at {stopped_at}, expected at least {position}", tablet.alias)
            );
        }
        info!("tablet {} stopped replicating at {stopped_at}", tablet.alias);

        Ok(stopped_at)
    }
}

/// Returns the only source shard of `shard`.
pub fn single_source_shard(shard: &ShardInfo) -> SplitDiffResult<&SourceShard> {
    match shard.source_shards.as_slice() {
        [source_shard] => Ok(source_shard),
        source_shards => bail!(
            ErrorKind::InvalidSourceShardCount,
            "The destination shard must have exactly one source shard",
            format!(
                "{}/{} has {} source shards",
                shard.keyspace,
                shard.shard,
                source_shards.len()
            )
        ),
    }
}
