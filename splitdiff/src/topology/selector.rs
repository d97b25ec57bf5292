use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::bail;
use crate::cleanup::CleanupStack;
use crate::error::{ErrorKind, SplitDiffResult};
use crate::topology::remote::remote_call;
use crate::topology::{TabletManagerClient, TopologyService};
use crate::types::{TabletAlias, TabletType};

/// Policy choosing the tablet a worker reads from in a shard.
///
/// Implementations take the chosen tablet out of serving and record in `cleaner` the action
/// putting it back.
pub trait TabletSelector: Send + Sync {
    fn find_worker_tablet(
        &self,
        cleaner: &CleanupStack,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> impl Future<Output = SplitDiffResult<TabletAlias>> + Send;
}

/// Picks the first `rdonly` tablet of the shard in the cell and turns it into a `worker`.
#[derive(Debug, Clone)]
pub struct RdonlyTabletSelector<T, M> {
    topology: T,
    tablet_manager: M,
    timeout: Duration,
}

impl<T, M> RdonlyTabletSelector<T, M> {
    pub fn new(topology: T, tablet_manager: M, timeout: Duration) -> Self {
        Self {
            topology,
            tablet_manager,
            timeout,
        }
    }
}

impl<T, M> TabletSelector for RdonlyTabletSelector<T, M>
where
    T: TopologyService,
    M: TabletManagerClient,
{
    async fn find_worker_tablet(
        &self,
        cleaner: &CleanupStack,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> SplitDiffResult<TabletAlias> {
        let tablets = self
            .topology
            .get_tablets_by_shard(cell, keyspace, shard)
            .await?;

        let Some(tablet) = tablets
            .into_iter()
            .find(|tablet| tablet.tablet_type == TabletType::Rdonly)
        else {
            bail!(
                ErrorKind::NoWorkerTablet,
                "No rdonly tablet available to become a worker",
                format!("cell {cell}, shard {keyspace}/{shard}")
            );
        };

        info!(tablet = %tablet.alias, keyspace, shard, "changing tablet type to worker");

        remote_call(
            self.timeout,
            "ChangeSlaveType",
            &tablet.alias,
            self.tablet_manager.change_type(&tablet, TabletType::Worker),
        )
        .await?;

        // Recorded only once the tablet actually left serving.
        cleaner.record_change_slave_type(&tablet.alias, TabletType::Rdonly);

        Ok(tablet.alias)
    }
}
