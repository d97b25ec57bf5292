use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use splitdiff::diff::row::Row;
use splitdiff::diff::scan::TableScanner;
use splitdiff::error::{ErrorKind, SplitDiffError, SplitDiffResult};
use splitdiff::schema::definition::{SchemaDefinition, TableDefinition};
use splitdiff::splitdiff_error;
use splitdiff::topology::{TabletManagerClient, TopologyService};
use splitdiff::types::{
    BlpPositionList, KeyspaceInfo, ReplicationPosition, ServedFrom, ShardInfo, SourceShard,
    TabletAlias, TabletInfo, TabletType,
};

use crate::common::rows::{FakeRowStream, ScanTracker};

pub const CELL: &str = "zone1";
pub const DESTINATION_KEYSPACE: &str = "customer";
pub const SOURCE_KEYSPACE: &str = "commerce";
pub const SHARD: &str = "0";
pub const SOURCE_SHARD_UID: u32 = 0;

pub const DESTINATION_MASTER_UID: u32 = 100;
pub const DESTINATION_RDONLY_UID: u32 = 101;
pub const DESTINATION_REPLICA_UID: u32 = 102;
pub const SOURCE_MASTER_UID: u32 = 200;
pub const SOURCE_RDONLY_UID: u32 = 201;

/// Position of the source shard stream on the destination master when it is paused.
pub const PAUSED_BLP_POSITION: u64 = 1_000;

pub fn alias(uid: u32) -> TabletAlias {
    TabletAlias::new(CELL, uid)
}

pub fn table(name: &str) -> TableDefinition {
    TableDefinition::new(name, &["id", "name"], &["id"])
}

#[derive(Debug, Default)]
struct Inner {
    keyspaces: HashMap<String, KeyspaceInfo>,
    shards: HashMap<(String, String), ShardInfo>,
    tablets: BTreeMap<TabletAlias, TabletInfo>,
    positions: HashMap<TabletAlias, ReplicationPosition>,
    blp_positions: HashMap<TabletAlias, BlpPositionList>,
    stop_overshoot: HashMap<TabletAlias, u64>,
    schemas: HashMap<TabletAlias, SchemaDefinition>,
    rows: HashMap<(TabletAlias, String), Vec<Row>>,
    read_failures: HashMap<(TabletAlias, String), usize>,
    failures: HashMap<(String, Option<TabletAlias>), SplitDiffError>,
    latencies: HashMap<String, Duration>,
    row_latency: Duration,
    calls: Vec<String>,
    scans: HashMap<TabletAlias, ScanTracker>,
}

/// In-memory cluster implementing every collaborator of the worker.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<Inner>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the cluster of a vertical split of `tables` from `commerce/0` to `customer/0`.
    ///
    /// Both rdonly tablets hold the same schema and no rows.
    pub fn vertical_split(tables: &[&str]) -> Self {
        let cluster = Self::new();

        cluster.add_keyspace(KeyspaceInfo {
            name: DESTINATION_KEYSPACE.to_string(),
            served_froms: vec![ServedFrom {
                tablet_type: TabletType::Rdonly,
                keyspace: SOURCE_KEYSPACE.to_string(),
            }],
        });
        cluster.add_keyspace(KeyspaceInfo {
            name: SOURCE_KEYSPACE.to_string(),
            served_froms: vec![],
        });
        cluster.add_shard(ShardInfo {
            keyspace: DESTINATION_KEYSPACE.to_string(),
            shard: SHARD.to_string(),
            master_alias: Some(alias(DESTINATION_MASTER_UID)),
            source_shards: vec![SourceShard {
                uid: SOURCE_SHARD_UID,
                keyspace: SOURCE_KEYSPACE.to_string(),
                shard: SHARD.to_string(),
                tables: tables.iter().map(|t| t.to_string()).collect(),
            }],
        });
        cluster.add_shard(ShardInfo {
            keyspace: SOURCE_KEYSPACE.to_string(),
            shard: SHARD.to_string(),
            master_alias: Some(alias(SOURCE_MASTER_UID)),
            source_shards: vec![],
        });

        cluster.add_tablet(DESTINATION_MASTER_UID, DESTINATION_KEYSPACE, TabletType::Master);
        cluster.add_tablet(DESTINATION_RDONLY_UID, DESTINATION_KEYSPACE, TabletType::Rdonly);
        cluster.add_tablet(DESTINATION_REPLICA_UID, DESTINATION_KEYSPACE, TabletType::Replica);
        cluster.add_tablet(SOURCE_MASTER_UID, SOURCE_KEYSPACE, TabletType::Master);
        cluster.add_tablet(SOURCE_RDONLY_UID, SOURCE_KEYSPACE, TabletType::Rdonly);

        let mut blp_positions = BlpPositionList::new();
        blp_positions
            .insert(SOURCE_SHARD_UID, PAUSED_BLP_POSITION.into())
            .unwrap();
        cluster.set_blp_positions(DESTINATION_MASTER_UID, blp_positions);
        cluster.set_position(DESTINATION_MASTER_UID, 5_000);
        cluster.set_position(DESTINATION_RDONLY_UID, 4_000);
        cluster.set_position(SOURCE_RDONLY_UID, 900);

        let schema = SchemaDefinition {
            database_schema: "CREATE DATABASE `vt_db`".to_string(),
            table_definitions: tables.iter().map(|name| table(name)).collect(),
        };
        cluster.set_schema(DESTINATION_RDONLY_UID, schema.clone());
        cluster.set_schema(SOURCE_RDONLY_UID, schema);

        cluster
    }

    pub fn add_keyspace(&self, keyspace: KeyspaceInfo) {
        self.inner
            .lock()
            .keyspaces
            .insert(keyspace.name.clone(), keyspace);
    }

    pub fn add_shard(&self, shard: ShardInfo) {
        self.inner
            .lock()
            .shards
            .insert((shard.keyspace.clone(), shard.shard.clone()), shard);
    }

    pub fn update_shard(&self, keyspace: &str, shard: &str, update: impl FnOnce(&mut ShardInfo)) {
        let mut inner = self.inner.lock();
        if let Some(shard) = inner
            .shards
            .get_mut(&(keyspace.to_string(), shard.to_string()))
        {
            update(shard);
        }
    }

    pub fn update_keyspace(&self, keyspace: &str, update: impl FnOnce(&mut KeyspaceInfo)) {
        if let Some(keyspace) = self.inner.lock().keyspaces.get_mut(keyspace) {
            update(keyspace);
        }
    }

    pub fn add_tablet(&self, uid: u32, keyspace: &str, tablet_type: TabletType) {
        let tablet = TabletInfo {
            alias: alias(uid),
            hostname: format!("tablet-{uid}"),
            keyspace: keyspace.to_string(),
            shard: SHARD.to_string(),
            tablet_type,
        };
        self.inner.lock().tablets.insert(tablet.alias.clone(), tablet);
    }

    pub fn set_position(&self, uid: u32, position: u64) {
        self.inner.lock().positions.insert(alias(uid), position.into());
    }

    pub fn set_blp_positions(&self, uid: u32, positions: BlpPositionList) {
        self.inner.lock().blp_positions.insert(alias(uid), positions);
    }

    /// Makes the tablet stop replicating `overshoot` past the position it is asked to reach.
    pub fn set_stop_overshoot(&self, uid: u32, overshoot: u64) {
        self.inner.lock().stop_overshoot.insert(alias(uid), overshoot);
    }

    pub fn set_schema(&self, uid: u32, schema: SchemaDefinition) {
        self.inner.lock().schemas.insert(alias(uid), schema);
    }

    pub fn set_rows(&self, uid: u32, table: &str, rows: Vec<Row>) {
        self.inner
            .lock()
            .rows
            .insert((alias(uid), table.to_string()), rows);
    }

    /// Makes scans of `table` on the tablet fail after `rows` rows.
    pub fn fail_reads_after(&self, uid: u32, table: &str, rows: usize) {
        self.inner
            .lock()
            .read_failures
            .insert((alias(uid), table.to_string()), rows);
    }

    /// Makes every `call` fail, or only the ones targeting `uid`.
    pub fn fail_call(&self, call: &str, uid: Option<u32>) {
        let err = splitdiff_error!(
            ErrorKind::RemoteCallFailed,
            "Injected failure",
            format!("{call} on {uid:?}")
        );
        self.inner
            .lock()
            .failures
            .insert((call.to_string(), uid.map(alias)), err);
    }

    pub fn set_latency(&self, call: &str, latency: Duration) {
        self.inner.lock().latencies.insert(call.to_string(), latency);
    }

    pub fn set_row_latency(&self, latency: Duration) {
        self.inner.lock().row_latency = latency;
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    /// Returns the logged calls named `call`, with their target.
    pub fn calls_named(&self, call: &str) -> Vec<String> {
        let prefix = format!("{call}(");
        self.calls()
            .into_iter()
            .filter(|logged| logged.starts_with(&prefix))
            .collect()
    }

    pub fn tablet(&self, uid: u32) -> TabletInfo {
        self.inner.lock().tablets[&alias(uid)].clone()
    }

    pub fn tablet_type(&self, uid: u32) -> TabletType {
        self.tablet(uid).tablet_type
    }

    pub fn position(&self, uid: u32) -> ReplicationPosition {
        self.inner
            .lock()
            .positions
            .get(&alias(uid))
            .copied()
            .unwrap_or_default()
    }

    pub fn scan_tracker(&self, uid: u32) -> ScanTracker {
        self.inner
            .lock()
            .scans
            .entry(alias(uid))
            .or_default()
            .clone()
    }

    /// Logs the call, applies its latency and returns its injected failure.
    async fn enter(&self, call: &str, target: &TabletAlias) -> SplitDiffResult<()> {
        let latency = {
            let mut inner = self.inner.lock();
            inner.calls.push(format!("{call}({target})"));
            inner.latencies.get(call).copied()
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let inner = self.inner.lock();
        let failure = inner
            .failures
            .get(&(call.to_string(), Some(target.clone())))
            .or_else(|| inner.failures.get(&(call.to_string(), None)));
        match failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn not_found(what: &'static str, name: String) -> SplitDiffError {
        splitdiff_error!(ErrorKind::TopologyReadFailed, what, name)
    }
}

impl TopologyService for FakeCluster {
    async fn get_keyspace(&self, keyspace: &str) -> SplitDiffResult<KeyspaceInfo> {
        self.inner
            .lock()
            .keyspaces
            .get(keyspace)
            .cloned()
            .ok_or_else(|| Self::not_found("Keyspace not found", keyspace.to_string()))
    }

    async fn get_shard(&self, keyspace: &str, shard: &str) -> SplitDiffResult<ShardInfo> {
        self.inner
            .lock()
            .shards
            .get(&(keyspace.to_string(), shard.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("Shard not found", format!("{keyspace}/{shard}")))
    }

    async fn get_tablet(&self, alias: &TabletAlias) -> SplitDiffResult<TabletInfo> {
        self.inner
            .lock()
            .tablets
            .get(alias)
            .cloned()
            .ok_or_else(|| Self::not_found("Tablet not found", alias.to_string()))
    }

    async fn get_tablets_by_shard(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
    ) -> SplitDiffResult<Vec<TabletInfo>> {
        Ok(self
            .inner
            .lock()
            .tablets
            .values()
            .filter(|t| t.alias.cell == cell && t.keyspace == keyspace && t.shard == shard)
            .cloned()
            .collect())
    }
}

impl TabletManagerClient for FakeCluster {
    async fn stop_blp(&self, tablet: &TabletInfo) -> SplitDiffResult<BlpPositionList> {
        self.enter("StopBlp", &tablet.alias).await?;

        Ok(self
            .inner
            .lock()
            .blp_positions
            .get(&tablet.alias)
            .cloned()
            .unwrap_or_default())
    }

    async fn start_blp(&self, tablet: &TabletInfo) -> SplitDiffResult<()> {
        self.enter("StartBlp", &tablet.alias).await
    }

    async fn run_blp_until(
        &self,
        tablet: &TabletInfo,
        positions: &BlpPositionList,
        _wait_timeout: Duration,
    ) -> SplitDiffResult<ReplicationPosition> {
        self.enter("RunBlpUntil", &tablet.alias).await?;

        let mut inner = self.inner.lock();
        // Applying the caught up events advances the master by one position per event.
        let applied: u64 = positions
            .entries()
            .iter()
            .map(|target| {
                let paused = inner
                    .blp_positions
                    .get(&tablet.alias)
                    .and_then(|list| list.find_by_uid(target.uid))
                    .unwrap_or_default();
                target.position.value().saturating_sub(paused.value())
            })
            .sum();
        let master = inner.positions.entry(tablet.alias.clone()).or_default();
        *master = ReplicationPosition::new(master.value() + applied);
        let master = *master;
        inner.blp_positions.insert(tablet.alias.clone(), positions.clone());

        Ok(master)
    }

    async fn stop_slave_minimum(
        &self,
        tablet: &TabletInfo,
        position: ReplicationPosition,
        _wait_timeout: Duration,
    ) -> SplitDiffResult<ReplicationPosition> {
        self.enter("StopSlaveMinimum", &tablet.alias).await?;

        let mut inner = self.inner.lock();
        let overshoot = inner
            .stop_overshoot
            .get(&tablet.alias)
            .copied()
            .unwrap_or_default();
        let current = inner.positions.entry(tablet.alias.clone()).or_default();
        let stopped = ReplicationPosition::new((*current).max(position).value() + overshoot);
        *current = stopped;

        Ok(stopped)
    }

    async fn start_slave(&self, tablet: &TabletInfo) -> SplitDiffResult<()> {
        self.enter("StartSlave", &tablet.alias).await
    }

    async fn change_type(&self, tablet: &TabletInfo, tablet_type: TabletType) -> SplitDiffResult<()> {
        self.enter("ChangeSlaveType", &tablet.alias).await?;

        if let Some(tablet) = self.inner.lock().tablets.get_mut(&tablet.alias) {
            tablet.tablet_type = tablet_type;
        }

        Ok(())
    }

    async fn get_schema(
        &self,
        tablet: &TabletInfo,
        tables: &[String],
        exclude_tables: &[String],
        _include_views: bool,
    ) -> SplitDiffResult<SchemaDefinition> {
        self.enter("GetSchema", &tablet.alias).await?;

        let mut schema = self
            .inner
            .lock()
            .schemas
            .get(&tablet.alias)
            .cloned()
            .unwrap_or_default();
        schema.table_definitions.retain(|table| {
            (tables.is_empty() || tables.contains(&table.name))
                && !exclude_tables.contains(&table.name)
        });

        Ok(schema)
    }
}

impl TableScanner for FakeCluster {
    type Stream = FakeRowStream;

    async fn table_scan(
        &self,
        tablet: &TabletInfo,
        table: &TableDefinition,
    ) -> SplitDiffResult<FakeRowStream> {
        self.enter("TableScan", &tablet.alias).await?;

        let tracker = self.scan_tracker(tablet.alias.uid);
        let inner = self.inner.lock();
        let key = (tablet.alias.clone(), table.name.clone());
        let rows = inner.rows.get(&key).cloned().unwrap_or_default();
        let fail_after = inner.read_failures.get(&key).copied();

        Ok(FakeRowStream::new(
            table.ordered_columns(),
            rows,
            inner.row_latency,
            fail_after,
            tracker.open(),
        ))
    }
}
