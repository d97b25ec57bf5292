use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use splitdiff_config::shared::WorkerConfig;
use tracing::{Instrument, error, info, info_span};

use crate::bail;
use crate::cleanup::CleanupStack;
use crate::concurrency::shutdown::{ShutdownRx, check_done};
use crate::diff::pipeline::{DiffPipeline, DiffProgress, DiffSummary};
use crate::diff::scan::TableScanner;
use crate::error::{ErrorKind, SplitDiffResult};
use crate::metrics::MetricsSink;
use crate::replication::barrier::{BarrierPositions, ReplicationBarrier, single_source_shard};
use crate::schema::reconcile::SchemaReconciler;
use crate::topology::selector::TabletSelector;
use crate::topology::{TabletManagerClient, TopologyService};
use crate::types::{KeyspaceInfo, ShardInfo, SourceShard, TabletAlias};
use crate::workers::base::{WorkerState, WorkerStatus};

/// Topology of the destination shard, loaded once by the init phase.
#[derive(Debug, Clone)]
struct ShardDescriptor {
    keyspace_info: KeyspaceInfo,
    shard_info: ShardInfo,
    source_shard: SourceShard,
}

/// Worker tablets chosen by the find targets phase.
#[derive(Debug, Clone)]
struct Targets {
    destination: TabletAlias,
    source: TabletAlias,
}

/// Verifies that the destination shard of a vertical split holds the same data as the
/// tables it was split from.
///
/// A run pauses replication on one worker tablet of each shard at equivalent positions,
/// diffs every table, and always undoes its changes to the cluster before ending.
#[derive(Debug)]
pub struct VerticalSplitDiffWorker<T, M, S, P> {
    config: Arc<WorkerConfig>,
    topology: T,
    tablet_manager: M,
    scanner: S,
    selector: P,
    shutdown_rx: ShutdownRx,
    cleaner: CleanupStack,
    status: WorkerStatus,
    progress: DiffProgress,
    started: AtomicBool,
    barrier_positions: Mutex<Option<BarrierPositions>>,
    diff_summary: Mutex<Option<DiffSummary>>,
}

impl<T, M, S, P> VerticalSplitDiffWorker<T, M, S, P>
where
    T: TopologyService + Clone + 'static,
    M: TabletManagerClient + Clone + 'static,
    S: TableScanner + Clone + 'static,
    P: TabletSelector,
{
    pub fn new(
        config: Arc<WorkerConfig>,
        topology: T,
        tablet_manager: M,
        scanner: S,
        selector: P,
        shutdown_rx: ShutdownRx,
        metrics: Arc<dyn MetricsSink>,
    ) -> SplitDiffResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            topology,
            tablet_manager,
            scanner,
            selector,
            shutdown_rx,
            cleaner: CleanupStack::new(),
            status: WorkerStatus::new(metrics),
            progress: DiffProgress::new(),
            started: AtomicBool::new(false),
            barrier_positions: Mutex::new(None),
            diff_summary: Mutex::new(None),
        })
    }

    /// Runs the worker to completion.
    ///
    /// Cleanup always runs once the run started. A cleanup failure is returned only when
    /// every phase succeeded, otherwise it is logged and the phase error is returned.
    pub async fn run(&self) -> SplitDiffResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            bail!(
                ErrorKind::InvalidState,
                "The worker can only be run once",
                format!("current state: {}", self.status.state())
            );
        }
        self.status.metrics().reset();

        let span = info_span!(
            "vertical_split_diff",
            keyspace = %self.config.keyspace,
            shard = %self.config.shard
        );

        async {
            let result = self.run_phases().await;
            if let Err(err) = &result {
                error!("worker run failed: {err}");
            }

            self.status.set_state(WorkerState::CleanUp);
            let cleanup_result = self
                .cleaner
                .clean_up(
                    &self.topology,
                    &self.tablet_manager,
                    self.config.remote_actions_timeout(),
                )
                .await;

            let result = match (result, cleanup_result) {
                (Ok(()), cleanup_result) => cleanup_result,
                (Err(err), Ok(())) => Err(err),
                (Err(err), Err(cleanup_err)) => {
                    error!("cleanup failed after the run failed: {cleanup_err}");
                    Err(err)
                }
            };

            self.status.finish(result.as_ref().err().cloned());
            info!("worker run ended in state '{}'", self.status.state());

            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self) -> SplitDiffResult<()> {
        self.status.set_state(WorkerState::Init);
        let shard = self.init().await.map_err(|err| err.context("init"))?;
        check_done(&self.shutdown_rx)?;

        self.status.set_state(WorkerState::FindTargets);
        let targets = self
            .find_targets(&shard)
            .await
            .map_err(|err| err.context("find targets"))?;
        check_done(&self.shutdown_rx)?;

        self.status.set_state(WorkerState::SyncReplication);
        let positions = self
            .synchronize_replication(&shard, &targets)
            .await
            .map_err(|err| err.context("synchronize replication"))?;
        *self.barrier_positions.lock() = Some(positions);
        check_done(&self.shutdown_rx)?;

        self.status.set_state(WorkerState::Diff);
        self.diff(&shard, &targets)
            .await
            .map_err(|err| err.context("diff"))
    }

    async fn init(&self) -> SplitDiffResult<ShardDescriptor> {
        let keyspace_info = self.topology.get_keyspace(&self.config.keyspace).await?;
        if keyspace_info.served_froms.is_empty() {
            bail!(
                ErrorKind::MissingServedFrom,
                "Destination keyspace has no served-from record, is it the target of a vertical split?",
                format!("keyspace {}", self.config.keyspace)
            );
        }

        let shard_info = self
            .topology
            .get_shard(&self.config.keyspace, &self.config.shard)
            .await?;
        let source_shard = single_source_shard(&shard_info)?.clone();
        if source_shard.tables.is_empty() {
            bail!(
                ErrorKind::MissingSourceShardTables,
                "Source shard has no table filter",
                format!("{}/{}", source_shard.keyspace, source_shard.shard)
            );
        }
        if shard_info.master_alias.is_none() {
            bail!(
                ErrorKind::MissingShardMaster,
                "The destination shard has no master",
                format!("{}/{}", self.config.keyspace, self.config.shard)
            );
        }

        info!(
            "diffing {}/{} against source {}/{} with table filters {:?}",
            self.config.keyspace,
            self.config.shard,
            source_shard.keyspace,
            source_shard.shard,
            source_shard.tables
        );

        Ok(ShardDescriptor {
            keyspace_info,
            shard_info,
            source_shard,
        })
    }

    async fn find_targets(&self, shard: &ShardDescriptor) -> SplitDiffResult<Targets> {
        let destination = self
            .selector
            .find_worker_tablet(
                &self.cleaner,
                &self.config.cell,
                &shard.keyspace_info.name,
                &shard.shard_info.shard,
            )
            .await?;
        info!("using tablet {destination} as the destination worker");

        let source = self
            .selector
            .find_worker_tablet(
                &self.cleaner,
                &self.config.cell,
                &shard.source_shard.keyspace,
                &shard.source_shard.shard,
            )
            .await?;
        info!("using tablet {source} as the source worker");

        Ok(Targets {
            destination,
            source,
        })
    }

    async fn synchronize_replication(
        &self,
        shard: &ShardDescriptor,
        targets: &Targets,
    ) -> SplitDiffResult<BarrierPositions> {
        let barrier = ReplicationBarrier::new(
            self.topology.clone(),
            self.tablet_manager.clone(),
            self.cleaner.clone(),
            self.config.remote_actions_timeout(),
        );

        barrier
            .synchronize(&shard.shard_info, &targets.source, &targets.destination)
            .await
    }

    async fn diff(&self, shard: &ShardDescriptor, targets: &Targets) -> SplitDiffResult<()> {
        let destination = self.topology.get_tablet(&targets.destination).await?;
        let source = self.topology.get_tablet(&targets.source).await?;

        let reconciler = SchemaReconciler::new(
            self.tablet_manager.clone(),
            self.config.remote_actions_timeout(),
            self.config.exclude_tables.clone(),
            self.config.anchor_table_filters,
        );
        let schemas = reconciler
            .reconcile(&destination, &source, &shard.source_shard.tables)
            .await?;

        let pipeline = DiffPipeline::new(
            self.scanner.clone(),
            self.config.remote_actions_timeout(),
            self.config.max_concurrent_table_diffs,
            self.config.max_reported_mismatches,
            self.status.metrics().clone(),
            self.progress.clone(),
        );
        let summary = pipeline
            .run(&source, &destination, &schemas.destination.table_definitions)
            .await;

        let result = summary.result();
        *self.diff_summary.lock() = Some(summary);

        result
    }

    pub fn state(&self) -> WorkerState {
        self.status.state()
    }

    /// Returns the outcome of the run once it ended.
    pub fn result(&self) -> Option<SplitDiffResult<()>> {
        let state = self.status.state();
        if !state.is_terminal() {
            return None;
        }

        match self.status.error() {
            Some(err) => Some(Err(err)),
            None => Some(Ok(())),
        }
    }

    /// Returns the per table results of the diff phase, if it ran.
    pub fn diff_summary(&self) -> Option<DiffSummary> {
        self.diff_summary.lock().clone()
    }

    /// Returns the replication positions both worker tablets were stopped at, if the
    /// replication barrier completed.
    pub fn barrier_positions(&self) -> Option<BarrierPositions> {
        *self.barrier_positions.lock()
    }

    pub fn status_as_text(&self) -> String {
        let state = self.status.state();
        let mut status = String::new();
        let _ = writeln!(
            status,
            "Working on: {}/{}",
            self.config.keyspace, self.config.shard
        );
        let _ = writeln!(status, "State: {state}");

        match state {
            WorkerState::Diff => {
                let _ = writeln!(status, "Running...");
                let _ = writeln!(
                    status,
                    "{}/{} tables diffed",
                    self.progress.done(),
                    self.progress.total()
                );
            }
            WorkerState::Done => {
                let _ = writeln!(status, "Success.");
            }
            WorkerState::Error => {
                if let Some(err) = self.status.error() {
                    let _ = writeln!(status, "Error: {err}");
                }
            }
            _ => {}
        }

        status
    }

    pub fn status_as_html(&self) -> String {
        let state = self.status.state();
        let mut status = String::new();
        let _ = writeln!(
            status,
            "Working on: <b>{}/{}</b></br>",
            escape_html(&self.config.keyspace),
            escape_html(&self.config.shard)
        );
        let _ = writeln!(status, "State: {state}</br>");

        match state {
            WorkerState::Diff => {
                let _ = writeln!(status, "<b>Running...</b></br>");
                let _ = writeln!(
                    status,
                    "{}/{} tables diffed</br>",
                    self.progress.done(),
                    self.progress.total()
                );
            }
            WorkerState::Done => {
                let _ = writeln!(status, "<b>Success.</b></br>");
            }
            WorkerState::Error => {
                if let Some(err) = self.status.error() {
                    let _ = writeln!(
                        status,
                        "<b>Error</b>: {}</br>",
                        escape_html(&err.to_string())
                    );
                }
            }
            _ => {}
        }

        status
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}
