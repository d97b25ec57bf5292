//! Compensating actions undoing the cluster changes made during a run.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::bail;
use crate::error::{ErrorKind, SplitDiffError, SplitDiffResult};
use crate::topology::remote::remote_call;
use crate::topology::{TabletManagerClient, TopologyService};
use crate::types::{TabletAlias, TabletInfo, TabletType};

/// Name of a kind of cleanup action, the first half of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupActionName {
    StartBlp,
    StartSlave,
    ChangeSlaveType,
}

impl fmt::Display for CleanupActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartBlp => "StartBlpAction",
            Self::StartSlave => "StartSlaveAction",
            Self::ChangeSlaveType => "ChangeSlaveTypeAction",
        };

        f.write_str(name)
    }
}

/// A compensating action recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Resumes filtered replication on a destination master.
    StartBlp { tablet: TabletInfo },
    /// Resumes inbound replication on a tablet.
    StartSlave { tablet: TabletInfo },
    /// Moves a tablet back to a serving (or parking) type.
    ChangeSlaveType {
        alias: TabletAlias,
        tablet_type: TabletType,
    },
}

impl CleanupAction {
    pub fn name(&self) -> CleanupActionName {
        match self {
            Self::StartBlp { .. } => CleanupActionName::StartBlp,
            Self::StartSlave { .. } => CleanupActionName::StartSlave,
            Self::ChangeSlaveType { .. } => CleanupActionName::ChangeSlaveType,
        }
    }

    /// The tablet the action applies to, the second half of its key.
    pub fn target(&self) -> &TabletAlias {
        match self {
            Self::StartBlp { tablet } | Self::StartSlave { tablet } => &tablet.alias,
            Self::ChangeSlaveType { alias, .. } => alias,
        }
    }

    fn has_key(&self, name: CleanupActionName, target: &TabletAlias) -> bool {
        self.name() == name && self.target() == target
    }

    async fn execute<T, M>(&self, topology: &T, tablet_manager: &M, timeout: Duration) -> SplitDiffResult<()>
    where
        T: TopologyService,
        M: TabletManagerClient,
    {
        match self {
            Self::StartBlp { tablet } => {
                remote_call(
                    timeout,
                    "StartBlp",
                    &tablet.alias,
                    tablet_manager.start_blp(tablet),
                )
                .await
            }
            Self::StartSlave { tablet } => {
                remote_call(
                    timeout,
                    "StartSlave",
                    &tablet.alias,
                    tablet_manager.start_slave(tablet),
                )
                .await
            }
            Self::ChangeSlaveType { alias, tablet_type } => {
                let tablet = topology.get_tablet(alias).await?;

                remote_call(
                    timeout,
                    "ChangeSlaveType",
                    alias,
                    tablet_manager.change_type(&tablet, *tablet_type),
                )
                .await
            }
        }
    }
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChangeSlaveType { alias, tablet_type } => {
                write!(f, "{}({alias} -> {tablet_type})", self.name())
            }
            _ => write!(f, "{}({})", self.name(), self.target()),
        }
    }
}

/// Ordered registry of the cleanup actions of a run.
///
/// Actions are recorded as cluster state gets changed and executed in reverse
/// recording order by [`CleanupStack::clean_up`]. Executing drains the stack, so
/// every recorded action runs at most once. Clones share the same stack.
#[derive(Debug, Clone, Default)]
pub struct CleanupStack {
    actions: Arc<Mutex<Vec<CleanupAction>>>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: CleanupAction) {
        info!(%action, "recording cleanup action");

        self.actions.lock().push(action);
    }

    pub fn record_start_blp(&self, tablet: &TabletInfo) {
        self.record(CleanupAction::StartBlp {
            tablet: tablet.clone(),
        });
    }

    pub fn record_start_slave(&self, tablet: &TabletInfo) {
        self.record(CleanupAction::StartSlave {
            tablet: tablet.clone(),
        });
    }

    pub fn record_change_slave_type(&self, alias: &TabletAlias, tablet_type: TabletType) {
        self.record(CleanupAction::ChangeSlaveType {
            alias: alias.clone(),
            tablet_type,
        });
    }

    /// Changes the type a recorded [`CleanupAction::ChangeSlaveType`] restores `target` to.
    ///
    /// The action keeps its position in the stack. Fails if no such action was recorded.
    pub fn update_tablet_type(
        &self,
        target: &TabletAlias,
        new_tablet_type: TabletType,
    ) -> SplitDiffResult<()> {
        let mut actions = self.actions.lock();
        let action = actions
            .iter_mut()
            .rev()
            .find(|action| action.has_key(CleanupActionName::ChangeSlaveType, target));

        let Some(CleanupAction::ChangeSlaveType { tablet_type, .. }) = action else {
            bail!(
                ErrorKind::CleanupActionNotFound,
                "No cleanup action found for tablet",
                format!("{} for {target}", CleanupActionName::ChangeSlaveType)
            );
        };

        info!(%target, from = %tablet_type, to = %new_tablet_type, "updating cleanup tablet type");
        *tablet_type = new_tablet_type;

        Ok(())
    }

    /// Removes the most recent action recorded under `(name, target)`.
    pub fn remove_action(
        &self,
        name: CleanupActionName,
        target: &TabletAlias,
    ) -> SplitDiffResult<CleanupAction> {
        let mut actions = self.actions.lock();
        let Some(index) = actions
            .iter()
            .rposition(|action| action.has_key(name, target))
        else {
            bail!(
                ErrorKind::CleanupActionNotFound,
                "No cleanup action found for tablet",
                format!("{name} for {target}")
            );
        };

        Ok(actions.remove(index))
    }

    /// Returns a snapshot of the recorded actions in recording order.
    pub fn actions(&self) -> Vec<CleanupAction> {
        self.actions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    /// Executes and drains every recorded action, most recent first.
    ///
    /// A failing action does not prevent the following ones from running; all failures are
    /// returned together. Calling this again without recording new actions is a no-op.
    pub async fn clean_up<T, M>(
        &self,
        topology: &T,
        tablet_manager: &M,
        timeout: Duration,
    ) -> SplitDiffResult<()>
    where
        T: TopologyService,
        M: TabletManagerClient,
    {
        let actions = mem::take(&mut *self.actions.lock());

        info!(count = actions.len(), "executing cleanup actions");

        let mut errors: Vec<SplitDiffError> = Vec::new();
        for action in actions.into_iter().rev() {
            info!(%action, "executing cleanup action");

            if let Err(err) = action.execute(topology, tablet_manager, timeout).await {
                error!(%action, %err, "cleanup action failed");
                errors.push(err);
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        Err(SplitDiffError::from((
            ErrorKind::CleanupFailed,
            "One or more cleanup actions failed",
            SplitDiffError::many(errors).to_string(),
        )))
    }
}
