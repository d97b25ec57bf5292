//! Cluster topology and replication types shared by every phase of a run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{ErrorKind, SplitDiffResult};

/// Identity of a tablet: the cell it lives in and its numeric id within the cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(cell: impl Into<String>, uid: u32) -> Self {
        Self {
            cell: cell.into(),
            uid,
        }
    }
}

impl fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}

/// Serving role of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabletType {
    Master,
    Replica,
    Rdonly,
    Spare,
    Worker,
    Backup,
    Restore,
}

impl TabletType {
    /// Returns `true` if tablets of this type receive query traffic.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Master | Self::Replica | Self::Rdonly)
    }
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Master => "master",
            Self::Replica => "replica",
            Self::Rdonly => "rdonly",
            Self::Spare => "spare",
            Self::Worker => "worker",
            Self::Backup => "backup",
            Self::Restore => "restore",
        };

        f.write_str(name)
    }
}

/// Topology record of a tablet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletInfo {
    pub alias: TabletAlias,
    pub hostname: String,
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
}

/// Redirection of a tablet type of a keyspace to another keyspace.
///
/// Present on the destination keyspace of a vertical split until traffic is migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedFrom {
    pub tablet_type: TabletType,
    pub keyspace: String,
}

/// Topology record of a keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceInfo {
    pub name: String,
    pub served_froms: Vec<ServedFrom>,
}

/// The shard a destination shard receives filtered replication from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceShard {
    /// Id of the filtered replication stream on the destination master.
    pub uid: u32,
    pub keyspace: String,
    pub shard: String,
    /// Regular expressions selecting the tables moved by the split.
    pub tables: Vec<String>,
}

/// Topology record of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub keyspace: String,
    pub shard: String,
    pub master_alias: Option<TabletAlias>,
    pub source_shards: Vec<SourceShard>,
}

/// Coordinate in a replication log.
///
/// Positions are opaque to the worker apart from their total order: a tablet
/// stopped at position `a` has applied everything a tablet at `b <= a` has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ReplicationPosition(u64);

impl ReplicationPosition {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns `true` if this position is equal to or past `other`.
    pub fn at_least(&self, other: &ReplicationPosition) -> bool {
        self >= other
    }
}

impl From<u64> for ReplicationPosition {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

/// Position of one filtered replication stream, identified by its source shard uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlpPosition {
    pub uid: u32,
    pub position: ReplicationPosition,
}

/// Positions of the filtered replication streams of a destination master, unique per uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlpPositionList {
    entries: Vec<BlpPosition>,
}

impl BlpPositionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the position of stream `uid`, failing if the stream is already present.
    pub fn insert(&mut self, uid: u32, position: ReplicationPosition) -> SplitDiffResult<()> {
        if self.find_by_uid(uid).is_some() {
            bail!(
                ErrorKind::DuplicateBlpPosition,
                "Replication position already recorded for stream",
                format!("uid {uid}")
            );
        }

        self.entries.push(BlpPosition { uid, position });

        Ok(())
    }

    pub fn find_by_uid(&self, uid: u32) -> Option<ReplicationPosition> {
        self.entries
            .iter()
            .find(|entry| entry.uid == uid)
            .map(|entry| entry.position)
    }

    pub fn entries(&self) -> &[BlpPosition] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<BlpPosition> for BlpPositionList {
    /// Collects positions, keeping the first entry of a duplicated uid.
    fn from_iter<I: IntoIterator<Item = BlpPosition>>(iter: I) -> Self {
        let mut list = BlpPositionList::new();
        for entry in iter {
            let _ = list.insert(entry.uid, entry.position);
        }

        list
    }
}

impl fmt::Display for BlpPositionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}@{}", entry.uid, entry.position)?;
        }
        f.write_str("]")
    }
}
