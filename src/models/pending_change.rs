// ABOUTME: Pending change data model as reported by the server, grouped into pending sets per workspace

use super::item_path::ServerPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Add,
    Edit,
    Delete,
    Rename,
    Branch,
}

impl ChangeType {
    pub fn indicator(&self) -> &'static str {
        match self {
            ChangeType::Add => "+",
            ChangeType::Edit => "~",
            ChangeType::Delete => "-",
            ChangeType::Rename => ">",
            ChangeType::Branch => "^",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::Add => "add",
            ChangeType::Edit => "edit",
            ChangeType::Delete => "delete",
            ChangeType::Rename => "rename",
            ChangeType::Branch => "branch",
        };
        f.write_str(name)
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(ChangeType::Add),
            "edit" => Ok(ChangeType::Edit),
            "delete" => Ok(ChangeType::Delete),
            "rename" => Ok(ChangeType::Rename),
            "branch" => Ok(ChangeType::Branch),
            other => Err(format!("unknown change type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LockLevel {
    #[default]
    None,
    Checkin,
    Checkout,
}

/// A local modification recorded on the server but not yet checked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub server_item: ServerPath,
    pub local_item: PathBuf,
    pub change_type: ChangeType,
    pub item_type: ItemType,
    #[serde(default)]
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lock: LockLevel,
    /// Source item of a rename or branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_server_item: Option<ServerPath>,
    /// Non-zero when the item itself is deleted on the server.
    #[serde(default)]
    pub deletion_id: u32,
    // Filled in from the enclosing pending set
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer: Option<String>,
}

impl PendingChange {
    pub fn new(
        server_item: ServerPath,
        local_item: impl Into<PathBuf>,
        change_type: ChangeType,
        item_type: ItemType,
    ) -> Self {
        Self {
            server_item,
            local_item: local_item.into(),
            change_type,
            item_type,
            version: 0,
            date: None,
            lock: LockLevel::None,
            source_server_item: None,
            deletion_id: 0,
            workspace: String::new(),
            owner: String::new(),
            computer: None,
        }
    }

    /// Ordering and deduplication key of a query result.
    pub fn sort_key(&self) -> (&ServerPath, ChangeType) {
        (&self.server_item, self.change_type)
    }

    pub fn is_deleted_item(&self) -> bool {
        self.deletion_id != 0
    }
}

/// The pending changes of one workspace, as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSet {
    pub name: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer: Option<String>,
    #[serde(default)]
    pub pending_changes: Vec<PendingChange>,
}

/// One page of a pending-set query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSetPage {
    #[serde(default)]
    pub pending_sets: Vec<PendingSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: u32,
    pub edited: u32,
    pub deleted: u32,
    pub renamed: u32,
    pub branched: u32,
}

impl ChangeSummary {
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = &'a PendingChange>) -> Self {
        let mut summary = Self::default();
        for change in changes {
            match change.change_type {
                ChangeType::Add => summary.added += 1,
                ChangeType::Edit => summary.edited += 1,
                ChangeType::Delete => summary.deleted += 1,
                ChangeType::Rename => summary.renamed += 1,
                ChangeType::Branch => summary.branched += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> u32 {
        self.added + self.edited + self.deleted + self.renamed + self.branched
    }

    pub fn format(&self) -> String {
        if self.total() == 0 {
            "No pending changes".to_string()
        } else {
            format!(
                "+{} ~{} -{} >{} ^{}",
                self.added, self.edited, self.deleted, self.renamed, self.branched
            )
        }
    }
}
