//! Display nodes handed to the host tree view

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::DisplayConfig;
use crate::git::WorktreeRecord;

/// A leaf in the worktree tree view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayNode {
    /// Stable identifier, the worktree's full path
    pub id: String,
    /// Text shown for the entry
    pub label: String,
    /// Secondary text, the branch name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Hover text, the full path
    pub tooltip: String,
    /// Always false, the tree is one level deep
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub prunable: bool,
}

impl DisplayNode {
    /// Build the node for one parsed worktree
    pub fn from_record(record: &WorktreeRecord, display: &DisplayConfig) -> Self {
        let label = if record.relative_path().is_empty() && display.basename_fallback {
            basename(record.full_path())
        } else {
            record.relative_path().to_string()
        };

        Self {
            id: record.full_path().to_string(),
            label,
            description: record.branch().to_string(),
            tooltip: record.full_path().to_string(),
            collapsible: false,
            locked: record.is_locked(),
            prunable: record.is_prunable(),
        }
    }
}

fn basename(full_path: &str) -> String {
    Path::new(full_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| full_path.to_string())
}
