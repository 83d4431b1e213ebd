//! Merging a regenerated source unit into the existing one
//!
//! The merge starts from a copy of the existing tree and applies a
//! [`ComparisonResult`](crate::diff::ComparisonResult) to it:
//! - Additions are spliced in (imports at the top, everything else at the end)
//! - Modifications follow the [`ConflictResolution`] policy
//! - Deletions are applied only when the policy asks for it
//!
//! The merger never performs I/O; it returns the merged text.

mod merger;

pub use merger::Merger;

use crate::diff::Conflict;
use crate::structure::EntityKind;
use crate::syntax::SyntaxTree;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How modified entities are merged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConflictResolution {
    /// Keep the existing entity and append the new one under a suffixed name
    #[default]
    Rename,
    /// Replace the existing entity with the new one
    Overwrite,
    /// Keep the existing entity
    Skip,
    /// A value no strategy matches; merged like `Skip`
    Unrecognized(String),
}

impl ConflictResolution {
    pub fn as_str(&self) -> &str {
        match self {
            ConflictResolution::Rename => "rename",
            ConflictResolution::Overwrite => "overwrite",
            ConflictResolution::Skip => "skip",
            ConflictResolution::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl std::str::FromStr for ConflictResolution {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl From<String> for ConflictResolution {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "rename" => ConflictResolution::Rename,
            "overwrite" => ConflictResolution::Overwrite,
            "skip" => ConflictResolution::Skip,
            _ => ConflictResolution::Unrecognized(value),
        }
    }
}

impl From<ConflictResolution> for String {
    fn from(value: ConflictResolution) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Merge policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicy {
    pub conflict_resolution: ConflictResolution,
    /// Remove entities that the new source no longer has
    pub remove_deleted: bool,
    /// Appended to the identifier of renamed copies
    pub rename_suffix: String,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::Rename,
            remove_deleted: false,
            rename_suffix: "_v2".to_string(),
        }
    }
}

impl MergePolicy {
    pub fn new(conflict_resolution: ConflictResolution) -> Self {
        Self {
            conflict_resolution,
            ..Default::default()
        }
    }

    pub fn remove_deleted(mut self, remove: bool) -> Self {
        self.remove_deleted = remove;
        self
    }
}

/// Which input tree an entity was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeSide {
    Old,
    New,
}

impl std::fmt::Display for TreeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeSide::Old => write!(f, "existing"),
            TreeSide::New => write!(f, "generated"),
        }
    }
}

/// Failure to apply a comparison to a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("{kind} `{key}` not found in the {side} tree")]
    SubtreeNotFound {
        kind: EntityKind,
        key: String,
        side: TreeSide,
    },

    #[error("{kind} `{key}` in the {side} tree does not match the model (expected hash {expected}, found {found})")]
    StaleModel {
        kind: EntityKind,
        key: String,
        side: TreeSide,
        expected: String,
        found: String,
    },

    #[error("{kind} `{key}` is not a top-level statement of the {side} tree")]
    NotTopLevel {
        kind: EntityKind,
        key: String,
        side: TreeSide,
    },
}

/// Outcome of a merge
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeResult {
    pub success: bool,
    pub merged_source: Option<String>,
    #[serde(skip)]
    pub merged_tree: Option<SyntaxTree>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}
