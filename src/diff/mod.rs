//! Structural comparison of two models
//!
//! Entities are matched by kind and identity key:
//! - Key only in the new model: addition
//! - Key only in the old model: deletion
//! - Key in both with a different content hash: modification
//!
//! Modifications are also run through the [`ConflictClassifier`] to flag
//! changes that would break existing callers.

mod classifier;
mod differ;

pub use classifier::{
    ClassifierSettings, ConflictClassifier, ConflictRule, DefaultValueRule,
    ParameterSignatureRule, SuperclassRule,
};
pub use differ::{compare_models, StructureDiffer};

use crate::structure::{ByKind, EntityKind, StructuralEntity};
use serde::{Deserialize, Serialize};

/// Kind of a conflict record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    /// A risky modification, or one the merge could not apply
    Modification,
    /// A modification applied as a renamed copy
    Rename,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Modification => write!(f, "modification"),
            ConflictKind::Rename => write!(f, "rename"),
        }
    }
}

/// A modification that needs explicit handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub entity_kind: EntityKind,
    pub entity_key: String,
    pub reason: String,
    pub old: StructuralEntity,
    pub new: StructuralEntity,
    /// Name of the renamed copy, for rename conflicts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} `{}`: {}",
            self.kind, self.entity_kind, self.entity_key, self.reason
        )?;
        if let Some(renamed) = &self.renamed_to {
            write!(f, " (new version kept as `{}`)", renamed)?;
        }
        Ok(())
    }
}

/// An entity present in both models with different content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub key: String,
    pub old: StructuralEntity,
    pub new: StructuralEntity,
}

/// Aggregate change counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub total_changes: usize,
    pub added_items: usize,
    pub modified_items: usize,
    pub deleted_items: usize,
}

/// Result of comparing an old model with a new one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Entities only in the new model, in new-model order
    pub additions: ByKind<StructuralEntity>,
    /// Changed entities, in new-model order
    pub modifications: ByKind<Modification>,
    /// Entities only in the old model, in old-model order
    pub deletions: ByKind<StructuralEntity>,
    pub conflicts: Vec<Conflict>,
    pub summary: ChangeSummary,
    pub changed: bool,
}

impl ComparisonResult {
    /// Whether any conflict was raised for the given entity
    pub fn conflict_for(&self, kind: EntityKind, key: &str) -> Option<&Conflict> {
        self.conflicts
            .iter()
            .find(|c| c.entity_kind == kind && c.entity_key == key)
    }

    /// One line per change, for text reports
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (kind, entity) in self.additions.iter() {
            lines.push(format!("+ {} {}", kind, entity.display_key()));
        }
        for (kind, modification) in self.modifications.iter() {
            lines.push(format!("~ {} {}", kind, modification.key));
        }
        for (kind, entity) in self.deletions.iter() {
            lines.push(format!("- {} {}", kind, entity.display_key()));
        }
        lines
    }
}
