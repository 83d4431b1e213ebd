//! Key-based structural differ

use super::{ChangeSummary, ComparisonResult, ConflictClassifier, Modification};
use crate::structure::{EntityKind, StructuralEntity, StructuralModel};
use std::collections::HashMap;

/// Compares structural models kind by kind
pub struct StructureDiffer {
    classifier: ConflictClassifier,
}

impl StructureDiffer {
    /// Create a differ with the minimal conflict policy
    pub fn new() -> Self {
        Self {
            classifier: ConflictClassifier::new(),
        }
    }

    /// Create a differ with a custom classifier
    pub fn with_classifier(classifier: ConflictClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ConflictClassifier {
        &self.classifier
    }

    /// Compare an old model with a new one
    pub fn diff(&self, old: &StructuralModel, new: &StructuralModel) -> ComparisonResult {
        let mut result = ComparisonResult::default();

        for kind in EntityKind::ALL {
            self.diff_kind(kind, old, new, &mut result);
        }

        let added = result.additions.total();
        let modified = result.modifications.total();
        let deleted = result.deletions.total();
        result.summary = ChangeSummary {
            total_changes: added + modified + deleted,
            added_items: added,
            modified_items: modified,
            deleted_items: deleted,
        };
        result.changed = result.summary.total_changes > 0;

        tracing::debug!(
            "Compared models: {} added, {} modified, {} deleted, {} conflicts",
            added,
            modified,
            deleted,
            result.conflicts.len()
        );

        result
    }

    fn diff_kind(
        &self,
        kind: EntityKind,
        old: &StructuralModel,
        new: &StructuralModel,
        result: &mut ComparisonResult,
    ) {
        let old_entities = old.entities(kind);
        let new_entities = new.entities(kind);
        let old_map = key_map(old_entities);
        let new_map = key_map(new_entities);

        for entity in new_entities {
            let Some(key) = winning_key(entity, &new_map) else {
                continue;
            };

            match old_map.get(key) {
                None => result.additions.get_mut(kind).push(entity.clone()),
                Some(previous) if previous.content_hash == entity.content_hash => {}
                Some(previous) => {
                    if let Some(conflict) = self.classifier.classify(previous, entity) {
                        result.conflicts.push(conflict);
                    }
                    result.modifications.get_mut(kind).push(Modification {
                        key: key.to_string(),
                        old: (*previous).clone(),
                        new: entity.clone(),
                    });
                }
            }
        }

        for entity in old_entities {
            let Some(key) = winning_key(entity, &old_map) else {
                continue;
            };
            if !new_map.contains_key(key) {
                result.deletions.get_mut(kind).push(entity.clone());
            }
        }
    }
}

impl Default for StructureDiffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two models with the minimal conflict policy
pub fn compare_models(old: &StructuralModel, new: &StructuralModel) -> ComparisonResult {
    StructureDiffer::new().diff(old, new)
}

/// Key to entity map; on duplicate keys the later entity wins
fn key_map(entities: &[StructuralEntity]) -> HashMap<&str, &StructuralEntity> {
    entities
        .iter()
        .filter_map(|e| e.key.as_deref().map(|k| (k, e)))
        .collect()
}

/// The entity's key, if it is keyed and is the entry the map kept
fn winning_key<'a>(
    entity: &'a StructuralEntity,
    map: &HashMap<&str, &StructuralEntity>,
) -> Option<&'a str> {
    let key = entity.key.as_deref()?;
    map.get(key)
        .filter(|kept| std::ptr::eq(**kept, entity))
        .map(|_| key)
}
