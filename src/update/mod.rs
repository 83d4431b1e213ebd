//! Incremental update of generated source units
//!
//! Sequences extraction, comparison and merge for one unit:
//! - No existing unit: the generated text is written as is
//! - No structural change: nothing is written
//! - Otherwise the generated text is merged into the existing unit
//!
//! The unit is only written after a merge succeeded.

mod store;

pub use store::{FsStore, SourceStore};

use crate::diff::{ClassifierSettings, ComparisonResult, Conflict, ConflictClassifier, StructureDiffer};
use crate::merge::{MergePolicy, Merger};
use crate::structure::{content_hash, AnalysisStats, StructuralModel, StructureExtractor};
use crate::syntax::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What an update did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Create,
    Skip,
    Update,
    Error,
}

impl std::fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateAction::Create => write!(f, "create"),
            UpdateAction::Skip => write!(f, "skip"),
            UpdateAction::Update => write!(f, "update"),
            UpdateAction::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub success: bool,
    pub action: UpdateAction,
    pub comparison: Option<ComparisonResult>,
    pub conflicts: Vec<Conflict>,
    pub final_source: Option<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl UpdateResult {
    fn new(action: UpdateAction) -> Self {
        Self {
            success: action != UpdateAction::Error,
            action,
            comparison: None,
            conflicts: Vec::new(),
            final_source: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(UpdateAction::Error)
        }
    }

    /// Whether the result should be written to the unit
    pub fn needs_write(&self) -> bool {
        matches!(self.action, UpdateAction::Create | UpdateAction::Update)
    }
}

/// Options for [`perform_incremental_update_with`]
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub policy: MergePolicy,
    pub classifier: ClassifierSettings,
    /// Compute the result without writing
    pub dry_run: bool,
}

/// Runs extraction, comparison and merge for units of one language
pub struct IncrementalUpdater {
    extractor: StructureExtractor,
    differ: StructureDiffer,
    merger: Merger,
}

impl IncrementalUpdater {
    /// Create an updater with the minimal conflict policy
    pub fn new(language: Language) -> Result<Self> {
        Self::with_classifier(language, ConflictClassifier::new())
    }

    /// Create an updater with a custom classifier
    pub fn with_classifier(language: Language, classifier: ConflictClassifier) -> Result<Self> {
        Ok(Self {
            extractor: StructureExtractor::new(language)?,
            differ: StructureDiffer::with_classifier(classifier),
            merger: Merger::new(),
        })
    }

    /// Update an existing unit (or its absence) with newly generated text
    pub fn update(
        &mut self,
        existing: Option<&str>,
        new_source: &str,
        policy: &MergePolicy,
    ) -> UpdateResult {
        let new_unit = match self.extractor.parse_unit(new_source) {
            Ok(unit) => unit,
            Err(e) => return UpdateResult::failed(format!("Generated source: {}", e)),
        };

        let Some(existing) = existing else {
            return UpdateResult {
                final_source: Some(new_source.to_string()),
                ..UpdateResult::new(UpdateAction::Create)
            };
        };

        let old_unit = match self.extractor.parse_unit(existing) {
            Ok(unit) => unit,
            Err(e) => return UpdateResult::failed(format!("Existing source: {}", e)),
        };

        let comparison = self.differ.diff(&old_unit.model, &new_unit.model);
        if !comparison.changed {
            return UpdateResult {
                comparison: Some(comparison),
                final_source: Some(existing.to_string()),
                ..UpdateResult::new(UpdateAction::Skip)
            };
        }

        let merged = self.merger.merge(
            &old_unit.model,
            &old_unit.tree,
            &new_unit.tree,
            &comparison,
            policy,
        );

        if !merged.success {
            return UpdateResult {
                comparison: Some(comparison),
                warnings: merged.warnings,
                error: merged.error,
                ..UpdateResult::new(UpdateAction::Error)
            };
        }

        UpdateResult {
            comparison: Some(comparison),
            conflicts: merged.conflicts,
            final_source: merged.merged_source,
            warnings: merged.warnings,
            ..UpdateResult::new(UpdateAction::Update)
        }
    }
}

/// Structural analysis of one unit on disk
#[derive(Debug, Clone, Serialize)]
pub struct UnitAnalysis {
    pub exists: bool,
    /// SHA-256 of the full text
    pub hash: Option<String>,
    pub model: Option<StructuralModel>,
    pub stats: Option<AnalysisStats>,
    pub error: Option<String>,
}

/// Detect a unit's language from its path
pub fn language_for(path: &Path) -> Result<Language> {
    Language::from_path(path).with_context(|| {
        format!(
            "Unsupported source extension {:?} for {}",
            path.extension().unwrap_or_default(),
            path.display()
        )
    })
}

/// Analyze a unit on disk; parse failures are reported on the result
pub fn analyze_unit(path: &Path) -> Result<UnitAnalysis> {
    analyze_unit_with(&FsStore, path)
}

/// Analyze a unit through a store
pub fn analyze_unit_with(store: &dyn SourceStore, path: &Path) -> Result<UnitAnalysis> {
    let language = language_for(path)?;
    let Some(content) = store.read(path)? else {
        return Ok(UnitAnalysis {
            exists: false,
            hash: None,
            model: None,
            stats: None,
            error: None,
        });
    };

    let mut extractor = StructureExtractor::new(language)?;
    let (model, error) = match extractor.extract(&content) {
        Ok(model) => (Some(model), None),
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            (None, Some(e.to_string()))
        }
    };

    Ok(UnitAnalysis {
        exists: true,
        hash: Some(content_hash(&content)),
        stats: model.as_ref().map(|m| m.stats()),
        model,
        error,
    })
}

/// Update a unit on disk with newly generated text
pub fn perform_incremental_update(
    path: &Path,
    new_source: &str,
    policy: &MergePolicy,
) -> Result<UpdateResult> {
    let options = UpdateOptions {
        policy: policy.clone(),
        ..Default::default()
    };
    perform_incremental_update_with(&FsStore, path, new_source, &options)
}

/// Update a unit through a store
pub fn perform_incremental_update_with(
    store: &dyn SourceStore,
    path: &Path,
    new_source: &str,
    options: &UpdateOptions,
) -> Result<UpdateResult> {
    let language = language_for(path)?;
    let existing = store.read(path)?;

    let classifier = ConflictClassifier::from_settings(&options.classifier);
    let mut updater = IncrementalUpdater::with_classifier(language, classifier)?;
    let result = updater.update(existing.as_deref(), new_source, &options.policy);

    match result.action {
        UpdateAction::Error => tracing::warn!(
            "Update of {} failed: {}",
            path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        ),
        action => tracing::info!(
            "{}: {} ({} conflicts)",
            path.display(),
            action,
            result.conflicts.len()
        ),
    }

    if result.needs_write() && !options.dry_run {
        if let Some(source) = &result.final_source {
            store.write_atomic(path, source)?;
        }
    }

    Ok(result)
}
