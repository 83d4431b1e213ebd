//! Command implementations

use crate::config::EngineConfig;
use crate::diff::{ComparisonResult, ConflictClassifier, StructureDiffer};
use crate::structure::{EntityKind, StructureExtractor};
use crate::update::{
    analyze_unit, language_for, perform_incremental_update_with, FsStore, SourceStore,
    UnitAnalysis, UpdateAction, UpdateOptions, UpdateResult,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Analysis of one file, as reported by `analyze`
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub analysis: UnitAnalysis,
}

/// Collect source files under the given paths
pub fn collect_sources(root: &Path, paths: &[String], config: &EngineConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        let path = root.join(path);
        if path.is_file() {
            files.push(path);
            continue;
        }

        for entry in WalkDir::new(&path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file = entry.path();
            if !file.is_file() || !config.is_source_file(file) {
                continue;
            }

            let relative = file.strip_prefix(root).unwrap_or(file);
            let relative = relative.to_string_lossy().replace('\\', "/");
            if config.should_ignore(&relative) {
                tracing::debug!("Ignoring {}", relative);
                continue;
            }

            files.push(file.to_path_buf());
        }
    }

    files
}

/// Analyze source files and directories
pub fn analyze(root: &Path, paths: &[String], config: &EngineConfig) -> Result<Vec<FileReport>> {
    let files = collect_sources(root, paths, config);
    if files.is_empty() {
        anyhow::bail!("No source files found");
    }

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let analysis = analyze_unit(&path)?;
        reports.push(FileReport { path, analysis });
    }

    Ok(reports)
}

/// Compare two versions of a source file
pub fn compare(old: &Path, new: &Path, config: &EngineConfig) -> Result<ComparisonResult> {
    let language = language_for(old)?;
    let mut extractor = StructureExtractor::new(language)?;

    let old_source = std::fs::read_to_string(old)
        .with_context(|| format!("Failed to read {}", old.display()))?;
    let new_source = std::fs::read_to_string(new)
        .with_context(|| format!("Failed to read {}", new.display()))?;

    let old_model = extractor
        .extract(&old_source)
        .with_context(|| format!("Failed to parse {}", old.display()))?;
    let new_model = extractor
        .extract(&new_source)
        .with_context(|| format!("Failed to parse {}", new.display()))?;

    let differ =
        StructureDiffer::with_classifier(ConflictClassifier::from_settings(&config.classifier));
    Ok(differ.diff(&old_model, &new_model))
}

/// Merge a regenerated file into its target
pub fn update(
    target: &Path,
    generated: &Path,
    options: &UpdateOptions,
) -> Result<(Option<String>, UpdateResult)> {
    let new_source = std::fs::read_to_string(generated)
        .with_context(|| format!("Failed to read {}", generated.display()))?;
    let existing = FsStore.read(target)?;

    let result = perform_incremental_update_with(&FsStore, target, &new_source, options)?;
    Ok((existing, result))
}

/// Unified diff between the existing and the final source
pub fn unified_diff(existing: &str, updated: &str, path: &Path) -> String {
    let name = path.display().to_string();
    similar::TextDiff::from_lines(existing, updated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", name), &format!("b/{}", name))
        .to_string()
}

/// Print any serializable result as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Print analysis reports in text format
pub fn print_analysis_text(reports: &[FileReport], show_entities: bool) {
    for report in reports {
        println!("{}", report.path.display());

        if let Some(ref error) = report.analysis.error {
            println!("  ✗ {}", error);
            println!();
            continue;
        }

        if let Some(ref stats) = report.analysis.stats {
            println!(
                "  {} imports, {} exports, {} functions, {} classes, {} variables",
                stats.imports, stats.exports, stats.functions, stats.classes, stats.variables
            );
            println!(
                "  {} lines, {} comments, complexity {}",
                stats.total_lines, stats.comments, stats.complexity
            );
        }

        if show_entities {
            if let Some(ref model) = report.analysis.model {
                for kind in EntityKind::ALL {
                    for entity in model.entities(kind) {
                        println!(
                            "    {:<9} {:<32} {}",
                            kind.to_string(),
                            entity.display_key(),
                            &entity.content_hash[..12]
                        );
                    }
                }
            }
        }
        println!();
    }
}

/// Print a comparison in text format
pub fn print_comparison_text(comparison: &ComparisonResult) {
    if !comparison.changed {
        println!("No structural changes.");
        return;
    }

    let summary = &comparison.summary;
    println!(
        "{} changes: {} added, {} modified, {} deleted\n",
        summary.total_changes, summary.added_items, summary.modified_items, summary.deleted_items
    );

    for line in comparison.describe() {
        println!("  {}", line);
    }

    if !comparison.conflicts.is_empty() {
        println!("\nConflicts:");
        for conflict in &comparison.conflicts {
            println!("  ⚠ {}", conflict);
        }
    }
}

/// Print an update result in text format
pub fn print_update_text(target: &Path, result: &UpdateResult, dry_run: bool) {
    let prefix = if dry_run { "[dry run] " } else { "" };
    let icon = match result.action {
        UpdateAction::Create => "✓",
        UpdateAction::Skip => "•",
        UpdateAction::Update => "✓",
        UpdateAction::Error => "✗",
    };

    println!("{}{} {}: {}", prefix, icon, result.action, target.display());

    if let Some(ref comparison) = result.comparison {
        if comparison.changed {
            let summary = &comparison.summary;
            println!(
                "  {} added, {} modified, {} deleted",
                summary.added_items, summary.modified_items, summary.deleted_items
            );
        }
    }

    for conflict in &result.conflicts {
        println!("  ⚠ {}", conflict);
    }
    for warning in &result.warnings {
        println!("  ! {}", warning);
    }
    if let Some(ref error) = result.error {
        println!("  Error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_sources_skips_ignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/api")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/api/user.js"), "export const a = 1;\n").unwrap();
        std::fs::write(root.join("src/types.d.ts"), "export type A = string;\n").unwrap();
        std::fs::write(root.join("src/readme.md"), "# docs\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;\n").unwrap();

        let files = collect_sources(root, &[".".to_string()], &EngineConfig::default());
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["user.js"]);
    }

    #[test]
    fn test_compare_files() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("old.js");
        let new = dir.path().join("new.js");
        std::fs::write(&old, "function f(a) {}\n").unwrap();
        std::fs::write(&new, "function f(a, b) {}\nfunction g() {}\n").unwrap();

        let comparison = compare(&old, &new, &EngineConfig::default()).unwrap();
        assert_eq!(comparison.summary.added_items, 1);
        assert_eq!(comparison.summary.modified_items, 1);
        assert_eq!(comparison.conflicts.len(), 1);
    }

    #[test]
    fn test_unified_diff() {
        let diff = unified_diff("a();\n", "a();\nb();\n", Path::new("api.js"));
        assert!(diff.contains("--- a/api.js"));
        assert!(diff.contains("+b();"));
    }
}
