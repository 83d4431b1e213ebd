//! regen-merge - Structural diff and merge for regenerated source files
//!
//! This library parses JavaScript and TypeScript units into structural models,
//! compares two versions of a unit entity by entity, and merges a newly
//! generated version into the existing one under a conflict policy.

pub mod cli;
pub mod config;
pub mod diff;
pub mod merge;
pub mod structure;
pub mod syntax;
pub mod update;

/// Re-export commonly used types
pub use config::EngineConfig;
pub use diff::{compare_models, ComparisonResult, Conflict, ConflictKind, StructureDiffer};
pub use merge::{ConflictResolution, MergeError, MergePolicy, MergeResult, Merger};
pub use structure::{EntityKind, StructuralEntity, StructuralModel, StructureExtractor};
pub use syntax::{Language, ParseError, SyntaxTree};
pub use update::{
    analyze_unit, perform_incremental_update, IncrementalUpdater, UpdateAction, UpdateResult,
};

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "regen-merge";
