//! CLI interface using clap
//!
//! Provides the command-line interface for regen-merge

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// regen-merge - Structural merge of regenerated JavaScript/TypeScript sources
#[derive(Parser, Debug)]
#[command(name = "regen-merge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the project root (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the structural model of source files
    Analyze(AnalyzeArgs),

    /// Compare two versions of a source file
    Compare(CompareArgs),

    /// Merge a regenerated file into the existing one
    Update(UpdateArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// List every entity, not only the summary
    #[arg(short, long)]
    pub entities: bool,
}

/// Arguments for compare command
#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Existing version
    pub old: String,

    /// New version
    pub new: String,
}

/// Arguments for update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// File to update (created if missing)
    pub target: String,

    /// File holding the regenerated source
    pub generated: String,

    /// Conflict resolution (rename, overwrite, skip)
    #[arg(long)]
    pub policy: Option<String>,

    /// Remove entities the regenerated source no longer has
    #[arg(long)]
    pub remove_deleted: bool,

    /// Suffix for renamed copies
    #[arg(long)]
    pub suffix: Option<String>,

    /// Show the result without writing the target
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["regen-merge", "analyze", "src", "--entities"]);
        assert!(matches!(cli.command, Commands::Analyze(_)));

        if let Commands::Analyze(args) = cli.command {
            assert_eq!(args.paths, vec!["src"]);
            assert!(args.entities);
        }
    }

    #[test]
    fn test_update_command() {
        let cli = Cli::parse_from([
            "regen-merge",
            "update",
            "api.js",
            "gen/api.js",
            "--policy",
            "overwrite",
            "--dry-run",
            "-o",
            "json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        if let Commands::Update(args) = cli.command {
            assert_eq!(args.target, "api.js");
            assert_eq!(args.generated, "gen/api.js");
            assert_eq!(args.policy.as_deref(), Some("overwrite"));
            assert!(args.dry_run);
            assert!(!args.remove_deleted);
        } else {
            panic!("expected update command");
        }
    }

    #[test]
    fn test_analyze_requires_paths() {
        assert!(Cli::try_parse_from(["regen-merge", "analyze"]).is_err());
    }
}
