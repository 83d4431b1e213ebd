//! regen-merge - Structural merge of regenerated source files
//!
//! Regenerates machine-produced JavaScript/TypeScript units without losing the
//! hand-written changes layered onto earlier generations.

use anyhow::Result;
use regen_merge::cli::{
    analyze, compare, print_analysis_text, print_comparison_text, print_json, print_update_text,
    unified_diff, update, Cli, Commands, ConfigArgs, OutputFormat, UpdateArgs,
};
use regen_merge::config::EngineConfig;
use regen_merge::update::{UpdateAction, UpdateOptions};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Get project path
    let root = Path::new(&cli.path);
    let config = EngineConfig::load_or_default(root)?;

    // Execute command
    match cli.command {
        Commands::Analyze(args) => {
            let reports = analyze(root, &args.paths, &config)?;

            match cli.format {
                OutputFormat::Json => print_json(&reports)?,
                OutputFormat::Text => print_analysis_text(&reports, args.entities),
            }
        }

        Commands::Compare(args) => {
            let comparison = compare(&root.join(&args.old), &root.join(&args.new), &config)?;

            match cli.format {
                OutputFormat::Json => print_json(&comparison)?,
                OutputFormat::Text => print_comparison_text(&comparison),
            }
        }

        Commands::Update(args) => {
            run_update(root, &config, &args, cli.format)?;
        }

        Commands::Config(args) => {
            handle_config(root, &config, &args, cli.format)?;
        }
    }

    Ok(())
}

/// Run the update command; CLI flags override the configured policy
fn run_update(
    root: &Path,
    config: &EngineConfig,
    args: &UpdateArgs,
    format: OutputFormat,
) -> Result<()> {
    let mut policy = config.merge.clone();
    if let Some(ref resolution) = args.policy {
        policy.conflict_resolution = resolution.parse()?;
    }
    if args.remove_deleted {
        policy.remove_deleted = true;
    }
    if let Some(ref suffix) = args.suffix {
        policy.rename_suffix = suffix.clone();
    }

    let options = UpdateOptions {
        policy,
        classifier: config.classifier,
        dry_run: args.dry_run,
    };

    let target = root.join(&args.target);
    let (existing, result) = update(&target, &root.join(&args.generated), &options)?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => {
            print_update_text(&target, &result, args.dry_run);

            if args.dry_run && result.needs_write() {
                if let Some(ref updated) = result.final_source {
                    let before = existing.as_deref().unwrap_or("");
                    print!("\n{}", unified_diff(before, updated, Path::new(&args.target)));
                }
            }
        }
    }

    if result.action == UpdateAction::Error {
        anyhow::bail!(
            "Update of {} failed: {}",
            target.display(),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

/// Handle config command
fn handle_config(
    root: &Path,
    config: &EngineConfig,
    args: &ConfigArgs,
    format: OutputFormat,
) -> Result<()> {
    if args.reset {
        let default_config = EngineConfig::default();
        default_config.save(root)?;
        println!("✓ Configuration reset to defaults");
        return Ok(());
    }

    // --show is the default action
    if format == OutputFormat::Json {
        return print_json(config);
    }

    println!("regen-merge Configuration");
    println!("=========================\n");

    println!("Source extensions: {}", config.extensions.join(", "));

    println!("\nIgnore patterns:");
    for pattern in &config.ignore_patterns {
        println!("  - {}", pattern);
    }

    println!("\nMerge:");
    println!("  Conflict resolution: {}", config.merge.conflict_resolution);
    println!("  Remove deleted: {}", config.merge.remove_deleted);
    println!("  Rename suffix: {}", config.merge.rename_suffix);

    println!("\nClassifier:");
    println!("  Check default values: {}", config.classifier.check_default_values);
    println!("  Check superclass: {}", config.classifier.check_superclass);

    println!("\nConfig file: {}", EngineConfig::path(root).display());

    Ok(())
}
