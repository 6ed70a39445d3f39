//! Command handlers for the CLI
//!
//! Each handler resolves the snapshot root from the command line or the
//! configuration, performs one administrative operation and prints a report.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::app::{
    BinaryStore, DataProvider, DatasetRef, EntityType, PathGenerator, SnapshotVerifier, StoreStats,
    VerifyOptions,
};
use crate::config::AppConfig;
use crate::errors::Result;

use super::args::{ConfigAction, GlobalArgs, InvalidateArgs, InvalidateScope, PathArgs};

/// Snapshot root from `--root`, else from the configuration
pub fn resolve_root(global: &GlobalArgs, config: &AppConfig) -> Result<PathBuf> {
    match &global.root {
        Some(root) => Ok(root.clone()),
        None => Ok(config.store_root()?),
    }
}

/// Print the snapshot path for an entity type of a dataset
///
/// Only computes the path; the snapshot root is not created.
pub async fn handle_path(args: PathArgs, root: PathBuf) -> Result<()> {
    let dataset = DatasetRef::new(args.namespace, args.dataset);
    let entity_type = EntityType::new(args.entity, args.version);

    let path = PathGenerator::snapshot_path(&root, &entity_type, &dataset)?;
    let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
    debug!("Snapshot for {} of {} exists: {}", entity_type, dataset, exists);

    println!("{}", path.display());
    Ok(())
}

/// Show snapshot store statistics
pub async fn handle_stats(root: PathBuf, json: bool) -> Result<()> {
    let store = BinaryStore::open(root).await?;
    let stats = StoreStats::collect(store.root()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("💾 Snapshot Store");
    println!("================");
    println!("Location: {}", stats.root.display());
    println!("Snapshots: {}", stats.snapshot_count);
    println!("Total size: {}", stats.format_total_size());
    if !stats.per_namespace.is_empty() {
        println!();
        println!("Per namespace:");
        for (namespace, count) in &stats.per_namespace {
            println!("  {:<24} {}", namespace, count);
        }
    }
    if stats.unrecognized > 0 {
        println!();
        println!(
            "⚠️  {} files with the snapshot extension do not follow the naming scheme",
            stats.unrecognized
        );
    }
    Ok(())
}

/// Verify snapshot integrity
pub async fn handle_verify(root: PathBuf, options: VerifyOptions, json: bool) -> Result<()> {
    let store = BinaryStore::open(root).await?;
    info!(
        "Verifying snapshots (namespace: {:?}, dataset: {:?}, prune: {})",
        options.namespace, options.dataset_id, options.prune
    );

    let report = SnapshotVerifier::verify_tree(store.root(), &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔍 Snapshot Verification");
    println!("=======================");
    println!("Files checked: {}", report.files_checked);
    println!("Valid files: {}", report.files_verified);
    println!("Failed files: {}", report.files_failed);
    println!("Success rate: {:.1}%", report.success_rate());
    println!(
        "Verification time: {}",
        humantime::format_duration(report.verification_time)
    );

    if !report.failed_files.is_empty() {
        println!();
        println!("⚠️  Failed Files:");
        for failure in &report.failed_files {
            println!("  {} ({})", failure.path.display(), failure.reason);
        }
        println!();
        if options.prune {
            println!("🗑️  Pruned {} files", report.files_pruned);
        } else {
            println!("💡 These snapshots are regenerated on next use, or run with --prune.");
        }
    }

    if !report.stale_files.is_empty() {
        println!();
        println!("❓ Superseded schema versions:");
        for path in &report.stale_files {
            println!("  {}", path.display());
        }
    }

    if report.is_successful() {
        println!();
        println!("✅ All snapshots verified");
    }
    Ok(())
}

/// Remove snapshots in the selected scope
pub async fn handle_invalidate(args: InvalidateArgs, config: &AppConfig, root: PathBuf) -> Result<()> {
    let provider = DataProvider::open(root, config.provider_config()).await?;

    let (scope, removed) = match args.scope() {
        InvalidateScope::All => ("all datasets".to_string(), provider.invalidate_all().await?),
        InvalidateScope::Namespace(namespace) => (
            format!("namespace {}", namespace),
            provider.invalidate_namespace(&namespace).await?,
        ),
        InvalidateScope::Dataset(dataset) => (
            format!("dataset {}", dataset),
            provider.invalidate_dataset(&dataset).await?,
        ),
    };

    println!("🧹 Invalidated {}: {} snapshots removed", scope, removed);
    Ok(())
}

/// Manage the configuration file
pub async fn handle_config(action: ConfigAction, config: &AppConfig) -> Result<()> {
    match action {
        ConfigAction::Init { force, path } => {
            let written = AppConfig::initialize_default(path, force).await?;
            println!("📁 Created default configuration file:");
            println!("   {}", written.display());
            println!("   You can customize settings by editing this file.");
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
