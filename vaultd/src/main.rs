//! Entry point for the `vaultd` binary: parse CLI arguments, install
//! logging, load the on-disk configuration, wire in-memory collaborators
//! for every configured vault, and run the orchestrator until a shutdown
//! signal arrives.

mod config;

use clap::Parser;
use cli_config::RunConfig;
use collaborators::Config;
use metric::Registry;
use observability_deps::tracing::{error, info};
use retention::{parse_age, RetentionAction, RetentionRule};
use std::sync::Arc;
use testkit::{FakeChunkManager, FakeIndexManager, FakeQueryEngine, RotationPolicy, StaticConfigLoader};
use thiserror::Error;
use time_provider::SystemProvider;

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Retention(#[from] retention::RetentionError),

    #[error(transparent)]
    Orchestrator(#[from] orchestrator::OrchestratorError),

    #[error(transparent)]
    Bootstrap(#[from] bootstrap::BootstrapError),

    #[error(transparent)]
    Logging(#[from] logging::Error),
}

#[tokio::main]
async fn main() {
    let run_config = RunConfig::parse();

    if let Err(err) = run(run_config).await {
        eprintln!("vaultd: {err}");
        std::process::exit(1);
    }
}

async fn run(run_config: RunConfig) -> Result<(), RunError> {
    run_config.logging.install()?;

    let file_config = config::load(&run_config.config_path)?;
    let orchestrator = build_orchestrator(
        file_config,
        run_config.scheduler_concurrency,
        run_config.ingest_channel_size,
    )?;

    info!(config_path = %run_config.config_path.display(), "starting orchestrator");
    bootstrap::run_until_signal(orchestrator).await?;

    Ok(())
}

/// Builds an `Orchestrator` wired with one `testkit` fake collaborator
/// triple per configured vault, without starting it. Split out from `run`
/// so the wiring can be driven end-to-end from a test without blocking on
/// `bootstrap::run_until_signal`'s shutdown signal wait.
fn build_orchestrator(
    file_config: config::FileConfig,
    default_scheduler_concurrency: usize,
    default_ingest_channel_size: usize,
) -> Result<orchestrator::Orchestrator, RunError> {
    let time_provider = Arc::new(SystemProvider::new());
    let metrics = Arc::new(Registry::new());
    let orchestrator = orchestrator::Orchestrator::with_config(
        Arc::clone(&time_provider) as _,
        Arc::clone(&metrics),
        file_config.scheduler_concurrency.unwrap_or(default_scheduler_concurrency),
        file_config.ingest_channel_size.unwrap_or(default_ingest_channel_size),
    );

    for vault in &file_config.vaults {
        let retention_rules = vault
            .retention
            .iter()
            .map(retention_rule_from_file)
            .collect::<Result<Vec<_>, _>>()?;

        let rotation_policy = match vault.rotation_record_limit {
            Some(limit) => RotationPolicy::RecordCount(limit),
            None => RotationPolicy::Manual,
        };
        let chunks = Arc::new(FakeChunkManager::new(rotation_policy, Arc::clone(&time_provider) as _));
        let indexes = Arc::new(FakeIndexManager::default());
        let query = Arc::new(FakeQueryEngine::default());

        let filter_expr = filter_expr_for_vault(&file_config, vault.filter_id);

        orchestrator.add_vault(
            vault.id,
            vault.name.clone(),
            chunks,
            indexes,
            query,
            None,
            &filter_expr,
            vault.rotation_cron.as_deref(),
            retention_rules,
        )?;

        info!(vault_id = %vault.id, vault_name = %vault.name, "registered vault");
    }

    let config: Config = file_config.into();
    orchestrator.set_config_loader(Arc::new(StaticConfigLoader::new(config)));

    Ok(orchestrator)
}

fn filter_expr_for_vault(file_config: &config::FileConfig, filter_id: Option<uuid::Uuid>) -> String {
    match filter_id {
        None => "*".to_string(),
        Some(id) => file_config
            .filters
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.expr.clone())
            .unwrap_or_else(|| {
                error!(filter_id = %id, "vault references unknown filter, defaulting to catch-all");
                "*".to_string()
            }),
    }
}

fn retention_rule_from_file(rule: &config::FileRetentionRule) -> Result<RetentionRule, retention::RetentionError> {
    let older_than = parse_age(&rule.older_than)?;
    let action = match &rule.action {
        config::FileRetentionAction::Expire => RetentionAction::Expire,
        config::FileRetentionAction::Migrate => RetentionAction::Migrate {
            destination: rule.destination.expect("migrate rule must name a destination"),
        },
    };
    Ok(RetentionRule { older_than, action })
}
