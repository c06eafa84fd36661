//! Owns every registered vault and ingester behind a single readers-writer
//! lock and wires them into the rest of the workspace: the ingest dispatch
//! loop (`ingest_pipeline`), the shared background-job scheduler
//! (`scheduler`), per-vault retention sweeps (`retention`), and inter-vault
//! transfers (`transfer`). This crate is the composition root; it holds no
//! storage or indexing logic of its own beyond the vault-level seal
//! detector.

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod error;
mod ingester;
mod vault;

pub use error::OrchestratorError;
pub use ingester::IngesterStats;
pub use vault::Vault;

use async_trait::async_trait;
use collaborators::{
    ChunkManager, ChunkMover as CollabChunkMover, CollaboratorError, ConfigLoader, Digester, IndexManager, Ingester,
    QueryEngine, Record, RetentionActionConfig,
};
use data_types::ChunkId;
use filterset::{CompiledFilter, FilterSet};
use ingest_pipeline::{Dispatcher, Forwarder, IngestStatsSink, SealHandler, VaultSink};
use ingester::IngesterEntry;
use metric::Registry;
use observability_deps::tracing::{debug, info, warn};
use parking_lot::RwLock;
use retention::{RetentionAction, RetentionRule, RetentionRunner};
use scheduler::{JobFn, Scheduler};
use std::{collections::HashMap, sync::Arc, time::Duration};
use time_provider::TimeProvider;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracker::JobProgress;
use uuid::Uuid;

const ROTATION_SWEEP_JOB: &str = "rotation-sweep";
const ROTATION_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
const RETENTION_CRON: &str = "* * * * *";
const DEFAULT_INGEST_CHANNEL_SIZE: usize = 1000;
const DEFAULT_SCHEDULER_CONCURRENCY: usize = 4;

struct RunningState {
    ingest_tx: mpsc::Sender<collaborators::IngestMessage>,
    cancel: CancellationToken,
    dispatcher_task: JoinHandle<()>,
}

struct Inner {
    vaults: HashMap<Uuid, Arc<Vault>>,
    ingesters: HashMap<Uuid, IngesterEntry>,
    filters: Arc<RwLock<FilterSet>>,
    digesters: Vec<Arc<dyn Digester>>,
    retention_runners: HashMap<Uuid, Arc<RetentionRunner>>,
    config_loader: Option<Arc<dyn ConfigLoader>>,
    running: Option<RunningState>,
}

/// Handle to the orchestrator core. Cheaply `Clone`able — an `Arc` around
/// its registries — so the same handle can be captured by the dispatcher and
/// by scheduler job closures.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<RwLock<Inner>>,
    scheduler: Scheduler,
    metrics: Arc<Registry>,
    time_provider: Arc<dyn TimeProvider>,
    forwarder: Option<Arc<dyn Forwarder>>,
    ingest_channel_size: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Orchestrator")
            .field("vaults", &inner.vaults.len())
            .field("ingesters", &inner.ingesters.len())
            .field("running", &inner.running.is_some())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(time_provider: Arc<dyn TimeProvider>, metrics: Arc<Registry>) -> Self {
        Self::with_config(
            time_provider,
            metrics,
            DEFAULT_SCHEDULER_CONCURRENCY,
            DEFAULT_INGEST_CHANNEL_SIZE,
        )
    }

    pub fn with_config(
        time_provider: Arc<dyn TimeProvider>,
        metrics: Arc<Registry>,
        scheduler_concurrency: usize,
        ingest_channel_size: usize,
    ) -> Self {
        let scheduler = Scheduler::new(scheduler_concurrency, Arc::clone(&time_provider), &metrics);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                vaults: HashMap::new(),
                ingesters: HashMap::new(),
                filters: Arc::new(RwLock::new(FilterSet::new())),
                digesters: Vec::new(),
                retention_runners: HashMap::new(),
                config_loader: None,
                running: None,
            })),
            scheduler,
            metrics,
            time_provider,
            forwarder: None,
            ingest_channel_size,
        }
    }

    pub fn set_forwarder(&mut self, forwarder: Arc<dyn Forwarder>) {
        self.forwarder = Some(forwarder);
    }

    pub fn set_config_loader(&self, loader: Arc<dyn ConfigLoader>) {
        self.inner.write().config_loader = Some(loader);
    }

    pub fn add_digester(&self, digester: Arc<dyn Digester>) {
        self.inner.write().digesters.push(digester);
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Registers a vault: its collaborator set, an initial fan-out filter
    /// expression, an optional cron rotation policy, and its retention
    /// rules.
    #[allow(clippy::too_many_arguments)]
    pub fn add_vault(
        &self,
        id: Uuid,
        name: impl Into<String>,
        chunks: Arc<dyn ChunkManager>,
        indexes: Arc<dyn IndexManager>,
        query: Arc<dyn QueryEngine>,
        mover: Option<Arc<dyn CollabChunkMover>>,
        filter_expr: &str,
        cron_rotate: Option<&str>,
        retention_rules: Vec<RetentionRule>,
    ) -> Result<(), OrchestratorError> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.vaults.contains_key(&id) {
            return Err(OrchestratorError::DuplicateId(id));
        }

        let vault = Arc::new(Vault::new(id, name, chunks, indexes, query, mover));
        inner.vaults.insert(id, Arc::clone(&vault));

        let filter = CompiledFilter::compile(id, None, filter_expr)?;
        let next_filters = inner.filters.read().add_or_update(filter);
        *inner.filters.write() = next_filters;

        let runner = Arc::new(RetentionRunner::new(
            id,
            retention_rules,
            Arc::clone(&vault.chunks),
            Arc::clone(&vault.indexes),
            Arc::new(RetentionMover { orchestrator: self.clone() }),
            Arc::clone(&self.time_provider),
        ));
        inner.retention_runners.insert(id, Arc::clone(&runner));
        drop(inner);

        self.register_retention_job(id, runner)?;
        if let Some(cron_expr) = cron_rotate {
            self.register_cron_rotation(id, cron_expr)?;
        }

        info!(vault_id = %id, "vault registered");
        Ok(())
    }

    pub async fn remove_vault(&self, id: Uuid) -> Result<(), OrchestratorError> {
        self.remove_vault_inner(id, false).await
    }

    pub async fn force_remove_vault(&self, id: Uuid) -> Result<(), OrchestratorError> {
        self.remove_vault_inner(id, true).await
    }

    async fn remove_vault_inner(&self, id: Uuid, force: bool) -> Result<(), OrchestratorError> {
        let vault = {
            let inner = self.inner.read();
            inner.vaults.get(&id).cloned().ok_or(OrchestratorError::VaultNotFound(id))?
        };

        if !force {
            let chunks = vault.chunks.list().await?;
            if chunks.iter().any(|c| c.record_count > 0 || c.sealed) {
                return Err(OrchestratorError::VaultNotEmpty(id));
            }
        }

        let mut inner = self.inner.write();
        inner.vaults.remove(&id);
        inner.retention_runners.remove(&id);
        let next_filters = inner.filters.read().without(&[id]).unwrap_or_default();
        *inner.filters.write() = next_filters;
        drop(inner);

        self.scheduler.remove_job(&format!("cron-rotate:{id}"));
        self.scheduler.remove_job(&format!("retention:{id}"));

        info!(vault_id = %id, force, "vault removed");
        Ok(())
    }

    pub fn enable_vault(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let inner = self.inner.write();
        let vault = inner.vaults.get(&id).ok_or(OrchestratorError::VaultNotFound(id))?;
        vault.set_enabled(true);
        info!(vault_id = %id, "vault enabled");
        Ok(())
    }

    pub fn disable_vault(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let inner = self.inner.write();
        let vault = inner.vaults.get(&id).ok_or(OrchestratorError::VaultNotFound(id))?;
        vault.set_enabled(false);
        info!(vault_id = %id, "vault disabled");
        Ok(())
    }

    pub fn update_vault_filter(&self, id: Uuid, expr: &str) -> Result<(), OrchestratorError> {
        let inner = self.inner.write();
        if !inner.vaults.contains_key(&id) {
            return Err(OrchestratorError::VaultNotFound(id));
        }
        let filter = CompiledFilter::compile(id, None, expr)?;
        let next_filters = inner.filters.read().add_or_update(filter);
        *inner.filters.write() = next_filters;
        Ok(())
    }

    /// Registers an ingester. If the orchestrator is already running, it is
    /// started immediately under its own cancellable sub-context.
    pub fn add_ingester(&self, ingester: Arc<dyn Ingester>) -> Result<(), OrchestratorError> {
        let id = ingester.id().get();
        let mut inner = self.inner.write();
        if inner.ingesters.contains_key(&id) {
            return Err(OrchestratorError::DuplicateId(id));
        }

        let messages_metric = self
            .metrics
            .register_metric("ingester_messages_ingested", "messages ingested, per ingester");
        let bytes_metric = self
            .metrics
            .register_metric("ingester_bytes_ingested", "bytes ingested, per ingester");
        let errors_metric = self.metrics.register_metric("ingester_errors", "ingest errors, per ingester");

        let mut entry = IngesterEntry {
            ingester: Arc::clone(&ingester),
            stats: Arc::new(IngesterStats::default()),
            cancel: CancellationToken::new(),
            task: None,
            messages_metric,
            bytes_metric,
            errors_metric,
        };

        if let Some(state) = &inner.running {
            let out = state.ingest_tx.clone();
            let cancel = entry.cancel.clone();
            let task_ingester = Arc::clone(&ingester);
            entry.task = Some(tokio::spawn(async move {
                task_ingester.run(out, cancel).await;
            }));
        }

        inner.ingesters.insert(id, entry);
        info!(ingester_id = %id, "ingester registered");
        Ok(())
    }

    /// Cancels the ingester's sub-context and drops it from the registry.
    /// Already-enqueued messages from this ingester are not drained; they
    /// remain in the channel and are processed normally.
    pub fn remove_ingester(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.write();
        let entry = inner.ingesters.remove(&id).ok_or(OrchestratorError::IngesterNotFound(id))?;
        entry.cancel.cancel();
        info!(ingester_id = %id, "ingester removed");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), OrchestratorError> {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.ingest_channel_size);

        let mut inner = self.inner.write();
        if inner.running.is_some() {
            return Err(OrchestratorError::AlreadyRunning);
        }

        let dispatcher = Dispatcher::new(
            rx,
            inner.digesters.clone(),
            Arc::clone(&inner.filters),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            self.forwarder.clone(),
            Arc::new(self.clone()),
            Arc::clone(&self.time_provider),
        );
        let dispatcher_task = tokio::spawn(dispatcher.run());

        for entry in inner.ingesters.values_mut() {
            let out = tx.clone();
            let ingester_cancel = entry.cancel.clone();
            let ingester = Arc::clone(&entry.ingester);
            entry.task = Some(tokio::spawn(async move {
                ingester.run(out, ingester_cancel).await;
            }));
        }

        inner.running = Some(RunningState {
            ingest_tx: tx,
            cancel,
            dispatcher_task,
        });
        drop(inner);

        if !self.scheduler.has_job(ROTATION_SWEEP_JOB) {
            self.register_rotation_sweep()?;
        }

        info!("orchestrator started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), OrchestratorError> {
        let (dispatcher_task, ingester_tasks) = {
            let mut inner = self.inner.write();
            let state = inner.running.take().ok_or(OrchestratorError::NotRunning)?;

            let ingester_tasks: Vec<_> = inner.ingesters.values_mut().filter_map(|e| e.task.take()).collect();
            for entry in inner.ingesters.values() {
                entry.cancel.cancel();
            }
            state.cancel.cancel();
            // Drop the orchestrator's own sender clone; the channel closes
            // once every ingester task below has returned and dropped its
            // own clone, which is what lets the dispatcher's drain loop end.
            drop(state.ingest_tx);

            (state.dispatcher_task, ingester_tasks)
        };

        for task in ingester_tasks {
            let _ = task.await;
        }
        let _ = dispatcher_task.await;

        self.scheduler.stop();
        info!("orchestrator stopped");
        Ok(())
    }

    /// Direct ingest path: evaluates the filter set and appends to every
    /// matching local vault. Partial fan-out failure: the last error wins,
    /// preceding successes are not rolled back.
    pub async fn ingest(&self, attrs: data_types::Attrs, raw: Vec<u8>) -> Result<(), OrchestratorError> {
        let now = self.time_provider.now();
        let record = Record {
            source_ts: now,
            ingest_ts: now,
            attrs,
            raw,
        };

        let (destinations, vaults) = {
            let inner = self.inner.read();
            let filters = inner.filters.read();
            let destinations = if filters.is_empty() {
                inner.vaults.values().filter(|v| v.enabled()).map(|v| v.id).collect()
            } else {
                filters.matching_vaults(&record.attrs)
            };
            (destinations, inner.vaults.clone())
        };

        let mut last_error = None;
        for vault_id in destinations {
            let Some(vault) = vaults.get(&vault_id) else { continue };
            if !vault.enabled() {
                continue;
            }
            match vault.append_with_seal_detection(record.clone()).await {
                Ok(Some(sealed)) => self.post_seal_work(vault_id, sealed),
                Ok(None) => {}
                Err(e) => {
                    if let Some(prev) = last_error.replace(e) {
                        warn!(vault_id = %vault_id, error = %prev, "discarded earlier fan-out error");
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(OrchestratorError::Collaborator(e)),
            None => Ok(()),
        }
    }

    pub async fn reload_filters(&self) -> Result<(), OrchestratorError> {
        let loader = {
            let inner = self.inner.read();
            inner.config_loader.clone().ok_or(OrchestratorError::NoConfigLoader)?
        };
        let config = loader.load().await?;

        let filter_exprs: HashMap<Uuid, String> =
            config.filters.iter().map(|f| (f.id, f.expr.clone())).collect();

        let mut next = FilterSet::new();
        for route in config.routes.iter().filter(|r| r.enabled) {
            let expr = match route.filter_id {
                Some(id) => filter_exprs.get(&id).cloned().unwrap_or_default(),
                None => "*".to_string(),
            };
            for dest in &route.destinations {
                let node_id = match dest.node_id.as_deref() {
                    None | Some("") => None,
                    Some(_) if self.forwarder.is_some() => dest.node_id.clone(),
                    // Remote destination with no forwarder configured: skip it.
                    Some(_) => continue,
                };
                let compiled = CompiledFilter::compile(dest.vault_id, node_id, &expr)?;
                next = next.add_or_update(compiled);
            }
        }

        *self.inner.read().filters.write() = next;
        Ok(())
    }

    pub async fn reload_rotation_policies(&self) -> Result<(), OrchestratorError> {
        let (loader, existing_ids) = {
            let inner = self.inner.read();
            (
                inner.config_loader.clone().ok_or(OrchestratorError::NoConfigLoader)?,
                inner.vaults.keys().copied().collect::<Vec<_>>(),
            )
        };
        let config = loader.load().await?;

        for vault_id in &existing_ids {
            self.scheduler.remove_job(&format!("cron-rotate:{vault_id}"));
        }

        for vault_cfg in &config.vaults {
            let Some(cron_expr) = &vault_cfg.rotation_cron else { continue };
            if self.inner.read().vaults.contains_key(&vault_cfg.id) {
                self.register_cron_rotation(vault_cfg.id, cron_expr)?;
            }
        }
        Ok(())
    }

    pub async fn reload_retention_policies(&self) -> Result<(), OrchestratorError> {
        let loader = {
            let inner = self.inner.read();
            inner.config_loader.clone().ok_or(OrchestratorError::NoConfigLoader)?
        };
        let config = loader.load().await?;

        for vault_cfg in &config.vaults {
            let runner = {
                let inner = self.inner.read();
                inner.retention_runners.get(&vault_cfg.id).cloned()
            };
            let Some(runner) = runner else { continue };

            let mut rules = Vec::with_capacity(vault_cfg.retention.len());
            for policy in &vault_cfg.retention {
                let older_than = retention::parse_age(&policy.older_than)?;
                let action = match &policy.action {
                    RetentionActionConfig::Expire => RetentionAction::Expire,
                    RetentionActionConfig::Migrate { destination } => RetentionAction::Migrate { destination: *destination },
                };
                rules.push(RetentionRule { older_than, action });
            }
            runner.set_rules(rules);
        }
        Ok(())
    }

    /// Walks every vault's sealed chunks and queues a build for any whose
    /// indexes are incomplete. Used at startup to recover from crashes that
    /// interrupted indexing.
    pub async fn rebuild_missing_indexes(&self) {
        let vaults: Vec<Arc<Vault>> = self.inner.read().vaults.values().cloned().collect();
        for vault in vaults {
            let chunks = match vault.chunks.list().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(vault_id = %vault.id, error = %e, "failed to list chunks while rebuilding indexes");
                    continue;
                }
            };
            for chunk in chunks.into_iter().filter(|c| c.sealed) {
                match vault.indexes.indexes_complete(chunk.id).await {
                    Ok(true) => {}
                    Ok(false) => self.post_seal_work(vault.id, chunk.id),
                    Err(e) => {
                        warn!(vault_id = %vault.id, chunk_id = %chunk.id, error = %e, "failed to check index completeness");
                    }
                }
            }
        }
    }

    /// Submits a scheduler-tracked job that migrates every record from `src`
    /// into `dst`, choosing a filesystem move or a record copy based on
    /// `ChunkMover` capability, and removes `src` on success. The caller
    /// must have already disabled `src`.
    pub fn migrate_vault(&self, src: Uuid, dst: Uuid) -> Result<Arc<JobProgress>, OrchestratorError> {
        let (src_vault, dst_vault) = {
            let inner = self.inner.read();
            (
                inner.vaults.get(&src).cloned().ok_or(OrchestratorError::VaultNotFound(src))?,
                inner.vaults.get(&dst).cloned().ok_or(OrchestratorError::VaultNotFound(dst))?,
            )
        };
        if src_vault.enabled() {
            return Err(OrchestratorError::Collaborator(CollaboratorError::unknown(
                "source vault must be disabled before migration",
            )));
        }

        let this = self.clone();
        let job_name = format!("migrate-vault:{src}");
        let func: JobFn = Arc::new(move |progress| {
            let this = this.clone();
            let src_vault = Arc::clone(&src_vault);
            let dst_vault = Arc::clone(&dst_vault);
            Box::pin(async move {
                let src_handle = vault_to_handle(&src_vault);
                let dst_handle = vault_to_handle(&dst_vault);
                let src_id = src_vault.id;
                transfer::migrate_vault(&src_handle, &dst_handle, &progress, || {
                    this.inner.write().vaults.remove(&src_id);
                })
                .await
                .map_err(|e| e.to_string())
            })
        });
        self.scheduler.submit(job_name, func).map_err(OrchestratorError::from)
    }

    fn post_seal_work(&self, vault_id: Uuid, chunk_id: ChunkId) {
        let indexes = {
            let inner = self.inner.read();
            inner.vaults.get(&vault_id).map(|v| Arc::clone(&v.indexes))
        };
        let Some(indexes) = indexes else { return };

        let job_name = format!("index-build:{vault_id}:{chunk_id}");
        let func: JobFn = Arc::new(move |_progress| {
            let indexes = Arc::clone(&indexes);
            Box::pin(async move { indexes.build_indexes(chunk_id).await.map_err(|e| e.to_string()) })
        });

        if let Err(e) = self.scheduler.run_once(job_name.clone(), func) {
            debug!(job = %job_name, error = %e, "index build already scheduled");
        }
    }

    fn register_retention_job(&self, vault_id: Uuid, runner: Arc<RetentionRunner>) -> Result<(), OrchestratorError> {
        let job_name = format!("retention:{vault_id}");
        let func: JobFn = Arc::new(move |_progress| {
            let runner = Arc::clone(&runner);
            Box::pin(async move { runner.run_once().await.map_err(|e| e.to_string()) })
        });
        self.scheduler.add_job(job_name.clone(), RETENTION_CRON, func)?;
        self.scheduler
            .describe(&job_name, format!("Retention sweep for vault '{vault_id}'"))?;
        Ok(())
    }

    fn register_cron_rotation(&self, vault_id: Uuid, cron_expr: &str) -> Result<(), OrchestratorError> {
        let vault = {
            let inner = self.inner.read();
            inner
                .vaults
                .get(&vault_id)
                .cloned()
                .ok_or(OrchestratorError::VaultNotFound(vault_id))?
        };
        let this = self.clone();
        let job_name = format!("cron-rotate:{vault_id}");
        let vault_name = vault.name.clone();

        let func: JobFn = Arc::new(move |_progress| {
            let vault = Arc::clone(&vault);
            let this = this.clone();
            Box::pin(async move {
                let Some(active) = vault.chunks.active().await else { return Ok(()) };
                if active.record_count == 0 {
                    return Ok(());
                }
                vault.chunks.seal().await.map_err(|e| e.to_string())?;
                this.post_seal_work(vault.id, active.id);
                Ok(())
            })
        });

        self.scheduler.add_job(job_name.clone(), cron_expr, func)?;
        self.scheduler
            .describe(&job_name, format!("Rotate active chunk in '{vault_name}'"))?;
        Ok(())
    }

    fn register_rotation_sweep(&self) -> Result<(), OrchestratorError> {
        let this = self.clone();
        let func: JobFn = Arc::new(move |_progress| {
            let this = this.clone();
            Box::pin(async move {
                this.run_rotation_sweep().await;
                Ok(())
            })
        });
        self.scheduler
            .add_interval_job(ROTATION_SWEEP_JOB, ROTATION_SWEEP_INTERVAL, func)?;
        self.scheduler
            .describe(ROTATION_SWEEP_JOB, "Background rotation sweep across all vaults")?;
        Ok(())
    }

    async fn run_rotation_sweep(&self) {
        let vaults: Vec<Arc<Vault>> = self.inner.read().vaults.values().cloned().collect();
        for vault in vaults {
            let Some(trigger) = vault.chunks.check_rotation().await else { continue };
            let Some(active) = vault.chunks.active().await else { continue };
            if let Err(e) = vault.chunks.seal().await {
                warn!(vault_id = %vault.id, trigger = %trigger, error = %e, "rotation sweep failed to seal chunk");
                continue;
            }
            self.post_seal_work(vault.id, active.id);
        }
    }
}

fn vault_to_handle(vault: &Arc<Vault>) -> transfer::VaultHandle {
    transfer::VaultHandle {
        id: vault.id,
        chunks: Arc::clone(&vault.chunks),
        indexes: Arc::clone(&vault.indexes),
        mover: vault.mover.clone(),
    }
}

#[async_trait]
impl VaultSink for Orchestrator {
    async fn append(&self, vault_id: Uuid, record: Record) -> Result<Option<ChunkId>, CollaboratorError> {
        let vault = {
            let inner = self.inner.read();
            inner.vaults.get(&vault_id).cloned()
        };
        let Some(vault) = vault else {
            warn!(vault_id = %vault_id, "dispatch target vault not found, skipping");
            return Ok(None);
        };
        if !vault.enabled() {
            return Ok(None);
        }
        vault.append_with_seal_detection(record).await
    }

    fn all_local_vaults(&self) -> Vec<Uuid> {
        self.inner.read().vaults.values().filter(|v| v.enabled()).map(|v| v.id).collect()
    }
}

#[async_trait]
impl SealHandler for Orchestrator {
    async fn on_seal(&self, vault_id: Uuid, chunk_id: ChunkId) {
        self.post_seal_work(vault_id, chunk_id);
    }
}

impl IngestStatsSink for Orchestrator {
    fn record_success(&self, ingester_id: Option<&str>, bytes: usize) {
        let Some(id) = ingester_id.and_then(|s| Uuid::parse_str(s).ok()) else { return };
        if let Some(entry) = self.inner.read().ingesters.get(&id) {
            entry.record_success(bytes);
        }
    }

    fn record_error(&self, ingester_id: Option<&str>) {
        let Some(id) = ingester_id.and_then(|s| Uuid::parse_str(s).ok()) else { return };
        if let Some(entry) = self.inner.read().ingesters.get(&id) {
            entry.record_error();
        }
    }
}

/// Bridges the orchestrator's vault registry into retention's narrower
/// `ChunkMover` capability: a filesystem move when both vaults support it,
/// otherwise a record-level copy-then-delete of the single chunk.
struct RetentionMover {
    orchestrator: Orchestrator,
}

impl std::fmt::Debug for RetentionMover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionMover").finish()
    }
}

#[async_trait]
impl retention::ChunkMover for RetentionMover {
    async fn move_chunk(
        &self,
        chunk_id: ChunkId,
        src_vault: Uuid,
        dst_vault: Uuid,
    ) -> Result<(), retention::RetentionError> {
        let (src, dst) = {
            let inner = self.orchestrator.inner.read();
            (inner.vaults.get(&src_vault).cloned(), inner.vaults.get(&dst_vault).cloned())
        };
        let (Some(src), Some(dst)) = (src, dst) else {
            return Err(CollaboratorError::not_found(format!(
                "vault missing for retention move: src={src_vault} dst={dst_vault}"
            ))
            .into());
        };

        if let (Some(src_mover), Some(dst_mover)) = (&src.mover, &dst.mover) {
            let dir = src_mover.chunk_dir(chunk_id).await?;
            src_mover.disown(chunk_id).await?;
            if let Err(e) = dst_mover.adopt(chunk_id, dir.clone()).await {
                if let Err(reinstate_err) = src_mover.adopt(chunk_id, dir).await {
                    warn!(chunk_id = %chunk_id, error = %reinstate_err, "failed to reinstate chunk after failed retention move");
                }
                return Err(e.into());
            }
            if let Err(e) = dst.indexes.build_indexes(chunk_id).await {
                warn!(chunk_id = %chunk_id, error = %e, "failed to schedule post-migration index build");
            }
        } else {
            let mut cursor = src.chunks.open_cursor(chunk_id).await?;
            while let Some(record) = cursor.next() {
                dst.chunks.append_preserved(record).await?;
            }
            if let Err(e) = src.indexes.delete_indexes(chunk_id).await {
                warn!(chunk_id = %chunk_id, error = %e, "failed to delete source indexes after retention copy");
            }
            src.chunks.delete(chunk_id).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collaborators::IngestMessage;
    use data_types::Attrs;
    use testkit::{FakeChunkManager, FakeIndexManager, FakeQueryEngine, RotationPolicy, ScriptedIngester};
    use time_provider::{MockProvider, Time};

    fn orchestrator() -> Orchestrator {
        let time_provider = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        Orchestrator::new(time_provider, Arc::new(Registry::new()))
    }

    fn chunk_manager(policy: RotationPolicy) -> Arc<FakeChunkManager> {
        let clock = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        Arc::new(FakeChunkManager::new(policy, clock))
    }

    #[tokio::test]
    async fn ingest_fans_out_to_matching_vault_and_schedules_one_index_build() {
        let orch = orchestrator();
        let vault_id = Uuid::from_u128(1);
        let chunks = chunk_manager(RotationPolicy::RecordCount(2));
        let indexes = Arc::new(FakeIndexManager::default());

        orch.add_vault(
            vault_id,
            "v1",
            Arc::clone(&chunks) as Arc<dyn ChunkManager>,
            Arc::clone(&indexes) as Arc<dyn IndexManager>,
            Arc::new(FakeQueryEngine::default()),
            None,
            "*",
            None,
            vec![],
        )
        .unwrap();

        orch.start().await.unwrap();
        for _ in 0..3 {
            orch.ingest(Attrs::new(), vec![1]).await.unwrap();
        }
        orch.stop().await.unwrap();

        // Give the scheduler's fire-and-forget index-build job a chance to run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(chunks.total_record_count(), 3);
        assert_eq!(chunks.sealed_chunk_count(), 1);
        assert_eq!(indexes.build_call_count(), 1);
    }

    #[tokio::test]
    async fn disabled_vault_does_not_receive_records() {
        let orch = orchestrator();
        let vault_id = Uuid::from_u128(1);
        let chunks = chunk_manager(RotationPolicy::Manual);

        orch.add_vault(
            vault_id,
            "v1",
            Arc::clone(&chunks) as Arc<dyn ChunkManager>,
            Arc::new(FakeIndexManager::default()),
            Arc::new(FakeQueryEngine::default()),
            None,
            "*",
            None,
            vec![],
        )
        .unwrap();

        orch.disable_vault(vault_id).unwrap();
        orch.start().await.unwrap();
        orch.ingest(Attrs::new(), vec![1]).await.unwrap();
        orch.stop().await.unwrap();

        assert_eq!(chunks.total_record_count(), 0);

        orch.enable_vault(vault_id).unwrap();
        orch.start().await.unwrap();
        orch.ingest(Attrs::new(), vec![1]).await.unwrap();
        orch.stop().await.unwrap();

        assert_eq!(chunks.total_record_count(), 1);
    }

    #[tokio::test]
    async fn add_vault_with_expr_filter_then_remove_once_empty() {
        let orch = orchestrator();
        let vault_id = Uuid::from_u128(7);

        orch.add_vault(
            vault_id,
            "test-vault",
            chunk_manager(RotationPolicy::Manual),
            Arc::new(FakeIndexManager::default()),
            Arc::new(FakeQueryEngine::default()),
            None,
            "env=test",
            None,
            vec![],
        )
        .unwrap();

        orch.start().await.unwrap();
        let mut attrs = Attrs::new();
        attrs.insert("env", "test");
        orch.ingest(attrs, vec![1]).await.unwrap();
        orch.stop().await.unwrap();

        // Non-empty: must use force_remove_vault, plain remove_vault errors.
        assert!(orch.remove_vault(vault_id).await.is_err());
        orch.force_remove_vault(vault_id).await.unwrap();

        orch.start().await.unwrap();
        // No vaults left: ingest proceeds without error even though nothing matches.
        orch.ingest(Attrs::new(), vec![1]).await.unwrap();
        orch.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_runs_registered_ingesters_to_completion() {
        let orch = orchestrator();
        let vault_id = Uuid::from_u128(1);
        orch.add_vault(
            vault_id,
            "v1",
            chunk_manager(RotationPolicy::Manual),
            Arc::new(FakeIndexManager::default()),
            Arc::new(FakeQueryEngine::default()),
            None,
            "*",
            None,
            vec![],
        )
        .unwrap();

        let messages: Vec<_> = (0..5)
            .map(|i| IngestMessage::new(Attrs::new(), vec![i], Time::from_timestamp_nanos(1)))
            .collect();
        let ingester = Arc::new(ScriptedIngester::new(messages));
        orch.add_ingester(ingester).unwrap();

        orch.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        orch.stop().await.unwrap();
    }
}
