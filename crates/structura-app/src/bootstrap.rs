//! Process wiring: configuration, telemetry, storage roots, engine, API.
//!
//! # Design
//! - `run_app` reads the environment once; everything after that works from
//!   the typed [`ServiceConfig`], so tests can drive `start_services` directly.
//! - Storage roots are created up front so the first job never races on them.
//! - The structures root is canonicalised once; every request source must
//!   resolve beneath it.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use structura_api::ApiServer;
use structura_config::{EngineKind, EngineSettings, LogFormatSetting, ServiceConfig};
use structura_core::EngineFactory;
use structura_engine::{CommandEngineFactory, StubEngineFactory};
use structura_events::EventBus;
use structura_fsops::{ArtifactLayout, ArtifactStore};
use structura_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::orchestrator::{JobOrchestrator, OrchestratorDeps};
use crate::validator::SourceRoot;

/// Running services produced by [`start_services`].
pub struct Services {
    /// HTTP surface, ready to serve.
    pub api: ApiServer,
    /// Orchestrator shared with the API.
    pub orchestrator: JobOrchestrator,
    /// Background retention task.
    pub retention: JoinHandle<()>,
}

/// Entry point for the service boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, telemetry cannot be
/// installed, storage roots cannot be created, or the API listener fails.
pub async fn run_app() -> AppResult<()> {
    let config = ServiceConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    run_app_with(config).await
}

/// Boot sequence over an already loaded configuration.
///
/// # Errors
///
/// See [`run_app`].
pub async fn run_app_with(config: ServiceConfig) -> AppResult<()> {
    let logging = LoggingConfig {
        level: &config.log.level,
        format: LogFormat::from_choice(
            config
                .log
                .format
                .map(|format| format == LogFormatSetting::Json),
        ),
        build_sha: env!("CARGO_PKG_VERSION"),
    };
    structura_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(config.engine.kind.as_str());

    info!(
        assets_root = %config.storage.assets_root.display(),
        sources_root = %config.storage.sources_root.display(),
        working_root = %config.storage.working_root.display(),
        retention_secs = config.storage.retention.as_secs(),
        "structura bootstrap starting"
    );

    let services = start_services(&config)?;
    structura_telemetry::record_app_mode("serving");
    info!(engine = services.orchestrator.engine_name(), "services ready");

    let addr = config.http.socket_addr();
    let served = services.api.serve(addr).await;
    services.retention.abort();
    served.map_err(|err| AppError::api_server("api.serve", err))
}

/// Create storage roots and wire the orchestrator behind the API.
///
/// Must be called inside a Tokio runtime; the retention task is spawned on it.
///
/// # Errors
///
/// Returns an error if a storage root cannot be created, the metrics registry
/// fails to build, or the command engine has no program configured.
pub fn start_services(config: &ServiceConfig) -> AppResult<Services> {
    ensure_dir("storage.working_root", &config.storage.working_root)?;
    ensure_dir("storage.assets_root", &config.storage.assets_root)?;
    ensure_dir("storage.sources_root", &config.storage.sources_root)?;
    let sources = SourceRoot::new(&config.storage.sources_root)
        .map_err(|err| AppError::io("storage.sources_root", &config.storage.sources_root, err))?;

    let engine = engine_factory(&config.engine)?;
    let events = EventBus::new();
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let layout = ArtifactLayout::new(
        config.storage.working_root.clone(),
        config.storage.assets_root.clone(),
    );
    let (orchestrator, retention) = JobOrchestrator::spawn(OrchestratorDeps {
        engine,
        store: ArtifactStore::new(layout, events.clone()),
        sources,
        events: events.clone(),
        metrics: metrics.clone(),
        retention: config.storage.retention,
    });
    let api = ApiServer::new(Arc::new(orchestrator.clone()), events, metrics);
    Ok(Services {
        api,
        orchestrator,
        retention,
    })
}

fn engine_factory(settings: &EngineSettings) -> AppResult<Arc<dyn EngineFactory>> {
    match settings.kind {
        EngineKind::Stub => Ok(Arc::new(StubEngineFactory::new())),
        EngineKind::Command => {
            let program = settings
                .command
                .as_ref()
                .ok_or(AppError::MissingDependency {
                    name: "engine command",
                })?;
            Ok(Arc::new(CommandEngineFactory::new(program)))
        }
    }
}

fn ensure_dir(operation: &'static str, path: &Path) -> AppResult<()> {
    fs::create_dir_all(path).map_err(|err| AppError::io(operation, path, err))
}
