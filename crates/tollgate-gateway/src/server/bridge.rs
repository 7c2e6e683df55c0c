//! Conversion from configuration values into runtime components.

use std::sync::Arc;

use tracing::info;

use tollgate_approval::ActionClassifier;
use tollgate_config::{Config, ConfigError, StorageBackend};
use tollgate_runtime::{Orchestrator, PlanEngine, RejectionPolicy};
use tollgate_storage::{KvStore, MemoryKvStore, SurrealKvStore};

use crate::error::{GatewayError, GatewayResult};

/// Open the configured backing store.
///
/// # Errors
///
/// Returns [`GatewayError::Storage`] if the durable store cannot be opened,
/// or [`GatewayError::Config`] if the surrealkv backend has no path.
pub fn open_store(config: &Config) -> GatewayResult<Arc<dyn KvStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory approval ledger");
            Ok(Arc::new(MemoryKvStore::default()))
        },
        StorageBackend::Surrealkv => {
            let path = config
                .storage
                .path
                .as_deref()
                .ok_or_else(|| ConfigError::ValidationError {
                    field: "storage.path".to_string(),
                    message: "the surrealkv backend requires a storage path".to_string(),
                })?;
            info!(path, "Opening SurrealKV approval ledger");
            Ok(Arc::new(SurrealKvStore::open(path)?))
        },
    }
}

/// Assemble an orchestrator over `store` from the config's approval, engine
/// and storage sections.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] for an unknown rejection policy and
/// [`GatewayError::Runtime`] if the orchestrator cannot be built.
pub fn build_orchestrator(
    config: &Config,
    store: Arc<dyn KvStore>,
) -> GatewayResult<Orchestrator> {
    let policy: RejectionPolicy = config.engine.rejection_policy.parse().map_err(|message| {
        GatewayError::Config(ConfigError::ValidationError {
            field: "engine.rejection_policy".to_string(),
            message,
        })
    })?;

    let classifier = ActionClassifier::new(config.approval.sensitive_actions.iter().cloned());
    info!(
        table = %config.storage.table_name,
        sensitive_actions = classifier.len(),
        policy = %policy,
        "Configuring orchestrator"
    );

    Ok(Orchestrator::builder(store)
        .table(config.storage.table_name.clone())
        .classifier(classifier)
        .engine(Arc::new(PlanEngine::new(policy)))
        .build()?)
}
