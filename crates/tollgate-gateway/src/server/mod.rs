//! Daemon server: binds the JSON-RPC surface and runs background loops.

mod bridge;
mod rpc;

pub use bridge::{build_orchestrator, open_store};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::server::{Server, ServerHandle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tollgate_config::{Config, SessionsSection};
use tollgate_runtime::Orchestrator;

use crate::error::{GatewayError, GatewayResult};
use crate::rpc::TollgateRpcServer;
use rpc::RpcImpl;

/// The Tollgate daemon.
///
/// Holds the shared orchestrator and the settings of the idle reaper.
/// Dropping the server does not stop the RPC listener; use the returned
/// [`ServerHandle`].
pub struct TollgateServer {
    orchestrator: Arc<Orchestrator>,
    abandon_after: Option<Duration>,
    reap_interval: Duration,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for TollgateServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TollgateServer")
            .field("abandon_after", &self.abandon_after)
            .field("reap_interval", &self.reap_interval)
            .finish_non_exhaustive()
    }
}

impl TollgateServer {
    /// Open the configured store, build the orchestrator and bind the RPC
    /// server on `config.gateway.bind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, the configuration is
    /// inconsistent, or the server cannot bind.
    pub async fn start(config: &Config) -> GatewayResult<(Self, ServerHandle, SocketAddr)> {
        let store = open_store(config)?;
        let orchestrator = Arc::new(build_orchestrator(config, store)?);
        let addr: SocketAddr = config.gateway.bind.parse().map_err(|e| GatewayError::Bind {
            addr: config.gateway.bind.clone(),
            reason: format!("{e}"),
        })?;
        Self::start_with(orchestrator, addr, &config.sessions).await
    }

    /// Bind the RPC server over an already assembled orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Bind`] if the address cannot be bound.
    pub async fn start_with(
        orchestrator: Arc<Orchestrator>,
        addr: SocketAddr,
        sessions: &SessionsSection,
    ) -> GatewayResult<(Self, ServerHandle, SocketAddr)> {
        let server = Server::builder()
            .build(addr)
            .await
            .map_err(|e| GatewayError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = server.local_addr()?;

        let rpc_impl = RpcImpl {
            orchestrator: Arc::clone(&orchestrator),
        };
        let handle = server.start(rpc_impl.into_rpc());
        info!(addr = %local_addr, "Tollgate RPC server listening");

        let daemon = Self {
            orchestrator,
            abandon_after: sessions.abandon_after_secs.map(Duration::from_secs),
            reap_interval: Duration::from_secs(sessions.reap_interval_secs.max(1)),
            shutdown: CancellationToken::new(),
        };
        Ok((daemon, handle, local_addr))
    }

    /// The shared orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Spawn the idle reaper. Returns `None` when no abandonment threshold is
    /// configured, in which case suspended sessions wait indefinitely.
    #[must_use]
    pub fn spawn_reaper_loop(&self) -> Option<JoinHandle<()>> {
        let older_than = self.abandon_after?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let interval = self.reap_interval;
        let shutdown = self.shutdown.clone();

        info!(
            abandon_after_secs = older_than.as_secs(),
            interval_secs = interval.as_secs(),
            "Idle session reaper enabled"
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Reaper loop stopping");
                        break;
                    },
                    _ = ticker.tick() => {},
                }

                let abandoned = orchestrator.abandon_idle(older_than).await;
                if !abandoned.is_empty() {
                    warn!(count = abandoned.len(), "Abandoned idle sessions");
                }
            }
        }))
    }

    /// Signal background loops to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
