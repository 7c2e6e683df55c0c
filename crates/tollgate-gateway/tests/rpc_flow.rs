//! Drive the daemon through a real WebSocket client.

#![allow(clippy::arithmetic_side_effects)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use jsonrpsee::core::client::Error as ClientError;
use jsonrpsee::server::ServerHandle;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde_json::json;

use tollgate_approval::{ApprovalStatus, Verdict};
use tollgate_config::Config;
use tollgate_core::{Liveness, RunnerState, SessionId};
use tollgate_gateway::{TollgateRpcClient, TollgateServer, error_codes};
use tollgate_runtime::TaskOutcome;

struct Harness {
    daemon: TollgateServer,
    handle: ServerHandle,
    client: WsClient,
}

impl Harness {
    async fn start(config: Config) -> Self {
        let (daemon, handle, addr) = TollgateServer::start(&config).await.unwrap();
        let client = connect(addr).await;
        Self {
            daemon,
            handle,
            client,
        }
    }

    async fn stop(self) {
        self.daemon.shutdown();
        self.handle.stop().unwrap();
        self.handle.stopped().await;
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1:0".to_string();
    config
}

async fn connect(addr: SocketAddr) -> WsClient {
    WsClientBuilder::default()
        .build(format!("ws://{addr}"))
        .await
        .unwrap()
}

fn sid(s: &str) -> SessionId {
    SessionId::parse(s).unwrap()
}

async fn wait_for(client: &WsClient, session: &SessionId, want: RunnerState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = client.status(session.clone()).await.unwrap();
        if status.state == want {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "session {session} stuck in {} waiting for {want}",
            status.state
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn code_of<T: std::fmt::Debug>(result: Result<T, ClientError>) -> i32 {
    match result {
        Err(ClientError::Call(e)) => e.code(),
        other => panic!("expected call error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_approve_then_resume_over_rpc() {
    let h = Harness::start(test_config()).await;
    let s = sid("rpc-approve");

    let receipt = h
        .client
        .start(json!({"prompt": "run make deploy"}), Some(s.clone()))
        .await
        .unwrap();
    assert_eq!(receipt.session_id, s);
    wait_for(&h.client, &s, RunnerState::SuspendedPendingApproval).await;

    assert_eq!(h.client.liveness().await.unwrap().liveness, Liveness::Idle);

    let pending = h.client.list_pending(Some(s.clone())).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].reason.action, "execute_command");

    let record = h
        .client
        .approve(
            s.clone(),
            pending[0].request_id,
            None,
            Some("operator".into()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Approved);
    assert_eq!(record.decision, Some(json!({})));

    let resumed = h.client.resume(s.clone()).await.unwrap();
    assert_eq!(resumed.verdict, Verdict::Approved);

    wait_for(&h.client, &s, RunnerState::Completed).await;
    let TaskOutcome::Completed { result, .. } = h.client.result(s.clone()).await.unwrap() else {
        panic!("expected completion");
    };
    assert_eq!(result["steps"][0]["output"], "[DEMO] Would execute: make deploy");

    h.client.cleanup(s.clone()).await.unwrap();
    let status = h.client.status(s).await.unwrap();
    assert!(!status.in_memory);
    h.stop().await;
}

#[tokio::test]
async fn test_reject_uses_default_reason() {
    let h = Harness::start(test_config()).await;
    let s = sid("rpc-reject");

    h.client
        .start(json!({"prompt": "delete /etc/passwd"}), Some(s.clone()))
        .await
        .unwrap();
    wait_for(&h.client, &s, RunnerState::SuspendedPendingApproval).await;

    let request = h.client.list_pending(None).await.unwrap()[0].request_id;
    let record = h
        .client
        .reject(s.clone(), request, None, None)
        .await
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.approver.as_deref(), Some("cli"));
    assert_eq!(record.decision, Some(json!({"reason": "User rejected"})));

    // A second decision loses.
    assert_eq!(
        code_of(
            h.client
                .approve(s.clone(), request, None, None, None)
                .await
        ),
        error_codes::ALREADY_RESOLVED
    );

    h.client.resume(s.clone()).await.unwrap();
    wait_for(&h.client, &s, RunnerState::Completed).await;
    h.stop().await;
}

#[tokio::test]
async fn test_errors_map_to_stable_codes() {
    let h = Harness::start(test_config()).await;
    let s = sid("rpc-errors");

    assert_eq!(
        code_of(h.client.status(sid("missing")).await),
        error_codes::SESSION_NOT_FOUND
    );

    h.client
        .start(json!({"prompt": "sql DELETE FROM t"}), Some(s.clone()))
        .await
        .unwrap();
    assert_eq!(
        code_of(h.client.start(json!({}), Some(s.clone())).await),
        error_codes::SESSION_ALREADY_EXISTS
    );

    wait_for(&h.client, &s, RunnerState::SuspendedPendingApproval).await;
    assert_eq!(
        code_of(h.client.resume(s.clone()).await),
        error_codes::DECISION_NOT_READY
    );
    assert_eq!(
        code_of(h.client.result(s.clone()).await),
        error_codes::NOT_READY
    );
    assert_eq!(
        code_of(h.client.cleanup(s.clone()).await),
        error_codes::NOT_READY
    );
    assert_eq!(
        code_of(
            h.client
                .approve(s.clone(), tollgate_core::RequestId::new(), None, None, None)
                .await
        ),
        error_codes::REQUEST_NOT_FOUND
    );

    let request = h.client.list_pending(Some(s.clone())).await.unwrap()[0].request_id;
    h.client
        .approve(s.clone(), request, None, None, None)
        .await
        .unwrap();
    h.client.resume(s.clone()).await.unwrap();
    wait_for(&h.client, &s, RunnerState::Completed).await;
    assert_eq!(
        code_of(h.client.resume(s).await),
        error_codes::NOT_SUSPENDED
    );
    h.stop().await;
}

#[tokio::test]
async fn test_reaper_abandons_idle_sessions() {
    let mut config = test_config();
    config.sessions.abandon_after_secs = Some(1);
    config.sessions.reap_interval_secs = 1;
    let h = Harness::start(config).await;
    let reaper = h.daemon.spawn_reaper_loop().unwrap();

    let s = sid("rpc-idle");
    h.client
        .start(json!({"prompt": "rm old.log"}), Some(s.clone()))
        .await
        .unwrap();
    wait_for(&h.client, &s, RunnerState::SuspendedPendingApproval).await;

    let deadline = Instant::now() + Duration::from_secs(6);
    loop {
        if h.client.status(s.clone()).await.unwrap().state == RunnerState::Failed {
            break;
        }
        assert!(Instant::now() < deadline, "reaper never abandoned the session");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let TaskOutcome::Failed { error, .. } = h.client.result(s.clone()).await.unwrap() else {
        panic!("expected failure");
    };
    assert!(error.starts_with("abandoned"));
    assert!(h.client.list_pending(None).await.unwrap().is_empty());

    h.daemon.shutdown();
    reaper.await.unwrap();
    h.stop().await;
}

#[tokio::test]
async fn test_reaper_disabled_without_threshold() {
    let h = Harness::start(test_config()).await;
    assert!(h.daemon.spawn_reaper_loop().is_none());
    h.stop().await;
}
