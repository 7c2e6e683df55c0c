//! Shared helpers for runtime integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, oneshot};

use tollgate_approval::{GateOutcome, GateResult};

use tollgate_core::{RunnerState, SessionId};
use tollgate_runtime::{Orchestrator, TaskContext, TaskEngine, TaskError};
use tollgate_storage::{KvStore, MemoryKvStore, StorageError, StorageResult};

/// Orchestrator over a fresh in-memory store with the default plan engine.
pub fn orchestrator() -> Orchestrator {
    Orchestrator::builder(Arc::new(MemoryKvStore::new()))
        .build()
        .unwrap()
}

/// Orchestrator with a custom engine.
pub fn orchestrator_with(engine: Arc<dyn TaskEngine>) -> Orchestrator {
    Orchestrator::builder(Arc::new(MemoryKvStore::new()))
        .engine(engine)
        .build()
        .unwrap()
}

pub fn sid(s: &str) -> SessionId {
    SessionId::parse(s).unwrap()
}

pub fn prompt(p: &str) -> Value {
    json!({ "prompt": p })
}

/// Poll until the session reaches `state`, panicking after five seconds.
pub async fn wait_for_state(orch: &Orchestrator, session: &SessionId, state: RunnerState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = orch.status(session).await.unwrap().state;
        if current == state {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "session {session} stuck in {current}, expected {state}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Engine that stays running until released.
#[derive(Default)]
pub struct HoldEngine {
    pub release: Notify,
}

#[async_trait]
impl TaskEngine for HoldEngine {
    async fn run(&self, input: Value, _ctx: TaskContext) -> Result<Value, TaskError> {
        self.release.notified().await;
        Ok(input)
    }
}

/// Engine that returns at once but leaves a task behind which checks a
/// sensitive action once `go` is notified, reporting the gate's answer.
pub struct LateCheckEngine {
    pub go: Arc<Notify>,
    report: Mutex<Option<oneshot::Sender<GateResult<GateOutcome>>>>,
}

impl LateCheckEngine {
    pub fn new() -> (Self, oneshot::Receiver<GateResult<GateOutcome>>) {
        let (tx, rx) = oneshot::channel();
        let engine = Self {
            go: Arc::new(Notify::new()),
            report: Mutex::new(Some(tx)),
        };
        (engine, rx)
    }
}

#[async_trait]
impl TaskEngine for LateCheckEngine {
    async fn run(&self, input: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let go = Arc::clone(&self.go);
        let report = self.report.lock().unwrap().take();
        tokio::spawn(async move {
            go.notified().await;
            let outcome = ctx.check("delete_files", json!({"paths": ["/late"]})).await;
            if let Some(report) = report {
                let _ = report.send(outcome);
            }
        });
        Ok(input)
    }
}

/// Engine that panics immediately.
pub struct PanicEngine;

#[async_trait]
impl TaskEngine for PanicEngine {
    async fn run(&self, _input: Value, _ctx: TaskContext) -> Result<Value, TaskError> {
        panic!("engine exploded");
    }
}

/// In-memory store whose writes can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryKvStore,
    pub failing: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("store offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check()?;
        self.inner.set(namespace, key, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(namespace, key).await
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.inner.exists(namespace, key).await
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.inner.list_keys(namespace).await
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        self.check()?;
        self.inner
            .compare_and_swap(namespace, key, expected, value)
            .await
    }
}
