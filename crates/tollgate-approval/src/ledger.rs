//! Durable approval ledger.
//!
//! Every approval request lives as one JSON record in the primary namespace
//! `{table}:requests` under `{session_id}/{request_id}`. A secondary index
//! per status (`{table}:status:{status}`) holds one entry per record, keyed
//! `{created_at_nanos:020}/{session_id}/{request_id}` so that a lexical key
//! sort is a creation-time sort.
//!
//! # Write ordering
//!
//! Index entries are always written *before* the primary record changes and
//! removed *after*. A crash between the two steps can therefore leave a
//! stale index entry, never a record that is invisible to listing. Readers
//! re-check every indexed record against its primary copy and skip
//! mismatches.
//!
//! # Exactly-once resolution
//!
//! [`ApprovalLedger::resolve`] swaps the primary record with
//! [`KvStore::compare_and_swap`] against the exact pending bytes it read.
//! When two resolves race, one swap wins and the other observes a changed
//! record and fails with [`LedgerError::AlreadyResolved`].

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use tollgate_core::{RequestId, SessionId, Timestamp};
use tollgate_storage::KvStore;

use crate::error::{LedgerError, LedgerResult};
use crate::record::{ApprovalReason, ApprovalRecord, ApprovalStatus, Resolution};

/// Default table name, matching the `HITL_TABLE_NAME` fallback.
pub const DEFAULT_TABLE_NAME: &str = "hitl-approvals";

/// Durable store of approval requests keyed by session and request.
#[derive(Clone)]
pub struct ApprovalLedger {
    store: Arc<dyn KvStore>,
    table: String,
    requests_ns: String,
}

impl std::fmt::Debug for ApprovalLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalLedger")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl ApprovalLedger {
    /// Create a ledger over `store`, namespacing every key under `table`.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, table: impl Into<String>) -> Self {
        let table = table.into();
        let requests_ns = format!("{table}:requests");
        Self {
            store,
            table,
            requests_ns,
        }
    }

    /// The table name this ledger writes under.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The underlying store, shared with the session journal.
    #[must_use]
    pub fn store(&self) -> Arc<dyn KvStore> {
        Arc::clone(&self.store)
    }

    fn primary_key(session_id: &SessionId, request_id: RequestId) -> String {
        format!("{session_id}/{request_id}")
    }

    fn index_namespace(&self, status: ApprovalStatus) -> String {
        format!("{}:status:{status}", self.table)
    }

    fn index_key(record: &ApprovalRecord) -> String {
        format!(
            "{:020}/{}/{}",
            record.created_at.unix_nanos(),
            record.session_id,
            record.request_id
        )
    }

    async fn write_index(&self, record: &ApprovalRecord) -> LedgerResult<()> {
        let primary = Self::primary_key(&record.session_id, record.request_id);
        self.store
            .set(
                &self.index_namespace(record.status),
                &Self::index_key(record),
                primary.into_bytes(),
            )
            .await?;
        Ok(())
    }

    async fn drop_index(&self, record: &ApprovalRecord) {
        let ns = self.index_namespace(record.status);
        if let Err(e) = self.store.delete(&ns, &Self::index_key(record)).await {
            warn!(
                session_id = %record.session_id,
                request_id = %record.request_id,
                "Failed to remove stale {} index entry: {e}",
                record.status
            );
        }
    }

    async fn load(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
    ) -> LedgerResult<Option<(Vec<u8>, ApprovalRecord)>> {
        let key = Self::primary_key(session_id, request_id);
        match self.store.get(&self.requests_ns, &key).await? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)?;
                Ok(Some((bytes, record)))
            },
            None => Ok(None),
        }
    }

    /// Record a new pending request.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateRequest`] if the pair already exists.
    /// - [`LedgerError::Storage`] if the store fails; nothing is recorded.
    pub async fn put_pending(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
        reason: ApprovalReason,
    ) -> LedgerResult<ApprovalRecord> {
        let record = ApprovalRecord::pending(session_id.clone(), request_id, reason);
        let bytes = serde_json::to_vec(&record)?;

        self.write_index(&record).await?;

        let key = Self::primary_key(session_id, request_id);
        let inserted = self
            .store
            .compare_and_swap(&self.requests_ns, &key, None, bytes)
            .await?;

        if !inserted {
            // Only remove our own index entry; the existing record may share
            // the key if both were created within the same clock tick.
            let existing = self.load(session_id, request_id).await.ok().flatten();
            if existing.is_none_or(|(_, e)| Self::index_key(&e) != Self::index_key(&record)) {
                self.drop_index(&record).await;
            }
            return Err(LedgerError::DuplicateRequest {
                session_id: session_id.clone(),
                request_id,
            });
        }

        info!(
            session_id = %session_id,
            request_id = %request_id,
            action = %record.reason.action,
            "Approval request recorded"
        );
        Ok(record)
    }

    /// Apply a decision to a pending request.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if no such request exists.
    /// - [`LedgerError::AlreadyResolved`] if the request is not pending,
    ///   including when a concurrent resolve won the race.
    /// - [`LedgerError::Storage`] if the store fails.
    pub async fn resolve(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
        resolution: Resolution,
    ) -> LedgerResult<ApprovalRecord> {
        let not_found = || LedgerError::NotFound {
            session_id: session_id.clone(),
            request_id,
        };

        let (current_bytes, current) = self
            .load(session_id, request_id)
            .await?
            .ok_or_else(not_found)?;

        if current.status.is_resolved() {
            return Err(LedgerError::AlreadyResolved {
                session_id: session_id.clone(),
                request_id,
                status: current.status,
            });
        }

        let mut updated = current.clone();
        updated.status = resolution.verdict.into();
        updated.decision = Some(resolution.payload);
        updated.approver = Some(resolution.approver);
        updated.trusted = resolution.trusted;
        updated.resolved_at = Some(Timestamp::now());
        let bytes = serde_json::to_vec(&updated)?;

        self.write_index(&updated).await?;

        let key = Self::primary_key(session_id, request_id);
        let swapped = self
            .store
            .compare_and_swap(&self.requests_ns, &key, Some(&current_bytes), bytes)
            .await?;

        if !swapped {
            // The winner's index entries stay; ours is re-validated away on read.
            let (_, winner) = self
                .load(session_id, request_id)
                .await?
                .ok_or_else(not_found)?;
            debug!(
                session_id = %session_id,
                request_id = %request_id,
                "Lost resolve race to a concurrent decision"
            );
            return Err(LedgerError::AlreadyResolved {
                session_id: session_id.clone(),
                request_id,
                status: winner.status,
            });
        }

        self.drop_index(&current).await;

        info!(
            session_id = %session_id,
            request_id = %request_id,
            status = %updated.status,
            approver = ?updated.approver,
            "Approval request resolved"
        );
        Ok(updated)
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no such request exists.
    pub async fn get(
        &self,
        session_id: &SessionId,
        request_id: RequestId,
    ) -> LedgerResult<ApprovalRecord> {
        self.load(session_id, request_id)
            .await?
            .map(|(_, record)| record)
            .ok_or_else(|| LedgerError::NotFound {
                session_id: session_id.clone(),
                request_id,
            })
    }

    /// Lazily stream every record currently in `status`, oldest first.
    ///
    /// Each call re-reads the index, so a new stream reflects current state.
    /// Records whose status changed after the index was read are skipped.
    pub fn list_by_status(
        &self,
        status: ApprovalStatus,
    ) -> BoxStream<'_, LedgerResult<ApprovalRecord>> {
        let ns = self.index_namespace(status);
        stream::once(async move { self.store.list_keys(&ns).await })
            .map(move |listed| match listed {
                Ok(mut keys) => {
                    keys.sort_unstable();
                    stream::iter(keys)
                        .filter_map(move |key| async move {
                            self.load_indexed(&key, status).await.transpose()
                        })
                        .boxed()
                },
                Err(e) => stream::once(async move { Err(LedgerError::from(e)) }).boxed(),
            })
            .flatten()
            .boxed()
    }

    async fn load_indexed(
        &self,
        index_key: &str,
        status: ApprovalStatus,
    ) -> LedgerResult<Option<ApprovalRecord>> {
        let mut parts = index_key.splitn(3, '/');
        let _created = parts.next();
        let session = parts.next().and_then(|s| SessionId::parse(s).ok());
        let request = parts.next().and_then(|r| r.parse::<RequestId>().ok());
        let (Some(session_id), Some(request_id)) = (session, request) else {
            warn!(index_key, "Skipping malformed ledger index entry");
            return Ok(None);
        };

        Ok(self
            .load(&session_id, request_id)
            .await?
            .map(|(_, record)| record)
            .filter(|record| record.status == status))
    }

    /// Collect pending records, optionally restricted to one session.
    ///
    /// # Errors
    ///
    /// Returns the first storage or decoding error encountered.
    pub async fn list_pending(
        &self,
        session_filter: Option<&SessionId>,
    ) -> LedgerResult<Vec<ApprovalRecord>> {
        self.list_by_status(ApprovalStatus::Pending)
            .try_filter(|record| {
                let keep = session_filter.is_none_or(|s| *s == record.session_id);
                async move { keep }
            })
            .try_collect()
            .await
    }

    /// Full approval history of one session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the first storage or decoding error encountered.
    pub async fn list_session(&self, session_id: &SessionId) -> LedgerResult<Vec<ApprovalRecord>> {
        let prefix = format!("{session_id}/");
        let keys = self.store.list_keys(&self.requests_ns).await?;

        let mut records = Vec::new();
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            if let Some(bytes) = self.store.get(&self.requests_ns, key).await? {
                records.push(serde_json::from_slice::<ApprovalRecord>(&bytes)?);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
