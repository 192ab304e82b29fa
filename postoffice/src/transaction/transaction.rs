/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Unit of work carrying completion hooks for staged routing side effects.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::RoutingError;
use crate::observability::events;
use crate::transaction::Xid;

const COMPONENT: &str = "transaction";

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionState {
    Active,
    Prepared,
    Committed,
    RolledBack,
}

#[derive(Debug, Error)]
pub enum TransactionError {
    /// The transaction was marked rollback-only and has been rolled back instead.
    #[error("transaction {tx_id} is rollback-only: {reason}")]
    RollbackOnly { tx_id: u64, reason: String },

    #[error("transaction {tx_id} cannot {operation} while {state:?}")]
    InvalidState {
        tx_id: u64,
        state: TransactionState,
        operation: &'static str,
    },

    #[error("transaction {0} is not an XA transaction")]
    NotXa(u64),

    #[error("no prepared transaction for xid {0}")]
    UnknownXid(Xid),

    /// A hook failed; the transaction has been rolled back.
    #[error("transaction operation failed: {0}")]
    Operation(#[source] Box<RoutingError>),
}

///
/// [`TransactionOperation`] is a set of hooks registered on a [`Transaction`].
///
/// Hooks run in registration order. A failing `before_prepare` or `before_commit` aborts the
/// transaction, after which every registered operation sees `after_rollback`.
#[async_trait]
pub trait TransactionOperation: Send + Sync {
    async fn before_prepare(&self, _tx: &Transaction) -> Result<(), RoutingError> {
        Ok(())
    }

    async fn before_commit(&self, tx: &Transaction) -> Result<(), RoutingError>;

    async fn after_commit(&self, tx: &Transaction);

    async fn after_rollback(&self, tx: &Transaction);
}

struct TransactionInner {
    state: TransactionState,
    rollback_only: Option<String>,
    operations: Vec<Arc<dyn TransactionOperation>>,
}

/// Local or XA transaction; one-phase commit is allowed from `Active` for both.
pub struct Transaction {
    id: u64,
    xid: Option<Xid>,
    inner: Mutex<TransactionInner>,
    completion: tokio::sync::Mutex<()>,
}

impl Transaction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_state(None, TransactionState::Active))
    }

    pub fn new_xa(xid: Xid) -> Arc<Self> {
        Arc::new(Self::with_state(Some(xid), TransactionState::Active))
    }

    /// A prepared branch reconstructed from the journal at startup.
    pub(crate) fn recovered(xid: Xid) -> Self {
        Self::with_state(Some(xid), TransactionState::Prepared)
    }

    fn with_state(xid: Option<Xid>, state: TransactionState) -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            xid,
            inner: Mutex::new(TransactionInner {
                state,
                rollback_only: None,
                operations: Vec::new(),
            }),
            completion: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn xid(&self) -> Option<&Xid> {
        self.xid.as_ref()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    pub fn is_rollback_only(&self) -> bool {
        self.inner.lock().rollback_only.is_some()
    }

    /// Dooms the transaction: a later commit rolls back and fails.
    pub fn mark_rollback_only(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(
            event = events::TX_ROLLBACK_ONLY,
            component = COMPONENT,
            tx_id = self.id,
            reason = reason.as_str(),
            "transaction marked rollback-only"
        );
        let mut inner = self.inner.lock();
        if inner.rollback_only.is_none() {
            inner.rollback_only = Some(reason);
        }
    }

    pub fn add_operation(
        &self,
        operation: Arc<dyn TransactionOperation>,
    ) -> Result<(), TransactionError> {
        let mut inner = self.inner.lock();
        self.require_state(&inner, &[TransactionState::Active], "add operation")?;
        inner.operations.push(operation);
        Ok(())
    }

    /// Recovered branches get their operations while already prepared.
    pub(crate) fn add_recovered_operation(&self, operation: Arc<dyn TransactionOperation>) {
        self.inner.lock().operations.push(operation);
    }

    pub fn operation_count(&self) -> usize {
        self.inner.lock().operations.len()
    }

    fn require_state(
        &self,
        inner: &TransactionInner,
        allowed: &[TransactionState],
        operation: &'static str,
    ) -> Result<(), TransactionError> {
        if allowed.contains(&inner.state) {
            Ok(())
        } else {
            Err(TransactionError::InvalidState {
                tx_id: self.id,
                state: inner.state,
                operation,
            })
        }
    }

    fn operations(&self) -> Vec<Arc<dyn TransactionOperation>> {
        self.inner.lock().operations.clone()
    }

    /// First phase of two-phase commit. Only XA transactions can be prepared.
    pub async fn prepare(&self) -> Result<(), TransactionError> {
        let Some(xid) = self.xid.as_ref() else {
            return Err(TransactionError::NotXa(self.id));
        };
        let _completion = self.completion.lock().await;

        let rollback_only = {
            let inner = self.inner.lock();
            self.require_state(&inner, &[TransactionState::Active], "prepare")?;
            inner.rollback_only.clone()
        };
        if let Some(reason) = rollback_only {
            self.run_rollback().await;
            return Err(TransactionError::RollbackOnly {
                tx_id: self.id,
                reason,
            });
        }

        for operation in self.operations() {
            if let Err(err) = operation.before_prepare(self).await {
                warn!(
                    event = events::TX_PREPARE_FAILED,
                    component = COMPONENT,
                    tx_id = self.id,
                    xid = %xid,
                    err = %err,
                    "prepare hook failed; rolling back"
                );
                self.run_rollback().await;
                return Err(TransactionError::Operation(Box::new(err)));
            }
        }

        self.inner.lock().state = TransactionState::Prepared;
        info!(
            event = events::TX_PREPARE_OK,
            component = COMPONENT,
            tx_id = self.id,
            xid = %xid,
            "transaction prepared"
        );
        Ok(())
    }

    /// Commits from `Active` (one phase) or `Prepared`.
    ///
    /// Every `before_commit` hook runs before any `after_commit` hook. If one fails, or the
    /// transaction is rollback-only, the transaction is rolled back and the error returned.
    pub async fn commit(&self) -> Result<(), TransactionError> {
        let _completion = self.completion.lock().await;

        let rollback_only = {
            let inner = self.inner.lock();
            self.require_state(
                &inner,
                &[TransactionState::Active, TransactionState::Prepared],
                "commit",
            )?;
            inner.rollback_only.clone()
        };
        if let Some(reason) = rollback_only {
            self.run_rollback().await;
            return Err(TransactionError::RollbackOnly {
                tx_id: self.id,
                reason,
            });
        }

        let operations = self.operations();
        for operation in &operations {
            if let Err(err) = operation.before_commit(self).await {
                warn!(
                    event = events::TX_COMMIT_FAILED,
                    component = COMPONENT,
                    tx_id = self.id,
                    err = %err,
                    "commit hook failed; rolling back"
                );
                self.run_rollback().await;
                return Err(TransactionError::Operation(Box::new(err)));
            }
        }

        self.inner.lock().state = TransactionState::Committed;
        for operation in &operations {
            operation.after_commit(self).await;
        }

        debug!(
            event = events::TX_COMMIT_OK,
            component = COMPONENT,
            tx_id = self.id,
            operations = operations.len(),
            "transaction committed"
        );
        Ok(())
    }

    pub async fn rollback(&self) -> Result<(), TransactionError> {
        let _completion = self.completion.lock().await;
        {
            let inner = self.inner.lock();
            self.require_state(
                &inner,
                &[TransactionState::Active, TransactionState::Prepared],
                "roll back",
            )?;
        }
        self.run_rollback().await;
        Ok(())
    }

    async fn run_rollback(&self) {
        let operations = {
            let mut inner = self.inner.lock();
            inner.state = TransactionState::RolledBack;
            inner.operations.clone()
        };
        for operation in &operations {
            operation.after_rollback(self).await;
        }
        debug!(
            event = events::TX_ROLLBACK,
            component = COMPONENT,
            tx_id = self.id,
            operations = operations.len(),
            "transaction rolled back"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{Transaction, TransactionError, TransactionOperation, TransactionState};
    use crate::error::RoutingError;
    use crate::transaction::Xid;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct HookLog {
        name: &'static str,
        fail_commit: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TransactionOperation for HookLog {
        async fn before_prepare(&self, _tx: &Transaction) -> Result<(), RoutingError> {
            self.calls.lock().push(format!("{}:prepare", self.name));
            Ok(())
        }

        async fn before_commit(&self, _tx: &Transaction) -> Result<(), RoutingError> {
            self.calls.lock().push(format!("{}:before", self.name));
            if self.fail_commit {
                return Err(RoutingError::BindingNotFound("gone".to_string()));
            }
            Ok(())
        }

        async fn after_commit(&self, _tx: &Transaction) {
            self.calls.lock().push(format!("{}:after", self.name));
        }

        async fn after_rollback(&self, _tx: &Transaction) {
            self.calls.lock().push(format!("{}:rollback", self.name));
        }
    }

    fn hooks(
        tx: &Transaction,
        calls: &Arc<Mutex<Vec<String>>>,
        names: &[(&'static str, bool)],
    ) {
        for (name, fail_commit) in names {
            tx.add_operation(Arc::new(HookLog {
                name: *name,
                fail_commit: *fail_commit,
                calls: calls.clone(),
            }))
            .unwrap();
        }
    }

    #[tokio::test]
    async fn commit_runs_before_hooks_then_after_hooks_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tx = Transaction::new();
        hooks(&tx, &calls, &[("a", false), ("b", false)]);

        tx.commit().await.unwrap();

        assert_eq!(
            *calls.lock(),
            vec!["a:before", "b:before", "a:after", "b:after"]
        );
        assert_eq!(tx.state(), TransactionState::Committed);
    }

    #[tokio::test]
    async fn failing_before_commit_rolls_back_every_operation() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tx = Transaction::new();
        hooks(&tx, &calls, &[("a", false), ("b", true)]);

        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, TransactionError::Operation(_)));
        assert_eq!(
            *calls.lock(),
            vec!["a:before", "b:before", "a:rollback", "b:rollback"]
        );
        assert_eq!(tx.state(), TransactionState::RolledBack);
    }

    #[tokio::test]
    async fn rollback_only_commit_rolls_back() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tx = Transaction::new();
        hooks(&tx, &calls, &[("a", false)]);
        tx.mark_rollback_only("duplicate");

        let err = tx.commit().await.unwrap_err();

        assert!(matches!(
            err,
            TransactionError::RollbackOnly { reason, .. } if reason == "duplicate"
        ));
        assert_eq!(*calls.lock(), vec!["a:rollback"]);
    }

    #[tokio::test]
    async fn local_transaction_cannot_prepare() {
        let tx = Transaction::new();
        assert!(matches!(
            tx.prepare().await,
            Err(TransactionError::NotXa(_))
        ));
    }

    #[tokio::test]
    async fn xa_prepare_then_commit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tx = Transaction::new_xa(Xid::new(1, b"g".to_vec(), b"b".to_vec()));
        hooks(&tx, &calls, &[("a", false)]);

        tx.prepare().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Prepared);
        assert!(tx
            .add_operation(Arc::new(HookLog::default()))
            .is_err());

        tx.commit().await.unwrap();
        assert_eq!(*calls.lock(), vec!["a:prepare", "a:before", "a:after"]);
    }

    #[tokio::test]
    async fn completed_transaction_rejects_further_completion() {
        let tx = Transaction::new();
        tx.rollback().await.unwrap();

        assert!(matches!(
            tx.commit().await,
            Err(TransactionError::InvalidState {
                state: TransactionState::RolledBack,
                ..
            })
        ));
    }
}
