//! Transaction hooks that apply a routing context when its transaction completes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::error::RoutingError;
use crate::observability::events;
use crate::routing::routing_context::{withdraw_all, Enqueued, RoutingContext};
use crate::transaction::{Transaction, TransactionOperation};

const COMPONENT: &str = "routing_operation";

/// A [`RoutingContext`] registered on a transaction.
///
/// Enqueues run in `before_commit` so a rejecting queue fails the commit; the duplicate-id
/// stage becomes visible in `after_commit`. A prepared stage is journaled in `before_prepare`
/// and its prepared record dropped once the branch completes.
pub(crate) struct RoutingOperation {
    context: RoutingContext,
    enqueued: Mutex<Enqueued>,
    prepared: AtomicBool,
}

impl RoutingOperation {
    pub(crate) fn new(context: RoutingContext) -> Self {
        Self {
            context,
            enqueued: Mutex::new(Enqueued::new()),
            prepared: AtomicBool::new(false),
        }
    }

    /// Operation of a prepared branch recovered from the journal.
    pub(crate) fn recovered(context: RoutingContext) -> Self {
        let operation = Self::new(context);
        operation.prepared.store(true, Ordering::SeqCst);
        operation
    }

    fn forget_prepared(&self, tx: &Transaction) {
        if !self.prepared.load(Ordering::SeqCst) {
            return;
        }
        if let (Some(xid), Some(stage)) = (tx.xid(), self.context.stage()) {
            stage.cache.forget_prepared(xid);
        }
    }
}

#[async_trait]
impl TransactionOperation for RoutingOperation {
    async fn before_prepare(&self, tx: &Transaction) -> Result<(), RoutingError> {
        if let (Some(xid), Some(stage)) = (tx.xid(), self.context.stage()) {
            stage.cache.store_prepared(xid, &stage.staged).await?;
            self.prepared.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn before_commit(&self, _tx: &Transaction) -> Result<(), RoutingError> {
        let mut enqueued = Enqueued::new();
        let result = self.context.enqueue_targets(&mut enqueued).await;
        *self.enqueued.lock() = enqueued;
        result?;

        if let Some(stage) = self.context.stage() {
            stage.cache.persist_before_commit(&stage.staged).await?;
        }
        Ok(())
    }

    async fn after_commit(&self, tx: &Transaction) {
        if let Some(stage) = self.context.stage() {
            stage.cache.commit(&stage.staged);
        }
        self.forget_prepared(tx);

        debug!(
            event = events::ROUTE_OK,
            component = COMPONENT,
            tx_id = tx.id(),
            msg_id = self.context.message().id(),
            address = %self.context.message().address(),
            queues = self.enqueued.lock().len(),
            "transactional routing applied"
        );
    }

    async fn after_rollback(&self, tx: &Transaction) {
        let enqueued = std::mem::take(&mut *self.enqueued.lock());
        withdraw_all(self.context.message(), enqueued).await;

        if let Some(stage) = self.context.stage() {
            stage.cache.rollback(&stage.staged);
        }
        self.forget_prepared(tx);

        debug!(
            event = events::TX_ROLLBACK,
            component = COMPONENT,
            tx_id = tx.id(),
            msg_id = self.context.message().id(),
            address = %self.context.message().address(),
            "transactional routing discarded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::RoutingOperation;
    use crate::duplicate::{DuplicateIdCache, StageOutcome, StageOwner};
    use crate::message::ServerMessage;
    use crate::queue::test_queue::TestQueue;
    use crate::routing::{RouteDecision, RoutingContext};
    use crate::transaction::Transaction;
    use crate::Address;
    use std::sync::Arc;

    async fn staged_operation(
        tx: &Transaction,
        cache: &Arc<DuplicateIdCache>,
        queues: &[Arc<TestQueue>],
    ) -> RoutingOperation {
        let message =
            Arc::new(ServerMessage::new(tx.id(), "orders").with_duplicate_id(b"tx-id".to_vec()));
        let mut context = RoutingContext::new(message);
        for queue in queues {
            context
                .add_queue_target(queue.clone(), RouteDecision::Route)
                .unwrap();
        }
        let StageOutcome::Staged(staged) = cache
            .stage_add_if_absent(b"tx-id", StageOwner::Transaction(tx.id()))
            .await
        else {
            panic!("identifier should stage");
        };
        context.set_duplicate_stage(cache.clone(), staged);
        RoutingOperation::new(context)
    }

    #[tokio::test]
    async fn commit_enqueues_then_publishes_identifier() {
        let queue = TestQueue::new("q1");
        let cache = Arc::new(DuplicateIdCache::new(Address::new("orders"), 10));
        let tx = Transaction::new();
        let operation = staged_operation(&tx, &cache, &[queue.clone()]).await;
        tx.add_operation(Arc::new(operation)).unwrap();

        assert!(queue.accepted().is_empty());
        tx.commit().await.unwrap();

        assert_eq!(queue.accepted(), vec![tx.id()]);
        assert!(cache.check_duplicate(b"tx-id"));
    }

    #[tokio::test]
    async fn rejected_enqueue_fails_commit_and_withdraws() {
        let accepted = TestQueue::new("accepting");
        let full = TestQueue::rejecting("full");
        let cache = Arc::new(DuplicateIdCache::new(Address::new("orders"), 10));
        let tx = Transaction::new();
        let operation = staged_operation(&tx, &cache, &[accepted.clone(), full]).await;
        tx.add_operation(Arc::new(operation)).unwrap();

        assert!(tx.commit().await.is_err());

        assert!(accepted.accepted().is_empty());
        assert!(!cache.check_duplicate(b"tx-id"));
        assert_eq!(cache.pending_len(), 0);
    }
}
