//! Registry of prepared XA branches awaiting the transaction manager's decision.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::observability::events;
use crate::transaction::{Transaction, TransactionError, Xid};

const COMPONENT: &str = "resource_manager";

/// Prepared transactions by xid, including branches recovered at startup.
#[derive(Default)]
pub struct ResourceManager {
    prepared: Mutex<HashMap<Xid, Arc<Transaction>>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares `tx` and keeps it until [`ResourceManager::commit`] or
    /// [`ResourceManager::rollback`].
    pub async fn prepare(&self, tx: &Arc<Transaction>) -> Result<(), TransactionError> {
        tx.prepare().await?;
        self.put_prepared(tx.clone())
    }

    pub(crate) fn put_prepared(&self, tx: Arc<Transaction>) -> Result<(), TransactionError> {
        let Some(xid) = tx.xid().cloned() else {
            return Err(TransactionError::NotXa(tx.id()));
        };
        self.prepared.lock().insert(xid, tx);
        Ok(())
    }

    pub fn get(&self, xid: &Xid) -> Option<Arc<Transaction>> {
        self.prepared.lock().get(xid).cloned()
    }

    pub fn prepared_xids(&self) -> Vec<Xid> {
        self.prepared.lock().keys().cloned().collect()
    }

    pub async fn commit(&self, xid: &Xid) -> Result<(), TransactionError> {
        let tx = self.take(xid)?;
        tx.commit().await?;
        info!(
            event = events::TX_COMMIT_OK,
            component = COMPONENT,
            tx_id = tx.id(),
            xid = %xid,
            "prepared transaction committed"
        );
        Ok(())
    }

    pub async fn rollback(&self, xid: &Xid) -> Result<(), TransactionError> {
        let tx = self.take(xid)?;
        tx.rollback().await?;
        info!(
            event = events::TX_ROLLBACK,
            component = COMPONENT,
            tx_id = tx.id(),
            xid = %xid,
            "prepared transaction rolled back"
        );
        Ok(())
    }

    fn take(&self, xid: &Xid) -> Result<Arc<Transaction>, TransactionError> {
        self.prepared
            .lock()
            .remove(xid)
            .ok_or_else(|| TransactionError::UnknownXid(xid.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceManager;
    use crate::transaction::{Transaction, TransactionError, TransactionState, Xid};

    #[tokio::test]
    async fn prepared_branch_commits_by_xid() {
        let manager = ResourceManager::new();
        let xid = Xid::new(1, b"g1".to_vec(), b"b1".to_vec());
        let tx = Transaction::new_xa(xid.clone());

        manager.prepare(&tx).await.unwrap();
        assert_eq!(manager.prepared_xids(), vec![xid.clone()]);

        manager.commit(&xid).await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert!(manager.get(&xid).is_none());
    }

    #[tokio::test]
    async fn unknown_xid_is_reported() {
        let manager = ResourceManager::new();
        let xid = Xid::new(1, b"missing".to_vec(), Vec::new());

        assert!(matches!(
            manager.rollback(&xid).await,
            Err(TransactionError::UnknownXid(_))
        ));
    }
}
