//! Persistence policy binding a duplicate-id cache to its journal.

use std::sync::Arc;

use crate::address::Address;
use crate::config::IdCachePersistence;
use crate::duplicate::{DuplicateIdJournal, DuplicateIdRecord, JournalError};
use crate::runtime::journal_runtime::{JournalCommand, JournalWriterHandle};
use crate::transaction::Xid;

/// Routes duplicate-id journal writes either through the writer thread or inline.
///
/// Appends are inline only in [`IdCachePersistence::Mandatory`] mode, where the caller must
/// see a failed write. Prunes and prepared-record deletions always go through the writer so
/// they land after any append queued before them.
#[derive(Clone)]
pub(crate) struct DuplicatePersistence {
    journal: Arc<dyn DuplicateIdJournal>,
    writer: JournalWriterHandle,
    mode: IdCachePersistence,
}

impl DuplicatePersistence {
    pub(crate) fn new(
        journal: Arc<dyn DuplicateIdJournal>,
        writer: JournalWriterHandle,
        mode: IdCachePersistence,
    ) -> Self {
        Self {
            journal,
            writer,
            mode,
        }
    }

    /// Durable append ahead of the in-memory commit; no-op unless persistence is mandatory.
    pub(crate) async fn append_before_commit(
        &self,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        match self.mode {
            IdCachePersistence::Mandatory => self.journal.append_duplicate_record(record).await,
            IdCachePersistence::Async => Ok(()),
        }
    }

    /// Queues the append of a record that just became visible; no-op in mandatory mode.
    pub(crate) fn append_after_commit(&self, record: DuplicateIdRecord) {
        if self.mode == IdCachePersistence::Async {
            let _ = self.writer.submit(JournalCommand::Append(record));
        }
    }

    pub(crate) fn schedule_prune(&self, address: &Address, sequence: u64) {
        let _ = self.writer.submit(JournalCommand::Prune {
            address: address.clone(),
            sequence,
        });
    }

    /// Inline prune used while loading, before any routing is accepted.
    pub(crate) async fn prune_now(
        &self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), JournalError> {
        self.journal.prune_duplicate_record(address, sequence).await
    }

    pub(crate) async fn store_prepared(
        &self,
        xid: &Xid,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        self.journal.store_prepared_duplicate(xid, record).await
    }

    pub(crate) fn schedule_delete_prepared(&self, xid: &Xid) {
        let _ = self.writer.submit(JournalCommand::DeletePrepared(xid.clone()));
    }
}
