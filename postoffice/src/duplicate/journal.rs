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

//! Durable log contract backing duplicate-id caches, plus an in-memory implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::address::Address;
use crate::transaction::Xid;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal record could not be encoded or decoded: {0}")]
    Codec(String),
    #[error("journal unavailable: {0}")]
    Unavailable(String),
}

/// One committed duplicate-detection identifier, keyed by `(address, sequence)`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DuplicateIdRecord {
    pub address: Address,
    pub sequence: u64,
    pub duplicate_id: Vec<u8>,
}

/// A staged identifier owned by a prepared XA branch.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PreparedDuplicateRecord {
    pub xid: Xid,
    pub record: DuplicateIdRecord,
}

///
/// [`DuplicateIdJournal`] is the durable log consumed by duplicate-id caches.
///
/// Committed records are appended per address and pruned by sequence once evicted. Prepared
/// records survive until the owning XA branch is committed or rolled back.
///
/// `load_duplicate_records` returns records ordered by ascending sequence.
#[async_trait]
pub trait DuplicateIdJournal: Send + Sync {
    async fn append_duplicate_record(&self, record: &DuplicateIdRecord)
        -> Result<(), JournalError>;

    /// Removes one committed record; pruning an absent record is not an error.
    async fn prune_duplicate_record(
        &self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), JournalError>;

    /// Addresses that hold at least one committed record.
    async fn duplicate_addresses(&self) -> Result<Vec<Address>, JournalError>;

    async fn load_duplicate_records(
        &self,
        address: &Address,
    ) -> Result<Vec<DuplicateIdRecord>, JournalError>;

    async fn store_prepared_duplicate(
        &self,
        xid: &Xid,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError>;

    /// Drops every prepared record of `xid`; deleting an unknown xid is not an error.
    async fn delete_prepared_duplicates(&self, xid: &Xid) -> Result<(), JournalError>;

    async fn load_prepared_duplicates(&self) -> Result<Vec<PreparedDuplicateRecord>, JournalError>;
}

#[derive(Default)]
struct InMemoryState {
    committed: BTreeMap<Address, BTreeMap<u64, Vec<u8>>>,
    prepared: HashMap<Xid, Vec<DuplicateIdRecord>>,
}

/// Process-local journal. Survives a post office restart only while the instance is shared.
#[derive(Default)]
pub struct InMemoryDuplicateIdJournal {
    state: Mutex<InMemoryState>,
}

impl InMemoryDuplicateIdJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records currently held for `address`.
    pub fn record_count(&self, address: &Address) -> usize {
        self.state
            .lock()
            .committed
            .get(address)
            .map_or(0, BTreeMap::len)
    }

    pub fn prepared_count(&self) -> usize {
        self.state.lock().prepared.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl DuplicateIdJournal for InMemoryDuplicateIdJournal {
    async fn append_duplicate_record(
        &self,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        self.state
            .lock()
            .committed
            .entry(record.address.clone())
            .or_default()
            .insert(record.sequence, record.duplicate_id.clone());
        Ok(())
    }

    async fn prune_duplicate_record(
        &self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), JournalError> {
        let mut state = self.state.lock();
        if let Some(records) = state.committed.get_mut(address) {
            records.remove(&sequence);
            if records.is_empty() {
                state.committed.remove(address);
            }
        }
        Ok(())
    }

    async fn duplicate_addresses(&self) -> Result<Vec<Address>, JournalError> {
        Ok(self.state.lock().committed.keys().cloned().collect())
    }

    async fn load_duplicate_records(
        &self,
        address: &Address,
    ) -> Result<Vec<DuplicateIdRecord>, JournalError> {
        let state = self.state.lock();
        Ok(state
            .committed
            .get(address)
            .map(|records| {
                records
                    .iter()
                    .map(|(sequence, duplicate_id)| DuplicateIdRecord {
                        address: address.clone(),
                        sequence: *sequence,
                        duplicate_id: duplicate_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn store_prepared_duplicate(
        &self,
        xid: &Xid,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        self.state
            .lock()
            .prepared
            .entry(xid.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn delete_prepared_duplicates(&self, xid: &Xid) -> Result<(), JournalError> {
        self.state.lock().prepared.remove(xid);
        Ok(())
    }

    async fn load_prepared_duplicates(&self) -> Result<Vec<PreparedDuplicateRecord>, JournalError> {
        let state = self.state.lock();
        let mut prepared: Vec<PreparedDuplicateRecord> = state
            .prepared
            .iter()
            .flat_map(|(xid, records)| {
                records.iter().map(|record| PreparedDuplicateRecord {
                    xid: xid.clone(),
                    record: record.clone(),
                })
            })
            .collect();
        prepared.sort_by(|a, b| {
            (&a.record.address, a.record.sequence).cmp(&(&b.record.address, b.record.sequence))
        });
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::{DuplicateIdJournal, DuplicateIdRecord, InMemoryDuplicateIdJournal};
    use crate::transaction::Xid;
    use crate::Address;

    fn record(address: &str, sequence: u64, id: &str) -> DuplicateIdRecord {
        DuplicateIdRecord {
            address: Address::new(address),
            sequence,
            duplicate_id: id.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn committed_records_load_in_sequence_order() {
        let journal = InMemoryDuplicateIdJournal::new();
        journal.append_duplicate_record(&record("a", 3, "c")).await.unwrap();
        journal.append_duplicate_record(&record("a", 1, "a")).await.unwrap();
        journal.append_duplicate_record(&record("b", 2, "b")).await.unwrap();

        let loaded = journal
            .load_duplicate_records(&Address::new("a"))
            .await
            .unwrap();
        let sequences: Vec<u64> = loaded.iter().map(|record| record.sequence).collect();
        assert_eq!(sequences, vec![1, 3]);
        assert_eq!(journal.duplicate_addresses().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn pruning_last_record_forgets_address() {
        let journal = InMemoryDuplicateIdJournal::new();
        journal.append_duplicate_record(&record("a", 1, "x")).await.unwrap();

        journal
            .prune_duplicate_record(&Address::new("a"), 1)
            .await
            .unwrap();
        journal
            .prune_duplicate_record(&Address::new("a"), 1)
            .await
            .unwrap();

        assert!(journal.duplicate_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prepared_records_are_grouped_by_xid() {
        let journal = InMemoryDuplicateIdJournal::new();
        let xid = Xid::new(1, b"gtrid".to_vec(), b"bq".to_vec());
        journal
            .store_prepared_duplicate(&xid, &record("a", 5, "p"))
            .await
            .unwrap();
        assert_eq!(journal.prepared_count(), 1);

        let prepared = journal.load_prepared_duplicates().await.unwrap();
        assert_eq!(prepared[0].xid, xid);

        journal.delete_prepared_duplicates(&xid).await.unwrap();
        assert!(journal.load_prepared_duplicates().await.unwrap().is_empty());
    }
}
