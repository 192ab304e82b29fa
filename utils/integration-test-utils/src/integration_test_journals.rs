/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

use async_trait::async_trait;
use postoffice::{
    Address, DuplicateIdJournal, DuplicateIdRecord, InMemoryDuplicateIdJournal, JournalError,
    PreparedDuplicateRecord, Xid,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// In-memory journal whose committed appends can be made to fail on demand.
pub struct FailingJournal {
    inner: Arc<InMemoryDuplicateIdJournal>,
    fail_appends: AtomicBool,
}

impl FailingJournal {
    pub fn new(inner: Arc<InMemoryDuplicateIdJournal>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_appends: AtomicBool::new(false),
        })
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &Arc<InMemoryDuplicateIdJournal> {
        &self.inner
    }
}

#[async_trait]
impl DuplicateIdJournal for FailingJournal {
    async fn append_duplicate_record(
        &self,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            debug!("failing append of sequence {} on {}", record.sequence, record.address);
            return Err(JournalError::Unavailable("injected append failure".to_string()));
        }
        self.inner.append_duplicate_record(record).await
    }

    async fn prune_duplicate_record(
        &self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), JournalError> {
        self.inner.prune_duplicate_record(address, sequence).await
    }

    async fn duplicate_addresses(&self) -> Result<Vec<Address>, JournalError> {
        self.inner.duplicate_addresses().await
    }

    async fn load_duplicate_records(
        &self,
        address: &Address,
    ) -> Result<Vec<DuplicateIdRecord>, JournalError> {
        self.inner.load_duplicate_records(address).await
    }

    async fn store_prepared_duplicate(
        &self,
        xid: &Xid,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        self.inner.store_prepared_duplicate(xid, record).await
    }

    async fn delete_prepared_duplicates(&self, xid: &Xid) -> Result<(), JournalError> {
        self.inner.delete_prepared_duplicates(xid).await
    }

    async fn load_prepared_duplicates(&self) -> Result<Vec<PreparedDuplicateRecord>, JournalError> {
        self.inner.load_prepared_duplicates().await
    }
}
