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

//! Per-address duplicate-id cache with staged (transactional) insertion and FIFO eviction.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, trace};

use crate::address::Address;
use crate::duplicate::persistence::DuplicatePersistence;
use crate::duplicate::{DuplicateIdRecord, JournalError};
use crate::observability::events;
use crate::observability::fields;
use crate::transaction::Xid;

const COMPONENT: &str = "duplicate_id_cache";

/// Identity of the unit of work staging an identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StageOwner {
    Transaction(u64),
    /// A non-transactional routing call.
    Direct(u64),
}

/// An identifier staged by one owner, pending commit or rollback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagedDuplicate {
    address: Address,
    duplicate_id: Arc<[u8]>,
    sequence: u64,
    owner: StageOwner,
}

impl StagedDuplicate {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn duplicate_id(&self) -> &[u8] {
        &self.duplicate_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn owner(&self) -> StageOwner {
        self.owner
    }

    pub(crate) fn to_record(&self) -> DuplicateIdRecord {
        self.record_at(self.sequence)
    }

    fn record_at(&self, sequence: u64) -> DuplicateIdRecord {
        DuplicateIdRecord {
            address: self.address.clone(),
            sequence,
            duplicate_id: self.duplicate_id.to_vec(),
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum StageOutcome {
    /// The identifier is now pending for the caller.
    Staged(StagedDuplicate),
    /// The same owner already holds a pending stage for the identifier.
    AlreadyStaged,
    /// The identifier is visible; the message is a duplicate.
    Duplicate,
    /// Detection is turned off for this cache.
    Disabled,
}

impl StageOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StageOutcome::Duplicate)
    }
}

struct PendingStage {
    owner: StageOwner,
    sequence: u64,
    /// Visible-order key drawn when the commit started.
    commit_sequence: Option<u64>,
}

struct CacheState {
    visible: BTreeMap<u64, Arc<[u8]>>,
    index: HashMap<Arc<[u8]>, u64>,
    pending: HashMap<Arc<[u8]>, PendingStage>,
    next_sequence: u64,
}

impl CacheState {
    fn is_pending_as(&self, duplicate_id: &[u8], sequence: u64) -> bool {
        self.pending
            .get(duplicate_id)
            .is_some_and(|pending| pending.sequence == sequence)
    }

    fn draw_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Commit-order key for a pending stage, drawn on first use.
    fn commit_sequence(&mut self, staged: &StagedDuplicate) -> Option<u64> {
        let next = self.next_sequence;
        let pending = self
            .pending
            .get_mut(&staged.duplicate_id)
            .filter(|pending| pending.sequence == staged.sequence)?;
        if let Some(sequence) = pending.commit_sequence {
            return Some(sequence);
        }
        pending.commit_sequence = Some(next);
        self.next_sequence += 1;
        Some(next)
    }
}

///
/// [`DuplicateIdCache`] holds the most recent `capacity` committed identifiers of one address.
///
/// Identifiers enter in two steps: [`DuplicateIdCache::stage_add_if_absent`] reserves the
/// identifier for one owner without making it visible, then [`DuplicateIdCache::commit`]
/// promotes it or [`DuplicateIdCache::rollback`] discards it. While one owner holds a
/// pending stage, a different owner staging the same identifier waits for the outcome.
///
/// Visible entries are ordered by the sequence drawn when their commit started, so a stage
/// held open for a long time still enters as the newest entry. Promoting past `capacity`
/// evicts the oldest committed entries; lookups do not refresh entries.
pub struct DuplicateIdCache {
    address: Address,
    capacity: usize,
    state: Mutex<CacheState>,
    resolved: Notify,
    persistence: Option<DuplicatePersistence>,
}

impl DuplicateIdCache {
    /// Builds a memory-only cache. A `capacity` of zero disables detection.
    pub fn new(address: Address, capacity: usize) -> Self {
        Self::with_persistence(address, capacity, None)
    }

    pub(crate) fn with_persistence(
        address: Address,
        capacity: usize,
        persistence: Option<DuplicatePersistence>,
    ) -> Self {
        Self {
            address,
            capacity,
            state: Mutex::new(CacheState {
                visible: BTreeMap::new(),
                index: HashMap::new(),
                pending: HashMap::new(),
                next_sequence: 1,
            }),
            resolved: Notify::new(),
            persistence,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// `true` iff `duplicate_id` is visible. Pending stages are ignored.
    pub fn check_duplicate(&self, duplicate_id: &[u8]) -> bool {
        self.is_enabled() && self.state.lock().index.contains_key(duplicate_id)
    }

    /// Reserves `duplicate_id` for `owner`.
    ///
    /// Waits while another owner holds a pending stage for the same identifier, then reports
    /// [`StageOutcome::Duplicate`] if that owner committed, or stages it if that owner rolled
    /// back.
    pub async fn stage_add_if_absent(
        &self,
        duplicate_id: &[u8],
        owner: StageOwner,
    ) -> StageOutcome {
        if !self.is_enabled() {
            return StageOutcome::Disabled;
        }

        loop {
            let mut resolved = pin!(self.resolved.notified());
            resolved.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.index.contains_key(duplicate_id) {
                    return StageOutcome::Duplicate;
                }

                match state.pending.get(duplicate_id).map(|pending| pending.owner) {
                    Some(pending_owner) if pending_owner == owner => {
                        return StageOutcome::AlreadyStaged
                    }
                    Some(_) => {}
                    None => {
                        let sequence = state.draw_sequence();
                        let duplicate_id: Arc<[u8]> = Arc::from(duplicate_id);
                        state.pending.insert(
                            duplicate_id.clone(),
                            PendingStage {
                                owner,
                                sequence,
                                commit_sequence: None,
                            },
                        );

                        trace!(
                            event = events::DUPLICATE_STAGED,
                            component = COMPONENT,
                            address = %self.address,
                            duplicate_id = %fields::format_duplicate_id(&duplicate_id),
                            sequence,
                            "duplicate id staged"
                        );
                        return StageOutcome::Staged(StagedDuplicate {
                            address: self.address.clone(),
                            duplicate_id,
                            sequence,
                            owner,
                        });
                    }
                }
            }

            debug!(
                event = events::DUPLICATE_STAGE_WAIT,
                component = COMPONENT,
                address = %self.address,
                duplicate_id = %fields::format_duplicate_id(duplicate_id),
                "identifier staged by another owner; waiting for its outcome"
            );
            resolved.await;
        }
    }

    /// Fixes the commit-order key of `staged`, then appends it durably when persistence is
    /// mandatory. Must run ahead of [`DuplicateIdCache::commit`].
    pub(crate) async fn persist_before_commit(
        &self,
        staged: &StagedDuplicate,
    ) -> Result<(), JournalError> {
        let Some(sequence) = self.state.lock().commit_sequence(staged) else {
            return Ok(());
        };
        match &self.persistence {
            Some(persistence) => {
                persistence
                    .append_before_commit(&staged.record_at(sequence))
                    .await
            }
            None => Ok(()),
        }
    }

    pub(crate) async fn store_prepared(
        &self,
        xid: &Xid,
        staged: &StagedDuplicate,
    ) -> Result<(), JournalError> {
        match &self.persistence {
            Some(persistence) => persistence.store_prepared(xid, &staged.to_record()).await,
            None => Ok(()),
        }
    }

    pub(crate) fn forget_prepared(&self, xid: &Xid) {
        if let Some(persistence) = &self.persistence {
            persistence.schedule_delete_prepared(xid);
        }
    }

    /// Promotes a staged identifier to visible as the newest entry and evicts the oldest
    /// entries over capacity.
    ///
    /// Visibility changes before this returns; journal writes are queued behind it.
    pub fn commit(&self, staged: &StagedDuplicate) {
        let (sequence, evicted) = {
            let mut state = self.state.lock();
            let Some(sequence) = state.commit_sequence(staged) else {
                debug!(
                    event = events::DUPLICATE_COMMITTED,
                    component = COMPONENT,
                    address = %self.address,
                    sequence = staged.sequence,
                    reason = "stage no longer pending",
                    "ignored commit of unknown stage"
                );
                return;
            };

            state.pending.remove(&staged.duplicate_id);
            state.visible.insert(sequence, staged.duplicate_id.clone());
            state.index.insert(staged.duplicate_id.clone(), sequence);

            let mut evicted = Vec::new();
            while state.visible.len() > self.capacity {
                let Some(oldest) = state.visible.keys().find(|key| **key != sequence).copied()
                else {
                    break;
                };
                if let Some(duplicate_id) = state.visible.remove(&oldest) {
                    state.index.remove(&duplicate_id);
                    evicted.push((oldest, duplicate_id));
                }
            }
            (sequence, evicted)
        };
        self.resolved.notify_waiters();

        trace!(
            event = events::DUPLICATE_COMMITTED,
            component = COMPONENT,
            address = %self.address,
            duplicate_id = %fields::format_duplicate_id(&staged.duplicate_id),
            sequence,
            "duplicate id visible"
        );

        if let Some(persistence) = &self.persistence {
            persistence.append_after_commit(staged.record_at(sequence));
        }

        for (evicted_sequence, duplicate_id) in evicted {
            trace!(
                event = events::DUPLICATE_EVICTED,
                component = COMPONENT,
                address = %self.address,
                duplicate_id = %fields::format_duplicate_id(&duplicate_id),
                sequence = evicted_sequence,
                "duplicate id evicted"
            );
            if let Some(persistence) = &self.persistence {
                persistence.schedule_prune(&self.address, evicted_sequence);
            }
        }
    }

    /// Discards a staged identifier; nothing becomes visible and nothing is written.
    pub fn rollback(&self, staged: &StagedDuplicate) {
        {
            let mut state = self.state.lock();
            if !state.is_pending_as(&staged.duplicate_id, staged.sequence) {
                return;
            }
            state.pending.remove(&staged.duplicate_id);
        }
        self.resolved.notify_waiters();

        trace!(
            event = events::DUPLICATE_ROLLED_BACK,
            component = COMPONENT,
            address = %self.address,
            duplicate_id = %fields::format_duplicate_id(&staged.duplicate_id),
            sequence = staged.sequence,
            "duplicate id stage discarded"
        );
    }

    /// Rebuilds visible entries from journal records.
    ///
    /// Keeps the `capacity` records with the highest sequences and prunes the rest from the
    /// journal so a later capacity increase cannot bring them back.
    pub(crate) async fn load(
        &self,
        mut records: Vec<DuplicateIdRecord>,
    ) -> Result<(), JournalError> {
        records.sort_by_key(|record| record.sequence);
        let dropped = records.len().saturating_sub(self.capacity);
        let kept = records.split_off(dropped);

        if let Some(persistence) = &self.persistence {
            for record in &records {
                persistence.prune_now(&self.address, record.sequence).await?;
            }
        }

        let loaded = kept.len();
        {
            let mut state = self.state.lock();
            for record in kept {
                let duplicate_id: Arc<[u8]> = Arc::from(record.duplicate_id);
                state.visible.insert(record.sequence, duplicate_id.clone());
                state.index.insert(duplicate_id, record.sequence);
                state.next_sequence = state.next_sequence.max(record.sequence + 1);
            }
            for record in &records {
                state.next_sequence = state.next_sequence.max(record.sequence + 1);
            }
        }

        info!(
            event = events::DUPLICATE_CACHE_LOAD,
            component = COMPONENT,
            address = %self.address,
            loaded,
            capacity = self.capacity,
            "duplicate id cache loaded"
        );
        if dropped > 0 {
            info!(
                event = events::DUPLICATE_CACHE_LOAD_PRUNED,
                component = COMPONENT,
                address = %self.address,
                pruned = dropped,
                "dropped records beyond the configured cache size"
            );
        }
        Ok(())
    }

    /// Re-pends an identifier held by a prepared transaction found at startup.
    ///
    /// The record's sequence only identifies the stage; committing it draws a fresh one.
    pub(crate) fn recover_pending(
        &self,
        record: DuplicateIdRecord,
        owner: StageOwner,
    ) -> StagedDuplicate {
        let duplicate_id: Arc<[u8]> = Arc::from(record.duplicate_id);
        let mut state = self.state.lock();
        state.pending.insert(
            duplicate_id.clone(),
            PendingStage {
                owner,
                sequence: record.sequence,
                commit_sequence: None,
            },
        );
        state.next_sequence = state.next_sequence.max(record.sequence + 1);

        debug!(
            event = events::DUPLICATE_RECOVERED,
            component = COMPONENT,
            address = %self.address,
            duplicate_id = %fields::format_duplicate_id(&duplicate_id),
            sequence = record.sequence,
            "prepared duplicate id re-staged"
        );
        StagedDuplicate {
            address: self.address.clone(),
            duplicate_id,
            sequence: record.sequence,
            owner,
        }
    }

    /// Visible identifiers, oldest first.
    pub fn visible_ids(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .visible
            .values()
            .map(|duplicate_id| duplicate_id.to_vec())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}
