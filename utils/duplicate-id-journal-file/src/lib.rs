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

//! File-backed [`DuplicateIdJournal`].
//!
//! Every journal operation is appended as one JSON line and the file is replayed on open.
//! A half-written trailing line left by a crash is truncated away; corruption anywhere else
//! fails the open.

use async_trait::async_trait;
use postoffice::observability::events;
use postoffice::{
    Address, DuplicateIdJournal, DuplicateIdRecord, JournalError, PreparedDuplicateRecord, Xid,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COMPONENT: &str = "duplicate_id_journal_file";

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Add { record: DuplicateIdRecord },
    Prune { address: Address, sequence: u64 },
    Prepare { xid: Xid, record: DuplicateIdRecord },
    Resolve { xid: Xid },
}

#[derive(Default)]
struct Replica {
    committed: BTreeMap<Address, BTreeMap<u64, Vec<u8>>>,
    prepared: HashMap<Xid, Vec<DuplicateIdRecord>>,
}

impl Replica {
    fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Add { record } => {
                self.committed
                    .entry(record.address)
                    .or_default()
                    .insert(record.sequence, record.duplicate_id);
            }
            JournalEntry::Prune { address, sequence } => {
                if let Some(records) = self.committed.get_mut(&address) {
                    records.remove(&sequence);
                    if records.is_empty() {
                        self.committed.remove(&address);
                    }
                }
            }
            JournalEntry::Prepare { xid, record } => {
                self.prepared.entry(xid).or_default().push(record);
            }
            JournalEntry::Resolve { xid } => {
                self.prepared.remove(&xid);
            }
        }
    }

    /// Minimal entry list reproducing this state.
    fn live_entries(&self) -> Vec<JournalEntry> {
        let committed = self.committed.iter().flat_map(|(address, records)| {
            records
                .iter()
                .map(|(sequence, duplicate_id)| JournalEntry::Add {
                    record: DuplicateIdRecord {
                        address: address.clone(),
                        sequence: *sequence,
                        duplicate_id: duplicate_id.clone(),
                    },
                })
        });
        let prepared = self.prepared.iter().flat_map(|(xid, records)| {
            records.iter().map(|record| JournalEntry::Prepare {
                xid: xid.clone(),
                record: record.clone(),
            })
        });
        committed.chain(prepared).collect()
    }
}

struct Inner {
    file: File,
    replica: Replica,
    entries: usize,
}

/// Append-only JSON-lines journal with an in-memory replica serving loads.
pub struct FileDuplicateIdJournal {
    path: PathBuf,
    inner: Mutex<Inner>,
}

fn codec_error(err: serde_json::Error) -> JournalError {
    JournalError::Codec(err.to_string())
}

fn encode(entry: &JournalEntry) -> Result<Vec<u8>, JournalError> {
    let mut line = serde_json::to_vec(entry).map_err(codec_error)?;
    line.push(b'\n');
    Ok(line)
}

async fn open_append(path: &Path) -> Result<File, JournalError> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?)
}

impl FileDuplicateIdJournal {
    /// Opens `path`, creating it when absent, and replays its entries.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let mut replica = Replica::default();
        let mut entries = 0;
        let mut offset = 0;
        let mut torn_at = None;
        for line in contents.split_inclusive(|byte| *byte == b'\n') {
            let start = offset;
            offset += line.len();
            let complete = line.ends_with(b"\n");
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // Also rejects invalid UTF-8, which a crash can leave inside the last line.
            match serde_json::from_slice::<JournalEntry>(line) {
                Ok(entry) => {
                    replica.apply(entry);
                    entries += 1;
                }
                Err(err) if !complete => {
                    warn!(
                        event = events::JOURNAL_FILE_TORN_TAIL,
                        component = COMPONENT,
                        path = %path.display(),
                        err = %err,
                        "dropping incomplete trailing journal entry"
                    );
                    torn_at = Some(start);
                }
                Err(err) => return Err(codec_error(err)),
            }
        }

        if let Some(valid_len) = torn_at {
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(valid_len as u64).await?;
        }
        let mut file = open_append(&path).await?;
        if torn_at.is_none() && !contents.is_empty() && !contents.ends_with(b"\n") {
            file.write_all(b"\n").await?;
        }

        debug!(
            event = events::JOURNAL_FILE_OPEN,
            component = COMPONENT,
            path = %path.display(),
            entries,
            addresses = replica.committed.len(),
            prepared = replica.prepared.len(),
            "opened duplicate-id journal"
        );

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                replica,
                entries,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the file, including superseded ones.
    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.entries
    }

    /// Rewrites the file with only the entries that still describe live state.
    pub async fn compact(&self) -> Result<(), JournalError> {
        let mut inner = self.inner.lock().await;
        let live = inner.replica.live_entries();

        let mut buffer = Vec::new();
        for entry in &live {
            buffer.extend(encode(entry)?);
        }

        let staging = self.path.with_extension("compacting");
        tokio::fs::write(&staging, &buffer).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        inner.file = open_append(&self.path).await?;

        debug!(
            event = events::JOURNAL_FILE_COMPACTED,
            component = COMPONENT,
            path = %self.path.display(),
            before = inner.entries,
            after = live.len(),
            "compacted duplicate-id journal"
        );
        inner.entries = live.len();
        Ok(())
    }

    async fn write(&self, entry: JournalEntry) -> Result<(), JournalError> {
        let line = encode(&entry)?;
        let mut inner = self.inner.lock().await;
        inner.file.write_all(&line).await?;
        inner.file.sync_data().await?;
        inner.replica.apply(entry);
        inner.entries += 1;
        Ok(())
    }
}

#[async_trait]
impl DuplicateIdJournal for FileDuplicateIdJournal {
    async fn append_duplicate_record(
        &self,
        record: &DuplicateIdRecord,
    ) -> Result<(), JournalError> {
        self.write(JournalEntry::Add {
            record: record.clone(),
        })
        .await
    }

    async fn prune_duplicate_record(
        &self,
        address: &Address,
        sequence: u64,
    ) -> Result<(), JournalError> {
        self.write(JournalEntry::Prune {
            address: address.clone(),
            sequence,
        })
        .await
    }

    async fn duplicate_addresses(&self) -> Result<Vec<Address>, JournalError> {
        let inner = self.inner.lock().await;
        Ok(inner.replica.committed.keys().cloned().collect())
    }

    async fn load_duplicate_records(
        &self,
        address: &Address,
    ) -> Result<Vec<DuplicateIdRecord>, JournalError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .replica
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
        self.write(JournalEntry::Prepare {
            xid: xid.clone(),
            record: record.clone(),
        })
        .await
    }

    async fn delete_prepared_duplicates(&self, xid: &Xid) -> Result<(), JournalError> {
        self.write(JournalEntry::Resolve { xid: xid.clone() }).await
    }

    async fn load_prepared_duplicates(&self) -> Result<Vec<PreparedDuplicateRecord>, JournalError> {
        let inner = self.inner.lock().await;
        let mut prepared: Vec<PreparedDuplicateRecord> = inner
            .replica
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
