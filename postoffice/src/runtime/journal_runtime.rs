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

//! Dedicated writer thread applying asynchronous duplicate-id journal writes in order.

use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::duplicate::{DuplicateIdJournal, DuplicateIdRecord, JournalError};
use crate::observability::events;
use crate::observability::fields::{self, WorkerContext};
use crate::transaction::Xid;

pub(crate) const JOURNAL_WRITER_THREAD_NAME: &str = "postoffice-journal";
const COMPONENT: &str = "journal_writer";

#[derive(Debug)]
pub(crate) enum JournalCommand {
    Append(DuplicateIdRecord),
    Prune { address: Address, sequence: u64 },
    DeletePrepared(Xid),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable submission side of the writer thread.
#[derive(Clone)]
pub(crate) struct JournalWriterHandle {
    sender: mpsc::UnboundedSender<JournalCommand>,
}

impl JournalWriterHandle {
    /// Queues a command; a stopped writer is logged and reported.
    pub(crate) fn submit(&self, command: JournalCommand) -> Result<(), JournalError> {
        self.sender.send(command).map_err(|rejected| {
            warn!(
                event = events::JOURNAL_SUBMIT_FAILED,
                component = COMPONENT,
                command = ?rejected.0,
                reason = fields::REASON_CHANNEL_CLOSED,
                "journal writer stopped; command dropped"
            );
            JournalError::Unavailable("journal writer stopped".to_string())
        })
    }

    /// Resolves once every command submitted before it has been applied.
    pub(crate) async fn flush(&self) -> Result<(), JournalError> {
        let (done, applied) = oneshot::channel();
        self.submit(JournalCommand::Flush(done))?;
        applied
            .await
            .map_err(|_| JournalError::Unavailable("journal writer stopped".to_string()))
    }
}

/// Owns the writer thread; dropping it leaves the thread to drain and exit.
pub(crate) struct JournalWriter {
    handle: JournalWriterHandle,
    worker_thread: String,
    join: Option<thread::JoinHandle<()>>,
}

impl JournalWriter {
    /// Starts a current-thread runtime on its own OS thread draining the command channel.
    pub(crate) fn spawn(journal: Arc<dyn DuplicateIdJournal>) -> Result<Self, JournalError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_id = uuid::Uuid::new_v4().to_string();

        let join = thread::Builder::new()
            .name(JOURNAL_WRITER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(write_loop(worker_id, journal, receiver)))
            .map_err(|err| {
                warn!(
                    event = events::RUNTIME_SPAWN_FAILED,
                    component = COMPONENT,
                    worker_thread = JOURNAL_WRITER_THREAD_NAME,
                    err = %err,
                    "failed to spawn journal writer thread"
                );
                JournalError::Io(err)
            })?;

        info!(
            event = events::RUNTIME_SPAWN_OK,
            component = COMPONENT,
            worker_thread = JOURNAL_WRITER_THREAD_NAME,
            "journal writer thread started"
        );

        Ok(Self {
            handle: JournalWriterHandle { sender },
            worker_thread: JOURNAL_WRITER_THREAD_NAME.to_string(),
            join: Some(join),
        })
    }

    pub(crate) fn handle(&self) -> JournalWriterHandle {
        self.handle.clone()
    }

    pub(crate) fn worker_thread(&self) -> &str {
        &self.worker_thread
    }

    /// Drains queued commands, then stops the thread and waits for it to exit.
    pub(crate) async fn shutdown(mut self) {
        if self.handle.flush().await.is_err() {
            return;
        }
        if self.handle.submit(JournalCommand::Shutdown).is_err() {
            return;
        }
        if let Some(join) = self.join.take() {
            let _ = tokio::task::spawn_blocking(move || join.join()).await;
        }
    }
}

async fn write_loop(
    worker_id: String,
    journal: Arc<dyn DuplicateIdJournal>,
    mut receiver: mpsc::UnboundedReceiver<JournalCommand>,
) {
    let worker = WorkerContext::with_current_thread(worker_id);

    while let Some(command) = receiver.recv().await {
        match command {
            JournalCommand::Append(record) => {
                if let Err(err) = journal.append_duplicate_record(&record).await {
                    write_failed(&worker, "append", &record.address, record.sequence, &err);
                }
            }
            JournalCommand::Prune { address, sequence } => {
                if let Err(err) = journal.prune_duplicate_record(&address, sequence).await {
                    write_failed(&worker, "prune", &address, sequence, &err);
                }
            }
            JournalCommand::DeletePrepared(xid) => {
                if let Err(err) = journal.delete_prepared_duplicates(&xid).await {
                    warn!(
                        event = events::JOURNAL_WRITE_FAILED,
                        component = COMPONENT,
                        worker_id = worker.worker_id.as_str(),
                        worker_thread = worker.worker_thread.as_str(),
                        operation = "delete_prepared",
                        xid = %xid,
                        err = %err,
                        "failed to delete prepared duplicate records"
                    );
                }
            }
            JournalCommand::Flush(done) => {
                let _ = done.send(());
            }
            JournalCommand::Shutdown => break,
        }
    }

    debug!(
        event = events::JOURNAL_RECV_CLOSED,
        component = COMPONENT,
        worker_id = worker.worker_id.as_str(),
        worker_thread = worker.worker_thread.as_str(),
        "journal writer loop finished"
    );
}

fn write_failed(
    worker: &WorkerContext,
    operation: &'static str,
    address: &Address,
    sequence: u64,
    err: &JournalError,
) {
    warn!(
        event = events::JOURNAL_WRITE_FAILED,
        component = COMPONENT,
        worker_id = worker.worker_id.as_str(),
        worker_thread = worker.worker_thread.as_str(),
        operation,
        address = %address,
        sequence,
        err = %err,
        "duplicate-id journal write failed; entry remains memory-only"
    );
}

#[cfg(test)]
mod tests {
    use super::{JournalCommand, JournalWriter, JOURNAL_WRITER_THREAD_NAME};
    use crate::duplicate::{DuplicateIdRecord, InMemoryDuplicateIdJournal};
    use crate::Address;
    use std::sync::Arc;

    #[tokio::test]
    async fn commands_apply_in_submission_order() {
        let journal = Arc::new(InMemoryDuplicateIdJournal::new());
        let writer = JournalWriter::spawn(journal.clone()).expect("writer should start");
        let handle = writer.handle();
        let address = Address::new("orders");

        handle
            .submit(JournalCommand::Append(DuplicateIdRecord {
                address: address.clone(),
                sequence: 1,
                duplicate_id: b"x".to_vec(),
            }))
            .unwrap();
        handle
            .submit(JournalCommand::Prune {
                address: address.clone(),
                sequence: 1,
            })
            .unwrap();
        handle.flush().await.unwrap();

        assert_eq!(journal.record_count(&address), 0);
        assert_eq!(writer.worker_thread(), JOURNAL_WRITER_THREAD_NAME);
        writer.shutdown().await;
    }

    #[tokio::test]
    async fn submissions_after_shutdown_fail() {
        let writer = JournalWriter::spawn(Arc::new(InMemoryDuplicateIdJournal::new())).unwrap();
        let handle = writer.handle();
        writer.shutdown().await;

        assert!(handle.flush().await.is_err());
    }
}
