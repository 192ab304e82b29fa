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
use parking_lot::Mutex;
use postoffice::{MessageReference, Queue, QueueError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Queue that keeps every accepted reference and can be switched to refuse new ones.
pub struct RecordingQueue {
    name: String,
    message_store: Mutex<Vec<MessageReference>>,
    rejecting: AtomicBool,
}

impl RecordingQueue {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            message_store: Mutex::new(Vec::with_capacity(64)),
            rejecting: AtomicBool::new(false),
        })
    }

    /// While set, `enqueue` fails with [`QueueError::Full`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn message_ids(&self) -> Vec<u64> {
        self.message_store
            .lock()
            .iter()
            .map(MessageReference::message_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.message_store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Queue for RecordingQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, reference: MessageReference) -> Result<(), QueueError> {
        if self.rejecting.load(Ordering::SeqCst) {
            debug!("{}: refusing message {}", self.name, reference.message_id());
            return Err(QueueError::Full);
        }
        debug!("{}: accepted message {}", self.name, reference.message_id());
        self.message_store.lock().push(reference);
        Ok(())
    }

    async fn withdraw(&self, reference: &MessageReference) -> Result<(), QueueError> {
        debug!("{}: withdrawing message {}", self.name, reference.message_id());
        self.message_store
            .lock()
            .retain(|stored| stored.message_id() != reference.message_id());
        Ok(())
    }
}
