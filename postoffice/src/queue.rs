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

//! Queue contract consumed by the routing engine.

use crate::message::MessageReference;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum QueueError {
    /// Flow control refused the reference (paging full, blocking disabled).
    #[error("queue is full")]
    Full,
    #[error("queue has been deleted")]
    Deleted,
}

///
/// [`Queue`] is the narrow surface the post office needs from a queue: accept a reference,
/// and withdraw one it accepted when the enclosing routing call has to be undone.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use postoffice::{MessageReference, Queue, QueueError};
/// use std::sync::Mutex;
///
/// struct VecQueue {
///     name: String,
///     refs: Mutex<Vec<u64>>,
/// }
///
/// #[async_trait]
/// impl Queue for VecQueue {
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     async fn enqueue(&self, reference: MessageReference) -> Result<(), QueueError> {
///         self.refs.lock().unwrap().push(reference.message_id());
///         Ok(())
///     }
///
///     async fn withdraw(&self, reference: &MessageReference) -> Result<(), QueueError> {
///         self.refs
///             .lock()
///             .unwrap()
///             .retain(|id| *id != reference.message_id());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Queue: Send + Sync {
    /// Broker-unique queue name.
    fn name(&self) -> &str;

    async fn enqueue(&self, reference: MessageReference) -> Result<(), QueueError>;

    /// Removes a reference previously accepted by [`Queue::enqueue`].
    async fn withdraw(&self, reference: &MessageReference) -> Result<(), QueueError>;
}
