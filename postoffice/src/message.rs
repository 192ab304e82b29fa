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

use crate::address::Address;
use std::sync::Arc;

/// Inbound message as seen by the routing engine.
///
/// Only the routing-relevant attributes are modelled; the body is carried opaquely.
///
/// ```
/// use postoffice::{Address, ServerMessage};
///
/// let message = ServerMessage::new(7, "orders").with_duplicate_id(b"order-7".to_vec());
/// assert_eq!(message.address(), &Address::new("orders"));
/// assert_eq!(message.duplicate_id(), Some(&b"order-7"[..]));
/// ```
#[derive(Clone, Debug)]
pub struct ServerMessage {
    id: u64,
    address: Address,
    duplicate_id: Option<Arc<[u8]>>,
    durable: bool,
    body: Arc<[u8]>,
}

impl ServerMessage {
    pub fn new(id: u64, address: impl Into<Address>) -> Self {
        Self {
            id,
            address: address.into(),
            duplicate_id: None,
            durable: true,
            body: Arc::from(Vec::new()),
        }
    }

    /// Attaches the duplicate-detection identifier header.
    pub fn with_duplicate_id(mut self, duplicate_id: impl Into<Vec<u8>>) -> Self {
        self.duplicate_id = Some(Arc::from(duplicate_id.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Arc::from(body.into());
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn duplicate_id(&self) -> Option<&[u8]> {
        self.duplicate_id.as_deref()
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A message placed on one queue. Cheap to clone; the message is shared.
#[derive(Clone, Debug)]
pub struct MessageReference {
    message: Arc<ServerMessage>,
    queue: String,
}

impl MessageReference {
    pub(crate) fn new(message: Arc<ServerMessage>, queue: impl Into<String>) -> Self {
        Self {
            message,
            queue: queue.into(),
        }
    }

    pub fn message(&self) -> &Arc<ServerMessage> {
        &self.message
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn message_id(&self) -> u64 {
        self.message.id()
    }
}
