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
use crate::queue::Queue;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BindingKind {
    /// A queue hosted by this broker.
    LocalQueue,
    /// A proxy for a queue on another node; eligible for redistribution.
    RemoteQueue,
    /// Broker-internal queue, e.g. a management notification sink.
    System,
}

///
/// [`Binding`] ties one queue to one address pattern.
///
/// The binding name defaults to the queue name, and the routing name (shared by the local and
/// remote bindings of one logical subscription) defaults to the binding name.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use postoffice::{Binding, BindingKind, MessageReference, Queue, QueueError};
/// use std::sync::Arc;
///
/// struct Sink;
///
/// #[async_trait]
/// impl Queue for Sink {
///     fn name(&self) -> &str {
///         "orders-node-2"
///     }
///     async fn enqueue(&self, _reference: MessageReference) -> Result<(), QueueError> {
///         Ok(())
///     }
///     async fn withdraw(&self, _reference: &MessageReference) -> Result<(), QueueError> {
///         Ok(())
///     }
/// }
///
/// let binding = Binding::new("orders.#", Arc::new(Sink))
///     .with_kind(BindingKind::RemoteQueue)
///     .with_routing_name("orders");
///
/// assert_eq!(binding.name(), "orders-node-2");
/// assert_eq!(binding.routing_name(), "orders");
/// ```
#[derive(Clone)]
pub struct Binding {
    name: String,
    address: Address,
    routing_name: String,
    kind: BindingKind,
    queue: Arc<dyn Queue>,
}

impl Binding {
    pub fn new(address: impl Into<Address>, queue: Arc<dyn Queue>) -> Self {
        let name = queue.name().to_string();
        Self {
            routing_name: name.clone(),
            name,
            address: address.into(),
            kind: BindingKind::LocalQueue,
            queue,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_routing_name(mut self, routing_name: impl Into<String>) -> Self {
        self.routing_name = routing_name.into();
        self
    }

    pub fn with_kind(mut self, kind: BindingKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern this binding was registered under.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn routing_name(&self) -> &str {
        &self.routing_name
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("routing_name", &self.routing_name)
            .field("kind", &self.kind)
            .field("queue", &self.queue.name())
            .finish()
    }
}
