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

//! # postoffice
//!
//! `postoffice` is the message-routing core of a broker: it decides which queues receive an
//! inbound message, rejects messages whose duplicate-detection id was already seen on their
//! address, and keeps both decisions consistent with local and XA transactions.
//!
//! Typical usage is API-first and centered on [`PostOffice`], [`Binding`] and [`Transaction`].
//! Queues and the durable duplicate-id log are collaborators supplied by the embedding broker
//! through the [`Queue`] and [`DuplicateIdJournal`] traits.
//!
//! ## Transactional routing
//!
//! ```
//! use async_trait::async_trait;
//! use postoffice::{
//!     Binding, InMemoryDuplicateIdJournal, MessageReference, PostOffice, PostOfficeConfig,
//!     Queue, QueueError, ServerMessage, Transaction,
//! };
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct CountingQueue(AtomicUsize);
//!
//! #[async_trait]
//! impl Queue for CountingQueue {
//!     fn name(&self) -> &str {
//!         "orders-q"
//!     }
//!     async fn enqueue(&self, _reference: MessageReference) -> Result<(), QueueError> {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//!     async fn withdraw(&self, _reference: &MessageReference) -> Result<(), QueueError> {
//!         self.0.fetch_sub(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let journal = Arc::new(InMemoryDuplicateIdJournal::new());
//! let post_office = PostOffice::start(PostOfficeConfig::default(), journal)
//!     .await
//!     .unwrap();
//! let queue = Arc::new(CountingQueue::default());
//! post_office
//!     .add_binding(Binding::new("orders.#", queue.clone()))
//!     .unwrap();
//!
//! let tx = Transaction::new();
//! let message = ServerMessage::new(1, "orders.eu").with_duplicate_id(b"order-1".to_vec());
//! post_office.route(message, Some(&tx), true).await.unwrap();
//! assert_eq!(queue.0.load(Ordering::SeqCst), 0);
//!
//! tx.commit().await.unwrap();
//! assert_eq!(queue.0.load(Ordering::SeqCst), 1);
//!
//! let retry = ServerMessage::new(2, "orders.eu").with_duplicate_id(b"order-1".to_vec());
//! assert!(post_office.route_direct(retry).await.unwrap_err().is_duplicate());
//! post_office.stop().await;
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`PostOffice`] routing, rerouting and redistribution
//! - Bindings: address patterns, wildcard matching and the snapshot registry
//! - Duplicate detection: per-address id caches and the journal contract
//! - Routing: per-call routing context and its transaction hooks
//! - Transactions: local and XA transactions, prepared-branch recovery
//! - Runtime: the journal writer thread boundary
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber. Binaries and tests
//! are responsible for one-time `tracing_subscriber` initialization at process boundaries.

mod address;
pub use address::{Address, ANY_WORDS_WILDCARD, DELIMITER, SINGLE_WORD_WILDCARD};

mod binding;
pub use binding::{AddressPattern, Binding, BindingKind, BindingRegistry, Bindings};

mod config;
pub use config::{ConfigError, IdCachePersistence, PostOfficeConfig};

mod duplicate;
pub use duplicate::{
    DuplicateIdCache, DuplicateIdJournal, DuplicateIdRecord, InMemoryDuplicateIdJournal,
    JournalError, PreparedDuplicateRecord, StageOutcome, StageOwner, StagedDuplicate,
};

mod error;
pub use error::RoutingError;

mod message;
pub use message::{MessageReference, ServerMessage};

mod notification;
pub use notification::Notification;

#[doc(hidden)]
pub mod observability;

mod post_office;
pub use post_office::{PostOffice, RoutingOutcome};

mod queue;
pub use queue::{Queue, QueueError};

mod routing;
pub use routing::{RouteDecision, RoutingContext};

mod runtime;

mod transaction;
pub use transaction::{
    ResourceManager, Transaction, TransactionError, TransactionOperation, TransactionState, Xid,
};
