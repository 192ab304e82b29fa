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

//! Routing facade tying bindings, duplicate detection and transactions together.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::binding::{Binding, BindingKind, BindingRegistry, Bindings};
use crate::config::PostOfficeConfig;
use crate::duplicate::persistence::DuplicatePersistence;
use crate::duplicate::{
    DuplicateIdCache, DuplicateIdJournal, DuplicateIdRecord, StageOutcome, StageOwner,
};
use crate::error::RoutingError;
use crate::message::ServerMessage;
use crate::notification::{Notification, NotificationSender};
use crate::observability::events;
use crate::observability::fields;
use crate::routing::routing_operation::RoutingOperation;
use crate::routing::{RouteDecision, RoutingContext};
use crate::runtime::journal_runtime::JournalWriter;
use crate::transaction::{ResourceManager, Transaction, Xid};

const COMPONENT: &str = "post_office";

/// What one routing call did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoutingOutcome {
    /// Queues that received (or will receive at commit) the message.
    pub queues: Vec<String>,
    /// The message's duplicate id was staged by this call.
    pub duplicate_id_staged: bool,
    /// The message was a duplicate but routed anyway because rejection was off.
    pub duplicate_accepted: bool,
}

///
/// [`PostOffice`] routes messages to the queues bound to their address.
///
/// One routing call checks the duplicate-id cache of the message's address, resolves the
/// bindings, stages the identifier and applies the result: immediately for a
/// non-transactional send, otherwise through hooks registered on the transaction.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use postoffice::{
///     Binding, MessageReference, PostOffice, PostOfficeConfig, Queue, QueueError, ServerMessage,
/// };
/// use std::sync::Arc;
///
/// struct Discard;
///
/// #[async_trait]
/// impl Queue for Discard {
///     fn name(&self) -> &str {
///         "q1"
///     }
///     async fn enqueue(&self, _reference: MessageReference) -> Result<(), QueueError> {
///         Ok(())
///     }
///     async fn withdraw(&self, _reference: &MessageReference) -> Result<(), QueueError> {
///         Ok(())
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let post_office = PostOffice::new(PostOfficeConfig::default());
/// post_office.add_binding(Binding::new("orders", Arc::new(Discard))).unwrap();
///
/// let message = ServerMessage::new(1, "orders").with_duplicate_id(b"X".to_vec());
/// let outcome = post_office.route_direct(message.clone()).await.unwrap();
/// assert_eq!(outcome.queues, vec!["q1"]);
///
/// let again = post_office.route_direct(message).await;
/// assert!(again.unwrap_err().is_duplicate());
/// # });
/// ```
pub struct PostOffice {
    config: PostOfficeConfig,
    bindings: BindingRegistry,
    duplicate_caches: DashMap<Address, Arc<DuplicateIdCache>>,
    persistence: Option<DuplicatePersistence>,
    journal_writer: Mutex<Option<JournalWriter>>,
    resource_manager: ResourceManager,
    notifications: NotificationSender,
    next_direct_owner: AtomicU64,
}

impl PostOffice {
    /// Builds a memory-only post office; duplicate ids are not persisted.
    pub fn new(config: PostOfficeConfig) -> Self {
        Self::assemble(config, None, None)
    }

    fn assemble(
        config: PostOfficeConfig,
        persistence: Option<DuplicatePersistence>,
        journal_writer: Option<JournalWriter>,
    ) -> Self {
        Self {
            notifications: NotificationSender::new(config.notification_queue_size),
            config,
            bindings: BindingRegistry::new(),
            duplicate_caches: DashMap::new(),
            persistence,
            journal_writer: Mutex::new(journal_writer),
            resource_manager: ResourceManager::new(),
            next_direct_owner: AtomicU64::new(1),
        }
    }

    /// Starts a post office backed by `journal`.
    ///
    /// With persistence on and detection enabled this reloads every address's duplicate ids
    /// (keeping the newest `id_cache_size`, pruning the rest), recovers prepared XA branches
    /// into the [`ResourceManager`] and starts the journal writer thread. Otherwise the journal
    /// is left untouched.
    pub async fn start(
        config: PostOfficeConfig,
        journal: Arc<dyn DuplicateIdJournal>,
    ) -> Result<Self, RoutingError> {
        if !config.persist_id_cache || !config.duplicate_detection_enabled() {
            info!(
                event = events::POST_OFFICE_START,
                component = COMPONENT,
                persistent = false,
                id_cache_size = config.id_cache_size,
                "post office started without duplicate-id persistence"
            );
            return Ok(Self::new(config));
        }

        let writer = JournalWriter::spawn(journal.clone())?;
        let persistence = DuplicatePersistence::new(
            journal.clone(),
            writer.handle(),
            config.id_cache_persistence,
        );
        let post_office = Self::assemble(config, Some(persistence), Some(writer));

        for address in journal.duplicate_addresses().await? {
            let records = journal.load_duplicate_records(&address).await?;
            post_office
                .duplicate_id_cache(&address)
                .load(records)
                .await?;
        }

        let recovered = post_office.recover_prepared(journal.as_ref()).await?;

        info!(
            event = events::POST_OFFICE_START,
            component = COMPONENT,
            persistent = true,
            id_cache_size = post_office.config.id_cache_size,
            persistence = ?post_office.config.id_cache_persistence,
            addresses = post_office.duplicate_caches.len(),
            recovered_transactions = recovered,
            "post office started"
        );
        Ok(post_office)
    }

    async fn recover_prepared(
        &self,
        journal: &dyn DuplicateIdJournal,
    ) -> Result<usize, RoutingError> {
        let mut by_xid: HashMap<Xid, Vec<DuplicateIdRecord>> = HashMap::new();
        for prepared in journal.load_prepared_duplicates().await? {
            by_xid.entry(prepared.xid).or_default().push(prepared.record);
        }

        let recovered = by_xid.len();
        for (xid, records) in by_xid {
            let tx = Arc::new(Transaction::recovered(xid.clone()));
            for record in records {
                let cache = self.duplicate_id_cache(&record.address);
                let message = Arc::new(
                    ServerMessage::new(0, record.address.clone())
                        .with_duplicate_id(record.duplicate_id.clone()),
                );
                let staged = cache.recover_pending(record, StageOwner::Transaction(tx.id()));
                let mut context = RoutingContext::new(message);
                context.set_duplicate_stage(cache, staged);
                tx.add_recovered_operation(Arc::new(RoutingOperation::recovered(context)));
            }

            info!(
                event = events::TX_RECOVERED,
                component = COMPONENT,
                tx_id = tx.id(),
                xid = %xid,
                operations = tx.operation_count(),
                "prepared transaction recovered"
            );
            self.resource_manager.put_prepared(tx)?;
        }
        Ok(recovered)
    }

    /// Waits until every journal write queued so far has been applied.
    pub async fn flush_journal(&self) -> Result<(), RoutingError> {
        let writer = self.journal_writer.lock().await;
        if let Some(writer) = writer.as_ref() {
            writer.handle().flush().await?;
        }
        Ok(())
    }

    /// Drains and stops the journal writer. Later journal writes are dropped and logged.
    pub async fn stop(&self) {
        let writer = self.journal_writer.lock().await.take();
        if let Some(writer) = writer {
            debug!(
                event = events::POST_OFFICE_STOP,
                component = COMPONENT,
                worker_thread = writer.worker_thread(),
                "stopping journal writer"
            );
            writer.shutdown().await;
        }
        info!(
            event = events::POST_OFFICE_STOP,
            component = COMPONENT,
            "post office stopped"
        );
    }

    pub fn config(&self) -> &PostOfficeConfig {
        &self.config
    }

    pub fn resource_manager(&self) -> &ResourceManager {
        &self.resource_manager
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn add_binding(&self, binding: Binding) -> Result<Arc<Binding>, RoutingError> {
        let binding = self.bindings.add_binding(binding)?;
        self.notifications.send(Notification::BindingAdded {
            name: binding.name().to_string(),
            address: binding.address().clone(),
            queue: binding.queue().name().to_string(),
        });
        Ok(binding)
    }

    pub fn remove_binding(&self, name: &str) -> Result<Arc<Binding>, RoutingError> {
        let binding = self.bindings.remove_binding(name)?;
        self.notifications.send(Notification::BindingRemoved {
            name: binding.name().to_string(),
            address: binding.address().clone(),
        });
        Ok(binding)
    }

    pub fn get_binding(&self, name: &str) -> Option<Arc<Binding>> {
        self.bindings.get_binding(name)
    }

    pub fn get_bindings_for_address(
        &self,
        address: &Address,
        create_if_absent: bool,
    ) -> Option<Arc<Bindings>> {
        self.bindings.get_bindings_for_address(address, create_if_absent)
    }

    pub fn lookup_bindings_for_address(&self, address: &Address) -> Option<Arc<Bindings>> {
        self.bindings.lookup_bindings_for_address(address)
    }

    pub fn get_matching_bindings(&self, address: &Address) -> Bindings {
        self.bindings.get_matching_bindings(address)
    }

    /// The duplicate-id cache of `address`, created on first use.
    pub fn duplicate_id_cache(&self, address: &Address) -> Arc<DuplicateIdCache> {
        if let Some(cache) = self.duplicate_caches.get(address) {
            return cache.clone();
        }
        self.duplicate_caches
            .entry(address.clone())
            .or_insert_with(|| {
                debug!(
                    event = events::DUPLICATE_CACHE_CREATE,
                    component = COMPONENT,
                    address = %address,
                    capacity = self.config.id_cache_capacity(),
                    "duplicate id cache created"
                );
                Arc::new(DuplicateIdCache::with_persistence(
                    address.clone(),
                    self.config.id_cache_capacity(),
                    self.persistence.clone(),
                ))
            })
            .clone()
    }

    /// Non-transactional send that rejects duplicates.
    pub async fn route_direct(
        &self,
        message: ServerMessage,
    ) -> Result<RoutingOutcome, RoutingError> {
        self.route(message, None, true).await
    }

    /// Routes `message` to every binding matching its address.
    ///
    /// A visible duplicate id fails the call with [`RoutingError::DuplicateMessage`] before any
    /// binding is resolved when `reject_duplicates` is set; otherwise the message is routed
    /// without staging its identifier again. With `tx` the enqueues and the identifier take
    /// effect when the transaction commits.
    pub async fn route(
        &self,
        message: ServerMessage,
        tx: Option<&Arc<Transaction>>,
        reject_duplicates: bool,
    ) -> Result<RoutingOutcome, RoutingError> {
        let message = Arc::new(message);
        let tx_id = fields::format_tx_id(tx.map(|tx| tx.as_ref()));
        debug!(
            event = events::ROUTE_START,
            component = COMPONENT,
            msg_id = message.id(),
            address = %message.address(),
            tx_id = tx_id.as_str(),
            "routing message"
        );

        let mut outcome = RoutingOutcome::default();
        let mut context = RoutingContext::new(message.clone());

        let duplicate_cache = match message.duplicate_id() {
            Some(duplicate_id) if self.config.duplicate_detection_enabled() => {
                let cache = self.duplicate_id_cache(message.address());
                if cache.check_duplicate(duplicate_id) {
                    if reject_duplicates {
                        return Err(self.reject_duplicate(&message, duplicate_id, &tx_id));
                    }
                    self.accept_duplicate(&message, duplicate_id, &tx_id);
                    outcome.duplicate_accepted = true;
                    None
                } else {
                    Some(cache)
                }
            }
            _ => None,
        };

        let bindings = self
            .bindings
            .get_bindings_for_address(message.address(), true)
            .unwrap_or_else(|| Arc::new(Bindings::empty(message.address().clone())));
        for binding in bindings.iter() {
            context.add_queue_target(binding.queue().clone(), RouteDecision::Route)?;
        }
        if bindings.is_empty() {
            debug!(
                event = events::ROUTE_NO_BINDINGS,
                component = COMPONENT,
                msg_id = message.id(),
                address = %message.address(),
                "no bindings for address"
            );
        }

        if let (Some(cache), Some(duplicate_id)) = (duplicate_cache, message.duplicate_id()) {
            let owner = match tx {
                Some(tx) => StageOwner::Transaction(tx.id()),
                None => {
                    StageOwner::Direct(self.next_direct_owner.fetch_add(1, Ordering::Relaxed))
                }
            };
            match cache.stage_add_if_absent(duplicate_id, owner).await {
                StageOutcome::Staged(staged) => {
                    context.set_duplicate_stage(cache, staged);
                    outcome.duplicate_id_staged = true;
                }
                StageOutcome::Duplicate if reject_duplicates => {
                    return Err(self.reject_duplicate(&message, duplicate_id, &tx_id));
                }
                StageOutcome::Duplicate => {
                    self.accept_duplicate(&message, duplicate_id, &tx_id);
                    outcome.duplicate_accepted = true;
                }
                StageOutcome::AlreadyStaged | StageOutcome::Disabled => {}
            }
        }

        outcome.queues = context.routed_queues();
        self.dispatch(context, tx, &tx_id).await?;
        Ok(outcome)
    }

    /// Routes `message` to the queue of one named binding, skipping duplicate detection.
    pub async fn reroute(
        &self,
        message: Arc<ServerMessage>,
        queue_name: &str,
        tx: Option<&Arc<Transaction>>,
    ) -> Result<RoutingOutcome, RoutingError> {
        let binding = self
            .bindings
            .get_binding(queue_name)
            .ok_or_else(|| RoutingError::BindingNotFound(queue_name.to_string()))?;
        let tx_id = fields::format_tx_id(tx.map(|tx| tx.as_ref()));

        let mut context = RoutingContext::new(message.clone());
        context.add_queue_target(binding.queue().clone(), RouteDecision::Route)?;
        let queues = context.routed_queues();
        self.dispatch(context, tx, &tx_id).await?;

        debug!(
            event = events::REROUTE_OK,
            component = COMPONENT,
            msg_id = message.id(),
            queue = queue_name,
            tx_id = tx_id.as_str(),
            "message rerouted"
        );
        Ok(RoutingOutcome {
            queues,
            ..RoutingOutcome::default()
        })
    }

    /// Forwards a message held by `originating_queue` to a remote binding of the same
    /// subscription.
    ///
    /// The first [`BindingKind::RemoteQueue`] binding on the message's address sharing the
    /// originating binding's routing name is chosen. Returns the target queue name, or `None`
    /// when no such binding exists. Duplicate detection is not repeated.
    pub async fn redistribute(
        &self,
        message: Arc<ServerMessage>,
        originating_queue: &str,
        tx: Option<&Arc<Transaction>>,
    ) -> Result<Option<String>, RoutingError> {
        let origin = self
            .bindings
            .get_binding(originating_queue)
            .ok_or_else(|| RoutingError::BindingNotFound(originating_queue.to_string()))?;

        let target = self
            .bindings
            .lookup_bindings_for_address(message.address())
            .and_then(|bindings| {
                bindings
                    .iter()
                    .find(|binding| {
                        binding.kind() == BindingKind::RemoteQueue
                            && binding.routing_name() == origin.routing_name()
                            && binding.name() != origin.name()
                    })
                    .cloned()
            });

        let Some(target) = target else {
            debug!(
                event = events::REDISTRIBUTE_NO_TARGET,
                component = COMPONENT,
                msg_id = message.id(),
                queue = originating_queue,
                "no remote binding to redistribute to"
            );
            return Ok(None);
        };

        let tx_id = fields::format_tx_id(tx.map(|tx| tx.as_ref()));
        let mut context = RoutingContext::new(message.clone());
        context.add_queue_target(origin.queue().clone(), RouteDecision::Ignore)?;
        context.add_queue_target(target.queue().clone(), RouteDecision::Route)?;
        self.dispatch(context, tx, &tx_id).await?;

        info!(
            event = events::REDISTRIBUTE_OK,
            component = COMPONENT,
            msg_id = message.id(),
            queue = originating_queue,
            binding = target.name(),
            tx_id = tx_id.as_str(),
            "message redistributed"
        );
        Ok(Some(target.queue().name().to_string()))
    }

    async fn dispatch(
        &self,
        context: RoutingContext,
        tx: Option<&Arc<Transaction>>,
        tx_id: &str,
    ) -> Result<(), RoutingError> {
        let msg_id = context.message().id();
        let address = context.message().address().clone();

        let Some(tx) = tx else {
            return match context.apply().await {
                Ok(queues) => {
                    debug!(
                        event = events::ROUTE_OK,
                        component = COMPONENT,
                        msg_id,
                        address = %address,
                        queues = queues.len(),
                        "message routed"
                    );
                    Ok(())
                }
                Err(err) => {
                    warn!(
                        event = events::ROUTE_FAILED,
                        component = COMPONENT,
                        msg_id,
                        address = %address,
                        tx_id,
                        err = %err,
                        "routing failed; enqueues withdrawn and duplicate id discarded"
                    );
                    Err(err)
                }
            };
        };

        let stage = context.stage().cloned();
        if let Err(err) = tx.add_operation(Arc::new(RoutingOperation::new(context))) {
            if let Some(stage) = stage {
                stage.cache.rollback(&stage.staged);
            }
            warn!(
                event = events::ROUTE_FAILED,
                component = COMPONENT,
                msg_id,
                address = %address,
                tx_id,
                err = %err,
                "transaction no longer accepts routing"
            );
            return Err(err.into());
        }
        Ok(())
    }

    fn reject_duplicate(
        &self,
        message: &ServerMessage,
        duplicate_id: &[u8],
        tx_id: &str,
    ) -> RoutingError {
        let rendered = fields::format_duplicate_id(duplicate_id);
        warn!(
            event = events::ROUTE_DUPLICATE_REJECTED,
            component = COMPONENT,
            msg_id = message.id(),
            address = %message.address(),
            duplicate_id = rendered.as_str(),
            tx_id,
            "duplicate message rejected"
        );
        self.notifications.send(Notification::DuplicateMessageRejected {
            address: message.address().clone(),
            duplicate_id: duplicate_id.to_vec(),
            message_id: message.id(),
        });
        RoutingError::DuplicateMessage {
            address: message.address().clone(),
            duplicate_id: rendered,
        }
    }

    fn accept_duplicate(&self, message: &ServerMessage, duplicate_id: &[u8], tx_id: &str) {
        debug!(
            event = events::ROUTE_DUPLICATE_ACCEPTED,
            component = COMPONENT,
            msg_id = message.id(),
            address = %message.address(),
            duplicate_id = %fields::format_duplicate_id(duplicate_id),
            tx_id,
            "duplicate routed without re-staging its id"
        );
    }
}
