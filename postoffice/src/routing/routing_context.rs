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

//! Per-call accumulator of queue targets and the pending duplicate-id stage.

use std::sync::Arc;
use tracing::warn;

use crate::duplicate::{DuplicateIdCache, StagedDuplicate};
use crate::error::RoutingError;
use crate::message::{MessageReference, ServerMessage};
use crate::observability::events;
use crate::queue::Queue;

const COMPONENT: &str = "routing_context";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteDecision {
    Route,
    /// The queue already holds the message, e.g. the origin of a redistribution.
    Ignore,
}

/// A staged identifier together with the cache that must resolve it.
#[derive(Clone)]
pub(crate) struct DuplicateStage {
    pub(crate) cache: Arc<DuplicateIdCache>,
    pub(crate) staged: StagedDuplicate,
}

pub(crate) type Enqueued = Vec<(Arc<dyn Queue>, MessageReference)>;

///
/// [`RoutingContext`] collects the outcome of resolving one message: at most one decision per
/// queue and at most one duplicate-id stage.
///
/// Nothing reaches a queue until the context is applied, directly for a non-transactional
/// send or from the hooks of the enclosing transaction.
pub struct RoutingContext {
    message: Arc<ServerMessage>,
    targets: Vec<(Arc<dyn Queue>, RouteDecision)>,
    duplicate_stage: Option<DuplicateStage>,
}

impl RoutingContext {
    pub fn new(message: Arc<ServerMessage>) -> Self {
        Self {
            message,
            targets: Vec::new(),
            duplicate_stage: None,
        }
    }

    pub fn message(&self) -> &Arc<ServerMessage> {
        &self.message
    }

    /// Records the decision for `queue`; each queue may be targeted once per call.
    pub fn add_queue_target(
        &mut self,
        queue: Arc<dyn Queue>,
        decision: RouteDecision,
    ) -> Result<(), RoutingError> {
        if self
            .targets
            .iter()
            .any(|(existing, _)| existing.name() == queue.name())
        {
            return Err(RoutingError::DuplicateTarget(queue.name().to_string()));
        }
        self.targets.push((queue, decision));
        Ok(())
    }

    /// Records the single duplicate-id stage of this call, returning any stage it replaces.
    pub(crate) fn set_duplicate_stage(
        &mut self,
        cache: Arc<DuplicateIdCache>,
        staged: StagedDuplicate,
    ) -> Option<StagedDuplicate> {
        self.duplicate_stage
            .replace(DuplicateStage { cache, staged })
            .map(|previous| previous.staged)
    }

    pub fn duplicate_stage(&self) -> Option<&StagedDuplicate> {
        self.duplicate_stage.as_ref().map(|stage| &stage.staged)
    }

    pub(crate) fn stage(&self) -> Option<&DuplicateStage> {
        self.duplicate_stage.as_ref()
    }

    pub(crate) fn take_duplicate_stage(&mut self) -> Option<DuplicateStage> {
        self.duplicate_stage.take()
    }

    /// Names of the queues that will receive the message.
    pub fn routed_queues(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|(_, decision)| *decision == RouteDecision::Route)
            .map(|(queue, _)| queue.name().to_string())
            .collect()
    }

    pub fn decision_for(&self, queue_name: &str) -> Option<RouteDecision> {
        self.targets
            .iter()
            .find(|(queue, _)| queue.name() == queue_name)
            .map(|(_, decision)| *decision)
    }

    /// Enqueues on every `Route` target in order, stopping at the first failure.
    ///
    /// `enqueued` receives every accepted reference so the caller can withdraw them.
    pub(crate) async fn enqueue_targets(
        &self,
        enqueued: &mut Enqueued,
    ) -> Result<(), RoutingError> {
        for (queue, decision) in &self.targets {
            if *decision == RouteDecision::Ignore {
                continue;
            }
            let reference = MessageReference::new(self.message.clone(), queue.name());
            if let Err(source) = queue.enqueue(reference.clone()).await {
                warn!(
                    event = events::ROUTE_ENQUEUE_FAILED,
                    component = COMPONENT,
                    msg_id = self.message.id(),
                    address = %self.message.address(),
                    queue = queue.name(),
                    err = %source,
                    "queue rejected message reference"
                );
                return Err(RoutingError::Queue {
                    queue: queue.name().to_string(),
                    source,
                });
            }
            enqueued.push((queue.clone(), reference));
        }
        Ok(())
    }

    /// Applies the context outside any transaction.
    ///
    /// Enqueues first, then commits the duplicate-id stage. On any failure the references
    /// already accepted are withdrawn and the stage is rolled back.
    pub(crate) async fn apply(mut self) -> Result<Vec<String>, RoutingError> {
        let stage = self.take_duplicate_stage();
        let mut enqueued = Enqueued::new();

        let result = match self.enqueue_targets(&mut enqueued).await {
            Ok(()) => match &stage {
                Some(stage) => stage
                    .cache
                    .persist_before_commit(&stage.staged)
                    .await
                    .map_err(RoutingError::from),
                None => Ok(()),
            },
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            withdraw_all(&self.message, enqueued).await;
            if let Some(stage) = stage {
                stage.cache.rollback(&stage.staged);
            }
            return Err(err);
        }

        if let Some(stage) = stage {
            stage.cache.commit(&stage.staged);
        }
        Ok(enqueued
            .into_iter()
            .map(|(queue, _)| queue.name().to_string())
            .collect())
    }
}

/// Withdraws accepted references, newest first; failures are logged.
pub(crate) async fn withdraw_all(message: &ServerMessage, enqueued: Enqueued) {
    for (queue, reference) in enqueued.into_iter().rev() {
        if let Err(err) = queue.withdraw(&reference).await {
            warn!(
                event = events::ROUTE_WITHDRAW_FAILED,
                component = COMPONENT,
                msg_id = message.id(),
                address = %message.address(),
                queue = queue.name(),
                err = %err,
                "failed to withdraw message reference"
            );
        }
    }
}
