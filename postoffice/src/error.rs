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

//! Failure taxonomy surfaced by the post office to routing and administrative callers.

use crate::address::Address;
use crate::duplicate::JournalError;
use crate::queue::QueueError;
use crate::transaction::TransactionError;
use thiserror::Error;

/// Errors returned by routing, binding administration and transaction hooks.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The message carried a duplicate-detection identifier that is already visible.
    #[error("duplicate message '{duplicate_id}' rejected on address {address}")]
    DuplicateMessage {
        address: Address,
        duplicate_id: String,
    },

    #[error("binding '{0}' already exists")]
    DuplicateBinding(String),

    #[error("binding '{0}' not found")]
    BindingNotFound(String),

    /// Malformed binding pattern, rejected at bind time.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    /// A routing call resolved the same queue twice.
    #[error("queue '{0}' is already a target of this routing call")]
    DuplicateTarget(String),

    #[error("queue '{queue}' rejected message: {source}")]
    Queue {
        queue: String,
        #[source]
        source: QueueError,
    },

    #[error("duplicate-id persistence failed: {0}")]
    Persistence(#[from] JournalError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl RoutingError {
    /// Returns `true` for a rejected duplicate, which callers treat as non-fatal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RoutingError::DuplicateMessage { .. })
    }
}
