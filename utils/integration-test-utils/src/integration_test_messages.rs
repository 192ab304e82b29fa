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

use postoffice::ServerMessage;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

pub fn message(address: &str) -> ServerMessage {
    ServerMessage::new(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed), address)
}

pub fn message_with_duplicate_id(address: &str, duplicate_id: &str) -> ServerMessage {
    message(address).with_duplicate_id(duplicate_id.as_bytes().to_vec())
}

pub fn unique_duplicate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
