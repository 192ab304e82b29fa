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

//! Canonical structured field keys and value-format helpers.

use crate::transaction::Transaction;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const WORKER_ID: &str = "worker_id";
pub const WORKER_THREAD: &str = "worker_thread";

pub const MSG_ID: &str = "msg_id";
pub const ADDRESS: &str = "address";
pub const QUEUE: &str = "queue";
pub const BINDING: &str = "binding";
pub const DUPLICATE_ID: &str = "duplicate_id";
pub const SEQUENCE: &str = "sequence";
pub const TX_ID: &str = "tx_id";
pub const XID: &str = "xid";

pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_CHANNEL_CLOSED: &str = "channel_closed";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

/// Longest identifier rendered verbatim before it is shortened.
const DUPLICATE_ID_DISPLAY_MAX: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub worker_thread: String,
}

impl WorkerContext {
    pub fn new(worker_id: impl Into<String>, worker_thread: Option<&str>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: thread_name_or_default(worker_thread),
        }
    }

    pub fn with_current_thread(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: current_thread_name_or_default(),
        }
    }
}

pub fn thread_name_or_default(thread_name: Option<&str>) -> String {
    thread_name.unwrap_or(DEFAULT_WORKER_THREAD).to_string()
}

pub fn current_thread_name_or_default() -> String {
    thread_name_or_default(std::thread::current().name())
}

/// Renders opaque identifier bytes for logs and errors.
///
/// Printable ASCII is shown as text, anything else as lowercase hex.
pub fn format_duplicate_id(duplicate_id: &[u8]) -> String {
    let printable = !duplicate_id.is_empty()
        && duplicate_id
            .iter()
            .all(|byte| byte.is_ascii_graphic() || *byte == b' ');

    let rendered = if printable {
        String::from_utf8_lossy(duplicate_id).into_owned()
    } else {
        duplicate_id
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    };

    if rendered.len() > DUPLICATE_ID_DISPLAY_MAX {
        format!("{}..", &rendered[..DUPLICATE_ID_DISPLAY_MAX])
    } else {
        rendered
    }
}

pub fn format_tx_id(transaction: Option<&Transaction>) -> String {
    transaction
        .map(|tx| tx.id().to_string())
        .unwrap_or_else(|| NONE.to_string())
}

#[cfg(test)]
mod tests {
    use super::{format_duplicate_id, format_tx_id, thread_name_or_default, DEFAULT_WORKER_THREAD};

    #[test]
    fn format_duplicate_id_keeps_printable_text() {
        assert_eq!(format_duplicate_id(b"order-42"), "order-42");
    }

    #[test]
    fn format_duplicate_id_hex_encodes_binary() {
        assert_eq!(format_duplicate_id(&[0x00, 0xff, 0x10]), "00ff10");
    }

    #[test]
    fn format_duplicate_id_shortens_long_values() {
        let long = vec![b'a'; 100];
        let rendered = format_duplicate_id(&long);

        assert!(rendered.ends_with(".."));
        assert_eq!(rendered.len(), 66);
    }

    #[test]
    fn format_tx_id_falls_back_for_direct_sends() {
        assert_eq!(format_tx_id(None), "none");
    }

    #[test]
    fn thread_name_or_default_falls_back_when_absent() {
        assert_eq!(thread_name_or_default(None), DEFAULT_WORKER_THREAD);
        assert_eq!(thread_name_or_default(Some("named-thread")), "named-thread");
    }
}
