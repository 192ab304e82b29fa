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

use tracing_subscriber::EnvFilter;

mod integration_test_queues;
pub use integration_test_queues::RecordingQueue;
mod integration_test_journals;
pub use integration_test_journals::FailingJournal;
mod integration_test_messages;
pub use integration_test_messages::{message, message_with_duplicate_id, unique_duplicate_id};

/// Installs a `RUST_LOG`-filtered fmt subscriber once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
