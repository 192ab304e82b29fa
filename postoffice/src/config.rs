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

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_ID_CACHE_SIZE: i32 = 2000;
pub const DEFAULT_NOTIFICATION_QUEUE_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] json5::Error),
}

/// When the durable append of a committed duplicate id happens.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IdCachePersistence {
    /// Queued to the journal writer after the identifier becomes visible; failures are logged.
    #[default]
    Async,
    /// Written before the commit completes; a failed write fails the commit.
    Mandatory,
}

///
/// Post office settings, read from JSON5.
///
/// ```
/// use postoffice::{IdCachePersistence, PostOfficeConfig};
///
/// let config = PostOfficeConfig::from_json5_str(
///     r#"{ id_cache_size: 10, id_cache_persistence: "mandatory" }"#,
/// )
/// .unwrap();
/// assert_eq!(config.id_cache_capacity(), 10);
/// assert_eq!(config.id_cache_persistence, IdCachePersistence::Mandatory);
/// assert!(config.persist_id_cache);
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PostOfficeConfig {
    /// Identifiers remembered per address; zero or negative disables duplicate detection.
    pub id_cache_size: i32,
    pub persist_id_cache: bool,
    pub id_cache_persistence: IdCachePersistence,
    pub notification_queue_size: usize,
}

impl Default for PostOfficeConfig {
    fn default() -> Self {
        Self {
            id_cache_size: DEFAULT_ID_CACHE_SIZE,
            persist_id_cache: true,
            id_cache_persistence: IdCachePersistence::default(),
            notification_queue_size: DEFAULT_NOTIFICATION_QUEUE_SIZE,
        }
    }
}

impl PostOfficeConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(contents)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json5_str(&contents)
    }

    pub fn with_id_cache_size(mut self, id_cache_size: i32) -> Self {
        self.id_cache_size = id_cache_size;
        self
    }

    pub fn with_persist_id_cache(mut self, persist_id_cache: bool) -> Self {
        self.persist_id_cache = persist_id_cache;
        self
    }

    pub fn with_id_cache_persistence(mut self, persistence: IdCachePersistence) -> Self {
        self.id_cache_persistence = persistence;
        self
    }

    /// Effective per-address capacity; `0` when detection is disabled.
    pub fn id_cache_capacity(&self) -> usize {
        usize::try_from(self.id_cache_size).unwrap_or(0)
    }

    pub fn duplicate_detection_enabled(&self) -> bool {
        self.id_cache_size > 0
    }
}
