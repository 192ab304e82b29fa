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

//! Immutable, case-sensitive routing key shared between messages and bindings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Segment delimiter for hierarchical addresses.
pub const DELIMITER: char = '.';
/// Matches exactly one segment.
pub const SINGLE_WORD_WILDCARD: &str = "*";
/// Matches zero or more trailing segments; only valid as the last segment.
pub const ANY_WORDS_WILDCARD: &str = "#";

///
/// [`Address`] is used both as the literal key a message is sent to and as the pattern a
/// binding is registered under. Cloning is cheap; the text is shared.
///
/// # Examples
///
/// ```
/// use postoffice::Address;
///
/// let address = Address::new("orders.eu.created");
/// assert_eq!(address.segments().count(), 3);
/// assert!(!address.contains_wildcard());
/// assert!(Address::new("orders.*.created").contains_wildcard());
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(Arc<str>);

impl Address {
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(Arc::from(address.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the address on [`DELIMITER`].
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(DELIMITER)
    }

    /// Returns `true` when any segment is a wildcard token.
    pub fn contains_wildcard(&self) -> bool {
        self.segments()
            .any(|segment| segment == SINGLE_WORD_WILDCARD || segment == ANY_WORDS_WILDCARD)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Self(Arc::from(address))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Address::from)
    }
}

#[cfg(test)]
mod tests {
    use super::Address;
    use std::collections::HashMap;

    #[test]
    fn addresses_are_case_sensitive() {
        assert_ne!(Address::new("Orders"), Address::new("orders"));
    }

    #[test]
    fn map_lookup_by_str_matches_owned_key() {
        let mut map = HashMap::new();
        map.insert(Address::new("orders.created"), 1);

        assert_eq!(map.get("orders.created"), Some(&1));
    }

    #[test]
    fn wildcard_detection_is_per_segment() {
        assert!(Address::new("a.#").contains_wildcard());
        assert!(Address::new("*").contains_wildcard());
        assert!(!Address::new("a.b*.c").contains_wildcard());
    }
}
