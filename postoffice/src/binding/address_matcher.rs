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

//! Hierarchical address matching with single-segment and trailing wildcards.

use crate::address::{Address, ANY_WORDS_WILDCARD, DELIMITER, SINGLE_WORD_WILDCARD};
use crate::error::RoutingError;

#[derive(Clone, Debug, Eq, PartialEq)]
enum PatternSegment {
    Literal(String),
    AnyWord,
    AnyWords,
}

/// A validated binding pattern.
///
/// `*` consumes exactly one segment. `#` consumes zero or more trailing segments and must be
/// the last segment, so `a.#` matches `a`, `a.b` and `a.b.c`.
///
/// ```
/// use postoffice::{Address, AddressPattern};
///
/// let pattern = AddressPattern::parse(&Address::new("a.*.c")).unwrap();
/// assert!(pattern.matches("a.b.c"));
/// assert!(!pattern.matches("a.b.b.c"));
///
/// let trailing = AddressPattern::parse(&Address::new("a.#")).unwrap();
/// assert!(trailing.matches("a"));
/// assert!(trailing.matches("a.b.c"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AddressPattern {
    address: Address,
    segments: Vec<PatternSegment>,
    has_wildcards: bool,
}

impl AddressPattern {
    /// Validates `address` as a binding pattern.
    ///
    /// Fails with [`RoutingError::InvalidAddress`] for an empty address, an empty segment or a
    /// `#` that is not the final segment.
    pub fn parse(address: &Address) -> Result<Self, RoutingError> {
        let invalid = |reason: &'static str| RoutingError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        if address.is_empty() {
            return Err(invalid("address is empty"));
        }

        let raw_segments: Vec<&str> = address.as_str().split(DELIMITER).collect();
        let last_index = raw_segments.len() - 1;
        let mut segments = Vec::with_capacity(raw_segments.len());

        for (index, raw) in raw_segments.into_iter().enumerate() {
            let segment = match raw {
                "" => return Err(invalid("address contains an empty segment")),
                SINGLE_WORD_WILDCARD => PatternSegment::AnyWord,
                ANY_WORDS_WILDCARD if index == last_index => PatternSegment::AnyWords,
                ANY_WORDS_WILDCARD => {
                    return Err(invalid("'#' must be the last segment of a pattern"))
                }
                literal => PatternSegment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }

        let has_wildcards = segments
            .iter()
            .any(|segment| !matches!(segment, PatternSegment::Literal(_)));

        Ok(Self {
            address: address.clone(),
            segments,
            has_wildcards,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Literal patterns are resolved by direct key lookup instead of [`AddressPattern::matches`].
    pub fn has_wildcards(&self) -> bool {
        self.has_wildcards
    }

    /// Matches a literal address, segment by segment from the left.
    pub fn matches(&self, address: &str) -> bool {
        let mut words = address.split(DELIMITER);

        for segment in &self.segments {
            match segment {
                PatternSegment::AnyWords => return true,
                PatternSegment::AnyWord => {
                    if words.next().is_none() {
                        return false;
                    }
                }
                PatternSegment::Literal(literal) => match words.next() {
                    Some(word) if word == literal => {}
                    _ => return false,
                },
            }
        }

        words.next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::AddressPattern;
    use crate::error::RoutingError;
    use crate::Address;

    fn pattern(raw: &str) -> AddressPattern {
        AddressPattern::parse(&Address::new(raw)).expect("pattern should parse")
    }

    #[test]
    fn single_word_wildcard_consumes_exactly_one_segment() {
        let pattern = pattern("a.*.c");

        assert!(pattern.matches("a.b.c"));
        assert!(pattern.matches("a.x.c"));
        assert!(!pattern.matches("a.b.b.c"));
        assert!(!pattern.matches("a.c"));
    }

    #[test]
    fn trailing_wildcard_matches_bare_prefix() {
        let pattern = pattern("a.#");

        assert!(pattern.matches("a"));
        assert!(pattern.matches("a.b"));
        assert!(pattern.matches("a.b.c"));
        assert!(!pattern.matches("b.a"));
        assert!(!pattern.matches("ab"));
    }

    #[test]
    fn lone_trailing_wildcard_matches_everything() {
        let pattern = pattern("#");

        assert!(pattern.matches("a"));
        assert!(pattern.matches("a.b.c"));
    }

    #[test]
    fn literal_pattern_matches_only_identical_address() {
        let pattern = pattern("orders.eu");

        assert!(!pattern.has_wildcards());
        assert!(pattern.matches("orders.eu"));
        assert!(!pattern.matches("orders.eu.created"));
        assert!(!pattern.matches("orders"));
        assert!(!pattern.matches("Orders.eu"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for raw in ["", "a..b", ".a", "a.", "a.#.b", "#.a"] {
            let result = AddressPattern::parse(&Address::new(raw));
            assert!(
                matches!(result, Err(RoutingError::InvalidAddress { .. })),
                "pattern {raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn wildcard_embedded_in_word_is_literal() {
        let pattern = pattern("a.b*");

        assert!(!pattern.has_wildcards());
        assert!(pattern.matches("a.b*"));
        assert!(!pattern.matches("a.bc"));
    }
}
