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

//! Binding registry with copy-on-write snapshots and a per-address resolution cache.

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::binding::address_matcher::AddressPattern;
use crate::binding::{Binding, Bindings};
use crate::error::RoutingError;
use crate::observability::events;

const COMPONENT: &str = "binding_registry";

/// Upper bound on cached resolutions; addresses resolved past it are served uncached.
pub(crate) const RESOLVED_CACHE_CAPACITY: usize = 4096;

struct RegisteredBinding {
    binding: Arc<Binding>,
    pattern: AddressPattern,
    order: u64,
}

#[derive(Clone, Default)]
struct BindingSnapshot {
    version: u64,
    next_order: u64,
    by_name: HashMap<String, Arc<RegisteredBinding>>,
    literal: HashMap<Address, Vec<Arc<RegisteredBinding>>>,
    wildcard: HashMap<Address, Vec<Arc<RegisteredBinding>>>,
}

impl BindingSnapshot {
    fn resolve(&self, address: &Address) -> Vec<Arc<Binding>> {
        let mut matched: Vec<&Arc<RegisteredBinding>> = self
            .literal
            .get(address)
            .map(|entries| entries.iter().collect())
            .unwrap_or_default();

        for entries in self.wildcard.values() {
            let Some(first) = entries.first() else {
                continue;
            };
            if first.pattern.matches(address.as_str()) {
                matched.extend(entries.iter());
            }
        }

        matched.sort_by_key(|entry| entry.order);
        matched
            .into_iter()
            .map(|entry| entry.binding.clone())
            .collect()
    }

    fn index_for(
        &mut self,
        pattern: &AddressPattern,
    ) -> &mut HashMap<Address, Vec<Arc<RegisteredBinding>>> {
        if pattern.has_wildcards() {
            &mut self.wildcard
        } else {
            &mut self.literal
        }
    }
}

///
/// [`BindingRegistry`] maps address patterns to bindings.
///
/// Readers resolve against an immutable snapshot without locking. Writers are serialized,
/// publish a new snapshot and evict every cached resolution the changed pattern could affect,
/// so a resolution never mixes bindings from before and after one mutation. Cached
/// resolutions for unrelated addresses survive the mutation.
///
/// Only addresses with at least one matching binding are cached, up to
/// [`RESOLVED_CACHE_CAPACITY`] of them.
pub struct BindingRegistry {
    snapshot: ArcSwap<BindingSnapshot>,
    writer: Mutex<()>,
    resolved: RwLock<HashMap<Address, Arc<Bindings>>>,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(BindingSnapshot::default()),
            writer: Mutex::new(()),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `binding` under its address pattern.
    ///
    /// Fails with [`RoutingError::DuplicateBinding`] when the name is taken and with
    /// [`RoutingError::InvalidAddress`] when the pattern is malformed.
    pub fn add_binding(&self, binding: Binding) -> Result<Arc<Binding>, RoutingError> {
        let pattern = match AddressPattern::parse(binding.address()) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(
                    event = events::BINDING_ADD_FAILED,
                    component = COMPONENT,
                    binding = binding.name(),
                    address = %binding.address(),
                    err = %err,
                    "rejected binding with malformed address"
                );
                return Err(err);
            }
        };

        let _writer = self.writer.lock();
        let current = self.snapshot.load_full();

        if current.by_name.contains_key(binding.name()) {
            warn!(
                event = events::BINDING_ADD_FAILED,
                component = COMPONENT,
                binding = binding.name(),
                address = %binding.address(),
                "binding name already registered"
            );
            return Err(RoutingError::DuplicateBinding(binding.name().to_string()));
        }

        let binding = Arc::new(binding);
        let mut next = BindingSnapshot::clone(&current);
        let entry = Arc::new(RegisteredBinding {
            binding: binding.clone(),
            pattern: pattern.clone(),
            order: next.next_order,
        });
        next.next_order += 1;
        next.version += 1;
        next.by_name.insert(binding.name().to_string(), entry.clone());
        next.index_for(&pattern)
            .entry(pattern.address().clone())
            .or_default()
            .push(entry);

        self.publish(next, &pattern);

        info!(
            event = events::BINDING_ADD_OK,
            component = COMPONENT,
            binding = binding.name(),
            address = %binding.address(),
            queue = binding.queue().name(),
            "binding added"
        );
        Ok(binding)
    }

    /// Removes the binding registered as `name` and returns it.
    pub fn remove_binding(&self, name: &str) -> Result<Arc<Binding>, RoutingError> {
        let _writer = self.writer.lock();
        let current = self.snapshot.load_full();

        let Some(entry) = current.by_name.get(name).cloned() else {
            warn!(
                event = events::BINDING_REMOVE_FAILED,
                component = COMPONENT,
                binding = name,
                "binding not registered"
            );
            return Err(RoutingError::BindingNotFound(name.to_string()));
        };

        let mut next = BindingSnapshot::clone(&current);
        next.version += 1;
        next.by_name.remove(name);
        let index = next.index_for(&entry.pattern);
        if let Some(entries) = index.get_mut(entry.pattern.address()) {
            entries.retain(|candidate| candidate.binding.name() != name);
            if entries.is_empty() {
                index.remove(entry.pattern.address());
            }
        }

        self.publish(next, &entry.pattern);

        info!(
            event = events::BINDING_REMOVE_OK,
            component = COMPONENT,
            binding = name,
            address = %entry.pattern.address(),
            "binding removed"
        );
        Ok(entry.binding.clone())
    }

    fn publish(&self, next: BindingSnapshot, changed: &AddressPattern) {
        let mut resolved = self.resolved.write();
        self.snapshot.store(Arc::new(next));

        let before = resolved.len();
        resolved.retain(|address, _| !changed.matches(address.as_str()));
        let invalidated = before - resolved.len();
        if invalidated > 0 {
            debug!(
                event = events::BINDING_RESOLVE_CACHE_INVALIDATED,
                component = COMPONENT,
                address = %changed.address(),
                invalidated,
                "resolution cache entries invalidated"
            );
        }
    }

    pub fn get_binding(&self, name: &str) -> Option<Arc<Binding>> {
        self.snapshot
            .load()
            .by_name
            .get(name)
            .map(|entry| entry.binding.clone())
    }

    /// Resolves the bindings for a literal address.
    ///
    /// Returns `None` when nothing matches and `create_if_absent` is `false`; otherwise an
    /// empty [`Bindings`] stands in for an address with no matches.
    pub fn get_bindings_for_address(
        &self,
        address: &Address,
        create_if_absent: bool,
    ) -> Option<Arc<Bindings>> {
        if let Some(cached) = self.resolved.read().get(address) {
            return Some(cached.clone());
        }

        let snapshot = self.snapshot.load_full();
        let matched = snapshot.resolve(address);
        if matched.is_empty() {
            return create_if_absent.then(|| Arc::new(Bindings::empty(address.clone())));
        }

        let bindings = Arc::new(Bindings::new(address.clone(), matched));
        let mut resolved = self.resolved.write();
        if self.snapshot.load().version == snapshot.version
            && resolved.len() < RESOLVED_CACHE_CAPACITY
        {
            resolved
                .entry(address.clone())
                .or_insert_with(|| bindings.clone());
        }
        Some(bindings)
    }

    /// Resolves an address without creating or caching an entry for it.
    pub fn lookup_bindings_for_address(&self, address: &Address) -> Option<Arc<Bindings>> {
        if let Some(cached) = self.resolved.read().get(address) {
            return Some(cached.clone());
        }
        let matched = self.snapshot.load().resolve(address);
        (!matched.is_empty()).then(|| Arc::new(Bindings::new(address.clone(), matched)))
    }

    /// Read-only resolution straight from the current snapshot, bypassing the cache.
    pub fn get_matching_bindings(&self, address: &Address) -> Bindings {
        let matched = self.snapshot.load().resolve(address);
        if matched.is_empty() {
            Bindings::empty(address.clone())
        } else {
            Bindings::new(address.clone(), matched)
        }
    }

    pub fn binding_count(&self) -> usize {
        self.snapshot.load().by_name.len()
    }

    /// Every registered binding, in registration order.
    pub fn bindings(&self) -> Vec<Arc<Binding>> {
        let snapshot = self.snapshot.load();
        let mut entries: Vec<&Arc<RegisteredBinding>> = snapshot.by_name.values().collect();
        entries.sort_by_key(|entry| entry.order);
        entries
            .into_iter()
            .map(|entry| entry.binding.clone())
            .collect()
    }

    #[cfg(test)]
    fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    #[cfg(test)]
    fn cached_addresses(&self) -> usize {
        self.resolved.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingRegistry, RESOLVED_CACHE_CAPACITY};
    use crate::binding::Binding;
    use crate::error::RoutingError;
    use crate::queue::test_queue::TestQueue;
    use crate::Address;
    use std::sync::Arc;

    fn binding(address: &str, queue: &str) -> Binding {
        Binding::new(address, TestQueue::new(queue))
    }

    fn names(registry: &BindingRegistry, address: &str) -> Vec<String> {
        registry
            .get_bindings_for_address(&Address::new(address), true)
            .expect("create_if_absent always yields bindings")
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn literal_and_wildcard_bindings_resolve_in_registration_order() {
        let registry = BindingRegistry::new();
        registry.add_binding(binding("a.#", "q-hash")).unwrap();
        registry.add_binding(binding("a.b.c", "q-literal")).unwrap();
        registry.add_binding(binding("a.*.c", "q-star")).unwrap();
        registry.add_binding(binding("x.y", "q-other")).unwrap();

        assert_eq!(names(&registry, "a.b.c"), vec!["q-hash", "q-literal", "q-star"]);
        assert_eq!(names(&registry, "a"), vec!["q-hash"]);
        assert!(names(&registry, "b").is_empty());
    }

    #[test]
    fn duplicate_binding_name_is_rejected() {
        let registry = BindingRegistry::new();
        registry.add_binding(binding("a", "q1")).unwrap();

        let err = registry.add_binding(binding("b", "q1")).unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateBinding(name) if name == "q1"));
        assert_eq!(registry.binding_count(), 1);
    }

    #[test]
    fn malformed_pattern_is_rejected_at_bind_time() {
        let registry = BindingRegistry::new();
        let err = registry.add_binding(binding("a.#.b", "q1")).unwrap_err();

        assert!(matches!(err, RoutingError::InvalidAddress { .. }));
        assert_eq!(registry.version(), 0);
    }

    #[test]
    fn remove_unknown_binding_fails() {
        let registry = BindingRegistry::new();
        assert!(matches!(
            registry.remove_binding("missing"),
            Err(RoutingError::BindingNotFound(_))
        ));
    }

    #[test]
    fn mutation_evicts_only_affected_cache_entries() {
        let registry = BindingRegistry::new();
        registry.add_binding(binding("orders.*", "q-orders")).unwrap();
        registry.add_binding(binding("audit", "q-audit")).unwrap();

        assert_eq!(names(&registry, "orders.eu"), vec!["q-orders"]);
        assert_eq!(names(&registry, "audit"), vec!["q-audit"]);
        assert_eq!(registry.cached_addresses(), 2);

        registry.add_binding(binding("orders.eu", "q-eu")).unwrap();
        assert_eq!(registry.cached_addresses(), 1);
        assert_eq!(names(&registry, "orders.eu"), vec!["q-orders", "q-eu"]);

        registry.remove_binding("q-orders").unwrap();
        assert_eq!(names(&registry, "orders.eu"), vec!["q-eu"]);
        assert_eq!(names(&registry, "audit"), vec!["q-audit"]);
    }

    #[test]
    fn lookup_does_not_create_entries() {
        let registry = BindingRegistry::new();

        assert!(registry
            .lookup_bindings_for_address(&Address::new("nothing"))
            .is_none());
        assert!(registry
            .get_bindings_for_address(&Address::new("nothing"), false)
            .is_none());
        assert_eq!(registry.cached_addresses(), 0);

        let created = registry
            .get_bindings_for_address(&Address::new("nothing"), true)
            .unwrap();
        assert!(created.is_empty());
        assert_eq!(registry.cached_addresses(), 0);
    }

    #[test]
    fn unbound_addresses_are_not_cached() {
        let registry = BindingRegistry::new();
        registry.add_binding(binding("orders", "q-orders")).unwrap();

        for index in 0..100 {
            let address = Address::new(format!("one-off.{index}"));
            assert!(registry
                .get_bindings_for_address(&address, true)
                .unwrap()
                .is_empty());
        }
        assert_eq!(registry.cached_addresses(), 0);

        assert_eq!(names(&registry, "orders"), vec!["q-orders"]);
        assert_eq!(registry.cached_addresses(), 1);
    }

    #[test]
    fn resolution_cache_is_bounded() {
        let registry = BindingRegistry::new();
        registry.add_binding(binding("#", "q-all")).unwrap();

        for index in 0..RESOLVED_CACHE_CAPACITY + 10 {
            assert_eq!(names(&registry, &format!("a.{index}")), vec!["q-all"]);
        }
        assert_eq!(registry.cached_addresses(), RESOLVED_CACHE_CAPACITY);
    }

    #[test]
    fn get_binding_returns_registered_binding() {
        let registry = BindingRegistry::new();
        let added = registry.add_binding(binding("a", "q1")).unwrap();

        let found = registry.get_binding("q1").expect("binding should be registered");
        assert!(Arc::ptr_eq(&added, &found));

        registry.remove_binding("q1").unwrap();
        assert!(registry.get_binding("q1").is_none());
        assert!(registry.get_matching_bindings(&Address::new("a")).is_empty());
    }

    #[test]
    fn concurrent_readers_observe_whole_snapshots() {
        let registry = Arc::new(BindingRegistry::new());
        registry.add_binding(binding("s.#", "base")).unwrap();

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for round in 0..200 {
                    let name = format!("extra-{round}");
                    registry.add_binding(binding("s.t", &name)).unwrap();
                    registry.remove_binding(&name).unwrap();
                }
            })
        };

        for _ in 0..2_000 {
            let resolved = registry
                .get_bindings_for_address(&Address::new("s.t"), true)
                .unwrap();
            assert!(resolved.len() == 1 || resolved.len() == 2);
            assert_eq!(resolved.names()[0], "base");
        }

        writer.join().unwrap();
        assert_eq!(names(&registry, "s.t"), vec!["base"]);
    }
}
