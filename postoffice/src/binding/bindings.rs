//! Resolution result for one address lookup.

use crate::address::Address;
use crate::binding::Binding;
use std::sync::Arc;

/// Bindings matching one literal address, in registration order.
#[derive(Clone, Debug)]
pub struct Bindings {
    address: Address,
    bindings: Vec<Arc<Binding>>,
}

impl Bindings {
    pub(crate) fn new(address: Address, bindings: Vec<Arc<Binding>>) -> Self {
        Self { address, bindings }
    }

    pub(crate) fn empty(address: Address) -> Self {
        Self::new(address, Vec::new())
    }

    /// The literal address that was resolved.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Binding>> {
        self.bindings.iter().find(|binding| binding.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|binding| binding.name()).collect()
    }
}
