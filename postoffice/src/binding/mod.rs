//! Address-to-queue bindings and their registry.

pub(crate) mod address_matcher;
#[allow(clippy::module_inception)]
mod binding;
mod bindings;
pub(crate) mod registry;

pub use address_matcher::AddressPattern;
pub use binding::{Binding, BindingKind};
pub use bindings::Bindings;
pub use registry::BindingRegistry;
