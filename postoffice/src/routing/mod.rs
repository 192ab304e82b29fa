//! Routing contexts and their transactional application.

pub(crate) mod routing_context;
pub(crate) mod routing_operation;

pub use routing_context::{RouteDecision, RoutingContext};
