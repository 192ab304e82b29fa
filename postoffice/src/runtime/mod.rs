//! Runtime integration layer.
//!
//! Confines the thread and runtime boundary of the asynchronous journal writer so the routing
//! path never waits on durable-log I/O unless persistence is configured as mandatory.

pub(crate) mod journal_runtime;
