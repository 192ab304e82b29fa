//! Canonical structured event names used across `postoffice`.

// Binding registry events.
pub const BINDING_ADD_OK: &str = "binding_add_ok";
pub const BINDING_ADD_FAILED: &str = "binding_add_failed";
pub const BINDING_REMOVE_OK: &str = "binding_remove_ok";
pub const BINDING_REMOVE_FAILED: &str = "binding_remove_failed";
pub const BINDING_RESOLVE_CACHE_INVALIDATED: &str = "binding_resolve_cache_invalidated";

// Routing events.
pub const ROUTE_START: &str = "route_start";
pub const ROUTE_OK: &str = "route_ok";
pub const ROUTE_FAILED: &str = "route_failed";
pub const ROUTE_NO_BINDINGS: &str = "route_no_bindings";
pub const ROUTE_DUPLICATE_REJECTED: &str = "route_duplicate_rejected";
pub const ROUTE_DUPLICATE_ACCEPTED: &str = "route_duplicate_accepted";
pub const ROUTE_ENQUEUE_FAILED: &str = "route_enqueue_failed";
pub const ROUTE_WITHDRAW_FAILED: &str = "route_withdraw_failed";
pub const REROUTE_OK: &str = "reroute_ok";
pub const REDISTRIBUTE_OK: &str = "redistribute_ok";
pub const REDISTRIBUTE_NO_TARGET: &str = "redistribute_no_target";

// Duplicate-id cache events.
pub const DUPLICATE_CACHE_CREATE: &str = "duplicate_cache_create";
pub const DUPLICATE_CACHE_LOAD: &str = "duplicate_cache_load";
pub const DUPLICATE_CACHE_LOAD_PRUNED: &str = "duplicate_cache_load_pruned";
pub const DUPLICATE_STAGE_WAIT: &str = "duplicate_stage_wait";
pub const DUPLICATE_STAGED: &str = "duplicate_staged";
pub const DUPLICATE_COMMITTED: &str = "duplicate_committed";
pub const DUPLICATE_EVICTED: &str = "duplicate_evicted";
pub const DUPLICATE_ROLLED_BACK: &str = "duplicate_rolled_back";
pub const DUPLICATE_RECOVERED: &str = "duplicate_recovered";

// Journal writer events.
pub const JOURNAL_WRITE_FAILED: &str = "journal_write_failed";
pub const JOURNAL_RECV_CLOSED: &str = "journal_recv_closed";
pub const JOURNAL_SUBMIT_FAILED: &str = "journal_submit_failed";
pub const JOURNAL_FILE_OPEN: &str = "journal_file_open";
pub const JOURNAL_FILE_TORN_TAIL: &str = "journal_file_torn_tail";
pub const JOURNAL_FILE_COMPACTED: &str = "journal_file_compacted";

// Transaction events.
pub const TX_PREPARE_OK: &str = "tx_prepare_ok";
pub const TX_PREPARE_FAILED: &str = "tx_prepare_failed";
pub const TX_COMMIT_OK: &str = "tx_commit_ok";
pub const TX_COMMIT_FAILED: &str = "tx_commit_failed";
pub const TX_ROLLBACK: &str = "tx_rollback";
pub const TX_ROLLBACK_ONLY: &str = "tx_rollback_only";
pub const TX_RECOVERED: &str = "tx_recovered";

// Lifecycle and runtime events.
pub const POST_OFFICE_START: &str = "post_office_start";
pub const POST_OFFICE_STOP: &str = "post_office_stop";
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const NOTIFICATION_UNOBSERVED: &str = "notification_unobserved";
