//! Duplicate-id detection: per-address caches, the journal contract and persistence policy.

mod id_cache;
mod journal;
pub(crate) mod persistence;

pub use id_cache::{DuplicateIdCache, StageOutcome, StageOwner, StagedDuplicate};
pub use journal::{
    DuplicateIdJournal, DuplicateIdRecord, InMemoryDuplicateIdJournal, JournalError,
    PreparedDuplicateRecord,
};
