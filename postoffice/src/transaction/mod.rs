//! Transactions, completion hooks and XA branch recovery.

mod resource_manager;
#[allow(clippy::module_inception)]
mod transaction;
mod xid;

pub use resource_manager::ResourceManager;
pub use transaction::{Transaction, TransactionError, TransactionOperation, TransactionState};
pub use xid::Xid;
