//! Global identifier of an XA transaction branch.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// XA branch identifier as issued by an external transaction manager.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Xid {
    format_id: i32,
    global_transaction_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Xid {
    pub fn new(
        format_id: i32,
        global_transaction_id: impl Into<Vec<u8>>,
        branch_qualifier: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            format_id,
            global_transaction_id: global_transaction_id.into(),
            branch_qualifier: branch_qualifier.into(),
        }
    }

    pub fn format_id(&self) -> i32 {
        self.format_id
    }

    pub fn global_transaction_id(&self) -> &[u8] {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

impl Display for Xid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.format_id)?;
        for byte in &self.global_transaction_id {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(":")?;
        for byte in &self.branch_qualifier {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
