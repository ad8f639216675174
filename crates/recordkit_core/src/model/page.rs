//! Result windows for paged queries.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Offset/limit window over an ordered query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageBounds {
    /// Number of leading rows to skip.
    pub offset: u32,
    /// Maximum rows returned. `None` means no upper bound.
    pub limit: Option<u32>,
}

impl PageBounds {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Window for a 1-based page number. Page 0 is treated as page 1.
    pub fn page(page_number: u32, page_size: u32) -> Self {
        let index = page_number.saturating_sub(1);
        Self::new(index.saturating_mul(page_size), page_size)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }

    /// Appends `LIMIT`/`OFFSET` placeholders to `sql` and the bound values to `binds`.
    pub(crate) fn push_sql(&self, sql: &mut String, binds: &mut Vec<Value>) {
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(self.offset)));
        }
    }
}
