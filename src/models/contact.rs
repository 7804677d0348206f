//! Contact form submissions, owned by the web application and read here.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::contacts;

/// Contact query model for SELECT operations
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at_ms: i64,
}

impl Contact {
    /// Trimmed visitor address; `None` when blank.
    pub fn reply_address(&self) -> Option<&str> {
        let email = self.email.trim();
        (!email.is_empty()).then_some(email)
    }

    /// Name used to greet the visitor, `"there"` when none was given.
    pub fn greeting_name(&self) -> &str {
        let name = self.name.trim();
        if name.is_empty() { "there" } else { name }
    }
}
