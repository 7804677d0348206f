use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::jobs::store::ContactLookup;
use crate::models::Contact;
use crate::schema::contacts;

/// Read-only access to the `contacts` table
#[derive(Clone)]
pub struct ContactRepository {
    pool: AsyncDbPool,
}

impl ContactRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactLookup for ContactRepository {
    async fn find_contact(&self, id: &str) -> AppResult<Option<Contact>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::ConnectionPool {
                source: anyhow::Error::from(e),
            })?;

        contacts::table
            .find(id)
            .select(Contact::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, "find contact"))
    }
}
