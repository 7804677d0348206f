//! Repository layer for data access operations.
//!
//! PostgreSQL implementations of the queue's storage ports.

mod contact_repo;
mod email_job_repo;

pub use contact_repo::ContactRepository;
pub use email_job_repo::EmailJobRepository;

use crate::db::AsyncDbPool;

/// Aggregates all repositories for convenient access.
///
/// `AsyncDbPool` is reference counted, so cloning shares the pool.
#[derive(Clone)]
pub struct Repositories {
    pub email_jobs: EmailJobRepository,
    pub contacts: ContactRepository,
}

impl Repositories {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            email_jobs: EmailJobRepository::new(pool.clone()),
            contacts: ContactRepository::new(pool),
        }
    }
}
