//! Persistent email delivery queue.
//!
//! Jobs are written by the [`EmailQueueService`], picked up by the
//! [`EmailQueueWorker`] poll loop and delivered through the callbacks of a
//! `DeliveryRegistry`. All coordination between workers happens through
//! conditional updates on the [`JobStore`].

pub mod backoff;
pub mod claimer;
pub mod clock;
pub mod enqueuer;
pub mod memory;
pub mod processor;
pub mod store;
pub mod worker;

pub use backoff::RetryPolicy;
pub use claimer::JobClaimer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use enqueuer::{EmailQueueService, QueueEvent};
pub use memory::{MemoryContacts, MemoryJobStore};
pub use processor::{JobProcessor, ProcessOutcome};
pub use store::{ContactLookup, JobStore};
pub use worker::{EmailQueueWorker, TickReport};
