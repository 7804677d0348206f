//! Service layer.
//!
//! Services encapsulate the delivery side of the queue: providers, rendering
//! and the per-job-type callbacks.

pub mod delivery;
