//! Outbound HTTP plumbing shared by the delivery providers.

pub mod client;
