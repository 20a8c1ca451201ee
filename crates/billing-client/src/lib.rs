//! Client for the platform billing service.
//!
//! Only the balance gate is used here: callers ask whether a customer
//! can pay for a resource before provisioning it.

mod client;
mod error;
mod types;

pub use client::BillingClient;
pub use error::BillingError;
pub use types::*;
