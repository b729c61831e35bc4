//! Outbound adapters implementing the domain ports.

pub mod email;
pub mod notify;
pub mod payment;
pub mod persistence;
