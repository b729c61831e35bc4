//! Inbound adapters translating transport traffic into domain calls.

pub mod http;
pub mod ws;
