//! Marketplace booking backend.
//!
//! The crate follows a hexagonal layout: `domain` holds the booking engine,
//! wallet ledger, tracking, chat, and the ports they drive; `inbound` adapts
//! HTTP and WebSocket traffic onto those services; `outbound` implements the
//! ports against real infrastructure; `server` wires the pieces together.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;
