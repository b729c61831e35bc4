//! Persistence adapters.
//!
//! The in-memory store backs local development and the test suite; a SQL
//! adapter can replace it behind the same repository ports.

mod memory;

pub use memory::MemoryStore;
