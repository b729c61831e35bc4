//! Cross-cutting actix middleware.

pub mod trace;

pub use trace::{Trace, TraceId};
