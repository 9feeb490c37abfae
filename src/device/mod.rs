//! Device identity and accelerator driver access.
//!
//! - [`backend`]: Device specification parsing and backend identity resolution
//! - [`runtime`]: Per-backend accelerator runtimes (cache, sync, allocation queries)

pub mod backend;
pub mod runtime;
