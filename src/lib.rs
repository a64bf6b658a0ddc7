//! Facade crate re-exporting the `rlm-mcp` workspace members.
//!
//! The actual binary lives in `crates/server`; this crate exists so the
//! workspace root is itself a usable library for embedders that want the
//! session engine without the stdio transport.

pub use rlm_chunk as chunk;
pub use rlm_core as core;
pub use rlm_engine as engine;
pub use rlm_export as export;
pub use rlm_index as index;
pub use rlm_search as search;
pub use rlm_storage as storage;
