//! rep365 — harvest, enrich, and report Microsoft 365 security inventory.
//!
//! The library is three composable pieces wired together by the CLI:
//! [`harvest`] pulls paginated collections under a client-side rate budget,
//! [`join`] matches harvested records against a local subnet reference
//! table, and [`export`] writes the enriched stream to CSV with header and
//! shape management. [`remediate`] holds one-shot actions (quarantine
//! purge) built on the same client.

pub mod api;
pub mod cmd;
pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod join;
pub mod remediate;

pub use error::{Rep365Error, Result};
