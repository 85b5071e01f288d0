//! Developer tooling: read-only inspection of storages, the spatial index, and
//! visibility pipelines.
//!
//! # Invariants
//! - Inspection never mutates what it inspects.

mod inspector;

pub use inspector::{EntityInfo, PhaseReport, StorageSummary, WorldInspector};

pub fn crate_info() -> &'static str {
    "orbis-tools v0.1.0"
}
