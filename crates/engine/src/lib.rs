//! The visibility pipeline and the systems it drives.
//!
//! A [`VisibilityPipeline`] follows one trackee. Each tick it samples the bound
//! storages around the trackee, diffs the result against the previous sample, and
//! dispatches lifecycle hooks to the bound [`VisibilitySystem`]s and
//! [`TickSystem`]s. The update and render phases track independently, each with
//! its own radius and cadence.
//!
//! # Invariants
//! - Within a phase, opening hooks run in binding order and closing hooks in reverse.
//! - An item is entered at most once before it is exited, per system.
//! - Systems bound to the same storage in one phase observe the same diff.
//! - A [`Lifted`] system sees each entity once, however many chunk snapshots hold it.

mod pipeline;
mod system;
pub mod systems;

pub use pipeline::{
    Phase, PhaseSummary, PipelineError, RecordSummary, SystemEngine, SystemEngines,
    VisibilityPipeline, VisibilityPipelineBuilder,
};
pub use system::{Lifted, TickSystem, VisibilitySystem};

pub fn crate_info() -> &'static str {
    "orbis-engine v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("engine"));
    }
}
