//! Sequencing of the backup stages.
//!
//! A [`Pipeline`] runs the archiver, the stager and the uploader in that
//! order and reports a typed [`PipelineResult`]. Stage failures never panic
//! or exit; they are turned into results the caller can map to an exit code.

mod orchestrator;
mod state;

pub use orchestrator::{Pipeline, PipelineResult};
pub use state::{PipelineStage, PipelineState};
