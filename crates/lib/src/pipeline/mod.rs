//! Staged pipelines over a shared [`State`].
//!
//! A [`Pipeline`] (or its event-reporting sibling [`EventPipeline`]) runs
//! stages strictly in order and stops at the first failure. [`Parallel`] and
//! [`ParallelEvents`] are the only source of concurrency between stages.
//! [`Conventions`] assembles the pipelines the CLI commands run.

mod engine;
mod error;
mod events;
mod parallel;
mod presets;
pub mod stages;
mod state;

pub use engine::{EventPipeline, EventStage, FnStage, Lifted, Pipeline, Stage, StageResult, stage_fn};
pub use error::PipelineError;
pub use events::{EventLevel, EventLog, EventSink, StageEvent};
pub use parallel::{Parallel, ParallelEvents};
pub use presets::{Conventions, registry_for};
pub use stages::{Approval, ApprovalFn};
pub use state::{Outputs, State};
