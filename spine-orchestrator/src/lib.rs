//! Orchestration & continuity engine: routes tasks to agents, persists their
//! handoffs, and follows each chain until it ends.
//!
//! ```no_run
//! # async fn demo(orchestrator: spine_orchestrator::Orchestrator) -> Result<(), spine_orchestrator::OrchestratorError> {
//! use spine_core::Metadata;
//! use spine_orchestrator::Orchestrator;
//!
//! let project = orchestrator.create_project("atlas", "map every service", Metadata::new()).await?;
//! let report = orchestrator.run_chain(Orchestrator::kickoff_task(&project)).await?;
//! println!("{:?} ended: {:?}", report.agents(), report.end);
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod error;
pub mod orchestrator;

pub use chain::{ChainEnd, ChainReport, ChainStep, TaskState};
pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
