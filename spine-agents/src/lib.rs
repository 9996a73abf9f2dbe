//! Agent Invocation Shim for the Knowledge Spine.
//!
//! - [`AgentShim`]: one per registered agent, parameterised by [`RoleConfig`]
//! - [`Reasoner`]: the external reasoning capability the shim calls
//! - [`PromptRenderer`]: tera templates for the role instructions
//! - [`ReasoningOutput`]: the structured reply a reasoner must return

pub mod context;
pub mod error;
pub mod output;
pub mod prompt;
pub mod reasoner;
pub mod role;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;
pub mod shim;

pub use context::ProjectContext;
pub use error::{AgentError, ReasonerError, RenderError};
pub use output::{ArtifactDraft, DecisionDraft, ReasoningOutput};
pub use prompt::PromptRenderer;
pub use reasoner::Reasoner;
pub use role::RoleConfig;
#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedReasoner;
pub use shim::AgentShim;
