//! The outbound reasoning capability.

use async_trait::async_trait;

use crate::context::ProjectContext;
use crate::error::ReasonerError;
use crate::role::RoleConfig;

/// An external collaborator that turns a rendered instruction into structured
/// output (see [`crate::output::ReasoningOutput`] for the expected shape).
///
/// Implementations may block for a long time; callers treat `generate` as a
/// cancellable future. Shims are invoked concurrently, so implementations must
/// not assume one call at a time.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn generate(
        &self,
        role: &RoleConfig,
        instruction: &str,
        context: &ProjectContext,
    ) -> Result<serde_json::Value, ReasonerError>;
}
