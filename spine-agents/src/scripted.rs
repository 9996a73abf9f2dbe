//! A scripted [`Reasoner`] for tests: per-agent queues of canned replies.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use spine_core::AgentName;

use crate::context::ProjectContext;
use crate::error::ReasonerError;
use crate::reasoner::Reasoner;
use crate::role::RoleConfig;

type Reply = Result<serde_json::Value, ReasonerError>;

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    pub agent: AgentName,
    pub instruction: String,
}

#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    replies: Mutex<HashMap<AgentName, VecDeque<Reply>>>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `agent`. Replies are consumed in order.
    pub fn reply(self, agent: &str, value: serde_json::Value) -> Self {
        self.push(agent, Ok(value));
        self
    }

    pub fn fail(self, agent: &str, error: ReasonerError) -> Self {
        self.push(agent, Err(error));
        self
    }

    pub fn push(&self, agent: &str, reply: Reply) {
        let mut replies = self.replies.lock().unwrap_or_else(|p| p.into_inner());
        replies.entry(AgentName::from(agent)).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Agents in call order.
    pub fn agents_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.agent.0).collect()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn generate(
        &self,
        role: &RoleConfig,
        instruction: &str,
        _context: &ProjectContext,
    ) -> Result<serde_json::Value, ReasonerError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ScriptedCall {
                agent: role.agent.clone(),
                instruction: instruction.to_owned(),
            });
        let mut replies = self.replies.lock().unwrap_or_else(|p| p.into_inner());
        replies
            .get_mut(&role.agent)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ReasonerError::Unavailable(format!(
                    "no scripted reply left for '{}'",
                    role.agent
                )))
            })
    }
}
