//! Turn bookkeeping for the conversation loop that drives the tools.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, UsageLog};

/// What happened in one question/answer turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_question: String,
    pub agent_response: String,
    pub tools_used: Vec<AuditEntry>,
}

/// Close a turn: capture the tools used so far and clear the log for the next one.
pub fn finish_turn(
    log: &UsageLog,
    user_question: impl Into<String>,
    agent_response: impl Into<String>,
) -> InteractionRecord {
    let tools_used = log.snapshot();
    log.reset();
    InteractionRecord {
        user_question: user_question.into(),
        agent_response: agent_response.into(),
        tools_used,
    }
}
