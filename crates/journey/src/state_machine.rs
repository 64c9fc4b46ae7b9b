use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::types::ExecutionState;

/// Describes a single valid state transition for a journey execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ExecutionState,
    pub to: ExecutionState,
    pub trigger: String,
}

/// Guards execution lifecycle by enforcing a finite set of valid state
/// transitions. Terminal states absorb: nothing leaves completed, failed
/// or cancelled.
#[derive(Debug, Clone)]
pub struct ExecutionStateMachine {
    pub transitions: Vec<StateTransition>,
}

impl ExecutionStateMachine {
    /// Creates a state machine with all valid transitions pre-configured.
    pub fn new() -> Self {
        let transitions = vec![
            // Running ->
            StateTransition {
                from: ExecutionState::Running,
                to: ExecutionState::Waiting,
                trigger: "wait_node".to_string(),
            },
            StateTransition {
                from: ExecutionState::Running,
                to: ExecutionState::PendingApproval,
                trigger: "approval_required".to_string(),
            },
            StateTransition {
                from: ExecutionState::Running,
                to: ExecutionState::Completed,
                trigger: "end_node".to_string(),
            },
            StateTransition {
                from: ExecutionState::Running,
                to: ExecutionState::Failed,
                trigger: "node_failure".to_string(),
            },
            StateTransition {
                from: ExecutionState::Running,
                to: ExecutionState::Cancelled,
                trigger: "operator_cancel".to_string(),
            },
            // Waiting ->
            StateTransition {
                from: ExecutionState::Waiting,
                to: ExecutionState::Running,
                trigger: "wait_elapsed".to_string(),
            },
            StateTransition {
                from: ExecutionState::Waiting,
                to: ExecutionState::Cancelled,
                trigger: "operator_cancel".to_string(),
            },
            StateTransition {
                from: ExecutionState::Waiting,
                to: ExecutionState::Failed,
                trigger: "structural_failure".to_string(),
            },
            // PendingApproval ->
            StateTransition {
                from: ExecutionState::PendingApproval,
                to: ExecutionState::Running,
                trigger: "approved".to_string(),
            },
            StateTransition {
                from: ExecutionState::PendingApproval,
                to: ExecutionState::Failed,
                trigger: "rejected".to_string(),
            },
            StateTransition {
                from: ExecutionState::PendingApproval,
                to: ExecutionState::Cancelled,
                trigger: "operator_cancel".to_string(),
            },
        ];

        Self { transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: ExecutionState, to: ExecutionState) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == from && t.to == to)
    }

    /// Errors unless the transition is permitted.
    pub fn ensure(&self, from: ExecutionState, to: ExecutionState) -> Result<()> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(anyhow!(
                "Invalid state transition from {:?} to {:?}",
                from,
                to
            ))
        }
    }
}

impl Default for ExecutionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = ExecutionStateMachine::new();
        assert!(sm.can_transition(ExecutionState::Running, ExecutionState::Waiting));
        assert!(sm.can_transition(ExecutionState::Running, ExecutionState::PendingApproval));
        assert!(sm.can_transition(ExecutionState::Waiting, ExecutionState::Running));
        assert!(sm.can_transition(ExecutionState::PendingApproval, ExecutionState::Failed));
        assert!(sm.can_transition(ExecutionState::PendingApproval, ExecutionState::Cancelled));
    }

    #[test]
    fn test_terminal_states_absorb() {
        let sm = ExecutionStateMachine::new();
        for terminal in [
            ExecutionState::Completed,
            ExecutionState::Failed,
            ExecutionState::Cancelled,
        ] {
            assert!(!sm.can_transition(terminal, ExecutionState::Running));
            assert!(sm.ensure(terminal, ExecutionState::Running).is_err());
        }
    }

    #[test]
    fn test_waiting_cannot_jump_to_pending_approval() {
        let sm = ExecutionStateMachine::new();
        assert!(!sm.can_transition(ExecutionState::Waiting, ExecutionState::PendingApproval));
    }
}
