//! Wait scheduler — poll-based resumption of suspended executions.
//!
//! The engine never blocks a thread for a wait; it records a deadline and
//! parks the execution. Something external has to call back in once the
//! deadline passes — this scheduler is that collaborator. `tick` is
//! synchronous so the owner decides the cadence (the worker binary drives
//! it from a timer loop).

use chrono::Utc;
use tracing::{debug, warn};

use crate::engine::JourneyEngine;
use crate::types::ExecutionState;

/// Upper bound on nodes processed per execution per tick, so a cyclic
/// graph of immediate nodes cannot spin a tick forever.
const MAX_STEPS_PER_TICK: usize = 64;

pub struct WaitScheduler {
    engine: JourneyEngine,
}

impl WaitScheduler {
    pub fn new(engine: JourneyEngine) -> Self {
        Self { engine }
    }

    /// Resumes every waiting execution whose deadline has elapsed and
    /// advances it to its next rest state. Returns how many executions
    /// were resumed.
    pub fn tick(&self) -> usize {
        let due = self.engine.due_waiting(Utc::now());
        let mut resumed = 0usize;

        for execution_id in due {
            match self.engine.resume(&execution_id) {
                Ok(ExecutionState::Running) => {
                    resumed += 1;
                    if let Err(e) = self.engine.drive(&execution_id, MAX_STEPS_PER_TICK) {
                        warn!(
                            execution_id = %execution_id,
                            error = %e,
                            "Failed to advance resumed execution"
                        );
                    }
                }
                Ok(state) => {
                    debug!(execution_id = %execution_id, ?state, "Resume left unexpected state");
                }
                // Another process may have resumed or cancelled it between
                // the scan and this call; that is not an error for the tick.
                Err(e) => {
                    debug!(execution_id = %execution_id, reason = %e, "Skipped resume");
                }
            }
        }

        if resumed > 0 {
            debug!(resumed, "Scheduler tick resumed executions");
        }
        resumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ActionConfig, Journey, JourneyNode, JourneyStatus, NodeKind, TriggerDefinition, WaitConfig,
    };
    use chrono::Utc;
    use lifecycle_core::channels::{CaptureDispatcher, Channel};
    use lifecycle_core::types::{Customer, InMemoryCustomerSource};
    use std::sync::Arc;
    use uuid::Uuid;

    fn node(kind: NodeKind, next: Vec<Uuid>) -> JourneyNode {
        JourneyNode {
            id: Uuid::new_v4(),
            kind,
            next,
        }
    }

    /// trigger -> wait(0s) -> email -> end
    fn wait_journey() -> Journey {
        let end = node(NodeKind::End, vec![]);
        let send = node(
            NodeKind::Action(ActionConfig {
                channel: Channel::Email,
                template: "Welcome back {{name}}".to_string(),
                requires_approval: false,
            }),
            vec![end.id],
        );
        let wait = node(NodeKind::Wait(WaitConfig { duration_secs: 0 }), vec![send.id]);
        let trigger = node(NodeKind::Trigger, vec![wait.id]);
        let now = Utc::now();
        Journey {
            id: Uuid::new_v4(),
            name: "Wait Journey".to_string(),
            description: "scheduler fixture".to_string(),
            status: JourneyStatus::Active,
            trigger: TriggerDefinition::Manual,
            nodes: [trigger, wait, send, end]
                .into_iter()
                .map(|n| (n.id, n))
                .collect(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn test_tick_resumes_elapsed_waits_to_completion() {
        let customers = Arc::new(InMemoryCustomerSource::new());
        let dispatcher = Arc::new(CaptureDispatcher::new());
        let engine =
            JourneyEngine::new(customers.clone()).with_dispatcher(dispatcher.clone());
        let journey = wait_journey();
        let journey_id = journey.id;
        engine.create_journey(journey).unwrap();

        let ada = Customer::new(Uuid::new_v4(), "Ada");
        customers.insert(ada.clone());
        let execution_id = engine.enter_journey(&journey_id, &ada.id).unwrap();
        engine.advance(&execution_id).unwrap();
        assert_eq!(
            engine.execution_state(&execution_id).unwrap(),
            ExecutionState::Waiting
        );

        let scheduler = WaitScheduler::new(engine.clone());
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(
            engine.execution_state(&execution_id).unwrap(),
            ExecutionState::Completed
        );
        assert_eq!(dispatcher.count(), 1);

        // Nothing left to resume.
        assert_eq!(scheduler.tick(), 0);
    }
}
