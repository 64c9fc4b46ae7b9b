use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use lifecycle_core::channels::{
    ApprovalAuthority, ApprovalPreview, MessageDispatcher, NoOpApprovals, NoOpDispatcher,
};
use lifecycle_core::config::JourneyConfig;
use lifecycle_core::event_bus::{make_event, EventSink, EventType};
use lifecycle_core::templates;
use lifecycle_core::types::CustomerSource;

use crate::evaluator::{NodeEvaluator, NodeOutcome};
use crate::state_machine::ExecutionStateMachine;
use crate::types::{
    ExecutionFailure, ExecutionState, FailureKind, Journey, JourneyExecution, JourneyStats,
    JourneyStatus, NodeExecution, NodeKind,
};
use crate::validation::{validate, ValidationError};

/// Core orchestration engine — manages journey definitions and per-customer
/// executions.
///
/// Each execution is an independent unit of work. Advancement happens under
/// the execution's map entry lock, so a single execution is advanced by at
/// most one caller at a time while different executions proceed in
/// parallel. Collaborators (customer store, dispatcher, approval
/// authority, event sink) are injected; approval resolutions must arrive
/// asynchronously, never from inside `request_approval`.
#[derive(Clone)]
pub struct JourneyEngine {
    config: JourneyConfig,
    journeys: Arc<DashMap<Uuid, Journey>>,
    executions: Arc<DashMap<Uuid, JourneyExecution>>,
    evaluator: NodeEvaluator,
    state_machine: ExecutionStateMachine,
    customers: Arc<dyn CustomerSource>,
    dispatcher: Arc<dyn MessageDispatcher>,
    approvals: Arc<dyn ApprovalAuthority>,
    event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for JourneyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyEngine")
            .field("journeys", &self.journeys.len())
            .field("executions", &self.executions.len())
            .finish()
    }
}

impl JourneyEngine {
    /// Creates a new engine with no-op collaborators and default config.
    pub fn new(customers: Arc<dyn CustomerSource>) -> Self {
        Self {
            config: JourneyConfig::default(),
            journeys: Arc::new(DashMap::new()),
            executions: Arc::new(DashMap::new()),
            evaluator: NodeEvaluator::new(),
            state_machine: ExecutionStateMachine::new(),
            customers,
            dispatcher: Arc::new(NoOpDispatcher),
            approvals: Arc::new(NoOpApprovals),
            event_sink: lifecycle_core::event_bus::noop_sink(),
        }
    }

    pub fn with_config(mut self, config: JourneyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_approvals(mut self, approvals: Arc<dyn ApprovalAuthority>) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    // ------------------------------------------------------------------
    // Journey management
    // ------------------------------------------------------------------

    /// Stores a journey definition as authored and returns its id.
    pub fn create_journey(&self, journey: Journey) -> Result<Uuid> {
        let id = journey.id;
        let errors = validate(&journey);
        info!(
            journey_id = %id,
            name = %journey.name,
            validation_errors = errors.len(),
            "Creating journey"
        );
        self.journeys.insert(id, journey);
        Ok(id)
    }

    /// Returns a clone of the journey with the given id, if it exists.
    pub fn get_journey(&self, id: &Uuid) -> Option<Journey> {
        self.journeys.get(id).map(|r| r.clone())
    }

    /// Returns all journeys.
    pub fn list_journeys(&self) -> Vec<Journey> {
        self.journeys.iter().map(|r| r.value().clone()).collect()
    }

    /// Runs the structural validation pass over a stored journey.
    pub fn validate_journey(&self, id: &Uuid) -> Result<Vec<ValidationError>> {
        let journey = self
            .journeys
            .get(id)
            .ok_or_else(|| anyhow!("Journey {} not found", id))?;
        Ok(validate(&journey))
    }

    /// Activates a journey. Refused while structural validation errors
    /// exist, with the full offending-node list in the error.
    pub fn activate_journey(&self, id: &Uuid) -> Result<()> {
        let active = self
            .journeys
            .iter()
            .filter(|j| j.status == JourneyStatus::Active)
            .count();

        let mut entry = self
            .journeys
            .get_mut(id)
            .ok_or_else(|| anyhow!("Journey {} not found", id))?;

        let errors = validate(&entry);
        if !errors.is_empty() {
            let list = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(anyhow!("Journey {} failed validation: {}", id, list));
        }
        if entry.status != JourneyStatus::Active && active >= self.config.max_active_journeys {
            return Err(anyhow!(
                "Active journey limit {} reached",
                self.config.max_active_journeys
            ));
        }

        info!(journey_id = %id, "Activating journey");
        entry.status = JourneyStatus::Active;
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Pauses an active journey. Existing executions keep their state and
    /// can still be advanced; only new entries are blocked.
    pub fn pause_journey(&self, id: &Uuid) -> Result<()> {
        let mut entry = self
            .journeys
            .get_mut(id)
            .ok_or_else(|| anyhow!("Journey {} not found", id))?;
        if entry.status != JourneyStatus::Active {
            return Err(anyhow!("Journey {} is {:?}, not active", id, entry.status));
        }
        info!(journey_id = %id, "Pausing journey");
        entry.status = JourneyStatus::Paused;
        entry.updated_at = Utc::now();
        Ok(())
    }

    /// Removes a journey from the engine.
    pub fn delete_journey(&self, id: &Uuid) -> Result<()> {
        self.journeys
            .remove(id)
            .ok_or_else(|| anyhow!("Journey {} not found", id))?;
        info!(journey_id = %id, "Deleted journey");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution lifecycle
    // ------------------------------------------------------------------

    /// Creates a new execution for the given customer. The trigger node is
    /// passed through immediately: the execution starts `running` at the
    /// trigger's successor.
    pub fn enter_journey(&self, journey_id: &Uuid, customer_id: &Uuid) -> Result<Uuid> {
        // Copy what we need out of the journey guard before touching the
        // executions map.
        let trigger = {
            let journey = self
                .journeys
                .get(journey_id)
                .ok_or_else(|| anyhow!("Journey {} not found", journey_id))?;

            if journey.status != JourneyStatus::Active {
                return Err(anyhow!("Journey {} is not active", journey_id));
            }
            journey
                .trigger_node()
                .ok_or_else(|| anyhow!("Journey {} has no trigger node", journey_id))?
                .clone()
        };

        let mut live = 0usize;
        for entry in self.executions.iter() {
            if entry.journey_id != *journey_id {
                continue;
            }
            live += 1;
            if entry.customer_id == *customer_id && !entry.state.is_terminal() {
                return Err(anyhow!(
                    "Customer {} already has a live execution in journey {}",
                    customer_id,
                    journey_id
                ));
            }
        }
        if live >= self.config.max_executions_per_journey {
            return Err(anyhow!(
                "Journey {} reached its execution limit {}",
                journey_id,
                self.config.max_executions_per_journey
            ));
        }

        let entry_node = trigger
            .next
            .first()
            .copied()
            .ok_or_else(|| anyhow!("Journey {} trigger has no successor", journey_id))?;

        let now = Utc::now();
        let execution = JourneyExecution {
            id: Uuid::new_v4(),
            journey_id: *journey_id,
            customer_id: *customer_id,
            current_node_id: entry_node,
            state: ExecutionState::Running,
            entered_at: now,
            updated_at: now,
            wait_until: None,
            split_assignments: std::collections::HashMap::new(),
            failure: None,
            history: vec![NodeExecution {
                node_id: trigger.id,
                node_type: trigger.kind.label().to_string(),
                entered_at: now,
                outcome: "entered".to_string(),
            }],
        };
        let execution_id = execution.id;

        info!(
            execution_id = %execution_id,
            journey_id = %journey_id,
            customer_id = %customer_id,
            "Customer entered journey"
        );
        metrics::counter!("journey.executions_entered").increment(1);
        self.emit(
            EventType::JourneyEntered,
            &execution,
            Some(trigger.id),
            None,
        );

        self.executions.insert(execution_id, execution);
        Ok(execution_id)
    }

    /// Processes exactly one node for a `running` execution and returns the
    /// resulting state. Runtime configuration errors mark the execution
    /// `failed` (structural) without touching other executions.
    pub fn advance(&self, execution_id: &Uuid) -> Result<ExecutionState> {
        let mut execution = self
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))?;

        if execution.state != ExecutionState::Running {
            return Err(anyhow!(
                "Execution {} is {:?} and cannot be advanced",
                execution_id,
                execution.state
            ));
        }

        let journey = self
            .journeys
            .get(&execution.journey_id)
            .ok_or_else(|| anyhow!("Journey {} not found", execution.journey_id))?;

        let now = Utc::now();
        let node = match journey.node(&execution.current_node_id) {
            Some(node) => node.clone(),
            None => {
                let message = format!(
                    "current node {} does not exist in journey {}",
                    execution.current_node_id, journey.id
                );
                self.fail(&mut execution, FailureKind::Structural, "unknown", message);
                return Ok(ExecutionState::Failed);
            }
        };

        // Fresh attribute read at the moment of evaluation; condition nodes
        // never see values cached from entry time.
        let customer = self.customers.attributes(&execution.customer_id);

        let outcome = match self.evaluator.evaluate(&node, customer.as_ref(), &execution) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(
                    &mut execution,
                    FailureKind::Structural,
                    node.kind.label(),
                    e.to_string(),
                );
                return Ok(ExecutionState::Failed);
            }
        };

        match outcome {
            NodeOutcome::Dispatch {
                channel,
                template,
                requires_approval,
                next,
            } => {
                if !journey.nodes.contains_key(&next) {
                    let message = format!("node {} references unknown node {}", node.id, next);
                    self.fail(&mut execution, FailureKind::Structural, "action", message);
                    return Ok(ExecutionState::Failed);
                }
                let Some(customer) = customer else {
                    let message = format!(
                        "customer {} not found in store, cannot render message",
                        execution.customer_id
                    );
                    self.fail(&mut execution, FailureKind::Structural, "action", message);
                    return Ok(ExecutionState::Failed);
                };
                let content = templates::render(&template, &templates::customer_context(&customer));

                if requires_approval {
                    self.state_machine
                        .ensure(execution.state, ExecutionState::PendingApproval)?;
                    execution.state = ExecutionState::PendingApproval;
                    self.record(&mut execution, &node, now, "approval_requested");
                    self.emit(EventType::ApprovalRequested, &execution, Some(node.id), None);
                    self.approvals.request_approval(
                        execution.id,
                        ApprovalPreview {
                            channel,
                            customer_id: execution.customer_id,
                            content,
                        },
                    );
                } else {
                    match self.dispatcher.send(channel, &execution.customer_id, &content) {
                        Ok(receipt) => {
                            metrics::counter!(
                                "journey.messages_dispatched",
                                "channel" => channel.as_str()
                            )
                            .increment(1);
                            self.record(&mut execution, &node, now, "dispatched");
                            self.emit(
                                EventType::MessageDispatched,
                                &execution,
                                Some(node.id),
                                Some(receipt.provider_message_id),
                            );
                            execution.current_node_id = next;
                        }
                        Err(e) => {
                            metrics::counter!(
                                "journey.dispatch_failures",
                                "channel" => channel.as_str()
                            )
                            .increment(1);
                            self.emit(
                                EventType::DispatchFailed,
                                &execution,
                                Some(node.id),
                                Some(e.to_string()),
                            );
                            self.fail(
                                &mut execution,
                                FailureKind::Dispatch,
                                "action",
                                e.to_string(),
                            );
                        }
                    }
                }
            }
            NodeOutcome::Suspend {
                duration_secs,
                next,
            } => {
                if !journey.nodes.contains_key(&next) {
                    let message = format!("node {} references unknown node {}", node.id, next);
                    self.fail(&mut execution, FailureKind::Structural, "wait", message);
                    return Ok(ExecutionState::Failed);
                }
                self.state_machine
                    .ensure(execution.state, ExecutionState::Waiting)?;
                execution.state = ExecutionState::Waiting;
                execution.wait_until = Some(now + Duration::seconds(duration_secs as i64));
                execution.current_node_id = next;
                self.record(&mut execution, &node, now, "waiting");
                self.emit(
                    EventType::WaitScheduled,
                    &execution,
                    Some(node.id),
                    Some(format!("{duration_secs}s")),
                );
            }
            NodeOutcome::Branch { next } => {
                if !journey.nodes.contains_key(&next) {
                    let message = format!("node {} references unknown node {}", node.id, next);
                    self.fail(
                        &mut execution,
                        FailureKind::Structural,
                        node.kind.label(),
                        message,
                    );
                    return Ok(ExecutionState::Failed);
                }
                // A split draw is fixed for the life of the execution.
                if matches!(node.kind, NodeKind::Split(_)) {
                    execution.split_assignments.entry(node.id).or_insert(next);
                }
                execution.current_node_id = next;
                self.record(&mut execution, &node, now, "branched");
                self.emit(EventType::NodeCompleted, &execution, Some(node.id), None);
            }
            NodeOutcome::Finish => {
                self.state_machine
                    .ensure(execution.state, ExecutionState::Completed)?;
                execution.state = ExecutionState::Completed;
                self.record(&mut execution, &node, now, "completed");
                self.emit(EventType::ExecutionCompleted, &execution, Some(node.id), None);
                metrics::counter!("journey.executions_completed").increment(1);
                info!(execution_id = %execution.id, "Execution completed");
            }
        }

        execution.updated_at = now;
        Ok(execution.state)
    }

    /// Advances a `running` execution until it comes to rest (waits,
    /// completes, halts for approval or fails), bounded by `max_steps` so a
    /// condition cycle cannot spin forever in one call.
    pub fn drive(&self, execution_id: &Uuid, max_steps: usize) -> Result<ExecutionState> {
        let mut state = self.execution_state(execution_id)?;
        for _ in 0..max_steps {
            if state != ExecutionState::Running {
                break;
            }
            state = self.advance(execution_id)?;
        }
        Ok(state)
    }

    /// Scheduler entry point: moves an elapsed `waiting` execution back to
    /// `running`. Early resumption is refused — the wait duration is a
    /// lower bound.
    pub fn resume(&self, execution_id: &Uuid) -> Result<ExecutionState> {
        let mut execution = self
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))?;

        if execution.state != ExecutionState::Waiting {
            return Err(anyhow!(
                "Execution {} is {:?}, not waiting",
                execution_id,
                execution.state
            ));
        }
        let wait_until = execution
            .wait_until
            .ok_or_else(|| anyhow!("Execution {} is waiting without a deadline", execution_id))?;
        let now = Utc::now();
        if now < wait_until {
            return Err(anyhow!(
                "Execution {} wait has not elapsed (until {})",
                execution_id,
                wait_until
            ));
        }

        self.state_machine
            .ensure(execution.state, ExecutionState::Running)?;
        execution.state = ExecutionState::Running;
        execution.wait_until = None;
        execution.updated_at = now;
        self.emit(EventType::WaitResumed, &execution, None, None);
        Ok(execution.state)
    }

    /// Resolves a pending approval positively: the held send is dispatched
    /// and the execution continues past the action node.
    pub fn approve(&self, execution_id: &Uuid) -> Result<ExecutionState> {
        let mut execution = self
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))?;

        if execution.state != ExecutionState::PendingApproval {
            return Err(anyhow!(
                "Execution {} is {:?}, no approval is pending",
                execution_id,
                execution.state
            ));
        }

        let journey = self
            .journeys
            .get(&execution.journey_id)
            .ok_or_else(|| anyhow!("Journey {} not found", execution.journey_id))?;

        let now = Utc::now();
        let node = match journey.node(&execution.current_node_id) {
            Some(node) => node.clone(),
            None => {
                let message = format!(
                    "current node {} does not exist in journey {}",
                    execution.current_node_id, journey.id
                );
                self.fail(&mut execution, FailureKind::Structural, "unknown", message);
                return Ok(ExecutionState::Failed);
            }
        };
        let NodeKind::Action(config) = &node.kind else {
            let message = format!("approval resolved at non-action node {}", node.id);
            self.fail(
                &mut execution,
                FailureKind::Structural,
                node.kind.label(),
                message,
            );
            return Ok(ExecutionState::Failed);
        };
        let Some(next) = node.next.first().copied().filter(|n| journey.nodes.contains_key(n))
        else {
            let message = format!("action node {} has no resolvable successor", node.id);
            self.fail(&mut execution, FailureKind::Structural, "action", message);
            return Ok(ExecutionState::Failed);
        };
        let Some(customer) = self.customers.attributes(&execution.customer_id) else {
            let message = format!(
                "customer {} not found in store, cannot render message",
                execution.customer_id
            );
            self.fail(&mut execution, FailureKind::Structural, "action", message);
            return Ok(ExecutionState::Failed);
        };

        let content =
            templates::render(&config.template, &templates::customer_context(&customer));
        match self
            .dispatcher
            .send(config.channel, &execution.customer_id, &content)
        {
            Ok(receipt) => {
                metrics::counter!(
                    "journey.messages_dispatched",
                    "channel" => config.channel.as_str()
                )
                .increment(1);
                self.state_machine
                    .ensure(execution.state, ExecutionState::Running)?;
                execution.state = ExecutionState::Running;
                execution.current_node_id = next;
                self.record(&mut execution, &node, now, "approved");
                self.emit(EventType::ApprovalGranted, &execution, Some(node.id), None);
                self.emit(
                    EventType::MessageDispatched,
                    &execution,
                    Some(node.id),
                    Some(receipt.provider_message_id),
                );
            }
            Err(e) => {
                metrics::counter!(
                    "journey.dispatch_failures",
                    "channel" => config.channel.as_str()
                )
                .increment(1);
                self.emit(
                    EventType::DispatchFailed,
                    &execution,
                    Some(node.id),
                    Some(e.to_string()),
                );
                self.fail(&mut execution, FailureKind::Dispatch, "action", e.to_string());
            }
        }

        execution.updated_at = now;
        Ok(execution.state)
    }

    /// Resolves a pending approval negatively. A normal terminal outcome,
    /// recorded distinctly from system failures.
    pub fn reject(&self, execution_id: &Uuid, reason: &str) -> Result<ExecutionState> {
        let mut execution = self
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))?;

        if execution.state != ExecutionState::PendingApproval {
            return Err(anyhow!(
                "Execution {} is {:?}, no approval is pending",
                execution_id,
                execution.state
            ));
        }

        self.state_machine
            .ensure(execution.state, ExecutionState::Failed)?;
        let now = Utc::now();
        execution.failure = Some(ExecutionFailure {
            kind: FailureKind::ApprovalRejected,
            message: reason.to_string(),
            failed_at: now,
        });
        execution.state = ExecutionState::Failed;
        let current_node_id = execution.current_node_id;
        execution.history.push(NodeExecution {
            node_id: current_node_id,
            node_type: "action".to_string(),
            entered_at: now,
            outcome: "rejected".to_string(),
        });
        execution.updated_at = now;

        info!(execution_id = %execution_id, reason, "Approval rejected");
        self.emit(
            EventType::ApprovalRejected,
            &execution,
            Some(execution.current_node_id),
            Some(reason.to_string()),
        );
        Ok(execution.state)
    }

    /// Cancels a `running`, `waiting` or `pending_approval` execution.
    pub fn cancel(&self, execution_id: &Uuid) -> Result<ExecutionState> {
        let mut execution = self
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))?;

        self.state_machine
            .ensure(execution.state, ExecutionState::Cancelled)?;
        let now = Utc::now();
        execution.state = ExecutionState::Cancelled;
        execution.wait_until = None;
        let current_node_id = execution.current_node_id;
        execution.history.push(NodeExecution {
            node_id: current_node_id,
            node_type: "cancel".to_string(),
            entered_at: now,
            outcome: "cancelled".to_string(),
        });
        execution.updated_at = now;

        info!(execution_id = %execution_id, "Execution cancelled");
        self.emit(EventType::ExecutionCancelled, &execution, None, None);
        Ok(execution.state)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_execution(&self, execution_id: &Uuid) -> Option<JourneyExecution> {
        self.executions.get(execution_id).map(|r| r.clone())
    }

    pub fn execution_state(&self, execution_id: &Uuid) -> Result<ExecutionState> {
        self.executions
            .get(execution_id)
            .map(|r| r.state)
            .ok_or_else(|| anyhow!("Execution {} not found", execution_id))
    }

    pub fn list_executions(&self, journey_id: &Uuid) -> Vec<JourneyExecution> {
        self.executions
            .iter()
            .filter(|r| r.journey_id == *journey_id)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Ids of `waiting` executions whose deadline has elapsed at `now`.
    pub fn due_waiting(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.executions
            .iter()
            .filter(|r| {
                r.state == ExecutionState::Waiting
                    && r.wait_until.map_or(false, |until| until <= now)
            })
            .map(|r| r.id)
            .collect()
    }

    /// Computes aggregate statistics for the given journey.
    pub fn stats(&self, journey_id: &Uuid) -> JourneyStats {
        let mut total_entered: u64 = 0;
        let mut running: u64 = 0;
        let mut waiting: u64 = 0;
        let mut pending_approval: u64 = 0;
        let mut completed: u64 = 0;
        let mut failed: u64 = 0;
        let mut cancelled: u64 = 0;
        let mut total_completion_secs: f64 = 0.0;
        let mut completion_count: u64 = 0;

        for entry in self.executions.iter() {
            let execution = entry.value();
            if execution.journey_id != *journey_id {
                continue;
            }
            total_entered += 1;
            match execution.state {
                ExecutionState::Running => running += 1,
                ExecutionState::Waiting => waiting += 1,
                ExecutionState::PendingApproval => pending_approval += 1,
                ExecutionState::Completed => {
                    completed += 1;
                    let duration = execution
                        .updated_at
                        .signed_duration_since(execution.entered_at)
                        .num_seconds() as f64;
                    total_completion_secs += duration;
                    completion_count += 1;
                }
                ExecutionState::Failed => failed += 1,
                ExecutionState::Cancelled => cancelled += 1,
            }
        }

        let avg_completion_time_secs = if completion_count > 0 {
            total_completion_secs / completion_count as f64
        } else {
            0.0
        };

        JourneyStats {
            journey_id: *journey_id,
            total_entered,
            running,
            waiting,
            pending_approval,
            completed,
            failed,
            cancelled,
            avg_completion_time_secs,
        }
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn record(
        &self,
        execution: &mut JourneyExecution,
        node: &crate::types::JourneyNode,
        now: DateTime<Utc>,
        outcome: &str,
    ) {
        execution.history.push(NodeExecution {
            node_id: node.id,
            node_type: node.kind.label().to_string(),
            entered_at: now,
            outcome: outcome.to_string(),
        });
    }

    fn fail(
        &self,
        execution: &mut JourneyExecution,
        kind: FailureKind,
        node_label: &str,
        message: String,
    ) {
        warn!(
            execution_id = %execution.id,
            ?kind,
            error = %message,
            "Execution failed"
        );
        let now = Utc::now();
        execution.failure = Some(ExecutionFailure {
            kind,
            message: message.clone(),
            failed_at: now,
        });
        execution.state = ExecutionState::Failed;
        execution.history.push(NodeExecution {
            node_id: execution.current_node_id,
            node_type: node_label.to_string(),
            entered_at: now,
            outcome: "failed".to_string(),
        });
        execution.updated_at = now;
        self.emit(EventType::ExecutionFailed, execution, None, Some(message));
    }

    fn emit(
        &self,
        event_type: EventType,
        execution: &JourneyExecution,
        node_id: Option<Uuid>,
        detail: Option<String>,
    ) {
        let mut event = make_event(
            event_type,
            Some(execution.journey_id),
            Some(execution.id),
            Some(execution.customer_id),
        );
        event.node_id = node_id;
        event.detail = detail;
        self.event_sink.emit(event);
    }
}
