use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifecycle_core::channels::Channel;
use lifecycle_rules::RuleOperator;

/// A journey definition: a directed graph of typed nodes describing a
/// multi-step automated customer workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: JourneyStatus,
    pub trigger: TriggerDefinition,
    pub nodes: HashMap<Uuid, JourneyNode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl Journey {
    pub fn node(&self, id: &Uuid) -> Option<&JourneyNode> {
        self.nodes.get(id)
    }

    /// The graph's single entry point. Validation guarantees exactly one
    /// trigger node exists on an activated journey.
    pub fn trigger_node(&self) -> Option<&JourneyNode> {
        self.nodes
            .values()
            .find(|n| matches!(n.kind, NodeKind::Trigger))
    }
}

/// Lifecycle status of a journey definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

/// What makes a customer eligible to enter a journey. Entry eligibility is
/// decided by the surrounding targeting layer; the engine records the
/// definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TriggerDefinition {
    SegmentEntry { segment_id: Uuid },
    StageEntry { stage_slug: String },
    EventBased { event_type: String },
    Manual,
}

/// A single node within a journey graph. `next` holds the ordered outgoing
/// edges; its required length depends on the node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyNode {
    pub id: Uuid,
    pub kind: NodeKind,
    pub next: Vec<Uuid>,
}

/// Node kind plus its kind-specific configuration. Every consumption site
/// matches exhaustively, so a new kind forces a review of all handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum NodeKind {
    /// Entry point; exactly one per journey, one outgoing edge, no
    /// incoming edges.
    Trigger,
    /// Side-effecting send; one outgoing edge.
    Action(ActionConfig),
    /// Suspension for a duration; one outgoing edge.
    Wait(WaitConfig),
    /// Two outgoing edges ordered [true_target, false_target].
    Condition(ConditionConfig),
    /// N outgoing edges matching N weighted branches.
    Split(SplitConfig),
    /// Terminal; no outgoing edges.
    End,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Action(_) => "action",
            NodeKind::Wait(_) => "wait",
            NodeKind::Condition(_) => "condition",
            NodeKind::Split(_) => "split",
            NodeKind::End => "end",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub channel: Channel,
    /// Message template with `{{variable}}` placeholders, rendered against
    /// the customer context at dispatch time.
    pub template: String,
    #[serde(default)]
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    pub duration_secs: u64,
}

/// A single comparison evaluated against the customer's attributes at the
/// moment the node is reached, never cached from entry time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub field: String,
    pub operator: RuleOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub branches: Vec<SplitBranch>,
}

/// A weighted split branch. Weights across a split's branches sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitBranch {
    pub name: String,
    pub weight: u8,
}

/// One customer's live progress through a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyExecution {
    pub id: Uuid,
    pub journey_id: Uuid,
    pub customer_id: Uuid,
    pub current_node_id: Uuid,
    pub state: ExecutionState,
    pub entered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while `waiting`; advancement before this instant is refused.
    pub wait_until: Option<DateTime<Utc>>,
    /// Split draws already made for this execution, keyed by split node id.
    /// A draw is fixed for the life of the execution and reused on replay.
    pub split_assignments: HashMap<Uuid, Uuid>,
    pub failure: Option<ExecutionFailure>,
    pub history: Vec<NodeExecution>,
}

/// Runtime state of a journey execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Waiting,
    PendingApproval,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }
}

/// Why an execution failed. Structural problems (bad graph discovered at
/// run time) are audited separately from send failures and rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Structural,
    Dispatch,
    ApprovalRejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Audit record of a node processed for an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub node_id: Uuid,
    pub node_type: String,
    pub entered_at: DateTime<Utc>,
    pub outcome: String,
}

/// Aggregate statistics for a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyStats {
    pub journey_id: Uuid,
    pub total_entered: u64,
    pub running: u64,
    pub waiting: u64,
    pub pending_approval: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub avg_completion_time_secs: f64,
}
