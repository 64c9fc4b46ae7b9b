//! Per-node evaluation — turns the current node of an execution into a
//! `NodeOutcome` describing what the engine should do next. Evaluation
//! itself performs no side effects; dispatching and state changes belong
//! to the engine.

use anyhow::{anyhow, Result};
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use lifecycle_core::channels::Channel;
use lifecycle_core::types::Customer;
use lifecycle_rules::evaluator::compare;

use crate::types::{JourneyExecution, JourneyNode, NodeKind, SplitBranch};

/// What should happen after evaluating a node.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Send a message, then continue to `next` (or halt for approval).
    Dispatch {
        channel: Channel,
        template: String,
        requires_approval: bool,
        next: Uuid,
    },
    /// Suspend for at least `duration_secs`, then continue at `next`.
    Suspend { duration_secs: u64, next: Uuid },
    /// Continue to `next` immediately.
    Branch { next: Uuid },
    /// Terminal node reached.
    Finish,
}

/// Evaluates journey nodes for a given execution context.
#[derive(Debug, Clone)]
pub struct NodeEvaluator;

impl NodeEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates a single node. `customer` is the freshest attribute
    /// snapshot available; conditions read it at this moment, never a
    /// cached copy from entry time. Errors are structural configuration
    /// problems discovered at run time.
    pub fn evaluate(
        &self,
        node: &JourneyNode,
        customer: Option<&Customer>,
        execution: &JourneyExecution,
    ) -> Result<NodeOutcome> {
        debug!(
            node_id = %node.id,
            execution_id = %execution.id,
            kind = node.kind.label(),
            "Evaluating journey node"
        );

        match &node.kind {
            NodeKind::Trigger => {
                let next = single_target(node)?;
                Ok(NodeOutcome::Branch { next })
            }
            NodeKind::Action(config) => {
                let next = single_target(node)?;
                Ok(NodeOutcome::Dispatch {
                    channel: config.channel,
                    template: config.template.clone(),
                    requires_approval: config.requires_approval,
                    next,
                })
            }
            NodeKind::Wait(config) => {
                let next = single_target(node)?;
                Ok(NodeOutcome::Suspend {
                    duration_secs: config.duration_secs,
                    next,
                })
            }
            NodeKind::Condition(config) => {
                let [true_target, false_target] = node.next.as_slice() else {
                    return Err(anyhow!(
                        "condition node {} has {} targets, expected 2",
                        node.id,
                        node.next.len()
                    ));
                };
                // A missing customer or attribute is an evaluation miss:
                // the condition does not match and routes to the false arm.
                let matched = customer
                    .and_then(|c| c.attribute(&config.field))
                    .map_or(false, |value| {
                        compare(config.operator, &value, &config.value, None)
                    });
                Ok(NodeOutcome::Branch {
                    next: if matched { *true_target } else { *false_target },
                })
            }
            NodeKind::Split(config) => {
                // A draw made earlier in this execution's life is final.
                if let Some(target) = execution.split_assignments.get(&node.id) {
                    return Ok(NodeOutcome::Branch { next: *target });
                }
                if config.branches.is_empty() || node.next.len() != config.branches.len() {
                    return Err(anyhow!(
                        "split node {} has {} branches for {} targets",
                        node.id,
                        config.branches.len(),
                        node.next.len()
                    ));
                }
                let index = weighted_draw(&config.branches, &mut rand::thread_rng());
                Ok(NodeOutcome::Branch {
                    next: node.next[index],
                })
            }
            NodeKind::End => Ok(NodeOutcome::Finish),
        }
    }
}

impl Default for NodeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn single_target(node: &JourneyNode) -> Result<Uuid> {
    node.next
        .first()
        .copied()
        .ok_or_else(|| anyhow!("node {} has no outgoing edge", node.id))
}

/// Draws a branch index proportionally to the branch weights.
pub(crate) fn weighted_draw<R: Rng>(branches: &[SplitBranch], rng: &mut R) -> usize {
    let total: u32 = branches.iter().map(|b| b.weight as u32).sum();
    let mut roll = rng.gen_range(0..total.max(1));
    for (index, branch) in branches.iter().enumerate() {
        if roll < branch.weight as u32 {
            return index;
        }
        roll -= branch.weight as u32;
    }
    branches.len() - 1
}
