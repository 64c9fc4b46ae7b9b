//! Static structural validation of a journey graph. Runs at authoring and
//! activation time; it never executes the journey. The error list is
//! deterministic (nodes are visited in sorted-id order), so repeated runs
//! over an unchanged definition yield the same result.

use std::collections::{HashSet, VecDeque};

use thiserror::Error;
use uuid::Uuid;

use lifecycle_rules::RuleOperator;

use crate::types::{Journey, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("journey has no trigger node")]
    MissingTrigger,

    #[error("journey has {count} trigger nodes, expected exactly one")]
    MultipleTriggers { count: usize },

    #[error("trigger node {node} has an incoming edge from {source_node}")]
    TriggerHasIncomingEdge { node: Uuid, source_node: Uuid },

    #[error("{kind} node {node} has {actual} outgoing edges, expected {expected}")]
    EdgeCountMismatch {
        node: Uuid,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("node {node} references unknown node {target}")]
    UnresolvedTarget { node: Uuid, target: Uuid },

    #[error("split node {node} has {branches} branches but {targets} targets")]
    SplitBranchMismatch {
        node: Uuid,
        branches: usize,
        targets: usize,
    },

    #[error("split node {node} branch weights sum to {sum}, expected 100")]
    SplitWeightSum { node: Uuid, sum: u32 },

    #[error("condition node {node} uses 'between', which takes two bounds; conditions carry a single value")]
    ConditionBetween { node: Uuid },

    #[error("node {node} is unreachable from the trigger")]
    Unreachable { node: Uuid },
}

/// Validates the journey graph, returning every structural error found.
/// An empty list means the journey is safe to activate.
pub fn validate(journey: &Journey) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut node_ids: Vec<Uuid> = journey.nodes.keys().copied().collect();
    node_ids.sort();

    let trigger_ids: Vec<Uuid> = node_ids
        .iter()
        .copied()
        .filter(|id| matches!(journey.nodes[id].kind, NodeKind::Trigger))
        .collect();

    match trigger_ids.len() {
        0 => errors.push(ValidationError::MissingTrigger),
        1 => {}
        count => errors.push(ValidationError::MultipleTriggers { count }),
    }

    for id in &node_ids {
        let node = &journey.nodes[id];

        // Edges into a trigger are configuration errors regardless of the
        // source node's kind.
        for target in &node.next {
            if trigger_ids.contains(target) {
                errors.push(ValidationError::TriggerHasIncomingEdge {
                    node: *target,
                    source_node: *id,
                });
            }
        }

        let expected = match &node.kind {
            NodeKind::Trigger => Some(1),
            NodeKind::Action(_) => Some(1),
            NodeKind::Wait(_) => Some(1),
            NodeKind::Condition(_) => Some(2),
            NodeKind::Split(_) => None,
            NodeKind::End => Some(0),
        };
        if let Some(expected) = expected {
            if node.next.len() != expected {
                errors.push(ValidationError::EdgeCountMismatch {
                    node: *id,
                    kind: node.kind.label(),
                    expected,
                    actual: node.next.len(),
                });
            }
        }

        match &node.kind {
            NodeKind::Split(config) => {
                if node.next.len() != config.branches.len() {
                    errors.push(ValidationError::SplitBranchMismatch {
                        node: *id,
                        branches: config.branches.len(),
                        targets: node.next.len(),
                    });
                }
                let sum: u32 = config.branches.iter().map(|b| b.weight as u32).sum();
                if sum != 100 {
                    errors.push(ValidationError::SplitWeightSum { node: *id, sum });
                }
            }
            NodeKind::Condition(config) => {
                if config.operator == RuleOperator::Between {
                    errors.push(ValidationError::ConditionBetween { node: *id });
                }
            }
            NodeKind::Trigger | NodeKind::Action(_) | NodeKind::Wait(_) | NodeKind::End => {}
        }

        for target in &node.next {
            if !journey.nodes.contains_key(target) {
                errors.push(ValidationError::UnresolvedTarget {
                    node: *id,
                    target: *target,
                });
            }
        }
    }

    // Reachability from the trigger, only meaningful with a single entry.
    if let [trigger_id] = trigger_ids.as_slice() {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut queue = VecDeque::from([*trigger_id]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = journey.nodes.get(&id) {
                for target in &node.next {
                    if journey.nodes.contains_key(target) {
                        queue.push_back(*target);
                    }
                }
            }
        }
        for id in &node_ids {
            if !visited.contains(id) {
                errors.push(ValidationError::Unreachable { node: *id });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ActionConfig, ConditionConfig, JourneyNode, JourneyStatus, SplitBranch, SplitConfig,
        TriggerDefinition, WaitConfig,
    };
    use chrono::Utc;
    use lifecycle_core::channels::Channel;
    use serde_json::json;
    use std::collections::HashMap;

    fn journey_with(nodes: Vec<JourneyNode>) -> Journey {
        let now = Utc::now();
        Journey {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            description: "validation fixture".to_string(),
            status: JourneyStatus::Draft,
            trigger: TriggerDefinition::Manual,
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    fn node(kind: NodeKind, next: Vec<Uuid>) -> JourneyNode {
        JourneyNode {
            id: Uuid::new_v4(),
            kind,
            next,
        }
    }

    fn action() -> NodeKind {
        NodeKind::Action(ActionConfig {
            channel: Channel::Email,
            template: "Hi {{name}}".to_string(),
            requires_approval: false,
        })
    }

    fn valid_journey() -> Journey {
        let end = node(NodeKind::End, vec![]);
        let send = node(action(), vec![end.id]);
        let wait = node(NodeKind::Wait(WaitConfig { duration_secs: 60 }), vec![send.id]);
        let trigger = node(NodeKind::Trigger, vec![wait.id]);
        journey_with(vec![trigger, wait, send, end])
    }

    #[test]
    fn test_valid_journey_has_no_errors() {
        assert!(validate(&valid_journey()).is_empty());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let journey = valid_journey();
        assert_eq!(validate(&journey), validate(&journey));

        // Also deterministic on a journey with several errors.
        let orphan = node(action(), vec![Uuid::new_v4()]);
        let end = node(NodeKind::End, vec![]);
        let trigger = node(NodeKind::Trigger, vec![end.id]);
        let broken = journey_with(vec![trigger, end, orphan]);
        assert_eq!(validate(&broken), validate(&broken));
        assert!(!validate(&broken).is_empty());
    }

    #[test]
    fn test_missing_and_multiple_triggers() {
        let end = node(NodeKind::End, vec![]);
        let journey = journey_with(vec![end]);
        assert!(validate(&journey).contains(&ValidationError::MissingTrigger));

        let end = node(NodeKind::End, vec![]);
        let t1 = node(NodeKind::Trigger, vec![end.id]);
        let t2 = node(NodeKind::Trigger, vec![end.id]);
        let journey = journey_with(vec![t1, t2, end]);
        assert!(validate(&journey).contains(&ValidationError::MultipleTriggers { count: 2 }));
    }

    #[test]
    fn test_trigger_must_not_have_incoming_edges() {
        let end = node(NodeKind::End, vec![]);
        let mut trigger = node(NodeKind::Trigger, vec![]);
        let looped = node(action(), vec![trigger.id]);
        trigger.next = vec![looped.id];
        let trigger_id = trigger.id;
        let source_id = looped.id;
        let journey = journey_with(vec![trigger, looped, end]);

        let errors = validate(&journey);
        assert!(errors.contains(&ValidationError::TriggerHasIncomingEdge {
            node: trigger_id,
            source_node: source_id,
        }));
    }

    #[test]
    fn test_edge_cardinality_per_kind() {
        // A dangling action node (no outgoing edge) mid-graph.
        let dangling = node(action(), vec![]);
        let trigger = node(NodeKind::Trigger, vec![dangling.id]);
        let dangling_id = dangling.id;
        let journey = journey_with(vec![trigger, dangling]);

        let errors = validate(&journey);
        assert!(errors.contains(&ValidationError::EdgeCountMismatch {
            node: dangling_id,
            kind: "action",
            expected: 1,
            actual: 0,
        }));

        // A condition with a single target.
        let end = node(NodeKind::End, vec![]);
        let condition = node(
            NodeKind::Condition(ConditionConfig {
                field: "days_inactive".to_string(),
                operator: RuleOperator::Gte,
                value: json!(30),
            }),
            vec![end.id],
        );
        let condition_id = condition.id;
        let trigger = node(NodeKind::Trigger, vec![condition.id]);
        let journey = journey_with(vec![trigger, condition, end]);
        assert!(validate(&journey).contains(&ValidationError::EdgeCountMismatch {
            node: condition_id,
            kind: "condition",
            expected: 2,
            actual: 1,
        }));
    }

    #[test]
    fn test_unresolved_target() {
        let ghost = Uuid::new_v4();
        let send = node(action(), vec![ghost]);
        let send_id = send.id;
        let trigger = node(NodeKind::Trigger, vec![send.id]);
        let journey = journey_with(vec![trigger, send]);

        assert!(validate(&journey).contains(&ValidationError::UnresolvedTarget {
            node: send_id,
            target: ghost,
        }));
    }

    #[test]
    fn test_split_weights_and_branch_count() {
        let end_a = node(NodeKind::End, vec![]);
        let end_b = node(NodeKind::End, vec![]);
        let split = node(
            NodeKind::Split(SplitConfig {
                branches: vec![
                    SplitBranch { name: "a".to_string(), weight: 60 },
                    SplitBranch { name: "b".to_string(), weight: 30 },
                ],
            }),
            vec![end_a.id, end_b.id],
        );
        let split_id = split.id;
        let trigger = node(NodeKind::Trigger, vec![split.id]);
        let journey = journey_with(vec![trigger, split, end_a, end_b]);

        let errors = validate(&journey);
        assert!(errors.contains(&ValidationError::SplitWeightSum { node: split_id, sum: 90 }));

        let end_a = node(NodeKind::End, vec![]);
        let split = node(
            NodeKind::Split(SplitConfig {
                branches: vec![
                    SplitBranch { name: "a".to_string(), weight: 50 },
                    SplitBranch { name: "b".to_string(), weight: 50 },
                ],
            }),
            vec![end_a.id],
        );
        let split_id = split.id;
        let trigger = node(NodeKind::Trigger, vec![split.id]);
        let journey = journey_with(vec![trigger, split, end_a]);
        assert!(validate(&journey).contains(&ValidationError::SplitBranchMismatch {
            node: split_id,
            branches: 2,
            targets: 1,
        }));
    }

    #[test]
    fn test_between_rejected_in_conditions() {
        let end_a = node(NodeKind::End, vec![]);
        let end_b = node(NodeKind::End, vec![]);
        let condition = node(
            NodeKind::Condition(ConditionConfig {
                field: "days_inactive".to_string(),
                operator: RuleOperator::Between,
                value: json!(30),
            }),
            vec![end_a.id, end_b.id],
        );
        let condition_id = condition.id;
        let trigger = node(NodeKind::Trigger, vec![condition.id]);
        let journey = journey_with(vec![trigger, condition, end_a, end_b]);

        assert!(validate(&journey)
            .contains(&ValidationError::ConditionBetween { node: condition_id }));
    }

    #[test]
    fn test_orphan_nodes_are_unreachable() {
        let end = node(NodeKind::End, vec![]);
        let trigger = node(NodeKind::Trigger, vec![end.id]);
        let orphan_end = node(NodeKind::End, vec![]);
        let orphan = node(action(), vec![orphan_end.id]);
        let orphan_id = orphan.id;
        let orphan_end_id = orphan_end.id;
        let journey = journey_with(vec![trigger, end, orphan, orphan_end]);

        let errors = validate(&journey);
        assert!(errors.contains(&ValidationError::Unreachable { node: orphan_id }));
        assert!(errors.contains(&ValidationError::Unreachable { node: orphan_end_id }));
    }
}
