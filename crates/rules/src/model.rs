use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Comparison operator a churn metric applies to its attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Between,
}

/// A severity-ranked disengagement bucket. Higher severity = further along
/// the churn path; the lowest-severity stage is the healthy baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnStage {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub severity: u8,
    /// Display color for dashboards; never consulted by classification.
    pub color: String,
}

/// A single weighted comparison rule signalling its stage when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnMetric {
    pub id: Uuid,
    pub stage_id: Uuid,
    pub field: String,
    pub operator: RuleOperator,
    pub threshold: serde_json::Value,
    /// Upper bound, required iff `operator` is `between`.
    #[serde(default)]
    pub threshold_max: Option<serde_json::Value>,
    /// Evidence weight in 1..=10. Informational for analytics ranking only;
    /// it never changes which stage wins classification.
    pub weight: u8,
    pub active: bool,
}

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 10;

/// Authoring-time configuration problems in a rule set. Rejected before
/// activation, never tolerated silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleConfigError {
    #[error("no churn stages configured")]
    NoStages,

    #[error("stages {first} and {second} share severity {severity}; severities must totally order the stage set")]
    DuplicateSeverity {
        first: Uuid,
        second: Uuid,
        severity: u8,
    },

    #[error("metric {metric}: operator 'between' requires threshold_max")]
    MissingUpperBound { metric: Uuid },

    #[error("metric {metric}: 'between' bounds must be numeric")]
    NonNumericBounds { metric: Uuid },

    #[error("metric {metric}: threshold_max must be greater than threshold")]
    InvertedBounds { metric: Uuid },

    #[error("metric {metric}: weight {weight} outside 1..=10")]
    WeightOutOfRange { metric: Uuid, weight: u8 },

    #[error("metric {metric} references unknown stage {stage}")]
    UnknownStage { metric: Uuid, stage: Uuid },
}

/// Returns the baseline (lowest-severity) stage, if any stages exist.
pub fn baseline_stage(stages: &[ChurnStage]) -> Option<&ChurnStage> {
    stages.iter().min_by_key(|s| s.severity)
}

/// Validates a stage set and its metrics. Returns every problem found so
/// operators see the full list at once.
pub fn validate_metrics(stages: &[ChurnStage], metrics: &[ChurnMetric]) -> Vec<RuleConfigError> {
    let mut errors = Vec::new();

    if stages.is_empty() {
        errors.push(RuleConfigError::NoStages);
    }
    for (i, stage) in stages.iter().enumerate() {
        for other in &stages[i + 1..] {
            if stage.severity == other.severity {
                errors.push(RuleConfigError::DuplicateSeverity {
                    first: stage.id,
                    second: other.id,
                    severity: stage.severity,
                });
            }
        }
    }

    for metric in metrics {
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&metric.weight) {
            errors.push(RuleConfigError::WeightOutOfRange {
                metric: metric.id,
                weight: metric.weight,
            });
        }
        if !stages.iter().any(|s| s.id == metric.stage_id) {
            errors.push(RuleConfigError::UnknownStage {
                metric: metric.id,
                stage: metric.stage_id,
            });
        }
        if metric.operator == RuleOperator::Between {
            match &metric.threshold_max {
                None => errors.push(RuleConfigError::MissingUpperBound { metric: metric.id }),
                Some(max) => match (metric.threshold.as_f64(), max.as_f64()) {
                    (Some(lo), Some(hi)) => {
                        if hi <= lo {
                            errors.push(RuleConfigError::InvertedBounds { metric: metric.id });
                        }
                    }
                    _ => errors.push(RuleConfigError::NonNumericBounds { metric: metric.id }),
                },
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stage(slug: &str, severity: u8) -> ChurnStage {
        ChurnStage {
            id: Uuid::new_v4(),
            name: slug.to_string(),
            slug: slug.to_string(),
            severity,
            color: "#888888".to_string(),
        }
    }

    fn metric(stage_id: Uuid, operator: RuleOperator) -> ChurnMetric {
        ChurnMetric {
            id: Uuid::new_v4(),
            stage_id,
            field: "days_inactive".to_string(),
            operator,
            threshold: json!(30),
            threshold_max: None,
            weight: 5,
            active: true,
        }
    }

    #[test]
    fn test_valid_rule_set_passes() {
        let stages = vec![stage("healthy", 0), stage("at_risk", 1)];
        let metrics = vec![metric(stages[1].id, RuleOperator::Gte)];
        assert!(validate_metrics(&stages, &metrics).is_empty());
    }

    #[test]
    fn test_between_requires_upper_bound() {
        let stages = vec![stage("healthy", 0), stage("at_risk", 1)];
        let mut bad = metric(stages[1].id, RuleOperator::Between);
        let errors = validate_metrics(&stages, &[bad.clone()]);
        assert!(errors.contains(&RuleConfigError::MissingUpperBound { metric: bad.id }));

        bad.threshold_max = Some(json!(10));
        let errors = validate_metrics(&stages, &[bad.clone()]);
        assert!(errors.contains(&RuleConfigError::InvertedBounds { metric: bad.id }));

        bad.threshold_max = Some(json!(60));
        assert!(validate_metrics(&stages, &[bad]).is_empty());
    }

    #[test]
    fn test_weight_range_enforced() {
        let stages = vec![stage("healthy", 0)];
        let mut bad = metric(stages[0].id, RuleOperator::Gt);
        bad.weight = 0;
        let errors = validate_metrics(&stages, &[bad.clone()]);
        assert!(errors.contains(&RuleConfigError::WeightOutOfRange {
            metric: bad.id,
            weight: 0
        }));

        bad.weight = 11;
        let errors = validate_metrics(&stages, &[bad.clone()]);
        assert!(errors.contains(&RuleConfigError::WeightOutOfRange {
            metric: bad.id,
            weight: 11
        }));
    }

    #[test]
    fn test_duplicate_severity_and_unknown_stage() {
        let stages = vec![stage("healthy", 0), stage("shadow", 0)];
        let orphan = metric(Uuid::new_v4(), RuleOperator::Gt);
        let errors = validate_metrics(&stages, &[orphan.clone()]);

        assert!(errors
            .iter()
            .any(|e| matches!(e, RuleConfigError::DuplicateSeverity { severity: 0, .. })));
        assert!(errors.contains(&RuleConfigError::UnknownStage {
            metric: orphan.id,
            stage: orphan.stage_id,
        }));
    }

    #[test]
    fn test_baseline_is_lowest_severity() {
        let stages = vec![stage("churned", 3), stage("healthy", 0), stage("at_risk", 1)];
        assert_eq!(baseline_stage(&stages).map(|s| s.slug.as_str()), Some("healthy"));
        assert!(baseline_stage(&[]).is_none());
    }
}
