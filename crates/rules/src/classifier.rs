//! Churn stage classification — evaluates every active metric against a
//! customer and resolves the highest-severity stage with a fired rule.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use lifecycle_core::types::Customer;
use lifecycle_core::{LifecycleError, LifecycleResult};

use crate::evaluator;
use crate::model::{baseline_stage, ChurnMetric, ChurnStage};

/// Outcome of classifying one customer.
#[derive(Debug, Clone)]
pub struct StageAssessment {
    /// The single winning stage: highest severity among fired signals, or
    /// the baseline stage when nothing fired.
    pub stage: ChurnStage,
    /// Ids of the metrics that fired.
    pub fired: Vec<Uuid>,
    /// Summed weights of fired metrics per stage. Analytics-only evidence;
    /// severity alone decides the winning stage.
    pub evidence: HashMap<Uuid, u32>,
}

/// Classifies a customer against a stage set and its metrics. Inactive
/// metrics are skipped; a fired metric naming an unknown stage is dropped
/// with a warning rather than failing the whole classification.
pub fn classify(
    customer: &Customer,
    metrics: &[ChurnMetric],
    stages: &[ChurnStage],
) -> LifecycleResult<StageAssessment> {
    let baseline = baseline_stage(stages)
        .ok_or_else(|| LifecycleError::Config("no churn stages configured".to_string()))?;

    let mut fired = Vec::new();
    let mut evidence: HashMap<Uuid, u32> = HashMap::new();

    for metric in metrics.iter().filter(|m| m.active) {
        let value = customer.attribute(&metric.field);
        if !evaluator::evaluate(metric, value.as_ref()) {
            continue;
        }
        if !stages.iter().any(|s| s.id == metric.stage_id) {
            warn!(
                metric_id = %metric.id,
                stage_id = %metric.stage_id,
                "Fired metric references unknown stage, skipping"
            );
            continue;
        }
        fired.push(metric.id);
        *evidence.entry(metric.stage_id).or_insert(0) += metric.weight as u32;
    }

    let stage = stages
        .iter()
        .filter(|s| evidence.contains_key(&s.id))
        .max_by_key(|s| s.severity)
        .unwrap_or(baseline)
        .clone();

    debug!(
        customer_id = %customer.id,
        stage = %stage.slug,
        fired = fired.len(),
        "Classified customer churn stage"
    );

    Ok(StageAssessment {
        stage,
        fired,
        evidence,
    })
}
