//! Core segmentation engine — evaluates segment membership over a customer
//! population. Evaluation is read-only and pure, so callers may fan it out
//! across customers freely.

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use lifecycle_core::types::{ChurnRisk, Customer, SentimentBucket};
use lifecycle_core::{LifecycleError, LifecycleResult};

use crate::criteria::{
    CustomFilters, Segment, SegmentCriteria, SegmentEvaluation, SegmentMetrics,
};

/// Registry of segment definitions plus population evaluation.
pub struct SegmentationEngine {
    segments: DashMap<Uuid, Segment>,
}

impl SegmentationEngine {
    pub fn new() -> Self {
        Self {
            segments: DashMap::new(),
        }
    }

    pub fn register_segment(&self, segment: Segment) {
        self.segments.insert(segment.id, segment);
    }

    pub fn get_segment(&self, id: &Uuid) -> Option<Segment> {
        self.segments.get(id).map(|s| s.clone())
    }

    pub fn list_segments(&self) -> Vec<Segment> {
        self.segments.iter().map(|s| s.value().clone()).collect()
    }

    pub fn remove_segment(&self, id: &Uuid) -> Option<Segment> {
        self.segments.remove(id).map(|(_, s)| s)
    }

    /// Evaluates a registered segment against the given population.
    pub fn evaluate(
        &self,
        segment_id: &Uuid,
        customers: &[Customer],
    ) -> LifecycleResult<SegmentEvaluation> {
        let segment = self
            .segments
            .get(segment_id)
            .ok_or_else(|| LifecycleError::NotFound(format!("segment {segment_id}")))?;
        Ok(evaluate_segment(&segment, customers))
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates a segment definition against a population, returning matching
/// members and aggregate metrics.
pub fn evaluate_segment(segment: &Segment, customers: &[Customer]) -> SegmentEvaluation {
    let matching: Vec<Customer> = customers
        .iter()
        .filter(|c| matches(c, &segment.criteria))
        .cloned()
        .collect();

    let metrics = compute_metrics(&matching);

    debug!(
        segment_id = %segment.id,
        population = customers.len(),
        matching = matching.len(),
        "Evaluated segment"
    );

    SegmentEvaluation { matching, metrics }
}

/// Per-customer segment predicate: a conjunction of independent
/// sub-predicates, each passing vacuously when its criterion is unset.
pub fn matches(customer: &Customer, criteria: &SegmentCriteria) -> bool {
    let stage_ok = criteria
        .lifecycle_stages
        .as_ref()
        .map_or(true, |stages| stages.contains(&customer.lifecycle_stage));

    let sentiment_ok = criteria.sentiment_buckets.as_ref().map_or(true, |buckets| {
        customer
            .sentiment_score
            .map_or(false, |score| buckets.contains(&SentimentBucket::from_score(score)))
    });

    let custom_ok = criteria
        .custom
        .as_ref()
        .map_or(true, |filters| matches_custom(customer, filters));

    stage_ok && sentiment_ok && custom_ok
}

fn matches_custom(customer: &Customer, filters: &CustomFilters) -> bool {
    let age_ok = {
        let min_ok = filters
            .min_age
            .map_or(true, |min| customer.age.map_or(false, |age| age >= min));
        let max_ok = filters
            .max_age
            .map_or(true, |max| customer.age.map_or(false, |age| age <= max));
        min_ok && max_ok
    };

    let ltv_ok = filters
        .min_lifetime_value
        .map_or(true, |min| customer.lifetime_value >= min)
        && filters
            .max_lifetime_value
            .map_or(true, |max| customer.lifetime_value <= max);

    let inactivity_ok = filters
        .min_days_inactive
        .map_or(true, |min| customer.days_inactive >= min)
        && filters
            .max_days_inactive
            .map_or(true, |max| customer.days_inactive <= max);

    let balance_ok = filters
        .min_account_balance
        .map_or(true, |min| customer.account_balance >= min)
        && filters
            .max_account_balance
            .map_or(true, |max| customer.account_balance <= max);

    let gender_ok = filters.genders.as_ref().map_or(true, |genders| {
        customer
            .gender
            .as_ref()
            .map_or(false, |g| genders.contains(g))
    });

    let risk_ok = filters
        .churn_risks
        .as_ref()
        .map_or(true, |risks| risks.contains(&customer.churn_risk));

    let engagement_ok = filters
        .engagement_levels
        .as_ref()
        .map_or(true, |levels| levels.contains(&customer.engagement_level));

    let location_ok = filters.locations.as_ref().map_or(true, |fragments| {
        customer.location.as_ref().map_or(false, |location| {
            fragments.iter().any(|f| location.contains(f.as_str()))
        })
    });

    let churn_recency_ok = filters.max_days_since_churn.map_or(true, |max_days| {
        match customer.churn_date {
            // Only evaluated when a churn date is present.
            None => true,
            Some(churned_at) => (Utc::now() - churned_at).num_days() <= max_days,
        }
    });

    age_ok
        && ltv_ok
        && inactivity_ok
        && balance_ok
        && gender_ok
        && risk_ok
        && engagement_ok
        && location_ok
        && churn_recency_ok
}

fn compute_metrics(matching: &[Customer]) -> SegmentMetrics {
    let customer_count = matching.len() as u64;
    let total_lifetime_value: f64 = matching.iter().map(|c| c.lifetime_value).sum();
    let high_risk = matching
        .iter()
        .filter(|c| c.churn_risk == ChurnRisk::High)
        .count();

    let (avg_lifetime_value, churn_rate) = if customer_count > 0 {
        (
            total_lifetime_value / customer_count as f64,
            high_risk as f64 / customer_count as f64,
        )
    } else {
        (0.0, 0.0)
    };

    SegmentMetrics {
        customer_count,
        total_lifetime_value,
        avg_lifetime_value,
        churn_rate,
    }
}
