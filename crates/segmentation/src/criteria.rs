use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lifecycle_core::types::{ChurnRisk, Customer, EngagementLevel, LifecycleStage, SentimentBucket};

/// A named, reusable filter over the customer population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub criteria: SegmentCriteria,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Segment criteria. All present criteria are AND-combined; an absent
/// criterion imposes no constraint. Empty criteria match everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentCriteria {
    #[serde(default)]
    pub lifecycle_stages: Option<Vec<LifecycleStage>>,
    #[serde(default)]
    pub sentiment_buckets: Option<Vec<SentimentBucket>>,
    #[serde(default)]
    pub custom: Option<CustomFilters>,
}

impl SegmentCriteria {
    pub fn is_empty(&self) -> bool {
        self.lifecycle_stages.is_none() && self.sentiment_buckets.is_none() && self.custom.is_none()
    }
}

/// Numeric-range and category filters. Ranges are inclusive on both bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFilters {
    #[serde(default)]
    pub min_age: Option<u32>,
    #[serde(default)]
    pub max_age: Option<u32>,
    #[serde(default)]
    pub min_lifetime_value: Option<f64>,
    #[serde(default)]
    pub max_lifetime_value: Option<f64>,
    #[serde(default)]
    pub min_days_inactive: Option<u32>,
    #[serde(default)]
    pub max_days_inactive: Option<u32>,
    #[serde(default)]
    pub min_account_balance: Option<f64>,
    #[serde(default)]
    pub max_account_balance: Option<f64>,
    #[serde(default)]
    pub genders: Option<Vec<String>>,
    #[serde(default)]
    pub churn_risks: Option<Vec<ChurnRisk>>,
    #[serde(default)]
    pub engagement_levels: Option<Vec<EngagementLevel>>,
    /// Substring match: a customer passes when their location contains any
    /// of these fragments.
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    /// Whole-day floor difference from `churn_date` to now. Customers with
    /// no churn date always pass.
    #[serde(default)]
    pub max_days_since_churn: Option<i64>,
}

/// Aggregate metrics over a segment's matching customers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub customer_count: u64,
    pub total_lifetime_value: f64,
    pub avg_lifetime_value: f64,
    /// Fraction of matching customers with churn_risk = high.
    pub churn_rate: f64,
}

/// Result of evaluating a segment over a population.
#[derive(Debug, Clone)]
pub struct SegmentEvaluation {
    pub matching: Vec<Customer>,
    pub metrics: SegmentMetrics,
}
