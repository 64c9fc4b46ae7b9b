//! Segment builder — fluent API for constructing segment definitions.

use chrono::Utc;
use uuid::Uuid;

use lifecycle_core::types::{ChurnRisk, EngagementLevel, LifecycleStage, SentimentBucket};

use crate::criteria::{CustomFilters, Segment, SegmentCriteria};

pub struct SegmentBuilder {
    name: String,
    description: Option<String>,
    criteria: SegmentCriteria,
    tags: Vec<String>,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            criteria: SegmentCriteria::default(),
            tags: Vec::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn stage(mut self, stage: LifecycleStage) -> Self {
        self.criteria
            .lifecycle_stages
            .get_or_insert_with(Vec::new)
            .push(stage);
        self
    }

    pub fn sentiment(mut self, bucket: SentimentBucket) -> Self {
        self.criteria
            .sentiment_buckets
            .get_or_insert_with(Vec::new)
            .push(bucket);
        self
    }

    pub fn min_age(mut self, min: u32) -> Self {
        self.custom().min_age = Some(min);
        self
    }

    pub fn max_age(mut self, max: u32) -> Self {
        self.custom().max_age = Some(max);
        self
    }

    pub fn min_lifetime_value(mut self, min: f64) -> Self {
        self.custom().min_lifetime_value = Some(min);
        self
    }

    pub fn max_lifetime_value(mut self, max: f64) -> Self {
        self.custom().max_lifetime_value = Some(max);
        self
    }

    pub fn min_days_inactive(mut self, min: u32) -> Self {
        self.custom().min_days_inactive = Some(min);
        self
    }

    pub fn max_days_inactive(mut self, max: u32) -> Self {
        self.custom().max_days_inactive = Some(max);
        self
    }

    pub fn min_account_balance(mut self, min: f64) -> Self {
        self.custom().min_account_balance = Some(min);
        self
    }

    pub fn max_account_balance(mut self, max: f64) -> Self {
        self.custom().max_account_balance = Some(max);
        self
    }

    pub fn gender(mut self, gender: impl Into<String>) -> Self {
        self.custom()
            .genders
            .get_or_insert_with(Vec::new)
            .push(gender.into());
        self
    }

    pub fn churn_risk(mut self, risk: ChurnRisk) -> Self {
        self.custom()
            .churn_risks
            .get_or_insert_with(Vec::new)
            .push(risk);
        self
    }

    pub fn engagement_level(mut self, level: EngagementLevel) -> Self {
        self.custom()
            .engagement_levels
            .get_or_insert_with(Vec::new)
            .push(level);
        self
    }

    pub fn location(mut self, fragment: impl Into<String>) -> Self {
        self.custom()
            .locations
            .get_or_insert_with(Vec::new)
            .push(fragment.into());
        self
    }

    pub fn max_days_since_churn(mut self, days: i64) -> Self {
        self.custom().max_days_since_churn = Some(days);
        self
    }

    pub fn build(self) -> Segment {
        let now = Utc::now();
        Segment {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            criteria: self.criteria,
            created_at: now,
            updated_at: now,
            tags: self.tags,
        }
    }

    fn custom(&mut self) -> &mut CustomFilters {
        self.criteria.custom.get_or_insert_with(CustomFilters::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_criteria() {
        let segment = SegmentBuilder::new("lapsing gold members")
            .description("high-value customers going quiet")
            .tag("retention")
            .stage(LifecycleStage::AtRisk)
            .stage(LifecycleStage::Churned)
            .min_lifetime_value(250_000.0)
            .min_days_inactive(14)
            .churn_risk(ChurnRisk::High)
            .build();

        assert_eq!(segment.name, "lapsing gold members");
        assert_eq!(
            segment.criteria.lifecycle_stages.as_deref(),
            Some(&[LifecycleStage::AtRisk, LifecycleStage::Churned][..])
        );
        let custom = segment.criteria.custom.expect("custom filters set");
        assert_eq!(custom.min_lifetime_value, Some(250_000.0));
        assert_eq!(custom.min_days_inactive, Some(14));
        assert_eq!(custom.churn_risks.as_deref(), Some(&[ChurnRisk::High][..]));
    }

    #[test]
    fn test_builder_without_criteria_is_empty() {
        let segment = SegmentBuilder::new("everyone").build();
        assert!(segment.criteria.is_empty());
    }
}
