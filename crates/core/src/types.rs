use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Read-only snapshot of a customer's attributes, owned by the external
/// customer store. The automation core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub lifecycle_stage: LifecycleStage,
    pub engagement_level: EngagementLevel,
    pub churn_risk: ChurnRisk,
    /// Sentiment on a 0-100 scale, when a score has been computed.
    pub sentiment_score: Option<f64>,
    pub days_inactive: u32,
    pub account_balance: f64,
    pub lifetime_value: f64,
    pub churn_count: u32,
    pub reactivation_count: u32,
    pub churn_date: Option<DateTime<Utc>>,
}

impl Customer {
    /// Creates a customer with neutral defaults. Callers set the fields they
    /// care about directly.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            age: None,
            gender: None,
            location: None,
            lifecycle_stage: LifecycleStage::Active,
            engagement_level: EngagementLevel::Medium,
            churn_risk: ChurnRisk::Low,
            sentiment_score: None,
            days_inactive: 0,
            account_balance: 0.0,
            lifetime_value: 0.0,
            churn_count: 0,
            reactivation_count: 0,
            churn_date: None,
        }
    }

    /// Uniform attribute accessor used by rules and condition nodes. Returns
    /// `None` for unknown fields and for optional fields that are unset; a
    /// rule referencing such a field never matches.
    pub fn attribute(&self, field: &str) -> Option<Value> {
        match field {
            "days_inactive" => Some(self.days_inactive.into()),
            "account_balance" => Some(self.account_balance.into()),
            "sentiment_score" => self.sentiment_score.map(Value::from),
            "lifetime_value" => Some(self.lifetime_value.into()),
            "churn_risk" => Some(self.churn_risk.as_str().into()),
            "lifecycle_stage" => Some(self.lifecycle_stage.as_str().into()),
            "engagement_level" => Some(self.engagement_level.as_str().into()),
            "age" => self.age.map(Value::from),
            "gender" => self.gender.as_deref().map(Value::from),
            "location" => self.location.as_deref().map(Value::from),
            "churn_count" => Some(self.churn_count.into()),
            "reactivation_count" => Some(self.reactivation_count.into()),
            "name" => Some(self.name.as_str().into()),
            "email" => self.email.as_deref().map(Value::from),
            _ => None,
        }
    }
}

/// Where a customer sits in their relationship with the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    New,
    Active,
    AtRisk,
    Churned,
    Reactivated,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::New => "new",
            LifecycleStage::Active => "active",
            LifecycleStage::AtRisk => "at_risk",
            LifecycleStage::Churned => "churned",
            LifecycleStage::Reactivated => "reactivated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnRisk {
    Low,
    Medium,
    High,
}

impl ChurnRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurnRisk::Low => "low",
            ChurnRisk::Medium => "medium",
            ChurnRisk::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

/// Sentiment bucket derived from `sentiment_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentBucket {
    Negative,
    Neutral,
    Positive,
}

impl SentimentBucket {
    /// Buckets a 0-100 sentiment score: >= 70 positive, >= 40 neutral,
    /// everything below negative.
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            SentimentBucket::Positive
        } else if score >= 40.0 {
            SentimentBucket::Neutral
        } else {
            SentimentBucket::Negative
        }
    }
}

/// Read-only accessor into the external customer store.
pub trait CustomerSource: Send + Sync {
    fn attributes(&self, customer_id: &Uuid) -> Option<Customer>;
}

/// In-memory customer store for tests and local development.
#[derive(Default)]
pub struct InMemoryCustomerSource {
    customers: DashMap<Uuid, Customer>,
}

impl InMemoryCustomerSource {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
        }
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn remove(&self, customer_id: &Uuid) {
        self.customers.remove(customer_id);
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn all(&self) -> Vec<Customer> {
        self.customers.iter().map(|c| c.value().clone()).collect()
    }
}

impl CustomerSource for InMemoryCustomerSource {
    fn attributes(&self, customer_id: &Uuid) -> Option<Customer> {
        self.customers.get(customer_id).map(|c| c.clone())
    }
}
