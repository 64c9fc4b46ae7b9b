//! Lifecycle Pulse — customer lifecycle automation worker.
//!
//! Initializes the automation core (churn rules, segmentation, journey
//! engine), seeds a small demo data set, and drives executions to rest:
//! a timer loop ticks the wait scheduler and resolves demo approvals until
//! every execution settles.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use lifecycle_core::channels::{CaptureApprovals, CaptureDispatcher, Channel};
use lifecycle_core::config::AppConfig;
use lifecycle_core::types::{ChurnRisk, Customer, InMemoryCustomerSource, LifecycleStage};
use lifecycle_journey::types::{
    ActionConfig, ConditionConfig, Journey, JourneyNode, JourneyStatus, NodeKind, SplitBranch,
    SplitConfig, TriggerDefinition, WaitConfig,
};
use lifecycle_journey::{JourneyEngine, WaitScheduler};
use lifecycle_rules::model::validate_metrics;
use lifecycle_rules::{classify, ChurnMetric, ChurnStage, RuleOperator};
use lifecycle_segmentation::{evaluate_segment, SegmentBuilder};

#[derive(Parser, Debug)]
#[command(name = "lifecycle-pulse")]
#[command(about = "Customer lifecycle automation worker")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "LIFECYCLE_PULSE__NODE_ID")]
    node_id: Option<String>,

    /// Scheduler poll interval in milliseconds (overrides config)
    #[arg(long, env = "LIFECYCLE_PULSE__JOURNEY__SCHEDULER_INTERVAL_MS")]
    scheduler_interval_ms: Option<u64>,

    /// Safety cap on scheduler ticks before the worker gives up
    #[arg(long, default_value_t = 240)]
    max_ticks: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifecycle_pulse=info,lifecycle_journey=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Lifecycle Pulse starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(interval) = cli.scheduler_interval_ms {
        config.journey.scheduler_interval_ms = interval;
    }

    info!(
        node_id = %config.node_id,
        scheduler_interval_ms = config.journey.scheduler_interval_ms,
        "Configuration loaded"
    );

    // Demo customer base
    let customers = Arc::new(InMemoryCustomerSource::new());
    seed_customers(&customers);

    // Churn rules: classify the demo base
    let (stages, metrics) = churn_rules();
    let config_errors = validate_metrics(&stages, &metrics);
    if !config_errors.is_empty() {
        for error in &config_errors {
            warn!(%error, "Churn rule configuration error");
        }
        anyhow::bail!("churn rule set failed validation");
    }
    for customer in customers.all() {
        let assessment = classify(&customer, &metrics, &stages)?;
        info!(
            customer = %customer.name,
            stage = %assessment.stage.slug,
            fired = assessment.fired.len(),
            "Churn stage classified"
        );
    }

    // Segmentation: evaluate a retention segment over the base
    let segment = SegmentBuilder::new("lapsed high-value")
        .description("customers going quiet with real lifetime value")
        .stage(LifecycleStage::AtRisk)
        .stage(LifecycleStage::Churned)
        .min_lifetime_value(1_000.0)
        .tag("retention")
        .build();
    let evaluation = evaluate_segment(&segment, &customers.all());
    info!(
        segment = %segment.name,
        matching = evaluation.metrics.customer_count,
        avg_ltv = evaluation.metrics.avg_lifetime_value,
        churn_rate = evaluation.metrics.churn_rate,
        "Segment evaluated"
    );

    // Journey engine with demo collaborators
    let dispatcher = Arc::new(CaptureDispatcher::new());
    let approvals = Arc::new(CaptureApprovals::new());
    let engine = JourneyEngine::new(customers.clone())
        .with_config(config.journey.clone())
        .with_dispatcher(dispatcher.clone())
        .with_approvals(approvals.clone());

    let journey = winback_journey();
    let journey_id = journey.id;
    engine.create_journey(journey)?;
    engine.activate_journey(&journey_id)?;

    for customer in customers.all() {
        let execution_id = engine.enter_journey(&journey_id, &customer.id)?;
        engine.drive(&execution_id, 64)?;
    }

    // Drive everything to rest: tick the wait scheduler and auto-approve
    // demo approval requests until all executions settle.
    let scheduler = WaitScheduler::new(engine.clone());
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(
        config.journey.scheduler_interval_ms,
    ));
    let mut ticks = 0u64;
    loop {
        interval.tick().await;
        ticks += 1;

        scheduler.tick();
        for (execution_id, preview) in approvals.drain() {
            info!(
                execution_id = %execution_id,
                channel = preview.channel.as_str(),
                "Auto-approving demo message"
            );
            engine.approve(&execution_id)?;
            engine.drive(&execution_id, 64)?;
        }

        let settled = engine
            .list_executions(&journey_id)
            .iter()
            .all(|e| e.state.is_terminal());
        if settled {
            break;
        }
        if ticks >= cli.max_ticks {
            warn!(ticks, "Giving up with unsettled executions");
            break;
        }
    }

    let stats = engine.stats(&journey_id);
    info!(
        entered = stats.total_entered,
        completed = stats.completed,
        failed = stats.failed,
        messages_sent = dispatcher.count(),
        "Lifecycle Pulse demo run finished"
    );

    Ok(())
}

fn seed_customers(customers: &InMemoryCustomerSource) {
    let mut ada = Customer::new(Uuid::new_v4(), "Ada");
    ada.email = Some("ada@example.com".to_string());
    ada.lifecycle_stage = LifecycleStage::AtRisk;
    ada.churn_risk = ChurnRisk::High;
    ada.days_inactive = 45;
    ada.lifetime_value = 4_200.0;
    ada.sentiment_score = Some(35.0);
    customers.insert(ada);

    let mut grace = Customer::new(Uuid::new_v4(), "Grace");
    grace.email = Some("grace@example.com".to_string());
    grace.lifecycle_stage = LifecycleStage::Active;
    grace.days_inactive = 3;
    grace.lifetime_value = 12_500.0;
    grace.sentiment_score = Some(82.0);
    customers.insert(grace);

    let mut linus = Customer::new(Uuid::new_v4(), "Linus");
    linus.lifecycle_stage = LifecycleStage::Churned;
    linus.churn_risk = ChurnRisk::High;
    linus.days_inactive = 120;
    linus.lifetime_value = 900.0;
    customers.insert(linus);
}

fn churn_rules() -> (Vec<ChurnStage>, Vec<ChurnMetric>) {
    let healthy = stage("Healthy", "healthy", 0, "#22c55e");
    let at_risk = stage("At Risk", "at_risk", 1, "#eab308");
    let churning = stage("Churning", "churning", 2, "#f97316");
    let churned = stage("Churned", "churned", 3, "#ef4444");

    let metrics = vec![
        metric(at_risk.id, "days_inactive", RuleOperator::Between, json!(14), Some(json!(59)), 5),
        metric(at_risk.id, "sentiment_score", RuleOperator::Lt, json!(40), None, 3),
        metric(churning.id, "days_inactive", RuleOperator::Between, json!(60), Some(json!(89)), 7),
        metric(churned.id, "days_inactive", RuleOperator::Gte, json!(90), None, 10),
    ];

    (vec![healthy, at_risk, churning, churned], metrics)
}

fn stage(name: &str, slug: &str, severity: u8, color: &str) -> ChurnStage {
    ChurnStage {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug: slug.to_string(),
        severity,
        color: color.to_string(),
    }
}

fn metric(
    stage_id: Uuid,
    field: &str,
    operator: RuleOperator,
    threshold: serde_json::Value,
    threshold_max: Option<serde_json::Value>,
    weight: u8,
) -> ChurnMetric {
    ChurnMetric {
        id: Uuid::new_v4(),
        stage_id,
        field: field.to_string(),
        operator,
        threshold,
        threshold_max,
        weight,
        active: true,
    }
}

/// trigger -> condition(days_inactive >= 30)
///   true  -> wait(2s) -> approval-gated win-back email -> end
///   false -> 50/50 split -> [thank-you email | thank-you sms] -> end
fn winback_journey() -> Journey {
    let end = node(NodeKind::End, vec![]);
    let winback = node(
        NodeKind::Action(ActionConfig {
            channel: Channel::Email,
            template: "We miss you {{name}} — it has been {{days_inactive}} days.".to_string(),
            requires_approval: true,
        }),
        vec![end.id],
    );
    let cooldown = node(NodeKind::Wait(WaitConfig { duration_secs: 2 }), vec![winback.id]);
    let thanks_email = node(
        NodeKind::Action(ActionConfig {
            channel: Channel::Email,
            template: "Thanks for sticking around, {{name}}!".to_string(),
            requires_approval: false,
        }),
        vec![end.id],
    );
    let thanks_sms = node(
        NodeKind::Action(ActionConfig {
            channel: Channel::Sms,
            template: "Thanks {{name}}!".to_string(),
            requires_approval: false,
        }),
        vec![end.id],
    );
    let split = node(
        NodeKind::Split(SplitConfig {
            branches: vec![
                SplitBranch { name: "email".to_string(), weight: 50 },
                SplitBranch { name: "sms".to_string(), weight: 50 },
            ],
        }),
        vec![thanks_email.id, thanks_sms.id],
    );
    let condition = node(
        NodeKind::Condition(ConditionConfig {
            field: "days_inactive".to_string(),
            operator: RuleOperator::Gte,
            value: json!(30),
        }),
        vec![cooldown.id, split.id],
    );
    let trigger = node(NodeKind::Trigger, vec![condition.id]);

    let now = chrono::Utc::now();
    Journey {
        id: Uuid::new_v4(),
        name: "Win-back".to_string(),
        description: "Re-engage quiet customers, thank the rest".to_string(),
        status: JourneyStatus::Draft,
        trigger: TriggerDefinition::StageEntry {
            stage_slug: "at_risk".to_string(),
        },
        nodes: [trigger, condition, cooldown, winback, split, thanks_email, thanks_sms, end]
            .into_iter()
            .map(|n| (n.id, n))
            .collect(),
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
