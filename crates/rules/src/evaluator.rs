//! Rule evaluation — comparison of a customer attribute against a metric's
//! threshold(s). Absent attributes or incompatible types never match and
//! never error; a misconfigured rule under-triggers instead of crashing
//! evaluation.

use serde_json::Value;

use crate::model::{ChurnMetric, RuleOperator};

/// Evaluates a single comparison. `threshold_max` is consulted only by
/// `between`, which is inclusive at both bounds.
pub fn compare(
    operator: RuleOperator,
    actual: &Value,
    threshold: &Value,
    threshold_max: Option<&Value>,
) -> bool {
    match operator {
        RuleOperator::Gt => {
            numeric_cmp(actual, threshold).is_some_and(|o| o == std::cmp::Ordering::Greater)
        }
        RuleOperator::Gte => {
            numeric_cmp(actual, threshold).is_some_and(|o| o != std::cmp::Ordering::Less)
        }
        RuleOperator::Lt => {
            numeric_cmp(actual, threshold).is_some_and(|o| o == std::cmp::Ordering::Less)
        }
        RuleOperator::Lte => {
            numeric_cmp(actual, threshold).is_some_and(|o| o != std::cmp::Ordering::Greater)
        }
        RuleOperator::Eq => match numeric_cmp(actual, threshold) {
            Some(o) => o == std::cmp::Ordering::Equal,
            None => actual == threshold,
        },
        RuleOperator::Between => {
            let (Some(value), Some(lo)) = (actual.as_f64(), threshold.as_f64()) else {
                return false;
            };
            let Some(hi) = threshold_max.and_then(Value::as_f64) else {
                return false;
            };
            lo <= value && value <= hi
        }
    }
}

/// Evaluates a metric against an attribute value. `None` (absent attribute)
/// never matches.
pub fn evaluate(metric: &ChurnMetric, value: Option<&Value>) -> bool {
    match value {
        Some(actual) => compare(
            metric.operator,
            actual,
            &metric.threshold,
            metric.threshold_max.as_ref(),
        ),
        None => false,
    }
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    let a_num = a.as_f64()?;
    let b_num = b.as_f64()?;
    a_num.partial_cmp(&b_num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn metric(operator: RuleOperator, threshold: Value, threshold_max: Option<Value>) -> ChurnMetric {
        ChurnMetric {
            id: Uuid::new_v4(),
            stage_id: Uuid::new_v4(),
            field: "days_inactive".to_string(),
            operator,
            threshold,
            threshold_max,
            weight: 5,
            active: true,
        }
    }

    #[test]
    fn test_ordering_operators() {
        let gte = metric(RuleOperator::Gte, json!(30), None);
        assert!(evaluate(&gte, Some(&json!(45))));
        assert!(evaluate(&gte, Some(&json!(30))));
        assert!(!evaluate(&gte, Some(&json!(10))));

        let lt = metric(RuleOperator::Lt, json!(5), None);
        assert!(evaluate(&lt, Some(&json!(4))));
        assert!(!evaluate(&lt, Some(&json!(5))));
    }

    #[test]
    fn test_eq_numeric_and_string() {
        let eq_num = metric(RuleOperator::Eq, json!(30), None);
        assert!(evaluate(&eq_num, Some(&json!(30))));
        assert!(evaluate(&eq_num, Some(&json!(30.0))));
        assert!(!evaluate(&eq_num, Some(&json!(31))));

        let eq_str = metric(RuleOperator::Eq, json!("high"), None);
        assert!(evaluate(&eq_str, Some(&json!("high"))));
        assert!(!evaluate(&eq_str, Some(&json!("low"))));
    }

    #[test]
    fn test_between_inclusive_at_both_bounds() {
        let between = metric(RuleOperator::Between, json!(10), Some(json!(20)));
        assert!(evaluate(&between, Some(&json!(10))));
        assert!(evaluate(&between, Some(&json!(20))));
        assert!(evaluate(&between, Some(&json!(15))));
        assert!(!evaluate(&between, Some(&json!(9))));
        assert!(!evaluate(&between, Some(&json!(21))));
    }

    #[test]
    fn test_missing_or_incompatible_never_matches() {
        let gte = metric(RuleOperator::Gte, json!(30), None);
        assert!(!evaluate(&gte, None));
        assert!(!evaluate(&gte, Some(&json!("forty-five"))));

        // between without its upper bound configured cannot fire
        let broken = metric(RuleOperator::Between, json!(10), None);
        assert!(!evaluate(&broken, Some(&json!(15))));
    }

    #[test]
    fn test_non_between_operators_ignore_threshold_max() {
        let gt = metric(RuleOperator::Gt, json!(10), Some(json!(20)));
        // 25 > 10 fires even though it exceeds the (ignored) upper bound
        assert!(evaluate(&gt, Some(&json!(25))));
    }
}
