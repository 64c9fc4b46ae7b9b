//! Message content rendering using {{variable}} syntax.

use crate::types::Customer;
use std::collections::HashMap;

/// Renders a template against a flat key/value context. Placeholders whose
/// key is present in the context are replaced; unmatched placeholders are
/// left verbatim.
pub fn render(template: &str, context: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Builds the flat rendering context for a customer. Unset optional fields
/// are omitted so their placeholders stay verbatim in the output.
pub fn customer_context(customer: &Customer) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert("name".to_string(), customer.name.clone());
    if let Some(email) = &customer.email {
        context.insert("email".to_string(), email.clone());
    }
    if let Some(location) = &customer.location {
        context.insert("location".to_string(), location.clone());
    }
    context.insert(
        "days_inactive".to_string(),
        customer.days_inactive.to_string(),
    );
    context.insert(
        "lifetime_value".to_string(),
        format!("{:.2}", customer.lifetime_value),
    );
    context.insert(
        "account_balance".to_string(),
        format!("{:.2}", customer.account_balance),
    );
    context.insert(
        "lifecycle_stage".to_string(),
        customer.lifecycle_stage.as_str().to_string(),
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_render_substitutes_context_keys() {
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Ada".to_string());
        context.insert("days_inactive".to_string(), "45".to_string());

        let out = render("Hi {{name}}, it has been {{days_inactive}} days.", &context);
        assert_eq!(out, "Hi Ada, it has been 45 days.");
    }

    #[test]
    fn test_render_leaves_unmatched_placeholders_verbatim() {
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Ada".to_string());

        let out = render("Hi {{name}}, your code is {{promo_code}}.", &context);
        assert_eq!(out, "Hi Ada, your code is {{promo_code}}.");
    }

    #[test]
    fn test_customer_context_omits_unset_fields() {
        let mut customer = Customer::new(Uuid::new_v4(), "Grace");
        customer.days_inactive = 12;

        let context = customer_context(&customer);
        assert_eq!(context.get("name"), Some(&"Grace".to_string()));
        assert_eq!(context.get("days_inactive"), Some(&"12".to_string()));
        assert!(!context.contains_key("email"));

        let out = render("{{name}} <{{email}}>", &context);
        assert_eq!(out, "Grace <{{email}}>");
    }
}
