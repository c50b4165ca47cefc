//! Condition evaluation: `{field, operator, value}` against a rule's
//! trigger context. Fields come from a flat map the trigger site builds;
//! a missing field only satisfies the negated operators.

use serde_json::Value;

use crate::models::rule::{ConditionOperator, RuleCondition};

use super::RuleContext;

pub fn evaluate_all(conditions: &[RuleCondition], ctx: &RuleContext) -> bool {
    conditions.iter().all(|condition| evaluate(condition, ctx))
}

fn evaluate(condition: &RuleCondition, ctx: &RuleContext) -> bool {
    match ctx.fields.get(&condition.field) {
        Some(field_value) => apply(condition.operator, field_value, &condition.value),
        None => matches!(
            condition.operator,
            ConditionOperator::NotEquals | ConditionOperator::NotContains | ConditionOperator::NotInList
        ),
    }
}

fn as_trimmed_lower(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list field, or a comma-separated string field, normalized the same way
/// as scalar string comparisons.
fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_trimmed_lower).collect(),
        Value::String(s) => s.split(',').map(|part| part.trim().to_lowercase()).collect(),
        other => as_trimmed_lower(other).into_iter().collect(),
    }
}

fn apply(operator: ConditionOperator, field: &Value, target: &Value) -> bool {
    use ConditionOperator::*;
    match operator {
        Equals => as_trimmed_lower(field) == as_trimmed_lower(target),
        NotEquals => as_trimmed_lower(field) != as_trimmed_lower(target),
        Contains => match field {
            Value::Array(_) => {
                let Some(needle) = as_trimmed_lower(target) else { return false };
                as_list(field).iter().any(|item| item.contains(&needle))
            }
            _ => match (as_trimmed_lower(field), as_trimmed_lower(target)) {
                (Some(haystack), Some(needle)) => haystack.contains(&needle),
                _ => false,
            },
        },
        NotContains => !apply(Contains, field, target),
        GreaterThan => match (as_f64(field), as_f64(target)) {
            (Some(f), Some(t)) => f > t,
            _ => false,
        },
        LessThan => match (as_f64(field), as_f64(target)) {
            (Some(f), Some(t)) => f < t,
            _ => false,
        },
        InList => {
            let Some(needle) = as_trimmed_lower(field) else { return false };
            as_list(target).contains(&needle)
        }
        NotInList => !apply(InList, field, target),
        MatchesRegex => match (field.as_str(), target.as_str()) {
            (Some(text), Some(pattern)) => regex::Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx(fields: Vec<(&str, Value)>) -> RuleContext {
        let mut map = HashMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        RuleContext {
            user_id: uuid::Uuid::new_v4(),
            fields: map,
            artist_id: None,
            album_id: None,
            recommendation_id: None,
            wishlist_item_id: None,
        }
    }

    fn condition(field: &str, operator: ConditionOperator, value: Value) -> RuleCondition {
        RuleCondition { field: field.to_string(), operator, value }
    }

    #[test]
    fn string_equals_is_case_insensitive_and_trimmed() {
        let c = ctx(vec![("genre", json!("  Indie Rock "))]);
        let cond = condition("genre", ConditionOperator::Equals, json!("indie rock"));
        assert!(evaluate(&cond, &c));
    }

    #[test]
    fn contains_on_list_matches_any_element() {
        let c = ctx(vec![("tags", json!(["lossless", "24bit"]))]);
        let cond = condition("tags", ConditionOperator::Contains, json!("24"));
        assert!(evaluate(&cond, &c));
    }

    #[test]
    fn greater_than_with_mismatched_types_is_false() {
        let c = ctx(vec![("seeders", json!("not a number"))]);
        let cond = condition("seeders", ConditionOperator::GreaterThan, json!(5));
        assert!(!evaluate(&cond, &c));
    }

    #[test]
    fn in_list_accepts_comma_separated_string() {
        let c = ctx(vec![("format", json!("flac"))]);
        let cond = condition("format", ConditionOperator::InList, json!("mp3, flac, v0"));
        assert!(evaluate(&cond, &c));
    }

    #[test]
    fn missing_field_is_true_only_for_negated_operators() {
        let c = ctx(vec![]);
        assert!(evaluate(&condition("genre", ConditionOperator::NotEquals, json!("rock")), &c));
        assert!(!evaluate(&condition("genre", ConditionOperator::Equals, json!("rock")), &c));
        assert!(evaluate(&condition("genre", ConditionOperator::NotInList, json!("rock,pop")), &c));
        assert!(!evaluate(&condition("genre", ConditionOperator::InList, json!("rock,pop")), &c));
    }

    #[test]
    fn matches_regex_against_string_field() {
        let c = ctx(vec![("title", json!("Deluxe Edition (2024)"))]);
        let cond = condition("title", ConditionOperator::MatchesRegex, json!(r"(?i)deluxe"));
        assert!(evaluate(&cond, &c));
    }
}
