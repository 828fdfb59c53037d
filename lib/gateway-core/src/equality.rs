//! Order-insensitive comparisons used to decide whether a child object needs
//! a write. An absent list never equals a present-but-empty one.

use gateway_api::AiModel;
use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar};
use std::collections::BTreeMap;

/// Model lists are equal when they hold the same models in any order
pub fn ai_models_equal(existing: Option<&[AiModel]>, desired: Option<&[AiModel]>) -> bool {
    sorted_equal(existing, desired, |a, b| {
        (&a.provider, &a.name).cmp(&(&b.provider, &b.name))
    })
}

/// Exact label map equality
pub fn labels_equal(
    existing: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> bool {
    existing == desired
}

/// Every required label is present in `existing` with the same value.
/// Extra labels set by other actors are tolerated.
pub fn required_labels_present(
    existing: Option<&BTreeMap<String, String>>,
    required: &BTreeMap<String, String>,
) -> bool {
    required
        .iter()
        .all(|(key, value)| existing.and_then(|labels| labels.get(key)) == Some(value))
}

/// Environment lists are equal when they hold the same variables in any order
pub fn env_vars_equal(existing: Option<&[EnvVar]>, desired: Option<&[EnvVar]>) -> bool {
    sorted_equal(existing, desired, |a, b| a.name.cmp(&b.name))
}

/// Bulk env imports are equal when they reference the same sources in any order
pub fn env_from_equal(existing: Option<&[EnvFromSource]>, desired: Option<&[EnvFromSource]>) -> bool {
    sorted_equal(existing, desired, |a, b| env_from_key(a).cmp(&env_from_key(b)))
}

fn env_from_key(source: &EnvFromSource) -> String {
    if let Some(cm) = &source.config_map_ref {
        format!("cm:{}", cm.name)
    } else if let Some(secret) = &source.secret_ref {
        format!("secret:{}", secret.name)
    } else {
        String::new()
    }
}

fn sorted_equal<T, F>(existing: Option<&[T]>, desired: Option<&[T]>, cmp: F) -> bool
where
    T: Clone + PartialEq,
    F: Fn(&T, &T) -> std::cmp::Ordering,
{
    match (existing, desired) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut a = a.to_vec();
            let mut b = b.to_vec();
            a.sort_by(&cmp);
            b.sort_by(&cmp);
            a == b
        }
        _ => false,
    }
}
