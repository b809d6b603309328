//! Tag helpers shared by the adapters

use std::collections::HashMap;

use vela_core::resource::Value;

/// Flatten a tags attribute into a plain string map, ignoring
/// non-string values
pub fn tag_map(value: Option<&Value>) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    if let Some(Value::Map(user_tags)) = value {
        for (key, v) in user_tags {
            if let Value::String(s) = v {
                tags.insert(key.clone(), s.clone());
            }
        }
    }
    tags
}

/// Convert a remote tag map back into an attribute value;
/// returns None when there are no tags
pub fn tags_attr(tags: &HashMap<String, String>) -> Option<Value> {
    if tags.is_empty() {
        return None;
    }
    let map = tags
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Some(Value::Map(map))
}

/// Compute the updates needed to move from one tag set to another:
/// tags to create or overwrite, and tag keys to remove
pub fn tag_diff(
    from: &HashMap<String, String>,
    to: &HashMap<String, String>,
) -> (HashMap<String, String>, Vec<String>) {
    let mut upserts = HashMap::new();
    for (key, value) in to {
        if from.get(key) != Some(value) {
            upserts.insert(key.clone(), value.clone());
        }
    }
    let removals = from
        .keys()
        .filter(|k| !to.contains_key(*k))
        .cloned()
        .collect();
    (upserts, removals)
}
