//! Path-level diff of configuration payloads

use crate::model::ChangeRecord;
use serde_json::Value;

/// Maximum recursion depth for payload diffs
const MAX_DIFF_DEPTH: usize = 128;

/// Record name prefix for payload changes
const CONFIG_FIELD: &str = "Config";

/// Compare two payloads and describe every differing path.
///
/// Records are named after the JSON path (`Config.items[2]`). Unequal
/// payloads always produce at least one record.
pub fn config_changes(old: Option<&Value>, new: Option<&Value>) -> Vec<ChangeRecord> {
    match (old, new) {
        (None, None) => Vec::new(),
        (None, Some(new)) => vec![ChangeRecord::create(CONFIG_FIELD, new)],
        (Some(old), None) => vec![ChangeRecord::removed(CONFIG_FIELD, old)],
        (Some(old), Some(new)) => {
            let mut changes = Vec::new();
            diff_values(old, new, CONFIG_FIELD.to_string(), &mut changes, 0);
            changes
        }
    }
}

fn diff_values(
    old: &Value,
    new: &Value,
    path: String,
    changes: &mut Vec<ChangeRecord>,
    depth: usize,
) {
    // Past the depth limit the whole subtree counts as one modification
    if depth > MAX_DIFF_DEPTH {
        if old != new {
            changes.push(ChangeRecord::update(path, old, new));
        }
        return;
    }

    match (old, new) {
        (Value::Object(old_obj), Value::Object(new_obj)) => {
            for (key, old_value) in old_obj {
                let child_path = format!("{}.{}", path, key);
                match new_obj.get(key) {
                    Some(new_value) => {
                        diff_values(old_value, new_value, child_path, changes, depth + 1)
                    }
                    None => changes.push(ChangeRecord::removed(child_path, old_value)),
                }
            }
            for (key, new_value) in new_obj {
                if !old_obj.contains_key(key) {
                    changes.push(ChangeRecord::create(format!("{}.{}", path, key), new_value));
                }
            }
        }

        (Value::Array(old_arr), Value::Array(new_arr)) => {
            let max_len = old_arr.len().max(new_arr.len());
            for i in 0..max_len {
                let child_path = format!("{}[{}]", path, i);
                match (old_arr.get(i), new_arr.get(i)) {
                    (Some(old_val), Some(new_val)) => {
                        diff_values(old_val, new_val, child_path, changes, depth + 1)
                    }
                    (Some(old_val), None) => {
                        changes.push(ChangeRecord::removed(child_path, old_val))
                    }
                    (None, Some(new_val)) => {
                        changes.push(ChangeRecord::create(child_path, new_val))
                    }
                    (None, None) => {}
                }
            }
        }

        _ => {
            if old != new {
                changes.push(ChangeRecord::update(path, old, new));
            }
        }
    }
}
