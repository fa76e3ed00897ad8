//! Deep merge functionality for YAML configurations.
//!
//! Implements field-by-field merging where higher tier values override lower tier values.
//! Arrays are replaced entirely, not concatenated.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans, nulls are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use onboarding_tracker::config::deep_merge;
///
/// let base = json!({
///     "ui": { "port": 8080, "bind": "127.0.0.1" },
///     "catalog": { "stage_options": ["A", "B"] }
/// });
/// let overlay = json!({
///     "ui": { "port": 9000 },
///     "catalog": { "stage_options": ["C"] }
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result["ui"]["port"], 9000);
/// assert_eq!(result["ui"]["bind"], "127.0.0.1");
/// assert_eq!(result["catalog"]["stage_options"], json!(["C"]));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Two tables: recurse key by key
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        // An unset overlay key keeps whatever the lower tier had
        (base, Value::Null) => base,
        // Scalars and lists: the higher tier wins outright
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}
