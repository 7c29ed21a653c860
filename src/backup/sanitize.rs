use serde_json::Value;

/// Recursively drop every `src` field.
///
/// Moment sources are usually data URIs several hundred kilobytes long, so a
/// backup is previewed with them stripped.
pub fn remove_src(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| key != "src")
                .map(|(key, v)| (key, remove_src(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(remove_src).collect()),
        other => other,
    }
}
