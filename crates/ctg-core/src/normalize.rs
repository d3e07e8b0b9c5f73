use regex::Regex;
use std::sync::LazyLock;

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?").unwrap()
});
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0x[0-9a-fA-F]{6,}\b").unwrap());

/// Strips non-deterministic residues from a captured golden value so that
/// re-running the same capture on different days/hosts still compares equal.
/// Applied before persistence and before any equivalence comparison.
pub fn normalize_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(normalize_string(s)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(normalize_value).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub fn normalize_observations(
    observations: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    observations
        .iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}

fn normalize_string(s: &str) -> String {
    let s = ISO_TIMESTAMP.replace_all(s, "<TIMESTAMP>");
    let s = UUID.replace_all(&s, "<UUID>");
    HEX_ADDRESS.replace_all(&s, "<ADDR>").into_owned()
}
