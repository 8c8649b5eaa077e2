//! Mapping from monitor identity and user tags to metric attributes.

use std::cmp::Ordering;

use opentelemetry::{Array, KeyValue, StringValue, Value};
use uptime_common::monitor::{MonitoredEntity, Tag};

/// Sanitize a tag name or value so it can be used as a metric label.
///
/// Label names must match `[a-zA-Z_][a-zA-Z0-9_]*`. This function:
/// - Drops every character outside `[a-zA-Z0-9_]`
/// - Drops leading characters until a letter or underscore is found
///
/// The result may be empty.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .skip_while(|c| !(c.is_ascii_alphabetic() || *c == '_'))
        .collect()
}

/// Compare two label keys alphabetically, ignoring case.
pub fn compare_label_keys(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Group user tags into sanitized labels.
///
/// Tags whose name sanitizes to nothing are skipped. A tag whose value
/// sanitizes to nothing still creates its key, with no value added. Values
/// are sorted per key and keys are sorted case-insensitively.
pub fn map_tags_to_labels(tags: &[Tag]) -> Vec<(String, Vec<String>)> {
    let mut labels: Vec<(String, Vec<String>)> = Vec::new();

    for tag in tags {
        let name = sanitize(&tag.name);
        if name.is_empty() {
            continue;
        }

        let index = match labels.iter().position(|(key, _)| *key == name) {
            Some(index) => index,
            None => {
                labels.push((name, Vec::new()));
                labels.len() - 1
            }
        };

        let value = sanitize(tag.value.as_deref().unwrap_or(""));
        if !value.is_empty() {
            labels[index].1.push(value);
        }
    }

    for (_, values) in labels.iter_mut() {
        values.sort();
    }

    // Stable, so keys equal ignoring case keep first-seen order
    labels.sort_by(|a, b| compare_label_keys(&a.0, &b.0));
    labels
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelValue {
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl From<LabelValue> for Value {
    fn from(value: LabelValue) -> Self {
        match value {
            LabelValue::Int(v) => Value::I64(v),
            LabelValue::Text(v) => Value::String(v.into()),
            LabelValue::List(values) => Value::Array(Array::String(
                values.into_iter().map(StringValue::from).collect(),
            )),
        }
    }
}

/// Ordered attribute set describing one monitored entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: Vec<(String, LabelValue)>,
}

impl AttributeSet {
    /// Build the attribute set for an entity and its tags.
    ///
    /// Identity fields are taken verbatim and win over a tag with the same
    /// sanitized name. Absent optional identity fields are omitted.
    pub fn build(entity: &MonitoredEntity, tags: &[Tag]) -> Self {
        let identity = identity_labels(entity);

        let mut entries: Vec<(String, LabelValue)> = map_tags_to_labels(tags)
            .into_iter()
            .filter(|(key, _)| !identity.iter().any(|(id_key, _)| id_key == key))
            .map(|(key, values)| (key, LabelValue::List(values)))
            .collect();

        entries.extend(
            identity
                .into_iter()
                .map(|(key, value)| (key.to_string(), value)),
        );
        entries.sort_by(|a, b| compare_label_keys(&a.0, &b.0));

        Self { entries }
    }

    /// Look up an attribute by key.
    pub fn get(&self, key: &str) -> Option<&LabelValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Attribute keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Render as OpenTelemetry attributes.
    pub fn to_key_values(&self) -> Vec<KeyValue> {
        self.entries
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), Value::from(v.clone())))
            .collect()
    }
}

fn identity_labels(entity: &MonitoredEntity) -> Vec<(&'static str, LabelValue)> {
    let mut labels = Vec::with_capacity(6);

    labels.push(("monitor_id", LabelValue::Int(entity.id)));
    labels.push(("monitor_name", LabelValue::Text(entity.name.clone())));
    labels.push(("monitor_type", LabelValue::Text(entity.monitor_type.clone())));

    if let Some(url) = &entity.url {
        labels.push(("monitor_url", LabelValue::Text(url.clone())));
    }
    if let Some(hostname) = &entity.hostname {
        labels.push(("monitor_hostname", LabelValue::Text(hostname.clone())));
    }
    if let Some(port) = entity.port {
        labels.push(("monitor_port", LabelValue::Int(i64::from(port))));
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_label_safe(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !s.starts_with(|c: char| c.is_ascii_digit())
    }

    #[test]
    fn test_sanitize_simple() {
        assert_eq!(sanitize("env"), "env");
        assert_eq!(sanitize("Team_Name"), "Team_Name");
        assert_eq!(sanitize("_private"), "_private");
    }

    #[test]
    fn test_sanitize_special_chars() {
        assert_eq!(sanitize("my-tag"), "mytag");
        assert_eq!(sanitize("$$high"), "high");
        assert_eq!(sanitize("a.b/c d"), "abcd");
        assert_eq!(sanitize("café"), "caf");
    }

    #[test]
    fn test_sanitize_leading_digits() {
        assert_eq!(sanitize("1abc"), "abc");
        assert_eq!(sanitize("2cost"), "cost");
        assert_eq!(sanitize("12_x3"), "_x3");
        assert_eq!(sanitize("-9-a9"), "a9");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("123"), "");
        assert_eq!(sanitize("!@#"), "");
    }

    #[test]
    fn test_sanitize_output_is_label_safe() {
        let inputs = [
            "", "0", "00a", "a-b", "Ünïcödé", "  spaced out ", "__", "9_9", "x$1", "🚀rocket",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(is_label_safe(&out), "{:?} -> {:?}", input, out);
        }
    }

    #[test]
    fn test_map_tags_drops_empty_names() {
        let tags = vec![Tag::new("123", "x"), Tag::new("!!", "y"), Tag::new("1abc", "z")];

        let labels = map_tags_to_labels(&tags);
        assert_eq!(labels, vec![("abc".to_string(), vec!["z".to_string()])]);
    }

    #[test]
    fn test_map_tags_groups_and_sorts_values() {
        let tags = vec![
            Tag::new("env", "staging"),
            Tag::new("env", "prod"),
            Tag::new("env", "Prod"),
            Tag::new("env", "prod"),
        ];

        let labels = map_tags_to_labels(&tags);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].1, vec!["Prod", "prod", "prod", "staging"]);
    }

    #[test]
    fn test_map_tags_keeps_key_without_value() {
        let tags = vec![Tag::bare("critical"), Tag::new("owner", "***")];

        let labels = map_tags_to_labels(&tags);
        assert_eq!(
            labels,
            vec![
                ("critical".to_string(), Vec::<String>::new()),
                ("owner".to_string(), Vec::<String>::new()),
            ]
        );
    }

    #[test]
    fn test_map_tags_case_insensitive_key_order() {
        let tags = vec![
            Tag::new("zeta", "1"),
            Tag::new("Beta", "1"),
            Tag::new("alpha", "1"),
            Tag::new("beta", "1"),
        ];

        let keys: Vec<String> = map_tags_to_labels(&tags)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        // "Beta" and "beta" tie; first-seen wins
        assert_eq!(keys, vec!["alpha", "Beta", "beta", "zeta"]);
    }

    #[test]
    fn test_attribute_set_scenario() {
        let entity = MonitoredEntity::new(1, "api", "http")
            .with_url("https://x")
            .with_hostname("x")
            .with_port(443);
        let tags = vec![
            Tag::new("Env", "Prod"),
            Tag::new("Env", "prod"),
            Tag::new("2cost", "$$high"),
        ];

        let set = AttributeSet::build(&entity, &tags);

        let keys: Vec<&str> = set.keys().collect();
        assert_eq!(
            keys,
            vec![
                "cost",
                "Env",
                "monitor_hostname",
                "monitor_id",
                "monitor_name",
                "monitor_port",
                "monitor_type",
                "monitor_url",
            ]
        );
        assert_eq!(
            set.get("Env"),
            Some(&LabelValue::List(vec!["Prod".into(), "prod".into()]))
        );
        assert_eq!(set.get("cost"), Some(&LabelValue::List(vec!["high".into()])));
        assert_eq!(set.get("monitor_id"), Some(&LabelValue::Int(1)));
        assert_eq!(set.get("monitor_port"), Some(&LabelValue::Int(443)));
        assert_eq!(
            set.get("monitor_url"),
            Some(&LabelValue::Text("https://x".into()))
        );
    }

    #[test]
    fn test_identity_fields_are_verbatim_and_win() {
        let entity = MonitoredEntity::new(5, "My API (prod)!", "http");
        let tags = vec![Tag::new("monitor_name", "spoofed")];

        let set = AttributeSet::build(&entity, &tags);
        assert_eq!(
            set.get("monitor_name"),
            Some(&LabelValue::Text("My API (prod)!".into()))
        );
        assert_eq!(set.keys().filter(|k| *k == "monitor_name").count(), 1);
    }

    #[test]
    fn test_absent_identity_fields_omitted() {
        let entity = MonitoredEntity::new(9, "dns", "dns").with_hostname("1.1.1.1");

        let set = AttributeSet::build(&entity, &[]);
        assert!(set.get("monitor_url").is_none());
        assert!(set.get("monitor_port").is_none());
        assert_eq!(set.keys().count(), 4);
    }

    #[test]
    fn test_to_key_values() {
        let entity = MonitoredEntity::new(3, "db", "port").with_port(5432);
        let tags = vec![Tag::new("tier", "gold"), Tag::new("tier", "alpha")];

        let kvs = AttributeSet::build(&entity, &tags).to_key_values();

        let tier = kvs.iter().find(|kv| kv.key.as_str() == "tier").unwrap();
        assert_eq!(
            tier.value,
            Value::Array(Array::String(vec!["alpha".into(), "gold".into()]))
        );
        let port = kvs.iter().find(|kv| kv.key.as_str() == "monitor_port").unwrap();
        assert_eq!(port.value, Value::I64(5432));
        let name = kvs.iter().find(|kv| kv.key.as_str() == "monitor_name").unwrap();
        assert_eq!(name.value.as_str(), "db");
    }
}
