//! Tagged logger handles.
//!
//! A [`Logger`] is a cheap, cloneable handle carrying a set of tags
//! (`service`, `correlation_id`, ...) that are merged into the metadata of
//! every record it emits. Records are plain `tracing` events, so they flow
//! through whatever subscriber `logging::init_logging` installed.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::LogLevel;

/// Field carrying the serialized metadata object on emitted events.
pub const METADATA_FIELD: &str = "metadata";
/// Field carrying the correlation id.
pub const CORRELATION_FIELD: &str = "correlation_id";
/// Field carrying the service tag.
pub const SERVICE_FIELD: &str = "service";

#[derive(Debug, Clone, Default)]
pub struct Logger {
    tags: Arc<Map<String, Value>>,
}

impl Logger {
    /// Root logger tagged with a service name.
    pub fn service(name: &str) -> Self {
        Self::default().child([(SERVICE_FIELD, Value::from(name))])
    }

    /// Derive a logger whose tags extend (and override) this one's.
    pub fn child<K, I>(&self, tags: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut merged = (*self.tags).clone();
        for (key, value) in tags {
            merged.insert(key.into(), value);
        }
        Self {
            tags: Arc::new(merged),
        }
    }

    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    pub fn error(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Error, message, metadata);
    }

    pub fn warn(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Warn, message, metadata);
    }

    pub fn info(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Info, message, metadata);
    }

    pub fn debug(&self, message: &str, metadata: Value) {
        self.log(LogLevel::Debug, message, metadata);
    }

    /// Emit one record. `metadata` is merged over the logger's tags; a
    /// non-object value is stored under `data`.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        let mut fields = (*self.tags).clone();
        match metadata {
            Value::Object(map) => fields.extend(map),
            Value::Null => {}
            other => {
                fields.insert("data".to_string(), other);
            }
        }

        let correlation_id = take_string(&mut fields, CORRELATION_FIELD);
        let service = take_string(&mut fields, SERVICE_FIELD);
        let metadata = if fields.is_empty() {
            None
        } else {
            Some(Value::Object(fields).to_string())
        };

        let correlation_id = correlation_id.as_deref();
        let service = service.as_deref();
        let metadata = metadata.as_deref();

        match level {
            LogLevel::Error => tracing::error!(correlation_id, service, metadata, "{}", message),
            LogLevel::Warn => tracing::warn!(correlation_id, service, metadata, "{}", message),
            LogLevel::Info => tracing::info!(correlation_id, service, metadata, "{}", message),
            LogLevel::Debug => tracing::debug!(correlation_id, service, metadata, "{}", message),
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_merges_tags() {
        let root = Logger::service("backend");
        let child = root.child([(CORRELATION_FIELD, json!("req-1"))]);

        assert_eq!(child.tag(SERVICE_FIELD), Some(&json!("backend")));
        assert_eq!(child.tag(CORRELATION_FIELD), Some(&json!("req-1")));
        assert!(root.tag(CORRELATION_FIELD).is_none());
    }

    #[test]
    fn test_child_overrides_parent() {
        let child = Logger::service("backend").child([(SERVICE_FIELD, json!("cache"))]);
        assert_eq!(child.tag(SERVICE_FIELD), Some(&json!("cache")));
    }

    #[test]
    fn test_take_string_variants() {
        let mut fields = Map::new();
        fields.insert("a".into(), json!("x"));
        fields.insert("b".into(), json!(7));
        fields.insert("c".into(), Value::Null);

        assert_eq!(take_string(&mut fields, "a").as_deref(), Some("x"));
        assert_eq!(take_string(&mut fields, "b").as_deref(), Some("7"));
        assert_eq!(take_string(&mut fields, "c"), None);
        assert!(fields.is_empty());
    }
}
