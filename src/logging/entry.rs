//! Log entry construction.
//!
//! An entry is the result of merging ordered overlays with a single
//! last-writer-wins reducer:
//!
//! ```text
//! fixed fields (timestamp, level, message, correlationId)
//!     ← logger persistent context
//!     ← call-site context (with `error` folded in)
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::correlation::CorrelationId;
use crate::errors::ErrorInfo;
use crate::logging::level::LogLevel;

/// Free-form structured context.
pub type ContextMap = serde_json::Map<String, Value>;

pub const TIMESTAMP_KEY: &str = "timestamp";
pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "message";
pub const CORRELATION_KEY: &str = "correlationId";
pub const ERROR_KEY: &str = "error";

const FIXED_KEYS: [&str; 4] = [TIMESTAMP_KEY, LEVEL_KEY, MESSAGE_KEY, CORRELATION_KEY];

/// Values accepted as call-site context.
pub trait IntoContext {
    fn into_context(self) -> ContextMap;
}

impl IntoContext for () {
    fn into_context(self) -> ContextMap {
        ContextMap::new()
    }
}

impl IntoContext for ContextMap {
    fn into_context(self) -> ContextMap {
        self
    }
}

/// Objects are used as-is; any other value lands under `value`.
impl IntoContext for Value {
    fn into_context(self) -> ContextMap {
        match self {
            Value::Object(map) => map,
            Value::Null => ContextMap::new(),
            other => {
                let mut map = ContextMap::new();
                map.insert("value".into(), other);
                map
            }
        }
    }
}

/// Merge overlays in order; later keys replace earlier ones.
pub fn merge_overlays<'a, I>(overlays: I) -> ContextMap
where
    I: IntoIterator<Item = &'a ContextMap>,
{
    overlays.into_iter().fold(ContextMap::new(), |mut merged, overlay| {
        for (key, value) in overlay {
            merged.insert(key.clone(), value.clone());
        }
        merged
    })
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-03-01T09:30:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One immutable, flattened log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(skip)]
    level: LogLevel,
    #[serde(flatten)]
    fields: ContextMap,
}

impl LogEntry {
    /// Entry with only the fixed fields.
    pub fn new(level: LogLevel, message: &str) -> Self {
        Self::build(level, message, None, Utc::now(), &[])
    }

    /// Merge fixed fields and `overlays` into an entry.
    pub fn build(
        level: LogLevel,
        message: &str,
        correlation_id: Option<&CorrelationId>,
        at: DateTime<Utc>,
        overlays: &[&ContextMap],
    ) -> Self {
        let mut fixed = ContextMap::new();
        fixed.insert(TIMESTAMP_KEY.into(), Value::String(format_timestamp(at)));
        fixed.insert(LEVEL_KEY.into(), Value::String(level.as_str().into()));
        fixed.insert(MESSAGE_KEY.into(), Value::String(message.into()));
        if let Some(id) = correlation_id {
            fixed.insert(CORRELATION_KEY.into(), Value::String(id.as_str().into()));
        }

        let fields = merge_overlays(std::iter::once(&fixed).chain(overlays.iter().copied()));
        Self { level, fields }
    }

    /// Same entry with its fields replaced (used by the redaction pass).
    pub(crate) fn with_fields(self, fields: ContextMap) -> Self {
        Self {
            level: self.level,
            fields,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        self.str_field(MESSAGE_KEY).unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.str_field(TIMESTAMP_KEY)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.str_field(CORRELATION_KEY)
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.fields
            .get(ERROR_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &ContextMap {
        &self.fields
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Single-line JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| self.message().to_string())
    }

    /// Human-readable form: a header line, then any remaining fields as
    /// indented JSON.
    pub fn to_pretty(&self) -> String {
        let mut out = format!(
            "[{}] {:<5} {}",
            self.timestamp().unwrap_or("-"),
            self.level.as_str().to_ascii_uppercase(),
            self.message()
        );
        if let Some(id) = self.correlation_id() {
            out.push_str(&format!(" ({})", id));
        }

        let rest: ContextMap = self
            .fields
            .iter()
            .filter(|(k, _)| !FIXED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !rest.is_empty() {
            if let Ok(body) = serde_json::to_string_pretty(&rest) {
                out.push('\n');
                out.push_str(&body);
            }
        }
        out
    }
}
