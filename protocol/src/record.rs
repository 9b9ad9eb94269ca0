//! Trace record types representing intercepted dynamic-lookup calls.

use serde::{Serialize, Serializer};

/// Category of an intercepted call.
///
/// Serializes as a lowercase string for wire compatibility with the
/// offline image builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// Reflection, resource lookup, proxies, method handles, class loading
    #[default]
    Reflect,
    /// ObjectStreamClass construction
    Serialization,
    /// Calls observed through substituted native entry points
    Jni,
}

impl TraceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceKind::Reflect => "reflect",
            TraceKind::Serialization => "serialization",
            TraceKind::Jni => "jni",
        }
    }
}

impl Serialize for TraceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Marker written for values that were present but could not be read
/// (e.g. an unreadable array element or a missing local variable).
pub const UNKNOWN_MARKER: &str = "<unknown>";

/// A value slot in a trace record.
///
/// The two sentinels are distinct: `Null` means the original call carried
/// an explicit null reference, `Unknown` means the interceptor could not
/// observe the value. Consumers must not conflate them.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TraceValue {
    /// Explicit null reference in the intercepted call
    #[default]
    Null,
    /// Value existed but could not be read
    Unknown,
    /// Outcome flag of a re-invoked call
    Bool(bool),
    /// Class name, member name, resource name, ...
    Str(String),
    /// Materialised array argument (e.g. proxy interface list)
    List(Vec<TraceValue>),
}

impl Serialize for TraceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TraceValue::Null => serializer.serialize_unit(),
            TraceValue::Unknown => serializer.serialize_str(UNKNOWN_MARKER),
            TraceValue::Bool(b) => serializer.serialize_bool(*b),
            TraceValue::Str(s) => serializer.serialize_str(s),
            TraceValue::List(values) => values.serialize(serializer),
        }
    }
}

impl From<bool> for TraceValue {
    fn from(b: bool) -> Self {
        TraceValue::Bool(b)
    }
}

impl From<String> for TraceValue {
    fn from(s: String) -> Self {
        TraceValue::Str(s)
    }
}

impl From<&str> for TraceValue {
    fn from(s: &str) -> Self {
        TraceValue::Str(s.to_string())
    }
}

impl From<Option<String>> for TraceValue {
    /// Maps an absent value to the explicit-null sentinel.
    fn from(s: Option<String>) -> Self {
        match s {
            Some(s) => TraceValue::Str(s),
            None => TraceValue::Null,
        }
    }
}

/// One intercepted call, as handed to a [`crate::TraceSink`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    /// Call category
    pub kind: TraceKind,
    /// Name of the intercepted operation (e.g. "forName")
    pub function: String,
    /// Receiver or target class name
    pub clazz: TraceValue,
    /// Class declaring the resolved member, when distinct from `clazz`
    pub declaring_class: TraceValue,
    /// Direct caller class name
    pub caller_class: TraceValue,
    /// Outcome of the re-invocation, or a resolved name
    pub result: TraceValue,
    /// Positional arguments of the intercepted call
    pub args: Vec<TraceValue>,
}

impl TraceRecord {
    /// Start a record for a reflection-category operation.
    pub fn reflect(function: impl Into<String>) -> Self {
        Self {
            kind: TraceKind::Reflect,
            function: function.into(),
            ..Self::default()
        }
    }

    /// Start a record for a serialization-category operation.
    pub fn serialization(function: impl Into<String>) -> Self {
        Self {
            kind: TraceKind::Serialization,
            function: function.into(),
            ..Self::default()
        }
    }

    /// Start a record for a native-entry-category operation.
    pub fn jni(function: impl Into<String>) -> Self {
        Self {
            kind: TraceKind::Jni,
            function: function.into(),
            ..Self::default()
        }
    }

    pub fn clazz(mut self, v: impl Into<TraceValue>) -> Self {
        self.clazz = v.into();
        self
    }

    pub fn declaring_class(mut self, v: impl Into<TraceValue>) -> Self {
        self.declaring_class = v.into();
        self
    }

    pub fn caller_class(mut self, v: impl Into<TraceValue>) -> Self {
        self.caller_class = v.into();
        self
    }

    pub fn result(mut self, v: impl Into<TraceValue>) -> Self {
        self.result = v.into();
        self
    }

    pub fn arg(mut self, v: impl Into<TraceValue>) -> Self {
        self.args.push(v.into());
        self
    }

    pub fn args(mut self, values: Vec<TraceValue>) -> Self {
        self.args = values;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = TraceRecord::reflect("getField")
            .clazz("java.util.HashMap")
            .caller_class("com.example.Main")
            .result(true)
            .arg("table");

        assert_eq!(record.kind, TraceKind::Reflect);
        assert_eq!(record.function, "getField");
        assert_eq!(record.clazz, TraceValue::Str("java.util.HashMap".into()));
        assert_eq!(record.declaring_class, TraceValue::Null);
        assert_eq!(record.result, TraceValue::Bool(true));
        assert_eq!(record.args, vec![TraceValue::Str("table".into())]);
    }

    #[test]
    fn test_serialized_shape() {
        let record = TraceRecord::reflect("forName")
            .clazz("java.lang.Class")
            .caller_class("com.example.Main")
            .result(false)
            .arg("DoesNotExist");

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["kind"], "reflect");
        assert_eq!(json["function"], "forName");
        assert_eq!(json["clazz"], "java.lang.Class");
        assert_eq!(json["declaringClass"], serde_json::Value::Null);
        assert_eq!(json["callerClass"], "com.example.Main");
        assert_eq!(json["result"], false);
        assert_eq!(json["args"][0], "DoesNotExist");
    }

    #[test]
    fn test_sentinels_stay_distinct() {
        let null = serde_json::to_value(TraceValue::Null).unwrap();
        let unknown = serde_json::to_value(TraceValue::Unknown).unwrap();
        assert_eq!(null, serde_json::Value::Null);
        assert_eq!(unknown, serde_json::Value::String(UNKNOWN_MARKER.into()));
    }

    #[test]
    fn test_list_values_nest() {
        let value = TraceValue::List(vec![
            TraceValue::Str("java.lang.Runnable".into()),
            TraceValue::Unknown,
            TraceValue::Null,
        ]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json[0], "java.lang.Runnable");
        assert_eq!(json[1], UNKNOWN_MARKER);
        assert_eq!(json[2], serde_json::Value::Null);
    }
}
