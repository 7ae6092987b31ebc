//! # String-backed setting value with typed accessors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Setting value.
///
/// Values are stored as strings and converted on read; accessors return `None` when
/// the stored text does not parse as the requested type.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use servicevisor::Value;
///
/// assert_eq!(Value::from("250ms").as_duration(), Some(Duration::from_millis(250)));
/// assert_eq!(Value::from(true).as_bool(), Some(true));
/// assert_eq!(Value::from("12").as_int(), Some(12));
/// assert_eq!(Value::from("nope").as_bool(), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value(Arc<str>);

impl Default for Value {
    /// The empty string.
    fn default() -> Self {
        Self(Arc::from(""))
    }
}

impl Value {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.0.trim().parse().ok()
    }

    /// Parses a human duration such as `30s`, `1m 30s` or `100ms`.
    pub fn as_duration(&self) -> Option<Duration> {
        humantime::parse_duration(self.0.trim()).ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::new(if b { "true" } else { "false" })
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::new(n.to_string())
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Self::new(humantime::format_duration(d).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_round_trips_through_text() {
        for d in [
            Duration::from_millis(100),
            Duration::from_secs(30),
            Duration::from_secs(90),
            Duration::ZERO,
        ] {
            assert_eq!(Value::from(d).as_duration(), Some(d));
        }
    }

    #[test]
    fn malformed_values_read_as_none() {
        let v = Value::from("thirty seconds");
        assert_eq!(v.as_duration(), None);
        assert_eq!(v.as_int(), None);
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_str(), "thirty seconds");
    }
}
