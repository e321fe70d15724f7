use std::time::{SystemTime, UNIX_EPOCH};

use zbus::zvariant::Value;

/// Text held by a string variant, looking through nested variants
#[must_use]
pub fn text_of<'a>(v: &'a Value<'_>) -> Option<&'a str> {
    match v {
        Value::Str(s) => Some(s.as_str()),
        Value::Value(inner) => text_of(inner),
        _ => None,
    }
}

#[must_use]
/// Milliseconds since the Unix epoch, or 0 if the system clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
