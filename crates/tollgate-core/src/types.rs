//! Common types used throughout Tollgate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{IdError, IdResult};

/// Opaque identifier for one logical run of a computation.
///
/// Callers may supply their own identifier on `start`; otherwise a random
/// UUID string is generated. Identifiers are limited to ASCII letters,
/// digits and `.`, `_`, `:`, `-` so they can be embedded in storage keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Longest accepted session identifier.
    pub const MAX_LEN: usize = 128;

    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a caller-supplied session ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if the value is empty, too long, or contains a
    /// character outside `[A-Za-z0-9._:-]`.
    pub fn parse(value: impl Into<String>) -> IdResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::Empty { kind: "session id" });
        }
        if value.len() > Self::MAX_LEN {
            return Err(IdError::TooLong {
                kind: "session id",
                max: Self::MAX_LEN,
            });
        }
        if let Some(ch) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')))
        {
            return Err(IdError::InvalidChar {
                kind: "session id",
                ch,
            });
        }
        Ok(Self(value))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Unique identifier for an approval request within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a request ID from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IdError::InvalidUuid {
                kind: "request id",
                reason: e.to_string(),
            })
    }
}

/// Handle for one background execution launched by `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new random task ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// Timestamp wrapper for consistent handling throughout Tollgate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Nanoseconds since the Unix epoch, clamped to zero before 1970.
    ///
    /// Used as a sortable prefix in storage keys.
    #[must_use]
    pub fn unix_nanos(&self) -> u64 {
        self.0
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Time elapsed since this timestamp, zero if it lies in the future.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        Utc::now()
            .signed_duration_since(self.0)
            .to_std()
            .unwrap_or_default()
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generated_is_valid() {
        let id = SessionId::new();
        assert!(SessionId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_session_id_rejects_empty() {
        assert_eq!(
            SessionId::parse(""),
            Err(IdError::Empty { kind: "session id" })
        );
    }

    #[test]
    fn test_session_id_rejects_separator() {
        let err = SessionId::parse("a/b").unwrap_err();
        assert!(matches!(err, IdError::InvalidChar { ch: '/', .. }));
    }

    #[test]
    fn test_session_id_rejects_overlong() {
        let long = "x".repeat(SessionId::MAX_LEN + 1);
        assert!(matches!(
            SessionId::parse(long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_session_id_serde_validates() {
        let ok: SessionId = serde_json::from_str("\"S1\"").unwrap();
        assert_eq!(ok.as_str(), "S1");
        assert!(serde_json::from_str::<SessionId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_request_id_from_str() {
        let id = RequestId::new();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("nope".parse::<RequestId>().is_err());
    }

    #[test]
    fn test_timestamp_nanos_are_monotonic_with_order() {
        let a = Timestamp::now();
        let b = Timestamp::from_datetime(a.0 + chrono::Duration::milliseconds(5));
        assert!(a.unix_nanos() < b.unix_nanos());
    }

    #[test]
    fn test_future_timestamp_elapsed_is_zero() {
        let future = Timestamp::from_datetime(Utc::now() + chrono::Duration::hours(1));
        assert_eq!(future.elapsed(), std::time::Duration::ZERO);
    }
}
