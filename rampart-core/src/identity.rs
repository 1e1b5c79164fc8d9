//! Identity types for locally created records

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Prefix carried by every provisional identifier.
pub const PROVISIONAL_PREFIX: &str = "temp_";

/// Placeholder identifier for a record the server has not confirmed yet.
///
/// The token is random (UUIDv4) and carries no creation time; records keep
/// their timestamps in explicit fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProvisionalId(String);

impl ProvisionalId {
    /// Generate a fresh provisional identifier.
    pub fn generate() -> Self {
        Self(format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4().simple()))
    }

    /// Wrap an existing token, if it carries the provisional prefix.
    pub fn parse(value: &str) -> Option<Self> {
        is_provisional_id(value).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProvisionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProvisionalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_provisional_id(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidValue {
                field: "id".to_string(),
                value,
                reason: format!("provisional ids start with '{}'", PROVISIONAL_PREFIX),
            })
        }
    }
}

impl From<ProvisionalId> for String {
    fn from(id: ProvisionalId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProvisionalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate a fresh provisional identifier string.
pub fn generate_provisional_id() -> String {
    ProvisionalId::generate().into_string()
}

/// True iff `value` starts with the provisional prefix.
pub fn is_provisional_id(value: &str) -> bool {
    value.starts_with(PROVISIONAL_PREFIX)
}

/// Dynamically typed variant of [`is_provisional_id`].
///
/// Numbers, null, arrays and objects are never provisional.
pub fn is_provisional_value(value: &serde_json::Value) -> bool {
    value.as_str().is_some_and(is_provisional_id)
}

/// Identifier of a record that is either local-only or server-confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordId {
    Provisional(ProvisionalId),
    Confirmed(String),
}

impl RecordId {
    /// Classify a raw identifier by its prefix.
    pub fn from_raw(value: impl Into<String>) -> Self {
        let value = value.into();
        if is_provisional_id(&value) {
            Self::Provisional(ProvisionalId(value))
        } else {
            Self::Confirmed(value)
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisional(id) => id.as_str(),
            Self::Confirmed(id) => id,
        }
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::from_raw(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Provisional(id) => id.into_string(),
            RecordId::Confirmed(id) => id,
        }
    }
}

impl From<ProvisionalId> for RecordId {
    fn from(id: ProvisionalId) -> Self {
        Self::Provisional(id)
    }
}
