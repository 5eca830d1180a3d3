use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
};

use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

/// Identifier of a monitored API.
///
/// Change sets reference their API by this identifier only. Surrounding
/// whitespace is trimmed, and the remainder must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiId(NonEmptyString);

impl ApiId {
    /// Creates a new `ApiId` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ApiIdError`] if the string is empty or only whitespace.
    pub fn new(s: impl Into<String>) -> Result<Self, ApiIdError> {
        let s = s.into();
        let trimmed = s.trim();
        let value = if trimmed.len() == s.len() {
            s
        } else {
            trimmed.to_string()
        };
        NonEmptyString::new(value).map(Self).map_err(|_| ApiIdError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for ApiId {
    type Error = ApiIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ApiId {
    type Error = ApiIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiId> for String {
    fn from(id: ApiId) -> Self {
        id.0.as_str().to_owned()
    }
}

impl Hash for ApiId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl AsRef<str> for ApiId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for ApiId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiId {
    type Err = ApiIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error returned when an API identifier is empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("API identifier must not be empty")]
pub struct ApiIdError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let id = ApiId::new("  petstore ").unwrap();
        assert_eq!(id.as_str(), "petstore");
    }

    #[test]
    fn rejects_blank() {
        assert_eq!(ApiId::new("   ").unwrap_err(), ApiIdError);
        assert_eq!(ApiId::try_from("").unwrap_err(), ApiIdError);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: ApiId = "weather".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"weather\"");

        let back: ApiId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ApiId>("\"\"").is_err());
    }
}
