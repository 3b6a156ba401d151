//! # Call targets and their identity.
//!
//! [`TargetId`] wraps the caller-supplied id so maps keyed by target can never
//! be indexed with a phone number by mistake. [`CallTarget`] bundles the id
//! with the number to dial and a display name.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Unique identity of a call target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(Arc<str>);

impl TargetId {
    /// Wraps an id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One contact to call.
///
/// Immutable once a worklist is submitted.
///
/// ## Example
/// ```rust
/// use callvisor::CallTarget;
///
/// let t = CallTarget::new("1", "+15550001", "Ada");
/// assert!(t.validate().is_ok());
/// assert!(CallTarget::new("2", "555-0001", "Bob").validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTarget {
    /// Unique id of the target.
    pub id: TargetId,
    /// Number to dial, digits with an optional leading `+`.
    pub phone_number: String,
    /// Name shown in notifications.
    pub display_name: String,
}

impl CallTarget {
    /// Creates a new target.
    pub fn new(
        id: impl Into<TargetId>,
        phone_number: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            display_name: display_name.into(),
        }
    }

    /// Checks that the target can be dialled and used as a map key.
    ///
    /// ### Rules
    /// - id must be non-empty
    /// - phone number must be non-empty digits, optionally prefixed by one `+`
    pub fn validate(&self) -> Result<(), DispatchError> {
        let invalid = |reason: &str| DispatchError::InvalidTarget {
            id: self.id.to_string(),
            reason: reason.to_string(),
        };

        if self.id.as_str().trim().is_empty() {
            return Err(invalid("empty id"));
        }
        let digits = self
            .phone_number
            .strip_prefix('+')
            .unwrap_or(&self.phone_number);
        if digits.is_empty() {
            return Err(invalid("empty phone number"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("phone number must contain only digits"));
        }
        Ok(())
    }

    /// Name used in notifications, falling back to the phone number.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.phone_number
        } else {
            &self.display_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_e164_and_bare_digits() {
        assert!(CallTarget::new("1", "+15550001", "").validate().is_ok());
        assert!(CallTarget::new("2", "15550001", "").validate().is_ok());
    }

    #[test]
    fn rejects_malformed_targets() {
        assert!(CallTarget::new("", "+1555", "").validate().is_err());
        assert!(CallTarget::new("1", "", "").validate().is_err());
        assert!(CallTarget::new("1", "+", "").validate().is_err());
        assert!(CallTarget::new("1", "++1555", "").validate().is_err());
        assert!(CallTarget::new("1", "555 0001", "").validate().is_err());
    }

    #[test]
    fn label_falls_back_to_number() {
        assert_eq!(CallTarget::new("1", "+1555", "").label(), "+1555");
        assert_eq!(CallTarget::new("1", "+1555", "Ada").label(), "Ada");
    }
}
