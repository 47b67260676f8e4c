//! Delivery outcome.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a relay refused one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Reply code sent by the relay.
    pub code: u16,
    /// Reply text sent by the relay.
    pub reason: String,
}

impl Rejection {
    /// Creates a rejection.
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl<S: Into<String>> From<(u16, S)> for Rejection {
    fn from((code, reason): (u16, S)) -> Self {
        Self::new(code, reason)
    }
}

/// Refused recipients keyed by the address handed to the transport.
pub type Rejections = BTreeMap<String, Rejection>;

/// Result of delivering one envelope.
///
/// Built from the rejection map the transport returns and never changed
/// afterwards. A response with no rejections is [`ok`](Self::ok).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    rejected: Rejections,
}

impl Response {
    /// Creates a response from the transport's rejection map.
    #[must_use]
    pub const fn new(rejected: Rejections) -> Self {
        Self { rejected }
    }

    /// Returns true if no recipient was rejected.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Returns every rejected recipient.
    #[must_use]
    pub const fn rejected(&self) -> &Rejections {
        &self.rejected
    }

    /// Returns the rejection for one recipient.
    #[must_use]
    pub fn rejection(&self, address: &str) -> Option<&Rejection> {
        self.rejected.get(address)
    }

    /// Returns true if the recipient was rejected.
    #[must_use]
    pub fn is_rejected(&self, address: &str) -> bool {
        self.rejected.contains_key(address)
    }

    /// Consumes the response, returning the rejection map.
    #[must_use]
    pub fn into_rejected(self) -> Rejections {
        self.rejected
    }
}

impl From<Rejections> for Response {
    fn from(rejected: Rejections) -> Self {
        Self::new(rejected)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_is_ok() {
        let response = Response::default();
        assert!(response.ok());
        assert!(response.rejected().is_empty());
        assert!(!response.is_rejected("him@mail.com"));
    }

    #[test]
    fn test_rejections_are_kept_verbatim() {
        let rejected = Rejections::from([("addr".to_string(), Rejection::from((255, "reason")))]);
        let response = Response::from(rejected.clone());

        assert!(!response.ok());
        assert_eq!(response.rejected(), &rejected);
        assert_eq!(response.rejection("addr"), Some(&Rejection::new(255, "reason")));
        assert!(response.is_rejected("addr"));
        assert_eq!(response.into_rejected(), rejected);
    }

    #[test]
    fn test_serializes_for_reports() {
        let response = Response::new(Rejections::from([(
            "bad@example.com".to_string(),
            Rejection::new(550, "No such user"),
        )]));
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"rejected":{"bad@example.com":{"code":550,"reason":"No such user"}}}"#
        );
    }
}
