//! Request and response bodies for the rewards API endpoints.
//!
//! Payloads derive `Serialize` and are sent as JSON objects. Responses are
//! decoded into a generic [`JsonObject`] first, then narrowed into the typed
//! structs below so that a missing field surfaces as
//! [`GatewayError::UnexpectedResponse`](super::GatewayError::UnexpectedResponse).

use serde::{Deserialize, Serialize};

/// Decoded response body.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Body for `nodes/link`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkNodeRequest<'a> {
    pub unique_id: &'a str,
    pub node_type: &'a str,
    pub name: &'a str,
}

impl<'a> LinkNodeRequest<'a> {
    /// Nodes are registered as browser extensions.
    pub fn browser_extension(unique_id: &'a str) -> Self {
        Self {
            unique_id,
            node_type: "browser",
            name: "Extension",
        }
    }
}

/// Body for `rewards/start`, `rewards/claim` and `rewards/estimate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRequest<'a> {
    pub unique_id: &'a str,
}

/// Body for `auth/refresh-token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response of `rewards/estimate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RewardEstimate {
    pub value: f64,
}
