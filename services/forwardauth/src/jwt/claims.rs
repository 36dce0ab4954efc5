use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim every identity token must carry.
pub const USERNAME_CLAIM: &str = "username";

/// Claims of an identity token: the username plus whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Provider login name, matched against the whitelist
    pub username: String,
    /// Remaining provider claims, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdentityClaims {
    /// Builds claims from a provider userinfo payload.
    ///
    /// Returns `None` unless the payload carries a string `username`.
    pub fn from_payload(mut payload: Map<String, Value>) -> Option<Self> {
        match payload.remove(USERNAME_CLAIM) {
            Some(Value::String(username)) => Some(Self {
                username,
                extra: payload,
            }),
            _ => None,
        }
    }

    /// Whitelist membership is an exact, case-sensitive match.
    pub fn is_listed(&self, whitelist: &[String]) -> bool {
        whitelist.iter().any(|allowed| allowed == &self.username)
    }
}
