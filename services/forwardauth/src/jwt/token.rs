//! Type-State Identity Token
//!
//! A cookie value starts life as `Token<Unverified>`; claims are only
//! reachable on `Token<Verified>`, which can only be produced by a successful
//! HMAC signature check.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};

use crate::error::ForwardAuthError;
use crate::jwt::claims::IdentityClaims;

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for token verification states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Parsed header, signature not checked
#[derive(Debug)]
pub struct Unverified;
impl private::Sealed for Unverified {}
impl TokenState for Unverified {
    fn state_name() -> &'static str {
        "Unverified"
    }
}

/// Signature checked, claims decoded
#[derive(Debug)]
pub struct Verified {
    claims: IdentityClaims,
}
impl private::Sealed for Verified {}
impl TokenState for Verified {
    fn state_name() -> &'static str {
        "Verified"
    }
}

/// Identity token wrapper that enforces verification at compile time
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    state: State,
}

impl Token<Unverified> {
    /// Parse a raw cookie value. Only HS256 tokens are accepted.
    pub fn parse(raw: &str) -> Result<Self, ForwardAuthError> {
        let header = decode_header(raw).map_err(|e| ForwardAuthError::InvalidCredential {
            reason: format!("invalid header: {e}"),
        })?;

        if header.alg != Algorithm::HS256 {
            return Err(ForwardAuthError::InvalidCredential {
                reason: format!("unexpected algorithm {:?}", header.alg),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            state: Unverified,
        })
    }

    /// Check the signature and decode the claims.
    pub fn verify(
        self,
        key: &DecodingKey,
        validation: &Validation,
    ) -> Result<Token<Verified>, ForwardAuthError> {
        let data = decode::<IdentityClaims>(&self.raw, key, validation).map_err(|e| {
            ForwardAuthError::InvalidCredential {
                reason: e.to_string(),
            }
        })?;

        Ok(Token {
            raw: self.raw,
            state: Verified {
                claims: data.claims,
            },
        })
    }
}

impl Token<Verified> {
    /// Access claims - only available on verified tokens
    pub fn claims(&self) -> &IdentityClaims {
        &self.state.claims
    }

    /// Verified username
    pub fn username(&self) -> &str {
        &self.state.claims.username
    }

}

impl<S: TokenState> Token<S> {
    /// Get the current state name
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"token-state-test-secret";

    fn signed(claims: &serde_json::Value, alg: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }

    #[test]
    fn test_state_transitions() {
        let raw = signed(&json!({"username": "alice"}), Algorithm::HS256, SECRET);
        let token = Token::parse(&raw).unwrap();
        assert_eq!(token.state_name(), "Unverified");

        let verified = token
            .verify(&DecodingKey::from_secret(SECRET), &validation())
            .unwrap();
        assert_eq!(verified.state_name(), "Verified");
        assert_eq!(verified.username(), "alice");
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let raw = signed(&json!({"username": "alice"}), Algorithm::HS512, SECRET);
        assert!(matches!(
            Token::parse(&raw),
            Err(ForwardAuthError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Token::parse("not-a-token").is_err());
        assert!(Token::parse("").is_err());
    }

    #[test]
    fn test_wrong_secret_fails_verification() {
        let raw = signed(&json!({"username": "alice"}), Algorithm::HS256, b"other-secret");
        let token = Token::parse(&raw).unwrap();
        assert!(matches!(
            token.verify(&DecodingKey::from_secret(SECRET), &validation()),
            Err(ForwardAuthError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_missing_username_fails_verification() {
        let raw = signed(&json!({"login": "alice"}), Algorithm::HS256, SECRET);
        let token = Token::parse(&raw).unwrap();
        assert!(
            token
                .verify(&DecodingKey::from_secret(SECRET), &validation())
                .is_err()
        );
    }
}
