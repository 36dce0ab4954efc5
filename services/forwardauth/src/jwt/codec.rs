//! Signing and verification of identity tokens with the shared secret.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, encode};

use crate::error::ForwardAuthError;
use crate::jwt::claims::IdentityClaims;
use crate::jwt::token::{Token, Unverified, Verified};

/// HS256 signer and verifier for identity tokens.
///
/// No expiry is required or checked: a token stays valid for as long as the
/// secret is unchanged.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec for the given shared secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Signs claims into a compact token.
    pub fn sign(&self, claims: &IdentityClaims) -> Result<String, ForwardAuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(ForwardAuthError::TokenSigning)
    }

    /// Verifies a cookie value. A missing value is an invalid credential.
    pub fn verify(&self, raw: Option<&str>) -> Result<Token<Verified>, ForwardAuthError> {
        let raw = raw
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ForwardAuthError::InvalidCredential {
                reason: "no credential cookie".to_string(),
            })?;
        Token::<Unverified>::parse(raw)?.verify(&self.decoding, &self.validation)
    }
}
