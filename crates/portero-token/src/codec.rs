//! HS256 claims codec.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;

use crate::claims::ClaimSet;
use crate::error::TokenError;

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Signs and verifies [`ClaimSet`]s with a shared HMAC-SHA256 secret.
pub struct ClaimsCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    strict: Validation,
    lenient: Validation,
}

impl ClaimsCodec {
    /// Create a codec from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `SecretTooWeak` if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooWeak(secret.len()));
        }

        let mut strict = Validation::new(Algorithm::HS256);
        strict.leeway = 0;
        strict.set_required_spec_claims(&["exp", "sub"]);

        let mut lenient = strict.clone();
        lenient.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            strict,
            lenient,
        })
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Sign a claim set into a compact JWS.
    ///
    /// # Errors
    ///
    /// Returns `Encoding` if serialization fails.
    pub fn sign(&self, claims: &ClaimSet) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, structure and expiry, returning the claims.
    ///
    /// Expiry is strict: a token is rejected once `now > exp`.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `InvalidSignature` or `Expired`.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, TokenError> {
        decode::<ClaimSet>(token, &self.decoding_key, &self.strict)
            .map(|data| data.claims)
            .map_err(classify)
    }

    /// Verify signature and structure but accept an expired token.
    ///
    /// Only the refresh flow uses this.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` or `InvalidSignature`.
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<ClaimSet, TokenError> {
        decode::<ClaimSet>(token, &self.decoding_key, &self.lenient)
            .map(|data| data.claims)
            .map_err(classify)
    }
}

impl std::fmt::Debug for ClaimsCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed(err.to_string()),
    }
}

/// Sign `claims` with `secret`.
///
/// # Errors
///
/// Returns `SecretTooWeak` for short secrets or `Encoding` on failure.
pub fn sign(claims: &ClaimSet, secret: &[u8]) -> Result<String, TokenError> {
    ClaimsCodec::new(secret)?.sign(claims)
}

/// Strictly verify `token` with `secret`.
///
/// # Errors
///
/// See [`ClaimsCodec::verify`].
pub fn verify(token: &str, secret: &[u8]) -> Result<ClaimSet, TokenError> {
    ClaimsCodec::new(secret)?.verify(token)
}
