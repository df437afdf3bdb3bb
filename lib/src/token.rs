//! Short-lived signed bearer tokens for the `Grip-Sig` header.
//!
//! A token claims an issuer and an expiry one hour out, signed HS256 with
//! the route's (or the default) key. Validation only cares that the claim
//! set decodes under the expected key and that `exp` has not passed yet.

use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, get_current_timestamp, Algorithm, DecodingKey,
    EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("could not sign claims: {0}")]
    Sign(#[from] JwtError),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    exp: u64,
}

/// Mints a signed token claiming `iss` and expiring in one hour.
pub fn make_token(iss: &str, key: &[u8]) -> Result<String, TokenError> {
    let claims = Claims {
        iss: iss.to_string(),
        exp: get_current_timestamp() + TOKEN_TTL_SECS,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(key),
    )?;
    Ok(token)
}

/// True when `token` decodes under `key` into a claim map whose `exp` is a
/// positive integer strictly in the future.
pub fn validate_token(token: &[u8], key: &[u8]) -> bool {
    let token = match std::str::from_utf8(token) {
        Ok(s) => s,
        Err(_) => return false,
    };

    // the expiry comparison below is strict, which the crate's own exp
    // check is not
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = match decode::<Claims>(token, &DecodingKey::from_secret(key), &validation) {
        Ok(data) => data,
        Err(_) => return false,
    };

    data.claims.exp > 0 && data.claims.exp > get_current_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"changeme";

    fn token_with_exp(exp: u64) -> String {
        let claims = Claims {
            iss: "pushgate".to_string(),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(KEY),
        )
        .expect("encode")
    }

    #[test]
    fn round_trip() {
        let token = make_token("pushgate", KEY).expect("make_token");
        assert!(validate_token(token.as_bytes(), KEY));
    }

    #[test]
    fn wrong_key_rejected() {
        let token = make_token("pushgate", KEY).expect("make_token");
        assert!(!validate_token(token.as_bytes(), b"other"));
    }

    #[test]
    fn expired_rejected() {
        let token = token_with_exp(get_current_timestamp() - 10);
        assert!(!validate_token(token.as_bytes(), KEY));
    }

    #[test]
    fn current_second_rejected() {
        // exp must be strictly greater than now
        let token = token_with_exp(get_current_timestamp());
        assert!(!validate_token(token.as_bytes(), KEY));
    }

    #[test]
    fn garbage_rejected() {
        assert!(!validate_token(b"not-a-token", KEY));
        assert!(!validate_token(&[0xff, 0xfe], KEY));
    }
}
