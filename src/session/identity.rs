use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User identity carried in the access token's claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Read the payload of a JWT access token without verifying its signature.
///
/// The server is the only party that can check the signature; the client
/// only needs the claims for display and for user-scoped paths. Returns
/// `None` for opaque (non-JWT) tokens or tokens carrying neither `userId`
/// nor `username`.
pub fn decode_identity(token: &str) -> Option<Identity> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()?
        .claims;

    let user_id = claims.get("userId").and_then(claim_to_string);
    let username = claims.get("username").and_then(claim_to_string);
    if user_id.is_none() && username.is_none() {
        return None;
    }

    let expires_at = claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| Utc.timestamp_opt(exp, 0).single());

    Some(Identity {
        user_id,
        username,
        expires_at,
    })
}

// Numeric ids are common on the server side; normalise them to strings.
fn claim_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn mint(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap()
    }

    #[test]
    fn decodes_claims_without_knowing_the_secret() {
        let token = mint(json!({ "userId": "42", "username": "admin", "exp": 1_700_000_000 }));
        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.user_id.as_deref(), Some("42"));
        assert_eq!(identity.username.as_deref(), Some("admin"));
        assert_eq!(identity.expires_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn expired_tokens_still_decode() {
        let token = mint(json!({ "userId": 7, "exp": 1 }));
        let identity = decode_identity(&token).unwrap();
        assert_eq!(identity.user_id.as_deref(), Some("7"));
        assert_eq!(identity.username, None);
    }

    #[test]
    fn opaque_tokens_have_no_identity() {
        assert_eq!(decode_identity("A1"), None);
        assert_eq!(decode_identity("not.a.jwt"), None);
    }

    #[test]
    fn tokens_without_user_claims_have_no_identity() {
        let token = mint(json!({ "sub": "service", "exp": 1_700_000_000 }));
        assert_eq!(decode_identity(&token), None);
    }
}
