//! Signed bearer tokens: `account:expiry:signature` where the signature is
//! HMAC-SHA256 over `account:expiry` with the gateway secret. Stateless like
//! the rest of the auth surface; expiry is a unix timestamp 7 days out.

use axum::{http::HeaderMap, http::StatusCode, Json};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Issue a token for `account`, valid for seven days.
pub fn issue(secret: &str, account: &str) -> String {
    let expiry = chrono::Utc::now().timestamp() + TOKEN_TTL_SECS;
    let payload = format!("{account}:{expiry}");
    format!("{payload}:{}", sign(secret, &payload))
}

/// Verify a token and return the account it was issued for.
///
/// Accounts never contain `:`, so the signature and expiry are split off the
/// right and whatever remains is the account.
pub fn verify(secret: &str, token: &str) -> Option<String> {
    let (payload, sig_hex) = token.rsplit_once(':')?;
    let (account, expiry) = payload.rsplit_once(':')?;
    let expiry: i64 = expiry.parse().ok()?;

    let sig = hex::decode(sig_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&sig).ok()?;

    if expiry < chrono::Utc::now().timestamp() {
        return None;
    }
    Some(account.to_string())
}

fn sign(secret: &str, payload: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC keys can be any length.
        Err(_) => unreachable!("hmac accepts any key length"),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Pull the account out of an `Authorization: Bearer <token>` header.
pub fn bearer_account(
    headers: &HeaderMap,
    secret: &str,
) -> Result<String, (StatusCode, Json<Value>)> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("no authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("authorization header must use Bearer scheme"))?;

    verify(secret, token).ok_or_else(|| unauthorized("invalid or expired token"))
}

fn unauthorized(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": msg})))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-key";

    #[test]
    fn round_trip() {
        let token = issue(SECRET, "+15551234567");
        assert_eq!(verify(SECRET, &token).as_deref(), Some("+15551234567"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(SECRET, "+15551234567");
        assert_eq!(verify("other-secret", &token), None);
    }

    #[test]
    fn tampered_account_is_rejected() {
        let token = issue(SECRET, "+15551234567");
        let forged = token.replacen("+15551234567", "+15550000000", 1);
        assert_eq!(verify(SECRET, &forged), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let expiry = chrono::Utc::now().timestamp() - 10;
        let payload = format!("+15551234567:{expiry}");
        let token = format!("{payload}:{}", sign(SECRET, &payload));
        assert_eq!(verify(SECRET, &token), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(verify(SECRET, "not-a-token"), None);
        assert_eq!(verify(SECRET, ""), None);
        assert_eq!(verify(SECRET, "a:b:c"), None);
    }

    #[test]
    fn bearer_extraction() {
        let token = issue(SECRET, "+15551234567");
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        assert_eq!(
            bearer_account(&headers, SECRET).unwrap(),
            "+15551234567"
        );

        let empty = HeaderMap::new();
        assert!(bearer_account(&empty, SECRET).is_err());
    }
}
