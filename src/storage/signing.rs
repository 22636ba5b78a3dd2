//! HMAC-signed, time-limited object URLs.
//!
//! A signed URL looks like
//! `{base}/objects/{key}?expires={unix}&signature={hex}` where the signature
//! is HMAC-SHA256 over `"{key}\n{expires}"`. Anyone holding the URL can read
//! the object until `expires`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature expired")]
    Expired,

    #[error("signature mismatch")]
    Mismatch,
}

#[derive(Clone)]
pub struct UrlSigner {
    base: Url,
    secret: Arc<[u8]>,
}

impl UrlSigner {
    pub fn new(base_url: &str, secret: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
            secret: Arc::from(secret.as_bytes()),
        })
    }

    pub fn sign(&self, key: &str, ttl: Duration) -> String {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1));
        self.sign_until(key, Utc::now() + ttl)
    }

    pub fn sign_until(&self, key: &str, expires: DateTime<Utc>) -> String {
        let expires = expires.timestamp();
        let mut url = self.base.clone();
        let path = format!("{}/objects/{}", self.base.path().trim_end_matches('/'), key);
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &self.signature(key, expires));
        url.to_string()
    }

    /// Check a presented signature against `key` and `expires` at `now`.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let presented = hex::decode(signature).map_err(|_| SignatureError::Mismatch)?;
        // constant-time comparison
        self.mac(key, expires)
            .verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)?;
        if now.timestamp() >= expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC key length is valid");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("https://certs.example.com", "top-secret").unwrap()
    }

    fn query(url: &str) -> (i64, String) {
        let parsed = Url::parse(url).unwrap();
        let mut expires = 0;
        let mut signature = String::new();
        for (k, v) in parsed.query_pairs() {
            match k.as_ref() {
                "expires" => expires = v.parse().unwrap(),
                "signature" => signature = v.into_owned(),
                _ => {}
            }
        }
        (expires, signature)
    }

    #[test]
    fn signed_url_points_at_object_route() {
        let url = signer().sign("certificates/a.pdf", Duration::from_secs(60));
        assert!(url.starts_with("https://certs.example.com/objects/certificates/a.pdf?expires="));
    }

    #[test]
    fn valid_signature_verifies_until_expiry() {
        let signer = signer();
        let url = signer.sign("certificates/a.pdf", Duration::from_secs(3600));
        let (expires, signature) = query(&url);

        let now = Utc::now();
        assert!(expires - now.timestamp() <= 3600);
        assert_eq!(signer.verify("certificates/a.pdf", expires, &signature, now), Ok(()));

        let later = now + chrono::Duration::seconds(3601);
        assert_eq!(
            signer.verify("certificates/a.pdf", expires, &signature, later),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn tampering_is_detected() {
        let signer = signer();
        let url = signer.sign("certificates/a.pdf", Duration::from_secs(60));
        let (expires, signature) = query(&url);
        let now = Utc::now();

        assert_eq!(
            signer.verify("certificates/b.pdf", expires, &signature, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            signer.verify("certificates/a.pdf", expires + 100, &signature, now),
            Err(SignatureError::Mismatch)
        );
        let other = UrlSigner::new("https://certs.example.com", "other").unwrap();
        assert_eq!(
            other.verify("certificates/a.pdf", expires, &signature, now),
            Err(SignatureError::Mismatch)
        );
    }
}
