use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Seconds a signed key stays valid after its timestamp
pub const VALIDITY_WINDOW_SECS: i64 = 20;

/// Seconds a key's timestamp may run ahead of the local clock
pub const MAX_CLOCK_SKEW_SECS: i64 = 0;

/// Credentials presented alongside a transform request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub key: String,
    pub user_id: String,
    /// Unix seconds
    pub timestamp: i64,
    pub server_nonce: String,
}

/// Yes/no gate run before a transform. The signing scheme is up to the
/// integrator; the transform never inspects tokens itself.
pub trait AccessGate {
    fn allows(&self, token: &AccessToken) -> bool;
}

impl<F> AccessGate for F
where
    F: Fn(&AccessToken) -> bool,
{
    fn allows(&self, token: &AccessToken) -> bool {
        self(token)
    }
}

/// HMAC-SHA256 keyed by the hex digest of `"{timestamp}:{nonce}"`, signing
/// `"{user}:{timestamp}:{nonce}"`.
#[derive(Debug, Clone)]
pub struct HmacNonceGate {
    validity_secs: i64,
}

impl Default for HmacNonceGate {
    fn default() -> Self {
        Self {
            validity_secs: VALIDITY_WINDOW_SECS,
        }
    }
}

impl HmacNonceGate {
    pub fn new(validity_secs: i64) -> Self {
        Self { validity_secs }
    }

    fn mac_key(timestamp: i64, nonce: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{timestamp}:{nonce}").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Expected key for the given identity
    pub fn sign(&self, user_id: &str, timestamp: i64, nonce: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(Self::mac_key(timestamp, nonce).as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(format!("{user_id}:{timestamp}:{nonce}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check `token` as of `now` (Unix seconds)
    pub fn allows_at(&self, token: &AccessToken, now: i64) -> bool {
        let age = now - token.timestamp;
        if age < -MAX_CLOCK_SKEW_SECS {
            tracing::debug!(age, "Access key timestamp is in the future");
            return false;
        }
        if age > self.validity_secs {
            tracing::debug!(age, "Access key expired");
            return false;
        }

        let expected = self.sign(&token.user_id, token.timestamp, &token.server_nonce);
        if expected != token.key {
            tracing::debug!(user_id = %token.user_id, "Access key mismatch");
            return false;
        }
        true
    }
}

impl AccessGate for HmacNonceGate {
    fn allows(&self, token: &AccessToken) -> bool {
        self.allows_at(token, chrono::Utc::now().timestamp())
    }
}
