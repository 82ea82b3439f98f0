//! Signed, time-bounded object handles.
//!
//! A handle is a URL under the configured service URL:
//!
//! ```text
//! {service_url}/{key}?method=PUT&expires=1767225600&signature=9f2c...
//! ```
//!
//! The signature is HMAC-SHA256 over `method|key|expires`, hex encoded.

use crate::PartkitError;
use crate::Result;
use chrono::DateTime;
use chrono::Utc;
use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use std::fmt;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// What a handle allows its bearer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleMethod {
    /// Single write of the object.
    Put,
    /// Reads of the object.
    Get,
}

impl HandleMethod {
    /// Returns the HTTP-style verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Get => "GET",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "PUT" => Some(Self::Put),
            "GET" => Some(Self::Get),
            _ => None,
        }
    }
}

impl fmt::Display for HandleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHandle {
    /// Permitted method.
    pub method: HandleMethod,
    /// Object-store key the handle grants access to.
    pub key: String,
    /// Expiry, Unix seconds.
    pub expires: i64,
    /// Hex-encoded HMAC.
    pub signature: String,
}

impl SignedHandle {
    /// Returns the expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires, 0)
    }
}

/// Issues and verifies handles with a secret key.
#[derive(Clone)]
pub struct HandleSigner {
    secret: Vec<u8>,
    service_url: String,
}

impl fmt::Debug for HandleSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSigner")
            .field("service_url", &self.service_url)
            .finish_non_exhaustive()
    }
}

impl HandleSigner {
    /// Creates a signer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the secret is empty.
    pub fn new(secret: impl Into<Vec<u8>>, service_url: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(PartkitError::InvalidConfig(
                "session secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret,
            service_url: service_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a signer with a random 256-bit secret.
    #[must_use]
    pub fn random(service_url: impl Into<String>) -> Self {
        Self {
            secret: rand::random::<[u8; 32]>().to_vec(),
            service_url: service_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Issues a handle for `key` valid for `ttl` from now.
    pub fn issue(&self, method: HandleMethod, key: &str, ttl: Duration) -> Result<String> {
        self.issue_at(method, key, ttl, Utc::now())
    }

    /// Issues a handle valid for `ttl` from `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use partkit_core::session::HandleMethod;
    /// use partkit_core::session::HandleSigner;
    /// use std::time::Duration;
    ///
    /// let signer = HandleSigner::new(b"secret".to_vec(), "https://files.example.com").unwrap();
    /// let now = Utc::now();
    /// let url = signer
    ///     .issue_at(HandleMethod::Get, "sessions/x/output", Duration::from_secs(60), now)
    ///     .unwrap();
    /// assert!(url.starts_with("https://files.example.com/sessions/x/output?method=GET"));
    ///
    /// let handle = signer.verify_at(&url, HandleMethod::Get, now).unwrap();
    /// assert_eq!(handle.key, "sessions/x/output");
    /// ```
    pub fn issue_at(
        &self,
        method: HandleMethod,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.timestamp().saturating_add(ttl);
        let signature = hex::encode(self.mac(method, key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/{key}?method={method}&expires={expires}&signature={signature}",
            self.service_url
        ))
    }

    /// Verifies a handle for `expected` use at the current time.
    pub fn verify(&self, url: &str, expected: HandleMethod) -> Result<SignedHandle> {
        self.verify_at(url, expected, Utc::now())
    }

    /// Verifies a handle for `expected` use at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for a malformed handle, a foreign service
    /// URL, the wrong method, or a bad signature, and `SessionExpired` once
    /// the expiry has passed.
    pub fn verify_at(
        &self,
        url: &str,
        expected: HandleMethod,
        now: DateTime<Utc>,
    ) -> Result<SignedHandle> {
        let not_found = || PartkitError::SessionNotFound {
            reference: url.to_string(),
        };

        let handle = self.parse(url).ok_or_else(not_found)?;
        if handle.method != expected {
            return Err(not_found());
        }
        let signature = hex::decode(&handle.signature).map_err(|_| not_found())?;
        self.mac(handle.method, &handle.key, handle.expires)?
            .verify_slice(&signature)
            .map_err(|_| not_found())?;

        if now.timestamp() > handle.expires {
            return Err(PartkitError::SessionExpired {
                reason: format!("{} handle for {} has expired", handle.method, handle.key),
            });
        }
        Ok(handle)
    }

    fn parse(&self, url: &str) -> Option<SignedHandle> {
        let rest = url.strip_prefix(&self.service_url)?.strip_prefix('/')?;
        let (key, query) = rest.split_once('?')?;
        if key.is_empty() {
            return None;
        }

        let mut method = None;
        let mut expires = None;
        let mut signature = None;
        for pair in query.split('&') {
            match pair.split_once('=')? {
                ("method", value) => method = HandleMethod::parse(value),
                ("expires", value) => expires = value.parse().ok(),
                ("signature", value) => signature = Some(value.to_string()),
                _ => return None,
            }
        }

        Some(SignedHandle {
            method: method?,
            key: key.to_string(),
            expires: expires?,
            signature: signature?,
        })
    }

    fn mac(&self, method: HandleMethod, key: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| PartkitError::InvalidConfig(format!("invalid session secret: {e}")))?;
        mac.update(format!("{method}|{key}|{expires}").as_bytes());
        Ok(mac)
    }
}
