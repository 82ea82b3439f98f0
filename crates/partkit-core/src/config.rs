//! Engine configuration.

use crate::PartkitError;
use crate::Result;
use std::time::Duration;

/// Default inline payload ceiling: 25 MiB.
pub const DEFAULT_INLINE_LIMIT: u64 = 25 * 1024 * 1024;

/// Configuration passed explicitly into the engine and its entry points.
///
/// There is no process-wide state: every call reads the values it needs from
/// the `EngineConfig` it was given.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = EngineConfig::default();
///
/// // Customize for specific needs
/// let custom = EngineConfig::default()
///     .with_compression_level(9)
///     .with_include_binary(true)
///     .with_upload_ttl(Duration::from_secs(300));
/// assert!(custom.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deflate level used when writing archives (1-9), or 0 to store.
    ///
    /// Default: `6`.
    pub compression_level: u8,

    /// Embed base64 payloads of binary parts in unwrapped manifests.
    ///
    /// Default: `false` (binary entries carry only their path).
    pub include_binary: bool,

    /// Payload size above which callers should switch to a session.
    ///
    /// Default: 25 MiB.
    pub inline_limit: u64,

    /// Lifetime of the single-write upload handle.
    ///
    /// Default: 15 minutes.
    pub upload_ttl: Duration,

    /// Lifetime of the download handle.
    ///
    /// Default: 60 minutes.
    pub download_ttl: Duration,

    /// Base URL under which signed handles are rendered.
    ///
    /// Default: `memory://partkit`.
    pub service_url: String,

    /// Secret used to sign session handles.
    ///
    /// `None` makes the engine draw a random secret at construction, so
    /// handles do not survive the engine instance.
    ///
    /// Default: `None`.
    pub session_secret: Option<Vec<u8>>,
}

impl Default for EngineConfig {
    /// Creates an `EngineConfig` with default settings.
    ///
    /// Default values:
    /// - `compression_level`: 6
    /// - `include_binary`: false
    /// - `inline_limit`: 25 MiB
    /// - `upload_ttl`: 15 minutes
    /// - `download_ttl`: 60 minutes
    /// - `service_url`: `memory://partkit`
    /// - `session_secret`: `None`
    fn default() -> Self {
        Self {
            compression_level: 6,
            include_binary: false,
            inline_limit: DEFAULT_INLINE_LIMIT,
            upload_ttl: Duration::from_secs(15 * 60),
            download_ttl: Duration::from_secs(60 * 60),
            service_url: "memory://partkit".to_string(),
            session_secret: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new `EngineConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deflate level (0 stores entries uncompressed).
    #[must_use]
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets whether unwrapped manifests embed binary payloads.
    #[must_use]
    pub fn with_include_binary(mut self, include: bool) -> Self {
        self.include_binary = include;
        self
    }

    /// Sets the inline payload ceiling in bytes.
    #[must_use]
    pub fn with_inline_limit(mut self, limit: u64) -> Self {
        self.inline_limit = limit;
        self
    }

    /// Sets the upload handle lifetime.
    #[must_use]
    pub fn with_upload_ttl(mut self, ttl: Duration) -> Self {
        self.upload_ttl = ttl;
        self
    }

    /// Sets the download handle lifetime.
    #[must_use]
    pub fn with_download_ttl(mut self, ttl: Duration) -> Self {
        self.download_ttl = ttl;
        self
    }

    /// Sets the base URL for rendered handles.
    #[must_use]
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    /// Sets the handle signing secret.
    #[must_use]
    pub fn with_session_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.session_secret = Some(secret.into());
        self
    }

    /// Returns `true` when a payload of `len` bytes is too large to send
    /// inline and should travel through a session instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use partkit_core::EngineConfig;
    ///
    /// let config = EngineConfig::default().with_inline_limit(1024);
    /// assert!(!config.needs_session(1024));
    /// assert!(config.needs_session(1025));
    /// ```
    #[must_use]
    pub fn needs_session(&self, len: u64) -> bool {
        len > self.inline_limit
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the compression level is above 9, a TTL is zero,
    /// the download handle would expire before the upload handle, or the
    /// signing secret is empty.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(PartkitError::InvalidConfig(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.upload_ttl.is_zero() || self.download_ttl.is_zero() {
            return Err(PartkitError::InvalidConfig(
                "session handle TTLs must be non-zero".to_string(),
            ));
        }
        if self.download_ttl < self.upload_ttl {
            return Err(PartkitError::InvalidConfig(
                "download TTL must not be shorter than upload TTL".to_string(),
            ));
        }
        if self.session_secret.as_ref().is_some_and(Vec::is_empty) {
            return Err(PartkitError::InvalidConfig(
                "session secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Controls for a single validation run.
///
/// # Examples
///
/// ```
/// use partkit_core::ValidateOptions;
///
/// let options = ValidateOptions::default().with_fail_fast(true).with_max_violations(10);
/// assert!(options.enable_auto_fix);
/// assert_eq!(options.max_violations, Some(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Apply fixers for rules that request auto-fix.
    ///
    /// Default: `true`.
    pub enable_auto_fix: bool,

    /// Stop after the first rule that produces a violation.
    ///
    /// Default: `false`.
    pub fail_fast: bool,

    /// Stop once this many violations have been collected. Must be at
    /// least 1.
    ///
    /// Default: `None` (no cap).
    pub max_violations: Option<usize>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            enable_auto_fix: true,
            fail_fast: false,
            max_violations: None,
        }
    }
}

impl ValidateOptions {
    /// Sets whether fixers run.
    #[must_use]
    pub fn with_auto_fix(mut self, enable: bool) -> Self {
        self.enable_auto_fix = enable;
        self
    }

    /// Sets fail-fast scanning.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Caps the number of collected violations.
    #[must_use]
    pub fn with_max_violations(mut self, max: usize) -> Self {
        self.max_violations = Some(max);
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a violation cap of zero, which would stop
    /// before any rule is checked and report a perfect score.
    pub fn validate(&self) -> Result<()> {
        if self.max_violations == Some(0) {
            return Err(PartkitError::InvalidConfig(
                "max violations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
