//! Common constants used throughout the crate.
//!
//! Tests that are testing the content of an error code or message should not use these constants;
//! they should use hard-coded strings so the tests are also testing for misspellings.
//!
//! Please keep this file organized alphabetically.

/// Content-Type of rejection bodies.
pub(crate) const CONTENT_TYPE_TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Default scheme used to rebuild the request origin when the request target is not absolute.
pub(crate) const DEFAULT_SCHEME: &str = "http";

/// Default number of signatures retained by the in-memory cache.
pub(crate) const DEFAULT_CACHE_MAX_CAPACITY: u64 = 100_000;

/// Default grace window, in seconds, for signatures presented after their expiration.
pub(crate) const DEFAULT_GRACE_PERIOD_SECS: u64 = 60;

/// Longest grace window accepted by the signature cache, in seconds (one week).
pub(crate) const MAX_GRACE_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Error code: PreSignedUrlExpired
pub(crate) const ERR_CODE_PRESIGNED_URL_EXPIRED: &str = "PreSignedUrlExpired";

/// Error code: SignatureDoesNotMatch
pub(crate) const ERR_CODE_SIGNATURE_DOES_NOT_MATCH: &str = "SignatureDoesNotMatch";

/// Query parameter carrying the expiration, in milliseconds since the Unix epoch.
pub const EXPIRATION: &str = "expiration";

/// Query parameter carrying the hex-encoded HMAC-SHA256 signature.
pub const HMAC_SIGNATURE: &str = "hmacSignature";

/// Error message: `"Signature of the pre-signed URL does not match"`
pub const MSG_SIGNATURE_DOES_NOT_MATCH: &str = "Signature of the pre-signed URL does not match";

/// Error message: `"Pre-signed URL has expired"`
pub const MSG_URL_EXPIRED: &str = "Pre-signed URL has expired";

/// Length of a SHA-256 digest in bytes.
pub(crate) const SHA256_OUTPUT_LEN: usize = 32;

/// Length of a hex-encoded SHA-256 digest.
pub(crate) const SHA256_HEX_LENGTH: usize = SHA256_OUTPUT_LEN * 2;
