#![warn(clippy::all)]
#![warn(missing_docs)]

//! Pre-signed URL verification.
//!
//! URL issuers call [`sign`] to append an `expiration` (milliseconds since the Unix epoch) and an
//! `hmacSignature` (lowercase hex HMAC-SHA256) query parameter to a URL. At the server boundary, a
//! [`PresignedUrlService`] (usually installed via [`PresignedUrlLayer`]) re-derives the signature
//! and either forwards the request or answers `401 Unauthorized`.
//!
//! Signatures that verified once stay acceptable for a short grace window after their expiration,
//! as long as they keep being reused; see [`SignatureCache`]. `HEAD` requests are never
//! authenticated.
//!
//! ```
//! use {
//!     chrono::{Duration, Utc},
//!     http::Method,
//!     presigned_url_filter::{
//!         sign, Decision, InMemorySignatureCache, PresignedUrlAuthenticator, SignedRequestView, SigningSecret,
//!     },
//! };
//!
//! let secret = SigningSecret::from("Super secret key to sign URLs");
//! let expiration = Utc::now() + Duration::seconds(300);
//! let url = sign(&Method::GET, "http://host.org/path?foo=bar", expiration, &secret).unwrap();
//!
//! let auth = PresignedUrlAuthenticator::new(secret, InMemorySignatureCache::default());
//! let view = SignedRequestView::from_uri(Method::GET, &url);
//! assert_eq!(auth.authenticate(&view, Utc::now()), Decision::Allowed);
//! ```

mod auth;
mod cache;
mod canonical;
mod chronoutil;
mod constants;
mod crypto;
mod error;
mod secret;
mod service;
mod signature;

pub use {
    auth::{Decision, PresignedUrlAuthenticator, Rejection},
    cache::{
        InMemorySignatureCache, SignatureCache, SignatureCacheConfig, SignatureCacheConfigBuilder,
        SignatureCacheConfigBuilderError,
    },
    canonical::SignedRequestView,
    constants::{EXPIRATION, HMAC_SIGNATURE, MSG_SIGNATURE_DOES_NOT_MATCH, MSG_URL_EXPIRED},
    error::SigningError,
    secret::{SigningSecret, UrlSignerConfiguration},
    service::{PresignedUrlLayer, PresignedUrlService},
    signature::{sign, verify, Verification},
};
