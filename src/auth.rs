//! Per-request allow/deny decisions for pre-signed URLs.

use {
    crate::{
        constants::{
            CONTENT_TYPE_TEXT_PLAIN, ERR_CODE_PRESIGNED_URL_EXPIRED, ERR_CODE_SIGNATURE_DOES_NOT_MATCH,
            MSG_SIGNATURE_DOES_NOT_MATCH, MSG_URL_EXPIRED,
        },
        signature::verify,
        SignatureCache, SignedRequestView, SigningSecret, UrlSignerConfiguration,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    http::{
        header::{HeaderValue, CONTENT_TYPE},
        Method, Response, StatusCode,
    },
    log::debug,
    scratchstack_errors::ServiceError,
    std::{
        any::type_name,
        error::Error,
        fmt::{Debug, Display, Formatter, Result as FmtResult},
    },
};

/// Why a request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The presented signature does not match the request, or the signature or expiration parameter
    /// is missing or malformed.
    Mismatch,

    /// The signature matches but the URL has expired and the signature was not recently accepted.
    Expired,
}

impl Rejection {
    /// The fixed plain-text message returned to the client.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Mismatch => MSG_SIGNATURE_DOES_NOT_MATCH,
            Self::Expired => MSG_URL_EXPIRED,
        }
    }

    /// Build the `401 Unauthorized` plain-text response for this rejection.
    pub fn to_response<B: From<Bytes>>(&self) -> Response<B> {
        let mut response = Response::new(B::from(Bytes::from_static(self.message().as_bytes())));
        *response.status_mut() = self.http_status();
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TEXT_PLAIN));
        response
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Mismatch => ERR_CODE_SIGNATURE_DOES_NOT_MATCH,
            Self::Expired => ERR_CODE_PRESIGNED_URL_EXPIRED,
        }
    }

    fn http_status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl ServiceError for Rejection {
    fn error_code(&self) -> &'static str {
        Rejection::error_code(self)
    }

    fn http_status(&self) -> StatusCode {
        Rejection::http_status(self)
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.message())
    }
}

impl Error for Rejection {}

/// The outcome of authenticating one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Forward the request to the next handler.
    Allowed,

    /// Refuse the request without forwarding it.
    Rejected(Rejection),
}

impl Decision {
    /// Whether the request should be forwarded.
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decides whether requests carrying pre-signed URLs may proceed.
///
/// `HEAD` requests are always allowed. Other requests must carry a matching signature. A matching
/// signature whose expiration has passed is still allowed if the `cache` accepted that exact
/// signature within its grace window; every request allowed before its expiration puts its
/// signature into the cache.
///
/// The authenticator itself holds no mutable state apart from the cache, so clones may be used
/// concurrently. Use a cheaply-cloned cache (such as [`InMemorySignatureCache`][crate::InMemorySignatureCache]
/// or an `Arc`) so clones share entries.
#[derive(Clone)]
pub struct PresignedUrlAuthenticator<C> {
    secret: SigningSecret,
    cache: C,
}

impl<C> PresignedUrlAuthenticator<C>
where
    C: SignatureCache,
{
    /// Create a new authenticator from a signing secret and a signature cache.
    pub fn new(secret: SigningSecret, cache: C) -> Self {
        Self {
            secret,
            cache,
        }
    }

    /// Create a new authenticator, obtaining the secret from the host's configuration.
    pub fn from_configuration<T: UrlSignerConfiguration + ?Sized>(config: &T, cache: C) -> Self {
        Self::new(config.url_signer_secret_key(), cache)
    }

    /// The signature cache consulted for expired URLs.
    #[inline]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Decide whether the request described by `view` may proceed at server time `now`.
    ///
    /// This has one side effect: a request allowed before its expiration puts its signature into
    /// the cache, and an expired request allowed by the cache refreshes its entry.
    pub fn authenticate(&self, view: &SignedRequestView, now: DateTime<Utc>) -> Decision {
        // HEAD carries no body and is exempt from authentication.
        if view.method() == Method::HEAD {
            debug!("authenticate: bypassing signature check for HEAD {}", view.origin());
            return Decision::Allowed;
        }

        let verification = verify(view, &self.secret);
        let (true, Some(expiration), Some(signature)) =
            (verification.matches(), verification.expiration(), verification.presented_signature())
        else {
            debug!("authenticate: rejecting {} {}: signature does not match", view.method(), view.origin());
            return Decision::Rejected(Rejection::Mismatch);
        };

        if expiration > now {
            self.cache.put_signature(signature, now);
            debug!("authenticate: allowing {} {} expiring at {}", view.method(), view.origin(), expiration);
            return Decision::Allowed;
        }

        if self.cache.contains_with_refresh(signature, now) {
            debug!(
                "authenticate: allowing {} {} expired at {} within cache grace window",
                view.method(),
                view.origin(),
                expiration
            );
            Decision::Allowed
        } else {
            debug!("authenticate: rejecting {} {}: expired at {}", view.method(), view.origin(), expiration);
            Decision::Rejected(Rejection::Expired)
        }
    }
}

impl<C> Debug for PresignedUrlAuthenticator<C> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("PresignedUrlAuthenticator")
            .field("secret", &self.secret)
            .field("cache", &type_name::<C>())
            .finish()
    }
}
