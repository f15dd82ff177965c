use {
    crate::{constants::DEFAULT_SCHEME, Decision, PresignedUrlAuthenticator, SignatureCache, SignedRequestView},
    bytes::Bytes,
    chrono::Utc,
    http::{Request, Response},
    std::{
        any::type_name,
        fmt::{Debug, Formatter, Result as FmtResult},
        future::{ready, Future},
        pin::Pin,
        task::{Context, Poll},
    },
    tower::{Layer, Service},
};

/// A [`Service`] that authenticates pre-signed URLs before handing requests to `inner`.
///
/// Allowed requests are forwarded unchanged. Rejected requests receive a `401 Unauthorized`
/// response with a fixed `text/plain` message and never reach `inner`.
#[derive(Clone)]
pub struct PresignedUrlService<S, C> {
    authenticator: PresignedUrlAuthenticator<C>,
    default_scheme: String,
    inner: S,
}

impl<S, C> PresignedUrlService<S, C>
where
    C: SignatureCache,
{
    /// Wrap `inner` with pre-signed URL authentication.
    pub fn new(authenticator: PresignedUrlAuthenticator<C>, inner: S) -> Self {
        Self {
            authenticator,
            default_scheme: DEFAULT_SCHEME.to_string(),
            inner,
        }
    }

    /// Use `scheme` to rebuild the origin of requests whose target is not an absolute URL. This
    /// should match the scheme of the URLs being signed, e.g. `https` behind a TLS terminator.
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// The authenticator used by this service.
    #[inline]
    pub fn authenticator(&self) -> &PresignedUrlAuthenticator<C> {
        &self.authenticator
    }

    /// The wrapped service.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, C> Debug for PresignedUrlService<S, C> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("PresignedUrlService")
            .field("authenticator", &self.authenticator)
            .field("default_scheme", &self.default_scheme)
            .field("inner", &type_name::<S>())
            .finish()
    }
}

impl<S, C, ReqBody, ResBody> Service<Request<ReqBody>> for PresignedUrlService<S, C>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    C: SignatureCache,
    ResBody: From<Bytes> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, S::Error>> + Send>>;

    fn poll_ready(&mut self, c: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(c)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let view = SignedRequestView::from_request(&req, &self.default_scheme);

        match self.authenticator.authenticate(&view, Utc::now()) {
            Decision::Allowed => Box::pin(self.inner.call(req)),
            Decision::Rejected(rejection) => Box::pin(ready(Ok(rejection.to_response()))),
        }
    }
}

/// A [`Layer`] that wraps services in a [`PresignedUrlService`].
///
/// Every service produced by the layer shares the authenticator's signature cache.
#[derive(Clone)]
pub struct PresignedUrlLayer<C> {
    authenticator: PresignedUrlAuthenticator<C>,
    default_scheme: String,
}

impl<C> PresignedUrlLayer<C>
where
    C: SignatureCache,
{
    /// Create a new layer from an authenticator.
    pub fn new(authenticator: PresignedUrlAuthenticator<C>) -> Self {
        Self {
            authenticator,
            default_scheme: DEFAULT_SCHEME.to_string(),
        }
    }

    /// See [`PresignedUrlService::with_default_scheme`].
    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }
}

impl<C> Debug for PresignedUrlLayer<C> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("PresignedUrlLayer")
            .field("authenticator", &self.authenticator)
            .field("default_scheme", &self.default_scheme)
            .finish()
    }
}

impl<S, C> Layer<S> for PresignedUrlLayer<C>
where
    C: SignatureCache + Clone,
{
    type Service = PresignedUrlService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        PresignedUrlService::new(self.authenticator.clone(), inner).with_default_scheme(self.default_scheme.clone())
    }
}
