use {
    http::uri::InvalidUri,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// Error returned when a URL cannot be pre-signed.
///
/// These describe mistakes made by the URL issuer. Requests presented to the verifier never produce a
/// `SigningError`; see [`Rejection`][crate::Rejection] for those outcomes.
#[derive(Debug)]
#[non_exhaustive]
pub enum SigningError {
    /// The URL already has a fragment; fragments are never sent to the server and cannot be signed.
    FragmentNotAllowed(/* url */ String),

    /// The URL could not be parsed.
    InvalidUrl(InvalidUri),

    /// The URL is missing a scheme or an authority.
    RelativeUrl(/* url */ String),

    /// The URL already carries a query parameter reserved for the signature or the expiration.
    ReservedParameter(/* parameter name */ &'static str),

    /// The URL has userinfo (`user@host`), which clients never send to the server.
    UserInfoNotAllowed(/* url */ String),
}

impl Display for SigningError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::FragmentNotAllowed(url) => write!(f, "URL fragments cannot be signed: {}", url),
            Self::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            Self::RelativeUrl(url) => write!(f, "URL must include a scheme and host: {}", url),
            Self::ReservedParameter(name) => write!(f, "URL already contains the reserved query parameter '{}'", name),
            Self::UserInfoNotAllowed(url) => write!(f, "URL userinfo cannot be signed: {}", url),
        }
    }
}

impl Error for SigningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidUrl(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidUri> for SigningError {
    fn from(e: InvalidUri) -> SigningError {
        SigningError::InvalidUrl(e)
    }
}
