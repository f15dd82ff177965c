use std::{
    env::{self, VarError},
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};

/// The shared secret used to sign and verify pre-signed URLs.
///
/// The key material is treated as opaque bytes and is never written by the `Debug` or `Display`
/// implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret {
    key: Arc<[u8]>,
}

impl SigningSecret {
    /// Create a new `SigningSecret` from raw key material.
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    /// Read the secret from the environment variable `name`.
    pub fn from_env(name: &str) -> Result<Self, VarError> {
        env::var(name).map(Self::new)
    }
}

impl AsRef<[u8]> for SigningSecret {
    fn as_ref(&self) -> &[u8] {
        &self.key
    }
}

impl From<&str> for SigningSecret {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SigningSecret {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl Debug for SigningSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("SigningSecret")
    }
}

impl Display for SigningSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("SigningSecret")
    }
}

/// Source of the URL signing secret.
///
/// The secret is provisioned by the hosting application; this crate only asks for it when an
/// authenticator is constructed. Implement this on whatever configuration object already holds it.
pub trait UrlSignerConfiguration {
    /// Retrieve the secret used to sign and verify pre-signed URLs.
    fn url_signer_secret_key(&self) -> SigningSecret;
}

impl UrlSignerConfiguration for SigningSecret {
    fn url_signer_secret_key(&self) -> SigningSecret {
        self.clone()
    }
}
