use {
    crate::{
        canonical::{canonical_string, split_param, split_query, uri_origin, SignedRequestView},
        chronoutil::{expiration_millis, parse_expiration},
        constants::{DEFAULT_SCHEME, EXPIRATION, HMAC_SIGNATURE, SHA256_HEX_LENGTH},
        crypto::{constant_time_eq, hmac_sha256},
        SigningError, SigningSecret,
    },
    chrono::{DateTime, Utc},
    http::{Method, Uri},
    log::{debug, trace},
};

/// Create a pre-signed URL.
///
/// The `expiration` (milliseconds since the Unix epoch) and `hmacSignature` query parameters are
/// appended, in that order, to `url`. The signature is the lowercase hex encoding of
///
/// ```text
/// HMAC-SHA256(secret, METHOD \n scheme://authority/path \n query-with-expiration \n expiration-millis)
/// ```
///
/// Existing query parameters are kept exactly as given. The resulting URL must be presented with the
/// same method and with its query string unchanged; see [`verify`].
///
/// # Errors
/// Returns a [`SigningError`] if `url` does not parse, is not absolute, has userinfo or a fragment,
/// or already contains an `expiration` or `hmacSignature` parameter.
pub fn sign(method: &Method, url: &str, expiration: DateTime<Utc>, secret: &SigningSecret) -> Result<Uri, SigningError> {
    if url.contains('#') {
        return Err(SigningError::FragmentNotAllowed(url.to_string()));
    }

    let uri: Uri = url.parse()?;
    let Some(authority) = uri.authority() else {
        return Err(SigningError::RelativeUrl(url.to_string()));
    };

    if uri.scheme().is_none() {
        return Err(SigningError::RelativeUrl(url.to_string()));
    }

    if authority.as_str().contains('@') {
        return Err(SigningError::UserInfoNotAllowed(url.to_string()));
    }

    let query = uri.query().unwrap_or("");
    if !query.is_empty() {
        for segment in query.split('&') {
            match split_param(segment).0 {
                EXPIRATION => return Err(SigningError::ReservedParameter(EXPIRATION)),
                HMAC_SIGNATURE => return Err(SigningError::ReservedParameter(HMAC_SIGNATURE)),
                _ => (),
            }
        }
    }

    let millis = expiration_millis(expiration);
    let unsigned_query = if query.is_empty() {
        format!("{}={}", EXPIRATION, millis)
    } else {
        format!("{}&{}={}", query, EXPIRATION, millis)
    };

    let origin = uri_origin(&uri, None, DEFAULT_SCHEME);
    let signature = compute_signature(method, &origin, &unsigned_query, millis, secret);
    let signed = format!("{}?{}&{}={}", origin, unsigned_query, HMAC_SIGNATURE, signature);
    debug!("Pre-signed {} {} expiring at {}", method, origin, expiration);

    let signed: Uri = signed.parse()?;
    Ok(signed)
}

/// The outcome of [`verify`]ing a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    /// Whether the presented signature equals the expected signature.
    matches: bool,

    /// The expiration presented in the request, if present and parsable.
    expiration: Option<DateTime<Utc>>,

    /// The signature presented in the request, if present.
    presented_signature: Option<String>,
}

impl Verification {
    /// Whether the presented signature equals the expected signature.
    ///
    /// When this is `true`, [`expiration`][Self::expiration] and
    /// [`presented_signature`][Self::presented_signature] are both `Some`.
    #[inline]
    pub fn matches(&self) -> bool {
        self.matches
    }

    /// The expiration presented in the request.
    #[inline]
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// The signature presented in the request.
    #[inline]
    pub fn presented_signature(&self) -> Option<&str> {
        self.presented_signature.as_deref()
    }
}

/// Verify the signature of a pre-signed request.
///
/// The expected signature is recomputed from the request method, origin, and raw query string
/// (minus the `hmacSignature` parameter) and compared byte for byte with the presented one. The
/// expiration is *not* checked against the current time here; that is the
/// [authenticator's][crate::PresignedUrlAuthenticator] job.
///
/// A missing, duplicated, or malformed `expiration` or `hmacSignature` parameter never matches.
pub fn verify(view: &SignedRequestView, secret: &SigningSecret) -> Verification {
    let qc = split_query(view.raw_query());
    let expiration_str = qc.expiration();
    let expiration = expiration_str.and_then(parse_expiration);
    let presented_signature = qc.signature();

    let mut result = Verification {
        matches: false,
        expiration,
        presented_signature: presented_signature.map(str::to_string),
    };

    let (Some(expiration), Some(presented_signature)) = (expiration, presented_signature) else {
        debug!(
            "verify: missing or unparsable parameters: expiration={:?} signature_count={}",
            qc.expirations,
            qc.signatures.len()
        );
        return result;
    };

    if !is_lower_hex_sha256(presented_signature) {
        debug!("verify: presented signature is not a hex-encoded SHA-256 value");
        return result;
    }

    let expected = compute_signature(
        view.method(),
        view.origin(),
        &qc.unsigned_query,
        expiration_millis(expiration),
        secret,
    );
    result.matches = constant_time_eq(expected.as_bytes(), presented_signature.as_bytes());

    if !result.matches {
        debug!("verify: signature mismatch for {} {}", view.method(), view.origin());
    }

    result
}

/// Compute the hex-encoded signature over the canonical string.
fn compute_signature(
    method: &Method,
    origin: &str,
    unsigned_query: &str,
    expiration_millis: i64,
    secret: &SigningSecret,
) -> String {
    let canonical = canonical_string(method, origin, unsigned_query, expiration_millis);
    let signature = hex::encode(hmac_sha256(secret.as_ref(), canonical.as_bytes()));
    trace!("Computed signature: {}", signature);
    signature
}

fn is_lower_hex_sha256(value: &str) -> bool {
    value.len() == SHA256_HEX_LENGTH && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use {
        crate::{sign, verify, SignedRequestView, SigningError, SigningSecret},
        chrono::{DateTime, Duration, Utc},
        http::{header::HOST, Method, Request, Uri},
    };

    const SECRET: &str = "Super secret key to sign URLs";

    fn expiration() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1446179040123).unwrap()
    }

    fn view_of(method: Method, uri: &Uri) -> SignedRequestView {
        SignedRequestView::from_uri(method, uri)
    }

    fn with_query(uri: &Uri, query: &str) -> Uri {
        let url = uri.to_string();
        let (base, _) = url.split_once('?').unwrap();
        format!("{}?{}", base, query).parse().unwrap()
    }

    #[test_log::test]
    fn test_sign_layout() {
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/path/child?foo=bar&a=one", expiration(), &secret).unwrap();

        assert_eq!(signed.scheme_str(), Some("http"));
        assert_eq!(signed.authority().unwrap().as_str(), "host.org");
        assert_eq!(signed.path(), "/path/child");

        let query = signed.query().unwrap();
        let (unsigned, signature) = query.split_once("&hmacSignature=").unwrap();
        assert_eq!(unsigned, "foo=bar&a=one&expiration=1446179040123");
        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test_log::test]
    fn test_sign_is_deterministic() {
        let secret = SigningSecret::from(SECRET);
        let url = "http://host.org/path/child?foo=bar&a=one";
        let a = sign(&Method::GET, url, expiration(), &secret).unwrap();
        let b = sign(&Method::GET, url, expiration(), &secret).unwrap();
        assert_eq!(a, b);

        // Every input participates in the signature.
        let other_method = sign(&Method::PUT, url, expiration(), &secret).unwrap();
        let other_expiration = sign(&Method::GET, url, expiration() + Duration::milliseconds(1), &secret).unwrap();
        let other_secret = sign(&Method::GET, url, expiration(), &SigningSecret::from("other")).unwrap();
        let other_path = sign(&Method::GET, "http://host.org/path/other?foo=bar&a=one", expiration(), &secret).unwrap();
        for other in [other_method, other_expiration, other_secret, other_path] {
            assert_ne!(signature_of(&a), signature_of(&other));
        }
    }

    fn signature_of(uri: &Uri) -> String {
        uri.query().unwrap().split_once("hmacSignature=").unwrap().1.to_string()
    }

    #[test_log::test]
    fn test_sign_without_query() {
        let secret = SigningSecret::from(SECRET);
        for url in ["http://host.org/path", "http://host.org/path?", "http://host.org"] {
            let signed = sign(&Method::GET, url, expiration(), &secret).unwrap();
            assert!(signed.query().unwrap().starts_with("expiration=1446179040123&hmacSignature="), "{}", signed);
            assert!(verify(&view_of(Method::GET, &signed), &secret).matches());
        }
    }

    #[test_log::test]
    fn test_sign_errors() {
        let secret = SigningSecret::from(SECRET);
        let e = sign(&Method::GET, "/path/child?foo=bar", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::RelativeUrl(_)));

        let e = sign(&Method::GET, "http://host.org/p?expiration=5", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::ReservedParameter("expiration")));

        let e = sign(&Method::GET, "http://host.org/p?a=1&hmacSignature=5", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::ReservedParameter("hmacSignature")));

        let e = sign(&Method::GET, "http://host.org/p#section", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::FragmentNotAllowed(_)));

        let e = sign(&Method::GET, "http://exa mple.org/", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::InvalidUrl(_)));

        let e = sign(&Method::GET, "http://user@host.org/p?a=1", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::UserInfoNotAllowed(_)));

        let e = sign(&Method::GET, "http://user:pw@host.org:8080/p", expiration(), &secret).unwrap_err();
        assert!(matches!(e, SigningError::UserInfoNotAllowed(_)));
    }

    #[test_log::test]
    fn test_round_trip_across_inputs() {
        let secrets = ["S", SECRET, ""];
        let urls = [
            "http://h/p?foo=bar&a=one",
            "https://host.org:8443/a/b/c",
            "http://host.org/with%20space?q=%2F%3F&empty=&flag",
            "http://host.org:8080/p?z=1&a=2",
        ];
        let methods = [Method::GET, Method::PUT, Method::POST, Method::DELETE];
        let expirations = [expiration(), DateTime::<Utc>::from_timestamp_millis(456).unwrap(), Utc::now()];

        for secret in secrets {
            let secret = SigningSecret::from(secret);
            for url in urls {
                for method in methods.iter() {
                    for exp in expirations {
                        let signed = sign(method, url, exp, &secret).unwrap();
                        let v = verify(&view_of(method.clone(), &signed), &secret);
                        assert!(v.matches(), "{} {} did not verify", method, signed);

                        // As received by a server: origin-form target plus a Host header.
                        let request = Request::builder()
                            .method(method.clone())
                            .uri(signed.path_and_query().unwrap().as_str())
                            .header(HOST, signed.authority().unwrap().as_str())
                            .body(())
                            .unwrap();
                        let served = SignedRequestView::from_request(&request, signed.scheme_str().unwrap());
                        assert!(verify(&served, &secret).matches(), "{} {} did not verify as served", method, signed);
                        assert_eq!(v.expiration().unwrap().timestamp_millis(), exp.timestamp_millis());
                        assert_eq!(v.presented_signature().unwrap(), signature_of(&signed));
                    }
                }
            }
        }
    }

    #[test_log::test]
    fn test_any_query_mutation_fails() {
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/path/child?foo=bar&a=one", expiration(), &secret).unwrap();
        let query = signed.query().unwrap().to_string();

        for i in 0..query.len() {
            let original = query.as_bytes()[i];
            let replacement = if original == b'0' { b'1' } else { b'0' };
            let mut mutated = query.clone().into_bytes();
            mutated[i] = replacement;
            let mutated = String::from_utf8(mutated).unwrap();
            let v = verify(&view_of(Method::GET, &with_query(&signed, &mutated)), &secret);
            assert!(!v.matches(), "mutation at {} ({}) still matched", i, mutated);
        }
    }

    #[test_log::test]
    fn test_truncated_and_reordered_query_fails() {
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/path/child?foo=bar&a=one", expiration(), &secret).unwrap();
        let query = signed.query().unwrap();

        let truncated = with_query(&signed, &query[1..]);
        let v = verify(&view_of(Method::GET, &truncated), &secret);
        assert!(!v.matches());
        // The signature itself is still extracted.
        assert_eq!(v.presented_signature().unwrap(), signature_of(&signed));

        let reordered = with_query(&signed, &query.replacen("foo=bar&a=one", "a=one&foo=bar", 1));
        assert!(!verify(&view_of(Method::GET, &reordered), &secret).matches());

        let reencoded = with_query(&signed, &query.replacen("foo=bar", "foo=%62ar", 1));
        assert!(!verify(&view_of(Method::GET, &reencoded), &secret).matches());
    }

    #[test_log::test]
    fn test_wrong_method_secret_or_origin_fails() {
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/path/child?foo=bar", expiration(), &secret).unwrap();

        assert!(verify(&view_of(Method::GET, &signed), &secret).matches());
        assert!(!verify(&view_of(Method::POST, &signed), &secret).matches());
        assert!(!verify(&view_of(Method::GET, &signed), &SigningSecret::from("wrong")).matches());

        let moved = SignedRequestView::new(Method::GET, "http://host.org/path/other", signed.query().unwrap());
        assert!(!verify(&moved, &secret).matches());

        let https = SignedRequestView::new(Method::GET, "https://host.org/path/child", signed.query().unwrap());
        assert!(!verify(&https, &secret).matches());
    }

    #[test_log::test]
    fn test_missing_or_malformed_parameters() {
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/p?foo=bar", expiration(), &secret).unwrap();
        let signature = signature_of(&signed);

        let cases = [
            String::new(),
            "foo=bar".to_string(),
            "foo=bar&expiration=1446179040123".to_string(),
            format!("foo=bar&hmacSignature={}", signature),
            format!("foo=bar&expiration=soon&hmacSignature={}", signature),
            format!("foo=bar&expiration=1446179040123&hmacSignature={}&hmacSignature={}", signature, signature),
            format!("foo=bar&expiration=1446179040123&expiration=1446179040123&hmacSignature={}", signature),
            format!("foo=bar&expiration=1446179040123&hmacSignature={}", signature.to_uppercase()),
            format!("foo=bar&expiration=1446179040123&hmacSignature={}", &signature[1..]),
            "foo=bar&expiration=1446179040123&hmacSignature=".to_string(),
        ];

        for query in cases.iter() {
            let view = SignedRequestView::new(Method::GET, "http://host.org/p", query.as_str());
            let v = verify(&view, &secret);
            assert!(!v.matches(), "query {:?} matched", query);
        }

        let view = SignedRequestView::new(Method::GET, "http://host.org/p", "foo=bar&expiration=soon");
        let v = verify(&view, &secret);
        assert_eq!(v.expiration(), None);
        assert_eq!(v.presented_signature(), None);
    }

    #[test_log::test]
    fn test_signature_moved_within_query_still_matches() {
        // Only the signature parameter is removed; its position is irrelevant.
        let secret = SigningSecret::from(SECRET);
        let signed = sign(&Method::GET, "http://host.org/p?foo=bar", expiration(), &secret).unwrap();
        let signature = signature_of(&signed);
        let query = format!("hmacSignature={}&foo=bar&expiration=1446179040123", signature);
        let view = SignedRequestView::new(Method::GET, "http://host.org/p", query);
        assert!(verify(&view, &secret).matches());
    }
}
