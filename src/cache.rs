//! Short-lived cache of accepted signatures.
//!
//! A signature that passed full verification once stays acceptable for a trailing grace window
//! after its stated expiration, as long as requests keep reusing it. Each successful reuse slides
//! the window forward. The cache never vouches for a signature on its own; it is only consulted
//! for signatures that already verified.

use {
    crate::constants::{DEFAULT_CACHE_MAX_CAPACITY, DEFAULT_GRACE_PERIOD_SECS, MAX_GRACE_PERIOD_SECS},
    chrono::{DateTime, Duration, Utc},
    derive_builder::Builder,
    log::trace,
    moka::{
        ops::compute::{CompResult, Op},
        sync::Cache,
    },
    std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::Arc,
        time::Duration as StdDuration,
    },
};

/// Capability to remember accepted signatures for a grace window.
///
/// Both operations must be atomic with respect to each other for the same signature.
pub trait SignatureCache: Send + Sync {
    /// Insert `signature`, or refresh it if already present, as last seen at `now`.
    fn put_signature(&self, signature: &str, now: DateTime<Utc>);

    /// Returns `true` if `signature` was put or refreshed no longer than the grace window before
    /// `now`, and refreshes it to `now`. Returns `false` and changes nothing otherwise.
    fn contains_with_refresh(&self, signature: &str, now: DateTime<Utc>) -> bool;
}

impl<C: SignatureCache + ?Sized> SignatureCache for Arc<C> {
    #[inline]
    fn put_signature(&self, signature: &str, now: DateTime<Utc>) {
        (**self).put_signature(signature, now)
    }

    #[inline]
    fn contains_with_refresh(&self, signature: &str, now: DateTime<Utc>) -> bool {
        (**self).contains_with_refresh(signature, now)
    }
}

/// Settings for [`InMemorySignatureCache`].
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct SignatureCacheConfig {
    /// How long after its last use a signature remains acceptable. Must be non-zero and at most a week.
    #[builder(default = "StdDuration::from_secs(DEFAULT_GRACE_PERIOD_SECS)")]
    grace_period: StdDuration,

    /// Upper bound on the number of signatures retained.
    #[builder(default = "DEFAULT_CACHE_MAX_CAPACITY")]
    max_capacity: u64,
}

impl SignatureCacheConfig {
    /// Create a [SignatureCacheConfigBuilder] to construct a [SignatureCacheConfig].
    #[inline]
    pub fn builder() -> SignatureCacheConfigBuilder {
        SignatureCacheConfigBuilder::default()
    }

    /// How long after its last use a signature remains acceptable.
    #[inline]
    pub fn grace_period(&self) -> StdDuration {
        self.grace_period
    }

    /// Upper bound on the number of signatures retained.
    #[inline]
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }
}

impl Default for SignatureCacheConfig {
    fn default() -> Self {
        Self {
            grace_period: StdDuration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
            max_capacity: DEFAULT_CACHE_MAX_CAPACITY,
        }
    }
}

impl SignatureCacheConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(grace_period) = self.grace_period {
            if grace_period.is_zero() {
                return Err("grace_period must be non-zero".to_string());
            }

            if grace_period > StdDuration::from_secs(MAX_GRACE_PERIOD_SECS) {
                return Err(format!("grace_period must not exceed {} seconds", MAX_GRACE_PERIOD_SECS));
            }
        }

        Ok(())
    }
}

/// In-process [`SignatureCache`] backed by a [`moka`] cache.
///
/// The stored value is the last refresh time. Lookups compare it against the caller's `now`, so an
/// entry past its grace window is absent even if it has not been evicted yet. Entries idle for
/// longer than the grace window (in wall-clock time) are evicted by moka in the background.
///
/// Clones share the same underlying storage.
#[derive(Clone)]
pub struct InMemorySignatureCache {
    entries: Cache<String, DateTime<Utc>>,
    grace_period: Duration,
}

impl InMemorySignatureCache {
    /// Create a new cache from the given settings.
    pub fn new(config: SignatureCacheConfig) -> Self {
        let entries = Cache::builder()
            .name("presigned_url_signatures")
            .max_capacity(config.max_capacity)
            .time_to_idle(config.grace_period)
            .build();

        // The builder caps the grace period at one week, so the conversion never falls back.
        let grace_period = Duration::from_std(config.grace_period)
            .unwrap_or_else(|_| Duration::seconds(MAX_GRACE_PERIOD_SECS as i64));

        Self {
            entries,
            grace_period,
        }
    }

    /// The grace window applied to lookups.
    #[inline]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// The number of signatures currently stored, after running pending evictions.
    ///
    /// Entries that are logically expired but not yet evicted are still counted.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    #[inline]
    fn is_fresh(&self, last_refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_refreshed_at) <= self.grace_period
    }
}

impl Default for InMemorySignatureCache {
    fn default() -> Self {
        Self::new(SignatureCacheConfig::default())
    }
}

impl Debug for InMemorySignatureCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("InMemorySignatureCache").field("grace_period", &self.grace_period).finish_non_exhaustive()
    }
}

impl SignatureCache for InMemorySignatureCache {
    fn put_signature(&self, signature: &str, now: DateTime<Utc>) {
        // Never move an entry's refresh time backwards when callers race with slightly different clocks.
        self.entries.entry_by_ref(signature).and_compute_with(|entry| match entry {
            Some(entry) if *entry.value() >= now => Op::Nop,
            _ => Op::Put(now),
        });
        trace!("put_signature: signature cached at {}", now);
    }

    fn contains_with_refresh(&self, signature: &str, now: DateTime<Utc>) -> bool {
        let result = self.entries.entry_by_ref(signature).and_compute_with(|entry| match entry {
            Some(entry) if self.is_fresh(*entry.value(), now) => Op::Put(now.max(*entry.value())),
            _ => Op::Nop,
        });

        let found = matches!(result, CompResult::ReplacedWith(_));
        trace!("contains_with_refresh: found={} at {}", found, now);
        found
    }
}
