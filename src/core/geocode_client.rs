use crate::domain::model::GeocodeResult;
use crate::domain::ports::{Clock, Geocoder, LookupError};
use std::time::{Duration, Instant};

/// 速率限制與重試設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Minimum gap between the starts of two consecutive attempts.
    pub min_interval: Duration,
    pub request_timeout: Duration,
    /// Total attempts per address, the first one included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1100),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Sequential, rate-limited geocoding with bounded retries.
///
/// The time of the last outbound attempt is owned here, so every call made
/// through one client shares a single rate limit. Nothing is cached: the
/// same address asked twice is sent twice.
pub struct GeocodeClient<G: Geocoder, C: Clock> {
    geocoder: G,
    clock: C,
    policy: RetryPolicy,
    last_request: Option<Instant>,
    requests_issued: usize,
}

impl<G: Geocoder, C: Clock> GeocodeClient<G, C> {
    pub fn new(geocoder: G, clock: C, policy: RetryPolicy) -> Self {
        Self {
            geocoder,
            clock,
            policy,
            last_request: None,
            requests_issued: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.geocoder.provider_name()
    }

    /// Outbound attempts made so far, retries included.
    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }

    /// Geocode one address. Always returns a result:
    /// `high` on a match, `failed` on an empty answer (never retried),
    /// `error` once every attempt hit a lookup error.
    pub async fn geocode(&mut self, address: &str) -> GeocodeResult {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.throttle().await;
            self.requests_issued += 1;

            let outcome = match tokio::time::timeout(
                self.policy.request_timeout,
                self.geocoder.lookup(address),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(LookupError::Timeout),
            };

            match outcome {
                Ok(Some(location)) => {
                    return GeocodeResult::located(location, self.geocoder.provider_name());
                }
                Ok(None) => {
                    tracing::debug!("No match for address: {}", address);
                    return GeocodeResult::no_match(self.geocoder.provider_name());
                }
                Err(e) => {
                    tracing::warn!("⚠️  Attempt {}/{} failed: {}", attempt, max_attempts, e);
                    if attempt < max_attempts {
                        self.clock.sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        GeocodeResult::error(self.geocoder.provider_name())
    }

    async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.policy.min_interval {
                self.clock.sleep(self.policy.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(self.clock.now());
    }
}
