use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Duration;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::ProviderToken;
use crate::services::clock::Clock;

/// Tokens are treated as expired this many seconds before the provider
/// says so, so a token handed out near its deadline cannot go stale
/// mid-request.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

/// Wire shape of a client-credentials token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Performs one client-credentials exchange against a provider's token
/// endpoint
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self) -> AppResult<TokenResponse>;
}

/// Spotify client-credentials exchanger
pub struct SpotifyExchanger {
    http: HttpClient,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl SpotifyExchanger {
    pub fn new(
        http: HttpClient,
        token_url: String,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id,
            client_secret,
        }
    }
}

#[async_trait::async_trait]
impl TokenExchanger for SpotifyExchanger {
    async fn exchange(&self) -> AppResult<TokenResponse> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(AppError::Config(
                    "Spotify credentials not configured".to_string(),
                ))
            }
        };

        let basic = BASE64.encode(format!("{}:{}", client_id, client_secret));

        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", basic))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;

        tracing::debug!(expires_in = token.expires_in, "Provider token exchanged");

        Ok(token)
    }
}

/// Clonable failure carried by the shared in-flight future
///
/// `AppError` is not `Clone`, so the in-flight exchange flattens its error
/// into the two classes callers need to tell apart.
#[derive(Debug, Clone)]
enum ExchangeFailure {
    Config(String),
    Denied(String),
}

impl From<AppError> for ExchangeFailure {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Config(msg) => ExchangeFailure::Config(msg),
            other => ExchangeFailure::Denied(other.to_string()),
        }
    }
}

impl From<ExchangeFailure> for AppError {
    fn from(e: ExchangeFailure) -> Self {
        match e {
            ExchangeFailure::Config(msg) => AppError::Config(msg),
            ExchangeFailure::Denied(msg) => AppError::Auth(msg),
        }
    }
}

type InflightExchange = Shared<BoxFuture<'static, Result<ProviderToken, ExchangeFailure>>>;

#[derive(Default)]
struct Inner {
    token: Option<ProviderToken>,
    inflight: Option<InflightExchange>,
}

/// Process-wide cache for one provider's access token
///
/// A cached token is reused without a network call until its
/// margin-adjusted expiry. Concurrent callers racing past an expired token
/// attach to a single shared in-flight exchange and observe its result or
/// its failure; a failed exchange caches nothing.
pub struct TokenCache {
    exchanger: Arc<dyn TokenExchanger>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl TokenCache {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            exchanger,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns a valid access token, exchanging credentials if needed
    pub async fn acquire(&self) -> AppResult<String> {
        let inflight = {
            let mut inner = self.inner.lock().await;

            if let Some(token) = &inner.token {
                if self.clock.now() < token.expires_at {
                    return Ok(token.access_token.clone());
                }
            }

            match &inner.inflight {
                Some(existing) => existing.clone(),
                None => {
                    let exchanger = Arc::clone(&self.exchanger);
                    let clock = Arc::clone(&self.clock);
                    let fut: InflightExchange = async move {
                        let response =
                            exchanger.exchange().await.map_err(ExchangeFailure::from)?;
                        let ttl =
                            Duration::seconds(response.expires_in - EXPIRY_SAFETY_MARGIN_SECS);
                        Ok(ProviderToken {
                            access_token: response.access_token,
                            expires_at: clock.now() + ttl,
                        })
                    }
                    .boxed()
                    .shared();

                    inner.inflight = Some(fut.clone());
                    fut
                }
            }
        };

        let result = inflight.clone().await;

        // First awaiter back settles the exchange for everyone.
        let mut inner = self.inner.lock().await;
        if inner
            .inflight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&inflight))
        {
            inner.inflight = None;
            if let Ok(token) = &result {
                inner.token = Some(token.clone());
            }
        }

        match result {
            Ok(token) => Ok(token.access_token),
            Err(failure) => Err(failure.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestClock {
        now: std::sync::Mutex<DateTime<Utc>>,
    }

    impl TestClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: std::sync::Mutex::new(now),
            })
        }

        fn advance(&self, seconds: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(seconds);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    /// Exchanger that counts calls and can be slowed down to force overlap
    struct CountingExchanger {
        calls: AtomicUsize,
        delay_ms: u64,
        fail_first: bool,
    }

    impl CountingExchanger {
        fn new(delay_ms: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay_ms,
                fail_first: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl TokenExchanger for CountingExchanger {
        async fn exchange(&self) -> AppResult<TokenResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            if self.fail_first && call == 0 {
                return Err(AppError::Auth("token exchange returned 400".to_string()));
            }
            Ok(TokenResponse {
                access_token: format!("token-{}", call),
                expires_in: 3600,
            })
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cached_token_reused_before_expiry() {
        let mut exchanger = MockTokenExchanger::new();
        exchanger.expect_exchange().times(1).returning(|| {
            Ok(TokenResponse {
                access_token: "abc".to_string(),
                expires_in: 3600,
            })
        });

        let clock = TestClock::at(start());
        let cache = TokenCache::new(Arc::new(exchanger), clock.clone());

        assert_eq!(cache.acquire().await.unwrap(), "abc");

        // One hour minus the safety margin has not elapsed yet.
        clock.advance(3600 - EXPIRY_SAFETY_MARGIN_SECS - 1);
        assert_eq!(cache.acquire().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_expired_token_triggers_new_exchange() {
        let exchanger = Arc::new(CountingExchanger::new(0));
        let clock = TestClock::at(start());
        let cache = TokenCache::new(exchanger.clone(), clock.clone());

        assert_eq!(cache.acquire().await.unwrap(), "token-0");

        clock.advance(3600);
        assert_eq!(cache.acquire().await.unwrap(), "token-1");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_collapse_to_one_exchange() {
        let exchanger = Arc::new(CountingExchanger::new(50));
        let clock = TestClock::at(start());
        let cache = Arc::new(TokenCache::new(exchanger.clone(), clock));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.acquire().await }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-0");
        }

        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_is_not_cached() {
        let exchanger = Arc::new(CountingExchanger {
            calls: AtomicUsize::new(0),
            delay_ms: 0,
            fail_first: true,
        });
        let clock = TestClock::at(start());
        let cache = TokenCache::new(exchanger.clone(), clock);

        assert!(cache.acquire().await.is_err());

        // Next caller retries instead of observing a cached failure.
        assert_eq!(cache.acquire().await.unwrap(), "token-1");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let http = HttpClient::new();
        let exchanger =
            SpotifyExchanger::new(http, "http://localhost/token".to_string(), None, None);

        match exchanger.exchange().await {
            Err(AppError::Config(_)) => {}
            other => panic!("expected config error, got {:?}", other.map(|t| t.access_token)),
        }
    }
}
