//! Request wrapper around `reqwest`: timeout/abort, client-side rate limiting,
//! CSRF header, cookies, and translation of every failure into [`ApiError`].
//!
//! Status codes are interpreted here and in `translate`; the resource modules
//! under `api/` never look at them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    HTTP_ERRORS_TOTAL, RATE_LIMITED_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL, TIMEOUTS_TOTAL,
};
use crate::rate_limit::{EndpointClass, LimiterSet};
use crate::retry::retry_with_backoff;
use crate::session::{CSRF_TOKEN_KEY, EventBus, SessionStore};
use crate::state::ClientContext;
use crate::translate::ErrorPayload;

pub const CSRF_HEADER: &str = "x-csrf-token";
const CSRF_COOKIE_NAMES: [&str; 2] = ["csrf_token", "XSRF-TOKEN"];
const USER_AGENT_VALUE: &str = concat!("storefront-client/", env!("CARGO_PKG_VERSION"));

/// Per-call options. `Default` is a plain GET with the client timeout.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub timeout: Option<Duration>,
    // when set, replaces the internal timer entirely
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            timeout: None,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(ApiError::invalid_request)?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    // Invalid header names/values are dropped with a warning
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "dropping invalid request header"),
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

pub fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Parse `Retry-After` as delay seconds or an HTTP date relative to `now`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (at.with_timezone(&Utc) - now).num_seconds();
    Some(secs.max(0) as u64)
}

fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Percent-encode a single path segment (ids, tracking numbers) so it cannot
/// spill into the rest of the path, the query or the fragment.
pub fn path_segment(raw: &str) -> ApiResult<String> {
    if matches!(raw, "" | "." | "..") {
        return Err(ApiError::invalid_request(format!(
            "invalid path segment {:?}",
            raw
        )));
    }
    let mut url = Url::parse("http://segment.invalid/").map_err(ApiError::invalid_request)?;
    url.path_segments_mut()
        .map_err(|_| ApiError::invalid_request("base URL cannot hold a path"))?
        .clear()
        .push(raw);
    Ok(url.path().trim_start_matches('/').to_string())
}

struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// HTTP client for the storefront backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    cookies: Arc<Jar>,
    base_url: String,
    config: ClientConfig,
    ctx: Arc<ClientContext>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let ctx = ClientContext::new()
            .with_limiters(LimiterSet::new(
                config.general_limit,
                config.auth_limit,
                config.payment_limit,
            ))
            .with_login_redirect_delay(config.login_redirect_delay);
        Self::with_context(config, ctx)
    }

    pub fn with_context(config: ClientConfig, ctx: ClientContext) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // cookie store plays the role of `credentials: include`
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .map_err(ApiError::client_setup)?;

        let base_url = config.api_url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            cookies,
            base_url,
            config,
            ctx: Arc::new(ctx),
        })
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.ctx.store.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    fn url_for(&self, path: &str, query: &[(String, String)]) -> ApiResult<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| ApiError::invalid_url(&raw, e))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// CSRF token from session storage, falling back to a readable cookie.
    pub fn csrf_token(&self) -> Option<String> {
        if let Some(token) = self.ctx.store.get(CSRF_TOKEN_KEY).filter(|t| !t.is_empty()) {
            return Some(token);
        }
        let base = Url::parse(&self.base_url).ok()?;
        let header = self.cookies.cookies(&base)?;
        let header = header.to_str().ok()?;
        CSRF_COOKIE_NAMES
            .iter()
            .find_map(|name| cookie_value(header, name))
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        self.check_rate_limit(&options.method, path)?;
        self.dispatch(path, options).await
    }

    // Mutations consult the limiter for their path class; reads never do
    fn check_rate_limit(&self, method: &Method, path: &str) -> ApiResult<()> {
        if !is_state_changing(method) {
            return Ok(());
        }
        let Err(limited) = self.ctx.limiters.check(method, path) else {
            return Ok(());
        };

        let class = match LimiterSet::classify(path) {
            EndpointClass::General => "general",
            EndpointClass::Auth => "auth",
            EndpointClass::Payment => "payment",
        };
        RATE_LIMITED_TOTAL.with_label_values(&[class]).inc();
        warn!(
            method = %method,
            path,
            class,
            retry_after = limited.retry_after_secs,
            "request blocked by client-side rate limit"
        );
        Err(ApiError::rate_limited(limited.retry_after_secs))
    }

    // Everything after the limiter: one network exchange, translated
    async fn dispatch<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let RequestOptions {
            method,
            body,
            query,
            headers,
            timeout,
            cancel,
        } = options;

        REQUEST_TOTAL.inc();
        let mutating = is_state_changing(&method);

        let url = self.url_for(path, &query)?;
        let mut builder = self.http.request(method.clone(), url).headers(headers);

        if mutating {
            match self.csrf_token() {
                Some(token) => builder = builder.header(CSRF_HEADER, token),
                None => warn!(method = %method, path, "no CSRF token available for state-changing request"),
            }
        }

        if let Some(body) = &body {
            builder = builder.json(body);
        }

        debug!(method = %method, path, "sending request");
        let started = Instant::now();

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                headers,
                body,
            })
        };

        // Dropping `exchange` on the losing branch aborts the request and
        // releases the timer, whichever way this resolves.
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                res = exchange => Some(res),
            },
            None => {
                let limit = timeout.unwrap_or(self.config.timeout);
                tokio::time::timeout(limit, exchange).await.ok()
            }
        };

        let raw = match outcome {
            None => {
                TIMEOUTS_TOTAL.inc();
                warn!(method = %method, path, elapsed_ms = started.elapsed().as_millis() as u64, "request aborted or timed out");
                return Err(ApiError::timeout());
            }
            Some(Err(e)) if e.is_timeout() => {
                TIMEOUTS_TOTAL.inc();
                return Err(ApiError::timeout());
            }
            Some(Err(e)) => {
                warn!(method = %method, path, error = %e, "network failure");
                return Err(ApiError::network(e));
            }
            Some(Ok(raw)) => raw,
        };

        REQUEST_LATENCY.observe(started.elapsed().as_secs_f64());
        debug!(
            method = %method,
            path,
            status = raw.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response received"
        );

        if raw.status.is_success() {
            return decode_body(&raw.body);
        }

        Err(self.error_from_response(&method, path, raw))
    }

    fn error_from_response(&self, method: &Method, path: &str, raw: RawResponse) -> ApiError {
        let status = raw.status.as_u16();
        HTTP_ERRORS_TOTAL
            .with_label_values(&[status.to_string().as_str()])
            .inc();

        let payload = serde_json::from_slice::<ErrorPayload>(&raw.body).ok();
        let mut err = ApiError::from_status(status, payload.as_ref());

        if raw.status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(secs) = raw
                .headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()))
            {
                err = err.with_retry_after(secs);
            }
        }

        if raw.status == StatusCode::UNAUTHORIZED {
            self.ctx.handle_unauthorized();
        }

        warn!(
            method = %method,
            path,
            status,
            action = err.action.as_str(),
            "request failed"
        );
        err
    }

    /// `request` wrapped in the configured retry policy.
    ///
    /// The limiter is consulted once for the logical call: a rejection fails
    /// straight away and retries of an accepted call do not take more slots.
    pub async fn request_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        self.check_rate_limit(&options.method, path)?;
        retry_with_backoff(self.config.retry, || self.dispatch(path, options.clone())).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(path, RequestOptions::default()).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(path, RequestOptions::new(Method::POST).json(body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(path, RequestOptions::new(Method::PUT).json(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.request(path, RequestOptions::new(Method::PATCH).json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(path, RequestOptions::new(Method::DELETE)).await
    }
}

// Empty bodies (204 and friends) decode as JSON null
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(ApiError::invalid_response);
    }
    serde_json::from_slice(body).map_err(ApiError::invalid_response)
}
