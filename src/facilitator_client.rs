//! Verify-then-settle client for a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] handles the `/verify`, `/settle`, and `/supported`
//! endpoints. Every call:
//!
//! - carries a fresh JWT whose `uri` claim names the call's method and path,
//! - runs under the client's [`CircuitBreaker`] with the phase's [`RetryPolicy`],
//! - is bounded by the phase's timeout; a timed-out request is dropped, not left running.
//!
//! Every attempt, retries included, carries a fresh `X-Idempotency-Key`; a key
//! is never sent twice.
//!
//! ## Example
//!
//! ```rust
//! use x402_settle::facilitator_client::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_from("https://facilitator.x402.rs").unwrap();
//! ```

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;
use x402_settle_types::proto::{
    PaymentRequirements, ProtocolVersion, SettleOutcome, SettleRequest, SupportedResponse,
    VerifyOutcome, VerifyRequest, v1,
};

use crate::authorization::Authorization;
use crate::config::FacilitatorClientConfig;
use crate::jwt::{JwtError, JwtSigner};
use crate::resilience::{
    CircuitBreaker, CircuitOpenError, RetryError, RetryPolicy, Transient, retry_with_breaker,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "X-Idempotency-Key";

/// Reported when a facilitator rejects a payload without giving a reason.
pub const VERIFICATION_FAILED_REASON: &str = "verification failed";

#[derive(Clone, Debug)]
struct SupportedCacheState {
    response: SupportedResponse,
    expires_at: Instant,
}

/// TTL cache for the `/supported` response.
#[derive(Debug)]
pub struct SupportedCache {
    ttl: Duration,
    state: RwLock<Option<SupportedCacheState>>,
}

impl SupportedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<SupportedResponse> {
        let guard = self.state.read().await;
        let cache = guard.as_ref()?;
        if Instant::now() < cache.expires_at {
            Some(cache.response.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, response: SupportedResponse) {
        let mut guard = self.state.write().await;
        *guard = Some(SupportedCacheState {
            response,
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid header {name}")]
    InvalidHeader { name: String },
    #[error("API key id and secret must be configured together")]
    IncompleteCredentials,
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Failed to encode request body: {context}: {source}")]
    Encode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    #[error("Facilitator unavailable: {context}: gave up after {attempts} attempts: {source}")]
    Unavailable {
        context: &'static str,
        attempts: u32,
        #[source]
        source: Box<FacilitatorClientError>,
    },
}

impl Transient for FacilitatorClientError {
    fn is_transient(&self) -> bool {
        match self {
            FacilitatorClientError::Http { .. } => true,
            FacilitatorClientError::ResponseBodyRead { .. } => true,
            FacilitatorClientError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl FacilitatorClientError {
    fn from_retry(context: &'static str, error: RetryError<FacilitatorClientError>) -> Self {
        match error {
            RetryError::CircuitOpen(e) => FacilitatorClientError::CircuitOpen(e),
            RetryError::Exhausted { attempts, last } => FacilitatorClientError::Unavailable {
                context,
                attempts,
                source: Box::new(last),
            },
            RetryError::Permanent(e) => e,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, FacilitatorClientError::CircuitOpen(_))
    }

    /// The facilitator could not be reached: the breaker is open or retries ran out.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FacilitatorClientError::CircuitOpen(_) | FacilitatorClientError::Unavailable { .. }
        )
    }
}

/// A client for communicating with a remote x402 facilitator.
///
/// Clones share the circuit breaker and the `/supported` cache.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: Client,
    protocol_version: ProtocolVersion,
    jwt: Option<JwtSigner>,
    project_header: Option<(HeaderName, HeaderValue)>,
    verify_timeout: Duration,
    settle_timeout: Duration,
    supported_timeout: Duration,
    verify_retry: RetryPolicy,
    settle_retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    supported_cache: Arc<SupportedCache>,
}

impl FacilitatorClient {
    /// Default TTL for caching the supported endpoint response (10 minutes).
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn try_new(config: &FacilitatorClientConfig) -> Result<Self, FacilitatorClientError> {
        let base_url = normalize_base_url(config.base_url.inner())?;
        let join = |path: &str, context: &'static str| {
            base_url
                .join(path)
                .map_err(|e| FacilitatorClientError::UrlParse { context, source: e })
        };
        let verify_url = join(&config.verify_path, "Failed to construct verify URL")?;
        let settle_url = join(&config.settle_path, "Failed to construct settle URL")?;
        let supported_url = join(&config.supported_path, "Failed to construct supported URL")?;

        let jwt = match (&config.api_key_id, &config.api_key_secret) {
            (Some(id), Some(secret)) => Some(JwtSigner::from_secret(id.inner(), secret.inner())?),
            (None, None) => None,
            _ => return Err(FacilitatorClientError::IncompleteCredentials),
        };
        let project_header = config
            .project_header
            .as_ref()
            .map(|header| {
                let invalid = || FacilitatorClientError::InvalidHeader {
                    name: header.name.clone(),
                };
                let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| invalid())?;
                let value = HeaderValue::from_str(&header.value).map_err(|_| invalid())?;
                Ok::<_, FacilitatorClientError>((name, value))
            })
            .transpose()?;

        Ok(Self {
            breaker: Arc::new(CircuitBreaker::new(
                base_url.as_str(),
                config.circuit_breaker.clone(),
            )),
            base_url,
            verify_url,
            settle_url,
            supported_url,
            client: Client::new(),
            protocol_version: config.protocol_version,
            jwt,
            project_header,
            verify_timeout: config.verify_timeout(),
            settle_timeout: config.settle_timeout(),
            supported_timeout: config.supported_timeout(),
            verify_retry: config.verify_retry.clone(),
            settle_retry: config.settle_retry.clone(),
            supported_cache: Arc::new(SupportedCache::new(config.supported_cache_ttl())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn supported_cache(&self) -> &SupportedCache {
        &self.supported_cache
    }

    /// Shares `breaker` with other clients of the same facilitator.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Encodes the verify/settle body for this client's protocol version.
    pub fn encode_request(
        &self,
        authorization: &Authorization,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyRequest, FacilitatorClientError> {
        VerifyRequest::new(self.protocol_version, requirements, authorization).map_err(|e| {
            FacilitatorClientError::Encode {
                context: "payment payload",
                source: e,
            }
        })
    }

    /// Sends `POST /verify`. `isValid: false` is a result, not an error.
    #[tracing::instrument(
        name = "x402.facilitator_client.verify",
        skip_all,
        fields(version = %self.protocol_version, timeout = ?self.verify_timeout),
        err
    )]
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyOutcome, FacilitatorClientError> {
        let context = "POST /verify";
        let response: v1::VerifyResponse =
            retry_with_breaker(&self.verify_retry, &self.breaker, move |attempt| {
                self.post_json(&self.verify_url, context, request, self.verify_timeout, attempt)
            })
            .await
            .map_err(|e| FacilitatorClientError::from_retry(context, e))?;
        Ok(response.into())
    }

    /// Sends `POST /settle`. Success without a transaction hash is reported as a failure.
    #[tracing::instrument(
        name = "x402.facilitator_client.settle",
        skip_all,
        fields(version = %self.protocol_version, timeout = ?self.settle_timeout),
        err
    )]
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleOutcome, FacilitatorClientError> {
        let context = "POST /settle";
        let response: v1::SettleResponse =
            retry_with_breaker(&self.settle_retry, &self.breaker, move |attempt| {
                self.post_json(&self.settle_url, context, request, self.settle_timeout, attempt)
            })
            .await
            .map_err(|e| FacilitatorClientError::from_retry(context, e))?;
        let outcome = SettleOutcome::from(response);
        if !outcome.success {
            tracing::warn!(reason = ?outcome.error_reason, "Settlement failed");
        }
        Ok(outcome)
    }

    /// Verifies `authorization`, then settles it only if the facilitator accepted it.
    ///
    /// A rejected verification returns a failed [`SettleOutcome`] carrying the
    /// `invalidReason`, and settle is never called.
    #[tracing::instrument(name = "x402.facilitator_client.verify_and_settle", skip_all, fields(network = %requirements.network), err)]
    pub async fn verify_and_settle(
        &self,
        authorization: &Authorization,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, FacilitatorClientError> {
        let request = self.encode_request(authorization, requirements)?;
        let verification = self.verify(&request).await?;
        if !verification.verified {
            let reason = verification
                .invalid_reason
                .unwrap_or_else(|| VERIFICATION_FAILED_REASON.to_string());
            tracing::info!(%reason, "Payment rejected at verification");
            return Ok(SettleOutcome::failure(
                reason,
                verification.payer_address.or_else(|| authorization.payer()),
            ));
        }
        self.settle(&request).await
    }

    #[tracing::instrument(name = "x402.facilitator_client.supported", skip_all, err)]
    pub async fn supported_uncached(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        let context = "GET /supported";
        retry_with_breaker(&self.verify_retry, &self.breaker, move |attempt| {
            self.get_json(&self.supported_url, context, self.supported_timeout, attempt)
        })
        .await
        .map_err(|e| FacilitatorClientError::from_retry(context, e))
    }

    /// `GET /supported`, cached for the configured TTL (default 10 minutes).
    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        if let Some(response) = self.supported_cache.get().await {
            return Ok(response);
        }
        tracing::info!("x402.facilitator_client.supported_cache_miss");
        let response = self.supported_uncached().await?;
        self.supported_cache.set(response.clone()).await;
        Ok(response)
    }

    fn authorize(
        &self,
        mut req: reqwest::RequestBuilder,
        method: &str,
        url: &Url,
    ) -> Result<reqwest::RequestBuilder, FacilitatorClientError> {
        if let Some(jwt) = &self.jwt {
            let token = jwt.sign(method, url)?;
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some((name, value)) = &self.project_header {
            req = req.header(name.clone(), value.clone());
        }
        Ok(req)
    }

    async fn post_json<R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &VerifyRequest,
        timeout: Duration,
        attempt: u32,
    ) -> Result<R, FacilitatorClientError>
    where
        R: DeserializeOwned,
    {
        let idempotency_key = Uuid::new_v4().to_string();
        tracing::debug!(context, attempt, %idempotency_key, "Calling facilitator");
        let req = self
            .client
            .post(url.clone())
            .json(payload)
            .header(IDEMPOTENCY_KEY_HEADER, &idempotency_key)
            .timeout(timeout);
        let req = self.authorize(req, "POST", url)?;
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;
        read_json(http_response, context, true).await
    }

    async fn get_json<R>(
        &self,
        url: &Url,
        context: &'static str,
        timeout: Duration,
        attempt: u32,
    ) -> Result<R, FacilitatorClientError>
    where
        R: DeserializeOwned,
    {
        tracing::debug!(context, attempt, "Calling facilitator");
        let req = self.client.get(url.clone()).timeout(timeout);
        let req = self.authorize(req, "GET", url)?;
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;
        read_json(http_response, context, false).await
    }
}

/// Parses a 200 response. With `accept_rejection`, a 4xx other than 429 whose
/// body is a well-formed response is a rejection, not a transport failure.
async fn read_json<R: DeserializeOwned>(
    http_response: reqwest::Response,
    context: &'static str,
    accept_rejection: bool,
) -> Result<R, FacilitatorClientError> {
    let status = http_response.status();
    if status == StatusCode::OK {
        return http_response
            .json::<R>()
            .await
            .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e });
    }
    let body = http_response
        .text()
        .await
        .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
    if accept_rejection
        && status.is_client_error()
        && status != StatusCode::TOO_MANY_REQUESTS
        && let Ok(parsed) = serde_json::from_str::<R>(&body)
    {
        return Ok(parsed);
    }
    tracing::error!(context, %status, %body, "Request to facilitator failed");
    Err(FacilitatorClientError::HttpStatus {
        context,
        status,
        body,
    })
}

/// Ensures exactly one trailing slash, so relative endpoint paths append to it.
fn normalize_base_url(url: &Url) -> Result<Url, FacilitatorClientError> {
    let mut normalized = url.as_str().trim_end_matches('/').to_string();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
        context: "Failed to parse base url",
        source: e,
    })
}

/// Client with default configuration for the given base URL.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        FacilitatorClient::try_new(&FacilitatorClientConfig::new(url))
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FacilitatorClient::try_from(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{AuthorizationBuilder, PayerKey};
    use crate::challenge::PaymentChallenge;
    use crate::config::HeaderConfig;
    use crate::jwt::JwtClaims;
    use crate::resilience::CircuitState;
    use alloy_signer_local::PrivateKeySigner;
    use base64::Engine;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};
    use x402_settle_types::config::LiteralOrEnv;
    use x402_settle_types::proto::MISSING_TRANSACTION_REASON;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn config(server: &MockServer, version: ProtocolVersion) -> FacilitatorClientConfig {
        let mut config = FacilitatorClientConfig::new(server.uri().parse().unwrap());
        config.protocol_version = version;
        config.api_key_id = Some(LiteralOrEnv::from_literal("key-1".to_string()));
        config.api_key_secret = Some(LiteralOrEnv::from_literal(STANDARD.encode([9u8; 32])));
        config.verify_retry.base_delay_ms = 1;
        config.settle_retry.base_delay_ms = 1;
        config
    }

    fn client(server: &MockServer, version: ProtocolVersion) -> FacilitatorClient {
        FacilitatorClient::try_new(&config(server, version)).unwrap()
    }

    fn requirements() -> PaymentRequirements {
        PaymentChallenge::exact(
            "$0.01",
            "base-sepolia".parse().unwrap(),
            PAY_TO,
            "https://api.example.com/weather",
        )
        .with_description("Weather report")
        .requirements()
        .unwrap()
    }

    async fn authorization(requirements: &PaymentRequirements) -> Authorization {
        AuthorizationBuilder::evm_only()
            .authorize(requirements, &PayerKey::Evm(PrivateKeySigner::random()))
            .await
            .unwrap()
    }

    fn verify_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "isValid": true,
            "payer": "0x857b06519E91e3A54538791bDbb0E22373e36b66"
        }))
    }

    fn settle_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transaction": "0xdeadbeef",
            "network": "eip155:84532",
            "payer": "0x857b06519E91e3A54538791bDbb0E22373e36b66"
        }))
    }

    fn jwt_claims(request: &Request) -> JwtClaims {
        let value = request.headers.get("authorization").unwrap().to_str().unwrap();
        let token = value.strip_prefix("Bearer ").unwrap();
        let claims = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims).unwrap()).unwrap()
    }

    fn idempotency_key(request: &Request) -> String {
        request
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_verify_and_settle_v2() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(header("content-type", "application/json"))
            .and(header_exists(IDEMPOTENCY_KEY_HEADER))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "x402Version": 2,
                "paymentPayload": {
                    "x402Version": 2,
                    "accepted": {"network": "eip155:84532", "amount": "10000"}
                },
                "paymentRequirements": {"network": "eip155:84532", "amount": "10000"}
            })))
            .respond_with(verify_ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(settle_ok())
            .expect(1)
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let outcome = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tx_hash.as_deref(), Some("0xdeadbeef"));
        assert_eq!(outcome.network.as_deref(), Some("eip155:84532"));
    }

    #[tokio::test]
    async fn test_v1_body_uses_network_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({
                "x402Version": 1,
                "paymentPayload": {"x402Version": 1, "scheme": "exact", "network": "base-sepolia"},
                "paymentRequirements": {"network": "base-sepolia", "maxAmountRequired": "10000"}
            })))
            .respond_with(verify_ok())
            .expect(1)
            .mount(&server)
            .await;

        let requirements = requirements();
        let client = client(&server, ProtocolVersion::V1);
        let request = client
            .encode_request(&authorization(&requirements).await, &requirements)
            .unwrap();
        let outcome = client.verify(&request).await.unwrap();
        assert!(outcome.verified);
        let body: Value = serde_json::from_str(request.as_str()).unwrap();
        assert!(body["paymentPayload"].get("accepted").is_none());
    }

    #[tokio::test]
    async fn test_invalid_verification_never_settles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "invalidReason": "invalid_exact_evm_payload_signature",
                "payer": "0x857b06519E91e3A54538791bDbb0E22373e36b66"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(settle_ok())
            .expect(0)
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let outcome = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_reason.as_deref(),
            Some("invalid_exact_evm_payload_signature")
        );
        assert_eq!(outcome.tx_hash, None);
    }

    #[tokio::test]
    async fn test_rejection_in_400_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "isValid": false,
                "invalidReason": "insufficient_funds"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let outcome = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap();
        assert_eq!(outcome.error_reason.as_deref(), Some("insufficient_funds"));
    }

    #[tokio::test]
    async fn test_success_without_transaction_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(verify_ok())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "transaction": "",
                "network": "eip155:84532"
            })))
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let outcome = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_reason.as_deref(),
            Some(MISSING_TRANSACTION_REASON)
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let err = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(matches!(
            err,
            FacilitatorClientError::Unavailable { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .expect(1)
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        let err = client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FacilitatorClientError::HttpStatus { status, .. } if status == StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn test_verify_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(verify_ok().set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let mut config = config(&server, ProtocolVersion::V2);
        config.verify_timeout_ms = 50;
        config.verify_retry.max_attempts = 1;
        let client = FacilitatorClient::try_new(&config).unwrap();
        let requirements = requirements();
        let request = client
            .encode_request(&authorization(&requirements).await, &requirements)
            .unwrap();
        let err = client.verify(&request).await.unwrap_err();
        let FacilitatorClientError::Unavailable { source, .. } = err else {
            panic!("expected Unavailable, got {err:?}");
        };
        assert!(matches!(*source, FacilitatorClientError::Http { ref source, .. } if source.is_timeout()));
    }

    #[tokio::test]
    async fn test_open_breaker_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let mut config = config(&server, ProtocolVersion::V2);
        config.circuit_breaker.failure_threshold = 2;
        config.verify_retry.max_attempts = 1;
        let client = FacilitatorClient::try_new(&config).unwrap();
        let requirements = requirements();
        let request = client
            .encode_request(&authorization(&requirements).await, &requirements)
            .unwrap();

        for _ in 0..2 {
            let err = client.verify(&request).await.unwrap_err();
            assert!(!err.is_circuit_open());
        }
        assert_eq!(client.circuit_breaker().state(), CircuitState::Open);
        let err = client.verify(&request).await.unwrap_err();
        assert!(err.is_circuit_open());
    }

    #[tokio::test]
    async fn test_idempotency_key_per_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(verify_ok())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(settle_ok())
            .mount(&server)
            .await;

        let requirements = requirements();
        let auth = authorization(&requirements).await;
        client(&server, ProtocolVersion::V2)
            .verify_and_settle(&auth, &requirements)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        let keys: Vec<String> = requests.iter().map(idempotency_key).collect();
        assert_ne!(keys[0], keys[1], "a verify retry gets a new key");
        assert_ne!(keys[1], keys[2], "settle gets its own key");
        assert_ne!(keys[0], keys[2]);
        assert!(keys.iter().all(|key| Uuid::parse_str(key).is_ok()));
    }

    #[tokio::test]
    async fn test_jwt_uri_matches_method_and_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(verify_ok())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kinds": []})))
            .mount(&server)
            .await;

        let client = client(&server, ProtocolVersion::V2);
        let requirements = requirements();
        let request = client
            .encode_request(&authorization(&requirements).await, &requirements)
            .unwrap();
        client.verify(&request).await.unwrap();
        client.supported_uncached().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let host = server.address().to_string();
        assert_eq!(
            jwt_claims(&requests[0]).uri,
            format!("POST {host}/verify")
        );
        assert_eq!(
            jwt_claims(&requests[1]).uri,
            format!("GET {host}/supported")
        );
        assert_eq!(jwt_claims(&requests[1]).sub, "key-1");
    }

    #[tokio::test]
    async fn test_configurable_paths_and_project_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/platform/v2/x402/verify"))
            .and(header("X-Project-Id", "proj-9"))
            .respond_with(verify_ok())
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config(&server, ProtocolVersion::V2);
        config.base_url =
            LiteralOrEnv::from_literal(format!("{}/platform/v2/x402", server.uri()).parse().unwrap());
        config.project_header = Some(HeaderConfig {
            name: "X-Project-Id".into(),
            value: "proj-9".into(),
        });
        let client = FacilitatorClient::try_new(&config).unwrap();
        let requirements = requirements();
        let request = client
            .encode_request(&authorization(&requirements).await, &requirements)
            .unwrap();
        assert!(client.verify(&request).await.unwrap().verified);
    }

    #[tokio::test]
    async fn test_supported_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kinds": [
                    {"x402Version": 2, "scheme": "exact", "network": "eip155:84532"},
                    {"x402Version": 2, "scheme": "exact"}
                ],
                "extensions": [],
                "signers": {}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, ProtocolVersion::V2);
        let first = client.supported().await.unwrap();
        let second = client.supported().await.unwrap();
        assert_eq!(first.kinds.len(), 1);
        assert_eq!(second.kinds, first.kinds);
        assert!(first.supports(
            ProtocolVersion::V2,
            "exact",
            &"base-sepolia".parse().unwrap()
        ));

        // Shared cache across clones; the uncached call always goes out.
        let clone = client.clone();
        clone.supported().await.unwrap();
        clone.supported_uncached().await.unwrap();
    }

    #[tokio::test]
    async fn test_credentials_must_come_in_pairs() {
        let server = MockServer::start().await;
        let mut config = config(&server, ProtocolVersion::V2);
        config.api_key_secret = None;
        assert!(matches!(
            FacilitatorClient::try_new(&config),
            Err(FacilitatorClientError::IncompleteCredentials)
        ));
    }

    #[test]
    fn test_try_from_normalizes_base_url() {
        let client = FacilitatorClient::try_from("https://facilitator.x402.rs/api//").unwrap();
        assert_eq!(
            client.verify_url().as_str(),
            "https://facilitator.x402.rs/api/verify"
        );
        assert_eq!(
            client.supported_url().as_str(),
            "https://facilitator.x402.rs/api/supported"
        );
    }
}
