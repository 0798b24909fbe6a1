use std::env;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::transport::{ByteStream, ChatTransport};
use crate::types::{ChatRequest, ClaimList, ClaimSummary, HealthStatus};

/// Environment variable consulted when no base URL is configured.
pub const API_URL_ENV: &str = "CLAIMSAI_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the claims backend.
///
/// Serves the claim-retrieval endpoints and, as a [`ChatTransport`], the streamed chat endpoint.
/// The base URL is always injected; it never comes from a global.
#[derive(Debug, Clone)]
pub struct ClaimsClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ClaimsClient {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the CLAIMSAI_API_URL environment
    /// variable, falling back to `http://localhost:8000/`.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds connecting and every non-streaming request.  Chat streams are bounded
    /// only by the connect timeout, since a long answer is not a stalled one.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var(API_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// List the claims the backend can serve.
    pub async fn list_claims(&self) -> Result<ClaimList> {
        let url = self.endpoint(&["claims"])?;
        self.get_json(self.client.get(url), None).await
    }

    /// Query backend and database health.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint(&["health"])?;
        self.get_json(self.client.get(url), None).await
    }

    /// Fetch the normalized summary of a claim.
    ///
    /// With `include_pii` false the backend redacts the patient name and drops the FHIR id.
    pub async fn claim_summary(&self, claim_id: &str, include_pii: bool) -> Result<ClaimSummary> {
        let claim_id = validate_claim_id(claim_id)?;
        let url = self.endpoint(&["claims", claim_id, "summary"])?;
        let request = self
            .client
            .get(url)
            .query(&[("include_pii", if include_pii { "true" } else { "false" })]);
        self.get_json(request, Some(claim_id)).await
    }

    /// Fetch the raw ExplanationOfBenefit resource of a claim.
    pub async fn claim_raw(&self, claim_id: &str) -> Result<serde_json::Value> {
        let claim_id = validate_claim_id(claim_id)?;
        let url = self.endpoint(&["claims", claim_id, "raw"])?;
        self.get_json(self.client.get(url), Some(claim_id)).await
    }

    /// Send a chat request and return the streamed response body.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.endpoint(&["chat"])?;
        let mut headers = self.default_headers();
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain"));

        tracing::debug!(%url, thread_id = %request.thread_id, "opening chat stream");
        let response = self
            .execute(self.client.post(url).headers(headers).json(request))
            .await?;
        if !response.status().is_success() {
            return Err(Self::process_error_response(response, None).await);
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::url(
                    format!("Base URL cannot carry a path: {}", self.base_url),
                    None,
                )
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = request.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            tracing::warn!(error = %e, "request failed");
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        claim_id: Option<&str>,
    ) -> Result<T> {
        let response = self
            .execute(request.headers(self.default_headers()).timeout(self.timeout))
            .await?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response, claim_id).await);
        }

        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response, claim_id: Option<&str>) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status_code = response.status().as_u16();

        // FastAPI reports failures as {"detail": "..."}.
        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<serde_json::Value>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let message = match serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.detail)
        {
            Some(serde_json::Value::String(detail)) => detail,
            Some(detail) => detail.to_string(),
            None => error_body,
        };
        tracing::warn!(status_code, %message, "backend returned an error");

        match status_code {
            400 | 422 => Error::bad_request(message),
            404 => Error::not_found(
                message,
                claim_id.map(|_| "claim".to_string()),
                claim_id.map(String::from),
            ),
            408 => Error::timeout(message, None),
            500 => Error::internal_server(message),
            502..=504 => Error::service_unavailable(message),
            _ => Error::api(status_code, message),
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ClaimsClient {
    async fn open_chat(&self, request: ChatRequest) -> Result<ByteStream> {
        self.chat(&request).await
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(
            format!("Base URL cannot carry a path: {base_url}"),
            None,
        ));
    }
    Ok(url)
}

fn validate_claim_id(claim_id: &str) -> Result<&str> {
    let claim_id = claim_id.trim();
    if claim_id.is_empty() {
        return Err(Error::validation(
            "claim id must not be empty",
            Some("claim_id".to_string()),
        ));
    }
    Ok(claim_id)
}
