//! Retrying HTTP round-trip decorator.
//!
//! `RetryTransport` wraps any [`RoundTrip`] implementation and adds retry
//! with a fixed backoff schedule for network failures and 5xx responses,
//! plus classification of 3xx/4xx responses into typed errors.

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Body, Method, Request, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::error::TdarrError;

/// Delays slept before the first and second retry.
pub const DEFAULT_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(3)];

/// A single HTTP exchange with no retry or status handling.
pub trait RoundTrip: Send + Sync {
    fn round_trip(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send;
}

impl RoundTrip for reqwest::Client {
    fn round_trip(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        self.execute(request)
    }
}

/// Request parts captured up front so every attempt sends identical bytes.
struct ReplayableRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    body: Option<Vec<u8>>,
}

impl ReplayableRequest {
    /// Returns `Err(request)` when the body is a stream and cannot be buffered.
    fn capture(request: Request) -> Result<Self, Request> {
        let body = match request.body() {
            None => None,
            Some(body) => match body.as_bytes() {
                Some(bytes) => Some(bytes.to_vec()),
                None => return Err(request),
            },
        };
        Ok(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            timeout: request.timeout().copied(),
            body,
        })
    }

    fn build(&self) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.timeout_mut() = self.timeout;
        if let Some(body) = &self.body {
            *request.body_mut() = Some(Body::from(body.clone()));
        }
        request
    }
}

/// Round-trip decorator adding retry and status-code classification.
pub struct RetryTransport<T> {
    inner: T,
    backoff: Vec<Duration>,
}

impl<T: RoundTrip> RetryTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_backoff(inner, DEFAULT_BACKOFF.to_vec())
    }

    /// One retry is attempted per backoff entry.
    pub fn with_backoff(inner: T, backoff: Vec<Duration>) -> Self {
        Self { inner, backoff }
    }

    pub fn retries(&self) -> usize {
        self.backoff.len()
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Sends `request`, retrying transient failures, and classifies the
    /// final response.
    pub async fn round_trip(&self, request: Request) -> Result<Response, TdarrError> {
        let url = request.url().to_string();

        let replayable = match ReplayableRequest::capture(request) {
            Ok(replayable) => replayable,
            Err(request) => {
                debug!(url = %url, "Request body is a stream, sending without retry");
                let outcome = self.inner.round_trip(request).await;
                return classify(outcome, &url);
            }
        };

        let mut outcome = self.inner.round_trip(replayable.build()).await;
        for (attempt, delay) in self.backoff.iter().enumerate() {
            if !is_retryable(&outcome) {
                break;
            }
            debug!(
                retry_count = attempt + 1,
                backoff_seconds = delay.as_secs_f64(),
                url = %url,
                "Retrying HTTP request"
            );
            tokio::time::sleep(*delay).await;
            outcome = self.inner.round_trip(replayable.build()).await;
        }

        classify(outcome, &url)
    }
}

fn is_retryable(outcome: &Result<Response, reqwest::Error>) -> bool {
    match outcome {
        Err(_) => true,
        Ok(response) => response.status().is_server_error(),
    }
}

fn classify(outcome: Result<Response, reqwest::Error>, url: &str) -> Result<Response, TdarrError> {
    let response = outcome.map_err(|source| TdarrError::Connection {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status.is_server_error() {
        error!(status_code = status.as_u16(), url = %url, "Server error persisted after retries");
        return Err(TdarrError::Server {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if status.is_client_error() {
        error!(status_code = status.as_u16(), url = %url, "Received 40X status code");
        return Err(TdarrError::Client {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if status.is_redirection() {
        debug!(status_code = status.as_u16(), url = %url, "Received 30X status code");
        return Err(TdarrError::Redirect {
            url: url.to_string(),
            status: status.as_u16(),
            location: location_header(&response),
        });
    }
    if status != StatusCode::OK {
        debug!(status_code = status.as_u16(), url = %url, "Passing through non-200 response");
    }
    Ok(response)
}

fn location_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
