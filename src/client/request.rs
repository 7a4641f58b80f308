//! Authenticated JSON client for the Tdarr API.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::transport::{RetryTransport, RoundTrip};
use crate::error::TdarrError;

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Issues GET/POST calls relative to a base URL and decodes JSON responses.
pub struct RequestClient<T = reqwest::Client> {
    transport: RetryTransport<T>,
    base_url: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl RequestClient<reqwest::Client> {
    /// Builds the production client: redirects are never followed and
    /// certificate verification follows `verify_ssl`.
    pub fn build(
        base_url: Url,
        api_key: Option<String>,
        verify_ssl: bool,
        timeout: Duration,
        backoff: Vec<Duration>,
    ) -> Result<Self, TdarrError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!verify_ssl)
            .timeout(timeout)
            .build()
            .map_err(TdarrError::ClientBuild)?;
        Ok(Self::new(
            RetryTransport::with_backoff(http, backoff),
            base_url,
            api_key,
            timeout,
        ))
    }
}

impl<T: RoundTrip> RequestClient<T> {
    pub fn new(
        transport: RetryTransport<T>,
        base_url: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
            timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET path?query` decoded into `R`.
    pub async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, TdarrError> {
        let mut url = self.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(url = %url, "Sending GET request");

        let request = self.request(Method::GET, url);
        self.send(request).await
    }

    /// `POST path` with `payload` as the JSON body, decoded into `R`.
    pub async fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<R, TdarrError> {
        let url = self.join(path)?;
        let body = serde_json::to_vec(payload).map_err(TdarrError::Encode)?;
        debug!(url = %url, payload = %String::from_utf8_lossy(&body), "Sending POST request");

        let mut request = self.request(Method::POST, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(body.into());
        self.send(request).await
    }

    /// Appends `path` to the base path, keeping the base query string.
    fn join(&self, path: &str) -> Result<Url, TdarrError> {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        if url.cannot_be_a_base() {
            return Err(TdarrError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> Request {
        let mut request = Request::new(method, url);
        *request.timeout_mut() = Some(self.timeout);
        if let Some(key) = &self.api_key {
            match HeaderValue::from_str(key) {
                Ok(value) => {
                    request.headers_mut().insert(API_KEY_HEADER, value);
                }
                Err(e) => error!(error = %e, "API key is not a valid header value, sending without it"),
            }
        }
        request
    }

    async fn send<R: DeserializeOwned>(&self, request: Request) -> Result<R, TdarrError> {
        let url = request.url().to_string();
        let response = self.transport.round_trip(request).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TdarrError::Connection {
                url: url.clone(),
                source,
            })?;

        debug!(url = %url, status_code = status.as_u16(), bytes = bytes.len(), "Received response");

        serde_json::from_slice(&bytes).map_err(|source| {
            error!(url = %url, error = %source, "Failed to decode response body");
            debug!(url = %url, body = %String::from_utf8_lossy(&bytes), "Undecodable response body");
            TdarrError::Decode { url, source }
        })
    }
}
