// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! REST transport for Azure Resource Manager and Microsoft Graph.
//!
//! Both services share the same conventions, so one client serves both:
//!
//! - bearer-token authentication
//! - error bodies shaped as `{"error": {"code": "...", "message": "..."}}`
//! - list responses shaped as `{"value": [...], "nextLink": "..."}` (Graph spells the
//!   link `@odata.nextLink`)
//! - long-running deletes answered with `202 Accepted` plus an `Azure-AsyncOperation`
//!   or `Location` URL to poll
//!
//! Every non-2xx response becomes a [`CloudError::Api`] carrying the HTTP status, so
//! callers can classify it with [`crate::cloud_errors::classify`].

use crate::cloud_errors::CloudError;
use crate::constants::{
    HTTP_REQUEST_TIMEOUT_SECS, LRO_DEFAULT_POLL_INTERVAL_SECS, LRO_MAX_POLL_INTERVAL_SECS,
};
use reqwest::header::{HeaderMap, ACCEPT, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Header Resource Manager uses for the preferred long-running operation status URL.
const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client() -> Result<reqwest::Client, CloudError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CloudError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Error envelope returned by Resource Manager and Graph.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// One page of a list response.
#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Option<Vec<T>>,
    #[serde(rename = "nextLink", alias = "@odata.nextLink", default)]
    next_link: Option<String>,
}

/// Status body returned while polling an `Azure-AsyncOperation` URL.
#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: Option<String>,
    error: Option<ErrorBody>,
}

/// Result of a `DELETE` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The service finished the delete synchronously.
    Completed,
    /// The service accepted the delete and will finish it asynchronously.
    Accepted(PendingOperation),
}

/// A long-running operation that can be polled for completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// URL to poll, if the service provided one
    pub poll_url: Option<Url>,
    /// Delay requested by the service before the first poll
    pub retry_after: Option<Duration>,
}

/// Bearer-authenticated JSON client for one service endpoint.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    poll_interval: Duration,
}

impl RestClient {
    /// Create a client for `base` authenticating with `token`.
    #[must_use]
    pub fn new(http: reqwest::Client, base: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            base,
            token: token.into(),
            poll_interval: Duration::from_secs(LRO_DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Override the delay between long-running operation polls when the service sends no `Retry-After`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Resolve a path (with optional query) against the service endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Malformed`] if the result is not a valid URL.
    pub fn url(&self, path: &str) -> Result<Url, CloudError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| CloudError::Malformed(format!("invalid request path {path}: {e}")))
    }

    /// `GET` every item of a paged list, following next-page links until the last page.
    ///
    /// A page whose `value` is `null`, or an empty body, contributes no items.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered on any page.
    pub async fn list_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, CloudError> {
        let mut all_items = Vec::new();
        let mut page_count = 0;
        let mut next = Some(url);

        while let Some(page_url) = next.take() {
            page_count += 1;
            let (_, _, body) = self.send(Method::GET, page_url).await?;

            if body.trim().is_empty() {
                debug!(page = page_count, "Empty list response body, treating as no items");
                break;
            }

            let page: Page<T> = serde_json::from_str(&body)?;
            let items = page.value.unwrap_or_default();
            let item_count = items.len();
            all_items.extend(items);

            debug!(
                page = page_count,
                items_in_page = item_count,
                total_items = all_items.len(),
                "Fetched list page"
            );

            if let Some(link) = page.next_link.filter(|l| !l.is_empty()) {
                next = Some(self.base.join(&link).map_err(|e| {
                    CloudError::Malformed(format!("invalid next page link {link}: {e}"))
                })?);
            }
        }

        debug!(
            total_pages = page_count,
            total_items = all_items.len(),
            "Completed paginated list operation"
        );

        Ok(all_items)
    }

    /// Issue a `DELETE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service answers with a non-2xx status
    /// (including 404, which the caller is expected to classify).
    pub async fn delete(&self, url: Url) -> Result<DeleteOutcome, CloudError> {
        let (status, headers, _) = self.send(Method::DELETE, url).await?;

        if status == StatusCode::ACCEPTED {
            Ok(DeleteOutcome::Accepted(PendingOperation {
                poll_url: self.poll_url(&headers),
                retry_after: retry_after(&headers),
            }))
        } else {
            Ok(DeleteOutcome::Completed)
        }
    }

    /// Wait for a long-running operation to finish, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Timeout`] if the operation is still running after `timeout`,
    /// or the error reported by the operation or by the polling requests.
    pub async fn wait_for_completion(
        &self,
        operation: &PendingOperation,
        timeout: Duration,
    ) -> Result<(), CloudError> {
        let Some(poll_url) = operation.poll_url.clone() else {
            debug!("Accepted operation has no status URL, nothing to wait for");
            return Ok(());
        };

        match tokio::time::timeout(timeout, self.poll_until_done(poll_url, operation.retry_after))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CloudError::Timeout {
                operation: "long-running operation".to_string(),
                after: timeout,
            }),
        }
    }

    async fn poll_until_done(
        &self,
        poll_url: Url,
        first_delay: Option<Duration>,
    ) -> Result<(), CloudError> {
        let mut delay = first_delay.unwrap_or(self.poll_interval);
        let mut attempt = 0;

        loop {
            tokio::time::sleep(delay).await;
            attempt += 1;

            let (status, headers, body) = self.send(Method::GET, poll_url.clone()).await?;
            if status == StatusCode::ACCEPTED {
                delay = retry_after(&headers).unwrap_or(self.poll_interval);
                debug!(attempt = attempt, retry_after = ?delay, "Operation still in progress");
                continue;
            }

            let Ok(operation) = serde_json::from_str::<OperationStatus>(&body) else {
                // Location-style polling answers 200/204 with no status document when done
                return Ok(());
            };

            match operation.status.as_deref() {
                None | Some("Succeeded") => return Ok(()),
                Some("Failed" | "Canceled") => {
                    let (code, message) = operation
                        .error
                        .map(|e| (e.code, e.message))
                        .unwrap_or_default();
                    warn!(
                        attempt = attempt,
                        code = ?code,
                        "Long-running operation finished unsuccessfully"
                    );
                    return Err(CloudError::Api {
                        status: status.as_u16(),
                        code,
                        message: message
                            .unwrap_or_else(|| "long-running operation failed".to_string()),
                    });
                }
                Some(other) => {
                    delay = retry_after(&headers).unwrap_or(self.poll_interval);
                    debug!(attempt = attempt, state = other, "Operation still in progress");
                }
            }
        }
    }

    fn poll_url(&self, headers: &HeaderMap) -> Option<Url> {
        [AZURE_ASYNC_OPERATION, LOCATION.as_str()]
            .into_iter()
            .filter_map(|name| headers.get(name))
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| self.base.join(value).ok())
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
    ) -> Result<(StatusCode, HeaderMap, String), CloudError> {
        debug!(method = %method, url = %url, "HTTP request");

        let response = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(
                method = %method,
                url = %url,
                status = %status,
                "HTTP request failed"
            );
            return Err(error_from_response(status, &body));
        }

        debug!(
            method = %method,
            url = %url,
            status = %status,
            response_len = body.len(),
            "HTTP request successful"
        );

        Ok((status, headers, body))
    }
}

/// Decode a failed response into a [`CloudError::Api`].
///
/// Bodies that are not a service error envelope keep their raw text as the message.
#[must_use]
pub fn error_from_response(status: StatusCode, body: &str) -> CloudError {
    let decoded = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);

    match decoded {
        Some(ErrorBody { code, message }) => CloudError::Api {
            status: status.as_u16(),
            code,
            message: message.unwrap_or_else(|| status.to_string()),
        },
        None => CloudError::Api {
            status: status.as_u16(),
            code: None,
            message: if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

/// Parse a `Retry-After` header given in seconds, capped at the maximum poll interval.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(LRO_MAX_POLL_INTERVAL_SECS)))
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod rest_tests;
