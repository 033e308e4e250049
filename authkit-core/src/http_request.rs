//! HTTP transport wrapper.
//!
//! Applies the SDK timeout and User-Agent and retries transient failures
//! (timeouts, connection errors, 429/5xx responses) with bounded exponential
//! backoff. Everything else, including auth-relevant 4xx statuses, is handed
//! back to the caller untouched.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::NetworkError;

pub(crate) const USER_AGENT: &str =
    concat!("authkit-core/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TRANSIENT_RETRIES: usize = 2;

/// A reqwest client with SDK defaults applied.
pub(crate) struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Creates a request builder with timeout and User-Agent applied.
    pub(crate) fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Responses with non-retryable statuses (anything below 500 except 429)
    /// are returned as `Ok` for the caller to interpret.
    pub(crate) async fn send(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, NetworkError> {
        let Some(template) = request_builder.try_clone() else {
            // Streaming bodies cannot be retried.
            return execute(request_builder).await.map_err(Attempt::into_error);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(MAX_TRANSIENT_RETRIES);

        (|| async {
            let builder = template.try_clone().ok_or_else(|| Attempt {
                error: NetworkError::Unreachable {
                    url: "<unknown>".to_string(),
                    reason: "request template is not cloneable".to_string(),
                },
                retryable: false,
            })?;
            execute(builder).await
        })
        .retry(backoff)
        .when(Attempt::is_retryable)
        .await
        .map_err(Attempt::into_error)
    }
}

struct Attempt {
    error: NetworkError,
    retryable: bool,
}

impl Attempt {
    fn retryable(error: NetworkError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn permanent(error: NetworkError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn into_error(self) -> NetworkError {
        self.error
    }
}

async fn execute(request_builder: RequestBuilder) -> Result<Response, Attempt> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        Attempt::permanent(NetworkError::Unreachable {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            reason: format!("request build failed: {err}"),
        })
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(Attempt::retryable(NetworkError::ServerError {
                    url,
                    status,
                }));
            }
            Ok(response)
        }
        Err(err) if err.is_timeout() => {
            Err(Attempt::retryable(NetworkError::Timeout { url }))
        }
        Err(err) if err.is_connect() => {
            Err(Attempt::retryable(NetworkError::Unreachable {
                url,
                reason: err.to_string(),
            }))
        }
        Err(err) => Err(Attempt::permanent(NetworkError::Unreachable {
            url,
            reason: err.to_string(),
        })),
    }
}
