//! Authenticated resource gateway.
//!
//! Builds and executes requests against the resource server. The gateway
//! attaches the bearer token and owns the reserved headers; it does not
//! interpret response statuses, that is the caller's job.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub use reqwest::Method;
use uuid::Uuid;

use crate::error::AuthKitError;
use crate::http_request::HttpClient;
use crate::AuthKitResult;

/// Opaque identifier correlating a resource request with its response
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Body encoding for resource request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterEncoding {
    /// JSON object body.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` body.
    FormUrlEncoded,
    /// Apple XML property-list body.
    PropertyList,
}

/// A request against the resource server.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// Path relative to the configured resource base URL.
    pub path: String,
    /// HTTP method.
    pub method: Method,
    /// Request parameters. Sent as the body for methods that carry one and
    /// as query parameters otherwise.
    pub params: HashMap<String, String>,
    /// Body encoding for the parameters.
    pub encoding: ParameterEncoding,
    /// Additional headers. Reserved headers (`Authorization`, `User-Agent`)
    /// are owned by the gateway and silently dropped here.
    pub headers: HashMap<String, String>,
}

impl ResourceRequest {
    /// A GET request for `path` with no parameters or extra headers.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            params: HashMap::new(),
            encoding: ParameterEncoding::default(),
            headers: HashMap::new(),
        }
    }
}

/// A response from the resource server.
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers. Multi-valued headers keep their first value.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ResourceResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

const RESERVED_HEADERS: [&str; 2] = ["authorization", "user-agent"];

/// Executes [`ResourceRequest`]s with the session's bearer token attached.
pub(crate) struct ResourceGateway {
    http: Arc<HttpClient>,
    base_url: String,
}

impl ResourceGateway {
    pub(crate) fn new(http: Arc<HttpClient>, base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub(crate) async fn execute(
        &self,
        request: &ResourceRequest,
        authorization: &str,
    ) -> AuthKitResult<ResourceResponse> {
        let url = format!(
            "{}/{}",
            self.base_url,
            request.path.trim_start_matches('/')
        );
        let mut builder = self.http.builder(request.method.clone(), &url);

        for (name, value) in &request.headers {
            if RESERVED_HEADERS
                .iter()
                .any(|reserved| name.eq_ignore_ascii_case(reserved))
            {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder.header(reqwest::header::AUTHORIZATION, authorization);

        if !request.params.is_empty() {
            builder = if body_carrying(&request.method) {
                match request.encoding {
                    ParameterEncoding::Json => builder.json(&request.params),
                    ParameterEncoding::FormUrlEncoded => builder.form(&request.params),
                    ParameterEncoding::PropertyList => builder
                        .header(reqwest::header::CONTENT_TYPE, "application/x-plist")
                        .body(encode_plist(&request.params)),
                }
            } else {
                builder.query(&request.params)
            };
        }

        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| {
                AuthKitError::Serialization(format!("response body read failed: {err}"))
            })?
            .to_vec();

        Ok(ResourceResponse {
            status,
            headers,
            body,
        })
    }
}

fn body_carrying(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD && *method != Method::DELETE
}

/// Serializes string parameters as an Apple XML property list. Keys are
/// emitted in sorted order so the output is deterministic.
fn encode_plist(params: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<_, _> = params.iter().collect();
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \
         \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n<dict>\n",
    );
    for (key, value) in sorted {
        out.push_str(&format!(
            "\t<key>{}</key>\n\t<string>{}</string>\n",
            xml_escape(key),
            xml_escape(value)
        ));
    }
    out.push_str("</dict>\n</plist>\n");
    out
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plist_output_is_sorted_and_escaped() {
        let mut params = HashMap::new();
        params.insert("beta".to_string(), "2 < 3".to_string());
        params.insert("alpha".to_string(), "a & b".to_string());

        let plist = encode_plist(&params);
        let alpha = plist.find("<key>alpha</key>").expect("alpha present");
        let beta = plist.find("<key>beta</key>").expect("beta present");
        assert!(alpha < beta);
        assert!(plist.contains("<string>a &amp; b</string>"));
        assert!(plist.contains("<string>2 &lt; 3</string>"));
    }

    #[tokio::test]
    async fn bearer_token_and_custom_headers_are_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/devices")
            .match_header("authorization", "Bearer t0ken")
            .match_header("x-trace", "abc")
            .with_status(200)
            .with_body(r#"{"devices":[]}"#)
            .create_async()
            .await;

        let gateway =
            ResourceGateway::new(Arc::new(HttpClient::new()), server.url());
        let mut request = ResourceRequest::get("/devices");
        request
            .headers
            .insert("X-Trace".to_string(), "abc".to_string());
        // Caller-supplied Authorization must lose to the session token.
        request
            .headers
            .insert("Authorization".to_string(), "Bearer forged".to_string());

        let response = gateway
            .execute(&request, "Bearer t0ken")
            .await
            .expect("request succeeds");

        mock.assert_async().await;
        assert!(response.is_success());
        assert_eq!(response.body, br#"{"devices":[]}"#);
    }

    #[tokio::test]
    async fn get_parameters_go_into_the_query_string() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::UrlEncoded(
                "q".to_string(),
                "rust".to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let gateway =
            ResourceGateway::new(Arc::new(HttpClient::new()), server.url());
        let mut request = ResourceRequest::get("search");
        request.params.insert("q".to_string(), "rust".to_string());

        gateway
            .execute(&request, "Bearer t")
            .await
            .expect("request succeeds");
        mock.assert_async().await;
    }
}
