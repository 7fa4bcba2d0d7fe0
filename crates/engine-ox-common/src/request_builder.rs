use crate::error::{self, RequestError};
use bytes::Bytes;
use reqwest::{Method, StatusCode, header::HeaderMap};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Response headers that carry the server-side request id, in lookup order
pub const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "request-id"];

/// HTTP method for API endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// Authentication method for API requests
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
    /// API key header (e.g., api-key: <key>)
    ApiKey { header_name: String, key: String },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::ApiKey { header_name, .. } => {
                write!(f, "ApiKey {{ header_name: {header_name:?}, key: *** }}")
            }
        }
    }
}

/// Represents an API endpoint with its configuration
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    pub extra_headers: Option<HashMap<String, String>>,
    pub query_params: Option<Vec<(String, String)>>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
            extra_headers: None,
            query_params: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers = self.extra_headers.unwrap_or_default();
        headers.insert(key.into(), value.into());
        self.extra_headers = Some(headers);
        self
    }

    #[must_use]
    pub fn with_query_params(mut self, params: Vec<(String, String)>) -> Self {
        self.query_params = Some(params);
        self
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub auth: Option<AuthMethod>,
    pub default_headers: HashMap<String, String>,
    pub user_agent: Option<String>,
    /// Applied to each request, whatever the transport was built with
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            default_headers: HashMap::new(),
            user_agent: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Join the base URL and the endpoint path
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }

    /// Every header for a request, in application order: auth, defaults,
    /// endpoint-specific, user agent.
    pub fn headers_for(&self, endpoint: &Endpoint) -> Vec<(String, String)> {
        let mut headers = Vec::new();

        match &self.auth {
            Some(AuthMethod::Bearer(token)) => {
                headers.push(("authorization".to_string(), format!("Bearer {token}")));
            }
            Some(AuthMethod::ApiKey { header_name, key }) => {
                headers.push((header_name.clone(), key.clone()));
            }
            None => {}
        }

        headers.extend(
            self.default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        if let Some(extra) = &endpoint.extra_headers {
            headers.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if let Some(user_agent) = &self.user_agent {
            headers.push(("user-agent".to_string(), user_agent.clone()));
        }

        headers
    }
}

/// One part of a multipart upload
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        data: Vec<u8>,
        mime_type: Option<String>,
    },
}

/// Helper struct for building multipart forms.
///
/// Parts are kept transport-neutral so the same form can be sent through
/// the async or the blocking client.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// Create a new multipart form
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file from bytes
    #[must_use]
    pub fn file_from_bytes(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            data,
            mime_type: None,
        });
        self
    }

    /// Add a file from bytes with custom mime type
    #[must_use]
    pub fn file_from_bytes_with_mime(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            data,
            mime_type: Some(mime_type.into()),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Convert into a form for the async client
    pub fn into_async(self) -> Result<reqwest::multipart::Form, RequestError> {
        use reqwest::multipart::{Form, Part};

        let mut form = Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    data,
                    mime_type,
                } => {
                    let mut file = Part::bytes(data).file_name(filename);
                    if let Some(mime) = mime_type {
                        file = file.mime_str(&mime)?;
                    }
                    form.part(name, file)
                }
            };
        }
        Ok(form)
    }

    /// Convert into a form for the blocking client
    pub fn into_blocking(self) -> Result<reqwest::blocking::multipart::Form, RequestError> {
        use reqwest::blocking::multipart::{Form, Part};

        let mut form = Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    data,
                    mime_type,
                } => {
                    let mut file = Part::bytes(data).file_name(filename);
                    if let Some(mime) = mime_type {
                        file = file.mime_str(&mime)?;
                    }
                    form.part(name, file)
                }
            };
        }
        Ok(form)
    }
}

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

impl RequestBody {
    fn kind(&self) -> &'static str {
        match self {
            Self::Json(Value::Object(_)) => "object",
            Self::Json(_) => "json",
            Self::Multipart(_) => "multipart",
        }
    }
}

/// Status line and headers of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn from_parts(status: StatusCode, headers: &HeaderMap) -> Self {
        let request_id = REQUEST_ID_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });

        let headers = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            status,
            request_id,
            headers,
        }
    }
}

/// A fully read, successful response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub head: ResponseHead,
    pub body: Bytes,
}

impl RawResponse {
    /// Decode the body as JSON, failing with `InvalidResponse`
    pub fn json(&self) -> Result<Value, RequestError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            RequestError::InvalidResponse(
                error::ApiErrorInfo::new(format!(
                    "Invalid response body from API: {} (HTTP response code was {}; decode error: {e})",
                    String::from_utf8_lossy(&self.body),
                    self.head.status.as_u16()
                ))
                .with_status(self.head.status.as_u16())
                .with_request_id(self.head.request_id.clone()),
            )
        })
    }
}

/// Turn a fully read response into either a `RawResponse` or an API error
fn finish(head: ResponseHead, body: Bytes) -> Result<RawResponse, RequestError> {
    if head.status.is_success() {
        Ok(RawResponse { head, body })
    } else {
        Err(error::parse_error_response(
            head.status,
            head.request_id,
            &body,
        ))
    }
}

fn log_request(method: &Method, url: &str, body: Option<&RequestBody>) {
    tracing::debug!(
        %method,
        url,
        body = body.map_or("none", RequestBody::kind),
        "sending API request"
    );
}

/// Async request builder that handles the common HTTP patterns
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Build a reqwest RequestBuilder for the given endpoint
    pub fn build_request(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<reqwest::RequestBuilder, RequestError> {
        let method: Method = endpoint.method.into();
        let url = self.config.url_for(endpoint);
        log_request(&method, &url, body.as_ref());

        let mut req = self.client.request(method, &url);

        if let Some(params) = &endpoint.query_params {
            req = req.query(params);
        }

        for (key, value) in self.config.headers_for(endpoint) {
            req = req.header(key, value);
        }

        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }

        match body {
            Some(RequestBody::Json(value)) => {
                req = req.header("content-type", "application/json").json(&value);
            }
            Some(RequestBody::Multipart(form)) => {
                req = req.multipart(form.into_async()?);
            }
            None => {}
        }

        Ok(req)
    }

    /// Execute a request and read the whole body
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<RawResponse, RequestError> {
        let res = self.build_request(endpoint, body)?.send().await?;
        let head = ResponseHead::from_parts(res.status(), res.headers());
        let bytes = res.bytes().await?;
        finish(head, bytes)
    }

    /// Execute a request and hand back the open response for streaming.
    ///
    /// Non-2xx statuses are read fully and returned as errors.
    pub async fn open_stream(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<(ResponseHead, reqwest::Response), RequestError> {
        let res = self.build_request(endpoint, body)?.send().await?;
        let head = ResponseHead::from_parts(res.status(), res.headers());

        if head.status.is_success() {
            Ok((head, res))
        } else {
            let bytes = res.bytes().await?;
            Err(error::parse_error_response(
                head.status,
                head.request_id,
                &bytes,
            ))
        }
    }
}

/// Blocking request builder sharing the same request construction
#[derive(Debug, Clone)]
pub struct BlockingRequestBuilder {
    client: reqwest::blocking::Client,
    config: RequestConfig,
}

impl BlockingRequestBuilder {
    pub fn new(client: reqwest::blocking::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn build_request(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<reqwest::blocking::RequestBuilder, RequestError> {
        let method: Method = endpoint.method.into();
        let url = self.config.url_for(endpoint);
        log_request(&method, &url, body.as_ref());

        let mut req = self.client.request(method, &url);

        if let Some(params) = &endpoint.query_params {
            req = req.query(params);
        }

        for (key, value) in self.config.headers_for(endpoint) {
            req = req.header(key, value);
        }

        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }

        match body {
            Some(RequestBody::Json(value)) => {
                req = req.header("content-type", "application/json").json(&value);
            }
            Some(RequestBody::Multipart(form)) => {
                req = req.multipart(form.into_blocking()?);
            }
            None => {}
        }

        Ok(req)
    }

    pub fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<RawResponse, RequestError> {
        let res = self.build_request(endpoint, body)?.send()?;
        let head = ResponseHead::from_parts(res.status(), res.headers());
        let bytes = res.bytes()?;
        finish(head, bytes)
    }

    pub fn open_stream(
        &self,
        endpoint: &Endpoint,
        body: Option<RequestBody>,
    ) -> Result<(ResponseHead, reqwest::blocking::Response), RequestError> {
        let res = self.build_request(endpoint, body)?.send()?;
        let head = ResponseHead::from_parts(res.status(), res.headers());

        if head.status.is_success() {
            Ok((head, res))
        } else {
            let bytes = res.bytes()?;
            Err(error::parse_error_response(
                head.status,
                head.request_id,
                &bytes,
            ))
        }
    }
}
