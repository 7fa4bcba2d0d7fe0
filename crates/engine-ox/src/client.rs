use bytes::Bytes;
use engine_ox_common::{
    BlockingRequestBuilder, Endpoint, HttpMethod, MultipartForm, RawResponse, RequestBody,
    RequestBuilder, RequestError, SseParser,
};
use serde_json::Value;
use std::io::BufReader;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::{Credentials, RequestOptions, ResolvedCredentials};
use crate::object::{ApiObject, TransportMeta};
use crate::resource::{self, Params, ResourceDescriptor};
use crate::resources::{ChatCompletion, FineTune, File, Moderation};
use crate::retry::DEFAULT_WARMUP_INTERVAL;
use crate::stream::{self, BlockingObjectStream, ObjectStream};

/// Default transport timeout applied to every request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Resource request dispatcher.
///
/// Turns a [`ResourceDescriptor`] plus caller parameters into one HTTP
/// exchange and materializes the answer as [`ApiObject`]s. Every operation
/// comes in an async and a blocking flavor with identical semantics; the
/// blocking transport is created on first use.
#[derive(Debug, Clone)]
pub struct Client {
    credentials: Credentials,
    http: reqwest::Client,
    blocking_http: Arc<OnceLock<reqwest::blocking::Client>>,
    warmup_interval: Duration,
    request_timeout: Duration,
}

/// Everything needed to send one request
struct Prepared {
    credentials: ResolvedCredentials,
    endpoint: Endpoint,
    body: Option<RequestBody>,
}

impl Client {
    /// Create a client for the public API with the given key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credentials(Credentials::builder().api_key(api_key.into()).build())
    }

    /// Create a client configured from the `OPENAI_*` environment variables
    pub fn from_env() -> Result<Self, RequestError> {
        Ok(Self::with_credentials(Credentials::from_env()?))
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to configure HTTP client, using defaults");
                reqwest::Client::default()
            });

        Self {
            credentials,
            http,
            blocking_http: Arc::new(OnceLock::new()),
            warmup_interval: DEFAULT_WARMUP_INTERVAL,
            request_timeout: HTTP_TIMEOUT,
        }
    }

    /// Use a preconfigured async transport
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Use a preconfigured blocking transport
    #[must_use]
    pub fn with_blocking_http_client(mut self, http: reqwest::blocking::Client) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(http);
        self.blocking_http = Arc::new(cell);
        self
    }

    /// Pause between attempts while a model warms up
    #[must_use]
    pub fn with_warmup_interval(mut self, interval: Duration) -> Self {
        self.warmup_interval = interval;
        self
    }

    /// Upper bound for one HTTP exchange, including reading the body
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn warmup_interval(&self) -> Duration {
        self.warmup_interval
    }

    pub fn chat_completions(&self) -> ChatCompletion<'_> {
        ChatCompletion::new(self)
    }

    pub fn moderations(&self) -> Moderation<'_> {
        Moderation::new(self)
    }

    pub fn fine_tunes(&self) -> FineTune<'_> {
        FineTune::new(self)
    }

    pub fn files(&self) -> File<'_> {
        File::new(self)
    }

    fn blocking_http(&self) -> reqwest::blocking::Client {
        self.blocking_http
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(HTTP_TIMEOUT)
                    .build()
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "failed to configure blocking HTTP client, using defaults");
                        reqwest::blocking::Client::default()
                    })
            })
            .clone()
    }

    fn prepare(
        &self,
        descriptor: &ResourceDescriptor,
        mut params: Params,
        options: &RequestOptions,
    ) -> Result<Prepared, RequestError> {
        let credentials = self.credentials.resolve(options)?;
        let mut endpoint = descriptor.endpoint(&mut params, &credentials, options)?;

        let body = match descriptor.method {
            HttpMethod::Get | HttpMethod::Delete => {
                if !params.is_empty() {
                    let mut query = endpoint.query_params.take().unwrap_or_default();
                    query.extend(params.into_iter().filter_map(|(key, value)| match value {
                        Value::Null => None,
                        Value::String(s) => Some((key, s)),
                        other => Some((key, other.to_string())),
                    }));
                    endpoint = endpoint.with_query_params(query);
                }
                None
            }
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                Some(RequestBody::Json(Value::Object(params)))
            }
        };

        Ok(Prepared {
            credentials,
            endpoint,
            body,
        })
    }

    fn async_transport(&self, credentials: &ResolvedCredentials) -> RequestBuilder {
        RequestBuilder::new(
            self.http.clone(),
            resource::request_config(credentials).with_timeout(self.request_timeout),
        )
    }

    fn blocking_transport(&self, credentials: &ResolvedCredentials) -> BlockingRequestBuilder {
        BlockingRequestBuilder::new(
            self.blocking_http(),
            resource::request_config(credentials).with_timeout(self.request_timeout),
        )
    }

    /// Send one request and materialize the JSON answer.
    ///
    /// `"stream": true` is rejected; streamed answers go through
    /// [`Client::request_stream`].
    pub async fn request(
        &self,
        descriptor: &ResourceDescriptor,
        params: Params,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        reject_stream_flag(&params)?;
        let prepared = self.prepare(descriptor, params, options)?;
        let raw = self
            .async_transport(&prepared.credentials)
            .send(&prepared.endpoint, prepared.body)
            .await?;
        materialize(descriptor, &prepared.credentials, &raw)
    }

    /// Blocking flavor of [`Client::request`]
    pub fn request_blocking(
        &self,
        descriptor: &ResourceDescriptor,
        params: Params,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        reject_stream_flag(&params)?;
        let prepared = self.prepare(descriptor, params, options)?;
        let raw = self
            .blocking_transport(&prepared.credentials)
            .send(&prepared.endpoint, prepared.body)?;
        materialize(descriptor, &prepared.credentials, &raw)
    }

    /// Open a streaming request.
    ///
    /// The exchange is opened before this returns, so status errors surface
    /// here; the events themselves are pulled lazily from the stream.
    pub async fn request_stream(
        &self,
        descriptor: &ResourceDescriptor,
        mut params: Params,
        options: &RequestOptions,
    ) -> Result<ObjectStream, RequestError> {
        params.insert("stream".to_string(), Value::Bool(true));
        let prepared = self.prepare(descriptor, params, options)?;
        let (head, response) = self
            .async_transport(&prepared.credentials)
            .open_stream(&prepared.endpoint, prepared.body)
            .await?;

        let meta = Arc::new(TransportMeta::from_exchange(&prepared.credentials, &head));
        Ok(stream::object_stream(
            SseParser::new(response),
            descriptor.object_tag,
            meta,
        ))
    }

    /// Blocking flavor of [`Client::request_stream`]
    pub fn request_stream_blocking(
        &self,
        descriptor: &ResourceDescriptor,
        mut params: Params,
        options: &RequestOptions,
    ) -> Result<BlockingObjectStream, RequestError> {
        params.insert("stream".to_string(), Value::Bool(true));
        let prepared = self.prepare(descriptor, params, options)?;
        let (head, response) = self
            .blocking_transport(&prepared.credentials)
            .open_stream(&prepared.endpoint, prepared.body)?;

        let meta = Arc::new(TransportMeta::from_exchange(&prepared.credentials, &head));
        Ok(BlockingObjectStream::new(
            BufReader::new(response),
            descriptor.object_tag,
            meta,
        ))
    }

    /// Send a request whose answer is raw content rather than JSON
    pub async fn request_bytes(
        &self,
        descriptor: &ResourceDescriptor,
        options: &RequestOptions,
    ) -> Result<Bytes, RequestError> {
        let prepared = self.prepare(descriptor, Params::new(), options)?;
        let raw = self
            .async_transport(&prepared.credentials)
            .send(&prepared.endpoint, prepared.body)
            .await?;
        Ok(raw.body)
    }

    pub fn request_bytes_blocking(
        &self,
        descriptor: &ResourceDescriptor,
        options: &RequestOptions,
    ) -> Result<Bytes, RequestError> {
        let prepared = self.prepare(descriptor, Params::new(), options)?;
        let raw = self
            .blocking_transport(&prepared.credentials)
            .send(&prepared.endpoint, prepared.body)?;
        Ok(raw.body)
    }

    /// Send a multipart upload and materialize the JSON answer
    pub async fn request_multipart(
        &self,
        descriptor: &ResourceDescriptor,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let prepared = self.prepare(descriptor, Params::new(), options)?;
        let raw = self
            .async_transport(&prepared.credentials)
            .send(&prepared.endpoint, Some(RequestBody::Multipart(form)))
            .await?;
        materialize(descriptor, &prepared.credentials, &raw)
    }

    pub fn request_multipart_blocking(
        &self,
        descriptor: &ResourceDescriptor,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let prepared = self.prepare(descriptor, Params::new(), options)?;
        let raw = self
            .blocking_transport(&prepared.credentials)
            .send(&prepared.endpoint, Some(RequestBody::Multipart(form)))?;
        materialize(descriptor, &prepared.credentials, &raw)
    }
}

fn reject_stream_flag(params: &Params) -> Result<(), RequestError> {
    if params.get("stream").and_then(Value::as_bool) == Some(true) {
        return Err(RequestError::Configuration(
            "'stream: true' needs a streaming call such as create_stream".to_string(),
        ));
    }
    Ok(())
}

fn materialize(
    descriptor: &ResourceDescriptor,
    credentials: &ResolvedCredentials,
    raw: &RawResponse,
) -> Result<ApiObject, RequestError> {
    let value = raw.json()?;
    let meta = Arc::new(TransportMeta::from_exchange(credentials, &raw.head));

    ApiObject::from_json(value, descriptor.object_tag, meta).ok_or_else(|| {
        RequestError::InvalidResponse(
            engine_ox_common::ApiErrorInfo::new(format!(
                "Expected a JSON object from {}, got: {}",
                descriptor.path,
                String::from_utf8_lossy(&raw.body)
            ))
            .with_status(raw.head.status.as_u16())
            .with_request_id(raw.head.request_id.clone()),
        )
    })
}
