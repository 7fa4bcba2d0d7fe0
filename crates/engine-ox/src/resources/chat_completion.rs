use engine_ox_common::{HttpMethod, RequestError};
use serde::Serialize;

use crate::client::Client;
use crate::config::RequestOptions;
use crate::object::ApiObject;
use crate::resource::{EngineSegment, ResourceDescriptor, to_params};
use crate::retry::WarmupRetry;
use crate::stream::{BlockingObjectStream, ObjectStream};

/// Chat completions.
///
/// Every call retries while the model is warming up, bounded by
/// [`RequestOptions::timeout`] when set.
#[derive(Debug, Clone, Copy)]
pub struct ChatCompletion<'a> {
    client: &'a Client,
}

impl<'a> ChatCompletion<'a> {
    pub const DESCRIPTOR: ResourceDescriptor =
        ResourceDescriptor::new("chat/completions", HttpMethod::Post)
            .with_engine(EngineSegment::Optional);

    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn retry(&self, options: &RequestOptions) -> WarmupRetry {
        WarmupRetry::new(options.timeout).with_interval(self.client.warmup_interval())
    }

    /// Create a completion from arbitrary request parameters.
    ///
    /// Parameters are sent as given; `engine`/`deployment_id` select the
    /// engine path segment instead of being sent. `"stream": true` fails
    /// with a configuration error, use [`ChatCompletion::create_stream`].
    pub async fn create<P>(&self, params: &P, options: &RequestOptions) -> Result<ApiObject, RequestError>
    where
        P: Serialize + ?Sized,
    {
        let params = to_params(params)?;
        let descriptor = Self::DESCRIPTOR;
        let client = self.client;

        self.retry(options)
            .run(|| client.request(&descriptor, params.clone(), options))
            .await
    }

    pub fn create_blocking<P>(&self, params: &P, options: &RequestOptions) -> Result<ApiObject, RequestError>
    where
        P: Serialize + ?Sized,
    {
        let params = to_params(params)?;
        let descriptor = Self::DESCRIPTOR;

        self.retry(options)
            .run_blocking(|| self.client.request_blocking(&descriptor, params.clone(), options))
    }

    /// Stream completion chunks.
    ///
    /// Warmup retries cover opening the stream; once events flow, errors
    /// are reported through the stream.
    pub async fn create_stream<P>(&self, params: &P, options: &RequestOptions) -> Result<ObjectStream, RequestError>
    where
        P: Serialize + ?Sized,
    {
        let params = to_params(params)?;
        let descriptor = Self::DESCRIPTOR;
        let client = self.client;

        self.retry(options)
            .run(|| client.request_stream(&descriptor, params.clone(), options))
            .await
    }

    pub fn create_stream_blocking<P>(
        &self,
        params: &P,
        options: &RequestOptions,
    ) -> Result<BlockingObjectStream, RequestError>
    where
        P: Serialize + ?Sized,
    {
        let params = to_params(params)?;
        let descriptor = Self::DESCRIPTOR;

        self.retry(options).run_blocking(|| {
            self.client
                .request_stream_blocking(&descriptor, params.clone(), options)
        })
    }
}
