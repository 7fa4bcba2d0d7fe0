use crate::config::{RequestOptions, ResolvedCredentials};
use engine_ox_common::{Endpoint, HttpMethod, RequestConfig, RequestError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Request parameters as sent in a JSON body
pub type Params = Map<String, Value>;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("engine-ox/", env!("CARGO_PKG_VERSION"));

/// Whether a resource lives under a model/engine path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSegment {
    /// Never addressed through an engine (files, moderations, ...)
    None,
    /// `engine`/`deployment_id` puts the request under that engine
    Optional,
    /// An engine is mandatory; `model` stands in when no engine is given
    Required,
}

/// Static description of an API resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: Cow<'static, str>,
    pub method: HttpMethod,
    pub engine: EngineSegment,
    /// Explicit object-type tag for responses of this resource
    pub object_tag: Option<&'static str>,
}

impl ResourceDescriptor {
    pub const fn new(path: &'static str, method: HttpMethod) -> Self {
        Self {
            path: Cow::Borrowed(path),
            method,
            engine: EngineSegment::None,
            object_tag: None,
        }
    }

    #[must_use]
    pub const fn with_engine(mut self, engine: EngineSegment) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub const fn with_object_tag(mut self, tag: &'static str) -> Self {
        self.object_tag = Some(tag);
        self
    }

    /// Descriptor addressing `{path}/{segment}`, e.g. a single instance
    #[must_use]
    pub fn child(&self, segment: &str, method: HttpMethod) -> Self {
        Self {
            path: Cow::Owned(format!("{}/{}", self.path.trim_end_matches('/'), segment)),
            method,
            engine: self.engine,
            object_tag: self.object_tag,
        }
    }

    /// Resolve the endpoint for one call.
    ///
    /// For resources under an engine segment, `engine` and `deployment_id`
    /// are removed from `params`; they only ever travel in the URL. Other
    /// resources send them like any other parameter.
    pub fn endpoint(
        &self,
        params: &mut Params,
        credentials: &ResolvedCredentials,
        options: &RequestOptions,
    ) -> Result<Endpoint, RequestError> {
        let azure = credentials.api_type.is_azure();

        let path = match self.engine {
            EngineSegment::None => self.path.to_string(),
            segment => {
                let explicit =
                    take_string(params, "engine").or_else(|| take_string(params, "deployment_id"));
                let engine = explicit.or_else(|| {
                    (azure || segment == EngineSegment::Required)
                        .then(|| params.get("model").and_then(Value::as_str).map(str::to_string))
                        .flatten()
                });

                match (azure, engine) {
                    (true, Some(engine)) => format!("openai/deployments/{engine}/{}", self.path),
                    (true, None) => {
                        return Err(RequestError::Configuration(
                            "You must provide the deployment name in the 'engine' parameter \
                             to access the Azure OpenAI service"
                                .to_string(),
                        ));
                    }
                    (false, Some(engine)) => format!("engines/{engine}/{}", self.path),
                    (false, None) if segment == EngineSegment::Required => {
                        return Err(RequestError::Configuration(format!(
                            "Must provide an 'engine' or 'model' parameter to create a {}",
                            self.path
                        )));
                    }
                    (false, None) => self.path.to_string(),
                }
            }
        };

        let mut endpoint = Endpoint::new(path, self.method);

        if azure {
            let version = credentials.api_version.clone().ok_or_else(|| {
                RequestError::Configuration(
                    "An API version is required for the Azure API type".to_string(),
                )
            })?;
            endpoint = endpoint.with_query_params(vec![("api-version".to_string(), version)]);
        }

        if let Some(request_id) = &options.request_id {
            endpoint = endpoint.with_header("X-Request-Id", request_id);
        }

        Ok(endpoint)
    }
}

/// Transport configuration for one call
pub(crate) fn request_config(credentials: &ResolvedCredentials) -> RequestConfig {
    let mut config = RequestConfig::new(credentials.api_base.clone())
        .with_auth(credentials.auth())
        .with_user_agent(USER_AGENT);

    if let Some(organization) = &credentials.organization {
        config = config.with_header("OpenAI-Organization", organization);
    }

    if let (Some(version), false) = (&credentials.api_version, credentials.api_type.is_azure()) {
        config = config.with_header("OpenAI-Version", version);
    }

    config
}

/// Serialize caller parameters; anything but a JSON object is rejected
pub fn to_params<P: Serialize + ?Sized>(params: &P) -> Result<Params, RequestError> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(RequestError::Configuration(format!(
            "request parameters must serialize to a JSON object, got {other}"
        ))),
    }
}

fn take_string(params: &mut Params, key: &str) -> Option<String> {
    match params.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
