use bon::Builder;
use engine_ox_common::{ApiErrorInfo, AuthMethod, RequestError};
use std::time::Duration;
use strum::{Display, EnumString};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Api version used for Azure deployments when none is configured
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

/// Flavor of the API behind the base URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ApiType {
    #[default]
    #[strum(serialize = "open_ai", serialize = "openai")]
    OpenAi,

    #[strum(serialize = "azure")]
    Azure,

    #[strum(serialize = "azure_ad", serialize = "azuread")]
    AzureAd,
}

impl ApiType {
    pub fn is_azure(self) -> bool {
        matches!(self, ApiType::Azure | ApiType::AzureAd)
    }
}

/// Default credentials and endpoint settings for a [`crate::Client`]
#[derive(Clone, Builder)]
pub struct Credentials {
    #[builder(into)]
    pub api_key: Option<String>,

    #[builder(default = DEFAULT_API_BASE.to_string(), into)]
    pub api_base: String,

    #[builder(default)]
    pub api_type: ApiType,

    #[builder(into)]
    pub api_version: Option<String>,

    #[builder(into)]
    pub organization: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_base", &self.api_base)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("organization", &self.organization)
            .finish()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Credentials {
    /// Read credentials from `OPENAI_API_KEY`, `OPENAI_API_BASE`,
    /// `OPENAI_API_TYPE`, `OPENAI_API_VERSION` and `OPENAI_ORGANIZATION`.
    pub fn from_env() -> Result<Self, RequestError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let api_type = match var("OPENAI_API_TYPE") {
            Some(raw) => raw.parse::<ApiType>().map_err(|_| {
                RequestError::Configuration(format!(
                    "The API type provided is invalid: {raw}. Please select one of the supported API types: 'azure', 'azure_ad', 'open_ai'"
                ))
            })?,
            None => ApiType::default(),
        };

        Ok(Self {
            api_key: var("OPENAI_API_KEY"),
            api_base: var("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_type,
            api_version: var("OPENAI_API_VERSION"),
            organization: var("OPENAI_ORGANIZATION"),
        })
    }

    /// Apply per-call overrides on top of these defaults
    pub fn resolve(&self, options: &RequestOptions) -> Result<ResolvedCredentials, RequestError> {
        let api_type = options.api_type.unwrap_or(self.api_type);

        let api_key = options
            .api_key
            .clone()
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                RequestError::Authentication(ApiErrorInfo::new(
                    "No API key provided. You can set your API key in code with \
                     `Credentials::builder().api_key(..)`, or set the OPENAI_API_KEY \
                     environment variable.",
                ))
            })?;

        let api_version = options
            .api_version
            .clone()
            .or_else(|| self.api_version.clone())
            .or_else(|| api_type.is_azure().then(|| DEFAULT_AZURE_API_VERSION.to_string()));

        Ok(ResolvedCredentials {
            api_key,
            api_base: options
                .api_base
                .clone()
                .unwrap_or_else(|| self.api_base.clone()),
            api_type,
            api_version,
            organization: options
                .organization
                .clone()
                .or_else(|| self.organization.clone()),
        })
    }
}

/// Per-call overrides.
///
/// `timeout` bounds the total time spent waiting for a cold model and is
/// only consulted by facades that retry on warmup.
#[derive(Debug, Clone, Default, Builder)]
pub struct RequestOptions {
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(into)]
    pub api_base: Option<String>,
    pub api_type: Option<ApiType>,
    #[builder(into)]
    pub api_version: Option<String>,
    #[builder(into)]
    pub organization: Option<String>,
    /// Correlation id sent as `X-Request-Id`
    #[builder(into)]
    pub request_id: Option<String>,
    pub timeout: Option<Duration>,
}

/// Credentials after overrides were applied, as used for one request
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub api_key: String,
    pub api_base: String,
    pub api_type: ApiType,
    pub api_version: Option<String>,
    pub organization: Option<String>,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("api_key", &"***")
            .field("api_base", &self.api_base)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("organization", &self.organization)
            .finish()
    }
}

impl ResolvedCredentials {
    pub fn auth(&self) -> AuthMethod {
        match self.api_type {
            ApiType::Azure => AuthMethod::ApiKey {
                header_name: "api-key".to_string(),
                key: self.api_key.clone(),
            },
            ApiType::OpenAi | ApiType::AzureAd => AuthMethod::Bearer(self.api_key.clone()),
        }
    }
}
