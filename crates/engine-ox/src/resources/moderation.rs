use engine_ox_common::{HttpMethod, RequestError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use crate::client::Client;
use crate::config::RequestOptions;
use crate::object::ApiObject;
use crate::resource::{Params, ResourceDescriptor};

/// Moderation models accepted by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ModerationModel {
    #[strum(serialize = "text-moderation-stable")]
    Stable,
    #[default]
    #[strum(serialize = "text-moderation-latest")]
    Latest,
}

/// Input for moderation (can be string or array of strings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModerationInput {
    Single(String),
    Multiple(Vec<String>),
}

impl From<&str> for ModerationInput {
    fn from(value: &str) -> Self {
        ModerationInput::Single(value.to_string())
    }
}

impl From<String> for ModerationInput {
    fn from(value: String) -> Self {
        ModerationInput::Single(value)
    }
}

impl From<Vec<String>> for ModerationInput {
    fn from(value: Vec<String>) -> Self {
        ModerationInput::Multiple(value)
    }
}

impl From<Vec<&str>> for ModerationInput {
    fn from(value: Vec<&str>) -> Self {
        ModerationInput::Multiple(value.into_iter().map(str::to_string).collect())
    }
}

/// Content moderation.
///
/// Not retried on warmup; a "try again" answer is returned to the caller.
#[derive(Debug, Clone, Copy)]
pub struct Moderation<'a> {
    client: &'a Client,
}

impl<'a> Moderation<'a> {
    pub const DESCRIPTOR: ResourceDescriptor =
        ResourceDescriptor::new("moderations", HttpMethod::Post).with_object_tag("moderation");

    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Check `model` and build the request parameters without touching the network
    fn params(input: ModerationInput, model: Option<&str>) -> Result<Params, RequestError> {
        let mut params = Params::new();
        params.insert("input".to_string(), serde_json::to_value(input)?);

        if let Some(model) = model {
            let model: ModerationModel = model.parse().map_err(|_| {
                RequestError::Configuration(format!(
                    "The parameter model should be chosen from {:?} and it is default to be None.",
                    [ModerationModel::Stable.as_ref(), ModerationModel::Latest.as_ref()]
                ))
            })?;
            params.insert("model".to_string(), Value::String(model.to_string()));
        }

        Ok(params)
    }

    pub async fn create(
        &self,
        input: impl Into<ModerationInput>,
        model: Option<&str>,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let params = Self::params(input.into(), model)?;
        self.client.request(&Self::DESCRIPTOR, params, options).await
    }

    pub fn create_blocking(
        &self,
        input: impl Into<ModerationInput>,
        model: Option<&str>,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let params = Self::params(input.into(), model)?;
        self.client.request_blocking(&Self::DESCRIPTOR, params, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_names() {
        assert_eq!(ModerationModel::Stable.to_string(), "text-moderation-stable");
        assert_eq!(
            "text-moderation-latest".parse::<ModerationModel>().unwrap(),
            ModerationModel::Latest
        );
        assert!("not-a-real-model".parse::<ModerationModel>().is_err());
    }

    #[test]
    fn test_params_validate_model() {
        let params = Moderation::params("hello".into(), Some("text-moderation-stable")).unwrap();
        assert_eq!(params["input"], "hello");
        assert_eq!(params["model"], "text-moderation-stable");

        let without_model = Moderation::params(vec!["a", "b"].into(), None).unwrap();
        assert_eq!(without_model["input"], json!(["a", "b"]));
        assert!(!without_model.contains_key("model"));

        let err = Moderation::params("hello".into(), Some("not-a-real-model")).unwrap_err();
        assert!(matches!(err, RequestError::Configuration(_)));
    }
}
