use engine_ox_common::{HttpMethod, RequestError};

use crate::client::Client;
use crate::config::RequestOptions;
use crate::object::ApiObject;
use crate::resource::{Params, ResourceDescriptor};

/// Fine-tune job records
#[derive(Debug, Clone, Copy)]
pub struct FineTune<'a> {
    client: &'a Client,
}

impl<'a> FineTune<'a> {
    /// Collection endpoint; list envelopes are typed from their own `object` field
    pub const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor::new("fine-tunes", HttpMethod::Get);

    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn instance(id: &str) -> ResourceDescriptor {
        Self::DESCRIPTOR
            .child(id, HttpMethod::Get)
            .with_object_tag("fine-tune")
    }

    pub async fn retrieve(&self, id: &str, options: &RequestOptions) -> Result<ApiObject, RequestError> {
        self.client
            .request(&Self::instance(id), Params::new(), options)
            .await
    }

    pub fn retrieve_blocking(&self, id: &str, options: &RequestOptions) -> Result<ApiObject, RequestError> {
        self.client
            .request_blocking(&Self::instance(id), Params::new(), options)
    }

    pub async fn list(&self, options: &RequestOptions) -> Result<ApiObject, RequestError> {
        self.client
            .request(&Self::DESCRIPTOR, Params::new(), options)
            .await
    }

    pub fn list_blocking(&self, options: &RequestOptions) -> Result<ApiObject, RequestError> {
        self.client
            .request_blocking(&Self::DESCRIPTOR, Params::new(), options)
    }
}
