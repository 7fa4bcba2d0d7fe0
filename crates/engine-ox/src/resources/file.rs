use bytes::Bytes;
use engine_ox_common::{HttpMethod, MultipartForm, RequestError};

use crate::client::Client;
use crate::config::RequestOptions;
use crate::object::ApiObject;
use crate::resource::{Params, ResourceDescriptor};

/// Uploaded files and their contents
#[derive(Debug, Clone, Copy)]
pub struct File<'a> {
    client: &'a Client,
}

impl<'a> File<'a> {
    pub const DESCRIPTOR: ResourceDescriptor =
        ResourceDescriptor::new("files", HttpMethod::Post).with_object_tag("file");

    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn instance(id: &str) -> ResourceDescriptor {
        Self::DESCRIPTOR.child(id, HttpMethod::Get)
    }

    fn content(id: &str) -> ResourceDescriptor {
        Self::instance(id).child("content", HttpMethod::Get)
    }

    fn upload_form(file: Vec<u8>, filename: &str, purpose: &str) -> MultipartForm {
        MultipartForm::new()
            .text("purpose", purpose)
            .file_from_bytes_with_mime("file", filename, file, "application/octet-stream")
    }

    /// Upload `file` for the given `purpose` (e.g. `fine-tune`)
    pub async fn create(
        &self,
        file: impl Into<Vec<u8>>,
        filename: &str,
        purpose: &str,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let form = Self::upload_form(file.into(), filename, purpose);
        self.client
            .request_multipart(&Self::DESCRIPTOR, form, options)
            .await
    }

    pub fn create_blocking(
        &self,
        file: impl Into<Vec<u8>>,
        filename: &str,
        purpose: &str,
        options: &RequestOptions,
    ) -> Result<ApiObject, RequestError> {
        let form = Self::upload_form(file.into(), filename, purpose);
        self.client
            .request_multipart_blocking(&Self::DESCRIPTOR, form, options)
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

    /// Raw contents of a file
    pub async fn download(&self, id: &str, options: &RequestOptions) -> Result<Bytes, RequestError> {
        self.client.request_bytes(&Self::content(id), options).await
    }

    pub fn download_blocking(&self, id: &str, options: &RequestOptions) -> Result<Bytes, RequestError> {
        self.client.request_bytes_blocking(&Self::content(id), options)
    }
}
