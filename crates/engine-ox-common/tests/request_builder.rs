#[cfg(test)]
mod tests {
    use engine_ox_common::{
        RequestError,
        request_builder::{
            AuthMethod, Endpoint, FormPart, HttpMethod, MultipartForm, RequestBody,
            RequestBuilder, RequestConfig,
        },
    };
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_creation() {
        let endpoint = Endpoint::new("chat/completions", HttpMethod::Post);
        assert_eq!(endpoint.path, "chat/completions");
        assert!(matches!(endpoint.method, HttpMethod::Post));
        assert!(endpoint.extra_headers.is_none());
        assert!(endpoint.query_params.is_none());
    }

    #[test]
    fn test_endpoint_with_query_params() {
        let endpoint = Endpoint::new("openai/deployments/d1/chat/completions", HttpMethod::Post)
            .with_query_params(vec![("api-version".to_string(), "2023-05-15".to_string())]);

        let params = endpoint.query_params.as_ref().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0], ("api-version".to_string(), "2023-05-15".to_string()));
    }

    #[test]
    fn test_url_joining_trims_slashes() {
        let config = RequestConfig::new("https://api.example.com/v1/");
        let endpoint = Endpoint::new("/moderations", HttpMethod::Post);
        assert_eq!(config.url_for(&endpoint), "https://api.example.com/v1/moderations");
    }

    #[test]
    fn test_headers_order_and_auth() {
        let config = RequestConfig::new("https://api.example.com")
            .with_auth(AuthMethod::Bearer("token123".to_string()))
            .with_header("OpenAI-Organization", "org-1")
            .with_user_agent("test-client/1.0");
        let endpoint =
            Endpoint::new("models", HttpMethod::Get).with_header("X-Request-Id", "corr-1");

        let headers = config.headers_for(&endpoint);
        assert_eq!(headers[0], ("authorization".to_string(), "Bearer token123".to_string()));
        assert!(headers.contains(&("OpenAI-Organization".to_string(), "org-1".to_string())));
        assert!(headers.contains(&("X-Request-Id".to_string(), "corr-1".to_string())));
        assert_eq!(
            headers.last().unwrap(),
            &("user-agent".to_string(), "test-client/1.0".to_string())
        );
    }

    #[test]
    fn test_api_key_header_auth() {
        let config = RequestConfig::new("https://example.openai.azure.com").with_auth(
            AuthMethod::ApiKey {
                header_name: "api-key".to_string(),
                key: "key123".to_string(),
            },
        );
        let headers = config.headers_for(&Endpoint::new("x", HttpMethod::Get));
        assert_eq!(headers, vec![("api-key".to_string(), "key123".to_string())]);
    }

    #[test]
    fn test_auth_debug_is_redacted() {
        let auth = AuthMethod::Bearer("sk-secret".to_string());
        assert!(!format!("{auth:?}").contains("sk-secret"));
    }

    #[test]
    fn test_multipart_form_builder() {
        let form = MultipartForm::new()
            .text("purpose", "fine-tune")
            .file_from_bytes("file", "test.jsonl", vec![1, 2, 3])
            .file_from_bytes_with_mime("extra", "a.json", vec![4], "application/json");

        assert_eq!(form.parts().len(), 3);
        assert!(matches!(&form.parts()[0], FormPart::Text { name, .. } if name == "purpose"));
        assert!(form.clone().into_async().is_ok());
        assert!(form.into_blocking().is_ok());
    }

    #[test]
    fn test_multipart_form_rejects_bad_mime() {
        let form = MultipartForm::new().file_from_bytes_with_mime("f", "a", vec![], "not a mime");
        assert!(form.into_async().is_err());
    }

    #[test]
    fn test_http_method_conversion() {
        use reqwest::Method;

        assert_eq!(Method::from(HttpMethod::Get), Method::GET);
        assert_eq!(Method::from(HttpMethod::Post), Method::POST);
        assert_eq!(Method::from(HttpMethod::Put), Method::PUT);
        assert_eq!(Method::from(HttpMethod::Delete), Method::DELETE);
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
    }

    #[tokio::test]
    async fn test_send_json_and_read_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/echo"))
            .and(header("authorization", "Bearer test"))
            .and(query_param("api-version", "1"))
            .and(body_json(json!({"hello": "world"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "req_abc")
                    .set_body_json(json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = RequestConfig::new(format!("{}/v1", server.uri()))
            .with_auth(AuthMethod::Bearer("test".to_string()));
        let builder = RequestBuilder::new(reqwest::Client::new(), config);
        let endpoint = Endpoint::new("echo", HttpMethod::Post)
            .with_query_params(vec![("api-version".to_string(), "1".to_string())]);

        let response = builder
            .send(&endpoint, Some(RequestBody::Json(json!({"hello": "world"}))))
            .await
            .unwrap();

        assert_eq!(response.head.request_id.as_deref(), Some("req_abc"));
        assert_eq!(response.json().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_non_json_success_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let builder =
            RequestBuilder::new(reqwest::Client::new(), RequestConfig::new(server.uri()));
        let response = builder
            .send(&Endpoint::new("thing", HttpMethod::Get), None)
            .await
            .unwrap();

        assert!(matches!(response.json(), Err(RequestError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_error_status_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("request-id", "req_forbidden")
                    .set_body_json(json!({"error": {"message": "no access"}})),
            )
            .mount(&server)
            .await;

        let builder =
            RequestBuilder::new(reqwest::Client::new(), RequestConfig::new(server.uri()));
        let err = builder
            .send(&Endpoint::new("thing", HttpMethod::Get), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Permission(_)));
        assert_eq!(err.request_id(), Some("req_forbidden"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable_connection_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let builder = RequestBuilder::new(
            reqwest::Client::new(),
            RequestConfig::new("http://127.0.0.1:9"),
        );
        let err = builder
            .send(&Endpoint::new("thing", HttpMethod::Get), None)
            .await
            .unwrap_err();

        match err {
            RequestError::ApiConnection { retryable, .. } => assert!(retryable),
            other => panic!("expected connection error, got {other:?}"),
        }
    }
}
