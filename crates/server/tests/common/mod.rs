//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock processing client injected, so the HTTP surface can be
//! exercised without a processing service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use qform_core::{
    create_authenticator, AuthMethod, Authenticator, InMemoryItemRegistry, ItemRegistry,
    ProcessingQueue, ProcessorConfig, SequentialProcessor, UploadStore,
    processor::ArtifactPolicy,
    testing::MockProcessingClient,
};

/// Re-export fixtures for test convenience
pub use qform_core::testing::fixtures;

/// Basic credentials accepted when [`TestConfig::basic_auth`] is set.
pub const TEST_USER: &str = "alice";
pub const TEST_PASSWORD: &str = "pass";
/// `Authorization` header value for alice:pass.
pub const TEST_AUTH_HEADER: &str = "Basic YWxpY2U6cGFzcw==";

const MULTIPART_BOUNDARY: &str = "qform-test-boundary";

/// Options for building a [`TestFixture`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub basic_auth: bool,
    pub processor: ProcessorConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            basic_auth: false,
            processor: ProcessorConfig::default(),
        }
    }
}

/// Test fixture for API testing with a mock processing client.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.upload("diagram.xml", b"<xml/>").await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock processing client - script outcomes per item
    pub client: MockProcessingClient,
    /// The item registry behind the router
    pub registry: Arc<InMemoryItemRegistry>,
    /// The run queue behind the router
    pub queue: Arc<ProcessingQueue>,
    /// Upload directory root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    /// Raw body, for endpoints that do not answer with JSON.
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = fixtures::config();
        config.uploads.dir = temp_dir.path().join("uploads");
        config.processor = test_config.processor;
        if test_config.basic_auth {
            config.auth.method = AuthMethod::Basic;
            config.auth.username = Some(TEST_USER.to_string());
            config.auth.password_hash = Some(fixtures::password_hash(TEST_PASSWORD));
        }

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&config.auth).expect("Failed to create authenticator"));

        let client = MockProcessingClient::new();
        let registry = Arc::new(InMemoryItemRegistry::new());
        let shared: Arc<dyn ItemRegistry> = Arc::clone(&registry) as Arc<dyn ItemRegistry>;

        let uploads = Arc::new(UploadStore::new(config.uploads.clone(), Arc::clone(&shared)));
        let processor = Arc::new(
            SequentialProcessor::new(
                Arc::clone(&shared),
                Arc::new(client.clone()),
                ArtifactPolicy::from_config(&config.processor),
            )
            .with_files(Arc::clone(&uploads)),
        );
        let queue = Arc::new(ProcessingQueue::new(
            config.processor.clone(),
            processor,
            Arc::clone(&shared),
        ));
        queue.start().await;

        let state = Arc::new(qform_server::AppState::new(
            config,
            authenticator,
            shared,
            uploads,
            Arc::clone(&queue),
        ));

        let router = qform_server::create_router(state);

        Self {
            router,
            client,
            registry,
            queue,
            temp_dir,
        }
    }

    /// Send a GET request with an `Authorization` header.
    pub async fn get_as(&self, path: &str, authorization: &str) -> TestResponse {
        let builder = Request::builder()
            .method("GET")
            .uri(path)
            .header("Authorization", authorization);
        self.send(builder, Body::empty()).await
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json");
        let body = Body::from(serde_json::to_vec(&body).expect("Failed to encode body"));
        self.send(builder, body).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("POST").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json");
        self.send(builder, Body::from(body.to_string())).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("DELETE").uri(path), Body::empty())
            .await
    }

    /// Upload a file through the multipart endpoint.
    pub async fn upload(&self, file_name: &str, contents: &[u8]) -> TestResponse {
        self.upload_field("file", file_name, contents).await
    }

    /// Upload a file under an arbitrary multipart field name.
    pub async fn upload_field(&self, field: &str, file_name: &str, contents: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/xml\r\n\r\n");
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        let builder = Request::builder()
            .method("POST")
            .uri("/api/v1/items")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            );
        self.send(builder, Body::from(body)).await
    }

    /// Upload a file and return its item id.
    pub async fn upload_ok(&self, file_name: &str) -> String {
        let response = self.upload(file_name, b"<mxfile/>").await;
        assert_eq!(response.status, StatusCode::CREATED, "upload failed: {:?}", response.body);
        response.body["id"]
            .as_str()
            .expect("upload response has no id")
            .to_string()
    }

    /// Poll the status endpoint until `count` runs have completed.
    pub async fn wait_for_runs(&self, count: u64) {
        for _ in 0..200 {
            let status = self.get("/api/v1/process/status").await;
            if status.body["runs_completed"].as_u64().unwrap_or(0) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for {} completed runs", count);
    }

    /// Send a request built by the caller.
    pub async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            text: String::from_utf8_lossy(&body_bytes).into_owned(),
        }
    }
}
