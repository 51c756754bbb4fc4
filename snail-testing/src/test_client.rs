// In-process test client

use snail_core::{
    Application, DispatchOutcome, DispatchState, Error, HttpMethod, HttpRequest, HttpResponse,
};
use std::collections::HashMap;

/// Drives an [`Application`] without a socket.
#[derive(Clone)]
pub struct TestClient {
    app: Application,
}

impl TestClient {
    pub fn new(app: Application) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, path).body(body))
            .await
    }

    pub async fn put(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PUT, path).body(body))
            .await
    }

    pub async fn patch(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::PATCH, path).body(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::DELETE, path)).await
    }

    pub async fn send(&self, builder: TestRequestBuilder) -> TestResponse {
        self.request(builder.build()).await
    }

    pub async fn request(&self, request: HttpRequest) -> TestResponse {
        TestResponse::from(self.app.handle(request).await)
    }
}

/// Builder for test requests
pub struct TestRequestBuilder {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    query: Vec<(String, String)>,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body plus a matching content type.
    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(self.header("Content-Type", "application/json"))
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpRequest {
        let target = if self.query.is_empty() {
            self.path
        } else {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
                .collect();
            let separator = if self.path.contains('?') { '&' } else { '?' };
            format!("{}{}{}", self.path, separator, pairs.join("&"))
        };

        let mut request = HttpRequest::new(self.method, &target);
        for (key, value) in &self.headers {
            request = request.with_header(key, value);
        }
        request.with_body(self.body)
    }
}

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Response from a test request, with the dispatcher's terminal state.
#[derive(Debug, Clone)]
pub struct TestResponse {
    response: HttpResponse,
    state: DispatchState,
}

impl From<DispatchOutcome> for TestResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        Self {
            response: outcome.response,
            state: outcome.state,
        }
    }
}

impl TestResponse {
    pub fn new(response: HttpResponse, state: DispatchState) -> Self {
        Self { response, state }
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_errored(&self) -> bool {
        self.state == DispatchState::Errored
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.response.headers
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.response.header(key)
    }

    pub fn body(&self) -> &[u8] {
        &self.response.body
    }

    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.response.body.clone()).ok()
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_slice(&self.response.body).map_err(|e| format!("Serialization error: {}", e))
    }
}
