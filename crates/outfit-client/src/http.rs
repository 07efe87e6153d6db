//! JSON-over-HTTP client for the backend API.
//!
//! Every request carries `Content-Type: application/json` and, when the
//! session holds one, `Authorization: Bearer <token>`. Non-2xx responses and
//! transport failures are normalized into [`ApiError`] here so callers never
//! see raw `reqwest` errors. A 401 from any endpoint clears the session and
//! asks the navigator for the login route before the error is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use outfit_core::config::Config;
use outfit_core::session::{Navigator, NoopNavigator, Session, LOGIN_ROUTE};
use outfit_core::types::QueryParams;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error payload shape the backend uses for non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Cheap to clone; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: Session,
    navigator: Arc<dyn Navigator>,
    headers: HeaderMap,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            session,
            navigator: Arc::new(NoopNavigator),
            headers: HeaderMap::new(),
        }
    }

    /// Build from resolved configuration: base URL and request timeout.
    pub fn from_config(config: &Config, session: Session) -> Self {
        Self::new(config.api_url.clone(), session).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Extra header sent on every request. Overrides the JSON content type
    /// when `name` is `content-type`. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.insert(n, v);
            }
            _ => warn!(header = name, "ignoring invalid header"),
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---------------------------------------------------------------------------
    // Verbs
    // ---------------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, None).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> Result<T> {
        self.request(Method::GET, path, Some(params), None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode(body)?;
        self.request(Method::POST, path, None, Some(body)).await
    }

    /// POST without a request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::POST, path, None, None).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode(body)?;
        self.request(Method::PUT, path, None, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode(body)?;
        self.request(Method::PATCH, path, None, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, None).await
    }

    // ---------------------------------------------------------------------------
    // Core
    // ---------------------------------------------------------------------------

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Option<&QueryParams>,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let url = self.url(path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .headers(self.headers.clone());
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            req = req.query(params.pairs());
        }
        if let Some(body) = body {
            req = req.body(body);
        }

        let started = Instant::now();
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api request"
        );

        if !status.is_success() {
            let bytes = resp.bytes().await.unwrap_or_default();
            return Err(self.failure(status, &bytes));
        }

        let bytes = resp.bytes().await.map_err(transport_error)?;
        decode(path, &bytes)
    }

    /// Map a non-2xx response to an error, running the 401 side effects.
    pub(crate) fn failure(&self, status: StatusCode, body: &[u8]) -> ApiError {
        if status == StatusCode::UNAUTHORIZED {
            self.reject_session();
            return ApiError::Unauthorized;
        }
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        ApiError::Api {
            message: parsed
                .message
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            status: status.as_u16(),
            code: parsed.code,
            details: parsed.details,
        }
    }

    /// Clear the stored token and force the login route.
    pub(crate) fn reject_session(&self) {
        warn!("backend rejected credentials; signing out");
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "failed to clear stored token");
        }
        self.navigator.navigate(LOGIN_ROUTE);
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(ApiError::Encode)
}

/// Parse a success body. An empty body (204 and friends) parses as `null`.
fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(raw).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

pub(crate) fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use outfit_core::session::RecordingNavigator;
    use serde_json::{json, Value};

    fn client(server: &mockito::Server, session: Session) -> ApiClient {
        ApiClient::new(format!("{}/api", server.url()), session)
    }

    #[tokio::test]
    async fn get_sends_bearer_and_json_content_type() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer abc123")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"id":"u1","email":"a@b.co"}"#)
            .create_async()
            .await;

        let session = Session::in_memory();
        session.set_token("abc123").unwrap();
        let v: Value = client(&server, session).get("/auth/me").await.unwrap();
        assert_eq!(v["id"], "u1");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn no_authorization_header_without_token() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/products")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let v: Vec<Value> = client(&server, Session::in_memory())
            .get("/products")
            .await
            .unwrap();
        assert!(v.is_empty());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn query_params_are_encoded() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/products/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "linen shirt".into()),
                Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let params = QueryParams::new().with("q", "linen shirt").with("limit", 5);
        let _: Vec<Value> = client(&server, Session::in_memory())
            .get_with("/products/search", &params)
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/analyses")
            .match_body(Matcher::Json(json!({"imageUrl": "u", "imageId": "i"})))
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let v: Value = client(&server, Session::in_memory())
            .post("/analyses", &json!({"imageUrl": "u", "imageId": "i"}))
            .await
            .unwrap();
        assert_eq!(v["ok"], true);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn empty_body_parses_as_null() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/saved-looks/l1")
            .with_status(204)
            .create_async()
            .await;

        let v: Value = client(&server, Session::in_memory())
            .delete("/saved-looks/l1")
            .await
            .unwrap();
        assert!(v.is_null());
        client(&server, Session::in_memory())
            .delete::<()>("/saved-looks/l1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_navigates_to_login() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/analyses")
            .with_status(401)
            .with_body(r#"{"message":"expired"}"#)
            .create_async()
            .await;

        let session = Session::in_memory();
        session.set_token("stale").unwrap();
        let nav = Arc::new(RecordingNavigator::default());
        let api = client(&server, session.clone()).with_navigator(nav.clone());

        let err = api.get::<Value>("/analyses").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!session.has_token());
        assert_eq!(nav.routes(), vec!["/login"]);
    }

    #[tokio::test]
    async fn server_error_carries_message_code_and_details() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyses")
            .with_status(422)
            .with_body(r#"{"message":"Image required","code":"VALIDATION","details":{"field":"imageUrl"}}"#)
            .create_async()
            .await;

        let err = client(&server, Session::in_memory())
            .post::<Value, _>("/analyses", &json!({}))
            .await
            .unwrap_err();
        match err {
            ApiError::Api {
                message,
                status,
                code,
                details,
            } => {
                assert_eq!(message, "Image required");
                assert_eq!(status, 422);
                assert_eq!(code.as_deref(), Some("VALIDATION"));
                assert_eq!(details.unwrap()["field"], "imageUrl");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_status_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/products/p1")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let err = client(&server, Session::in_memory())
            .get::<Value>("/products/p1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502");
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn mismatched_shape_is_a_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/auth/me")
            .with_status(200)
            .with_body(r#"{"unexpected":true}"#)
            .create_async()
            .await;

        let err = client(&server, Session::in_memory())
            .get::<outfit_core::user::User>("/auth/me")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and hold the connection without answering
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let api = ApiClient::new(format!("http://{addr}/api"), Session::in_memory())
            .with_timeout(Duration::from_millis(200));
        let err = api.get::<Value>("/auth/me").await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(err.status(), Some(408));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = ApiClient::new(format!("http://{addr}/api"), Session::in_memory());
        let err = api.get::<Value>("/auth/me").await.unwrap_err();
        assert_eq!(err.status(), Some(0));
        assert_eq!(err.code(), Some("NETWORK_ERROR"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = ApiClient::new("http://h/api/", Session::in_memory());
        assert_eq!(api.url("/auth/me"), "http://h/api/auth/me");
    }
}
