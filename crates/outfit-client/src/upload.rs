//! Image upload with progress reporting and cancellation.
//!
//! The file is sent as the `file` field of a multipart body. Its bytes are
//! streamed in chunks so progress can be observed as they are handed to the
//! transport; each distinct percentage is reported once.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use outfit_core::commerce::UploadDescriptor;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::http::{transport_error, ApiClient, ErrorBody};
use crate::Result;

const UPLOAD_PATH: &str = "/upload";
const FALLBACK_MIME: &str = "application/octet-stream";
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Progress callback, invoked with a percentage in `0.0..=100.0`.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

// ---------------------------------------------------------------------------
// UploadFile
// ---------------------------------------------------------------------------

/// An in-memory image ready to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    filename: String,
    mime_type: String,
    data: Bytes,
}

impl UploadFile {
    /// Read `path` from disk, guessing the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(filename, data))
    }

    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        UploadFile {
            filename,
            mime_type,
            data: data.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Turns byte counts into percentages, suppressing repeats.
pub(crate) struct ProgressTracker {
    total: u64,
    sent: u64,
    last: Option<f64>,
    callback: Option<ProgressFn>,
}

impl ProgressTracker {
    pub(crate) fn new(total: u64, callback: Option<ProgressFn>) -> Self {
        ProgressTracker {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    /// Record `n` more bytes sent. Nothing is reported while the total is
    /// unknown (zero).
    pub(crate) fn advance(&mut self, n: u64) {
        self.sent = self.sent.saturating_add(n).min(self.total);
        if self.total == 0 {
            return;
        }
        let pct = self.sent as f64 * 100.0 / self.total as f64;
        if self.last == Some(pct) {
            return;
        }
        self.last = Some(pct);
        if let Some(cb) = &self.callback {
            cb(pct);
        }
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

impl ApiClient {
    /// Upload `file` to `POST /upload`.
    ///
    /// `progress` receives each distinct completion percentage. Cancelling
    /// `cancel` aborts the transfer with [`ApiError::Cancelled`].
    pub async fn upload(
        &self,
        file: UploadFile,
        progress: Option<ProgressFn>,
        cancel: Option<CancellationToken>,
    ) -> Result<UploadDescriptor> {
        self.upload_chunked(file, progress, cancel, DEFAULT_CHUNK_SIZE)
            .await
    }

    pub(crate) async fn upload_chunked(
        &self,
        file: UploadFile,
        progress: Option<ProgressFn>,
        cancel: Option<CancellationToken>,
        chunk_size: usize,
    ) -> Result<UploadDescriptor> {
        let cancel = cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let filename = file.filename.clone();
        let size = file.len();
        let form = Form::new().part("file", file_part(file, progress, chunk_size)?);

        let mut req = self.http().post(self.url(UPLOAD_PATH)).multipart(form);
        if let Some(token) = self.session().token() {
            req = req.bearer_auth(token);
        }

        debug!(filename = %filename, size, "upload started");
        let exchange = async {
            let resp = req.send().await.map_err(upload_transport_error)?;
            let status = resp.status();
            let text = resp.text().await.map_err(upload_transport_error)?;
            Ok::<_, ApiError>((status, text))
        };
        let (status, text) = tokio::select! {
            res = exchange => res?,
            _ = cancel.cancelled() => {
                warn!(filename = %filename, "upload cancelled");
                return Err(ApiError::Cancelled);
            }
        };

        if !status.is_success() {
            return Err(self.upload_failure(status, &text));
        }
        let descriptor: UploadDescriptor =
            serde_json::from_str(&text).map_err(|_| ApiError::UploadFormat)?;
        info!(id = %descriptor.id, filename = %filename, "upload complete");
        Ok(descriptor)
    }

    fn upload_failure(&self, status: StatusCode, text: &str) -> ApiError {
        if status == StatusCode::UNAUTHORIZED {
            self.reject_session();
            return ApiError::Unauthorized;
        }
        let fallback = format!("upload failed: {}", status.as_u16());
        let (message, code, details) = match serde_json::from_str::<ErrorBody>(text) {
            Ok(body) => (body.message.unwrap_or(fallback), body.code, body.details),
            Err(_) => (fallback, None, None),
        };
        ApiError::Api {
            message,
            status: status.as_u16(),
            code,
            details,
        }
    }
}

fn file_part(file: UploadFile, progress: Option<ProgressFn>, chunk_size: usize) -> Result<Part> {
    let total = file.len();
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<Bytes> = (0..file.data.len())
        .step_by(chunk_size)
        .map(|start| {
            let end = (start + chunk_size).min(file.data.len());
            file.data.slice(start..end)
        })
        .collect();

    let mut tracker = ProgressTracker::new(total, progress);
    let body = stream::iter(chunks).map(move |chunk| {
        tracker.advance(chunk.len() as u64);
        Ok::<Bytes, std::io::Error>(chunk)
    });

    let mime = if file.mime_type.parse::<mime_guess::Mime>().is_ok() {
        file.mime_type
    } else {
        FALLBACK_MIME.to_string()
    };
    Part::stream_with_length(Body::wrap_stream(body), total)
        .file_name(file.filename)
        .mime_str(&mime)
        .map_err(|e| ApiError::network(e.to_string()))
}

fn upload_transport_error(e: reqwest::Error) -> ApiError {
    match transport_error(e) {
        ApiError::Network { .. } => ApiError::network("Upload failed: Network error"),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use outfit_core::session::{RecordingNavigator, Session};
    use std::sync::Mutex;

    const DESCRIPTOR: &str = r#"{
        "id": "up-1",
        "url": "https://cdn.example.com/up-1.jpg",
        "filename": "look.jpg",
        "size": 12,
        "mimeType": "image/jpeg",
        "uploadedAt": "2026-10-01T12:00:00Z"
    }"#;

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<f64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
        (cb, seen)
    }

    #[test]
    fn tracker_reports_each_distinct_value_once() {
        let (cb, seen) = recorder();
        let mut t = ProgressTracker::new(100, Some(cb));
        t.advance(50);
        t.advance(0);
        t.advance(50);
        t.advance(0);
        assert_eq!(*seen.lock().unwrap(), vec![50.0, 100.0]);
    }

    #[test]
    fn tracker_is_silent_without_total() {
        let (cb, seen) = recorder();
        let mut t = ProgressTracker::new(0, Some(cb));
        t.advance(10);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn mime_is_guessed_from_filename() {
        assert_eq!(UploadFile::from_bytes("look.jpg", vec![1]).mime_type(), "image/jpeg");
        assert_eq!(UploadFile::from_bytes("look.png", vec![1]).mime_type(), "image/png");
        assert_eq!(
            UploadFile::from_bytes("noext", vec![1]).mime_type(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("outfit.webp");
        std::fs::write(&path, b"riff").unwrap();
        let f = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(f.filename(), "outfit.webp");
        assert_eq!(f.len(), 4);
    }

    #[tokio::test]
    async fn upload_posts_multipart_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/upload")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Regex(r#"name="file"; filename="look.jpg""#.into()))
            .with_status(201)
            .with_body(DESCRIPTOR)
            .create_async()
            .await;

        let session = Session::in_memory();
        session.set_token("tok").unwrap();
        let api = ApiClient::new(format!("{}/api", server.url()), session);
        let (cb, seen) = recorder();

        let file = UploadFile::from_bytes("look.jpg", b"abcdefghijkl".to_vec());
        let d = api.upload_chunked(file, Some(cb), None, 4).await.unwrap();

        assert_eq!(d.id, "up-1");
        m.assert_async().await;
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.last().copied(), Some(100.0));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn unparseable_success_body_is_format_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let api = ApiClient::new(format!("{}/api", server.url()), Session::in_memory());
        let err = api
            .upload(UploadFile::from_bytes("a.jpg", vec![0u8; 8]), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UploadFormat));
        assert_eq!(err.to_string(), "Invalid response format");
    }

    async fn upload_error(status: usize, body: &str) -> ApiError {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
        let api = ApiClient::new(format!("{}/api", server.url()), Session::in_memory());
        api.upload(UploadFile::from_bytes("a.jpg", vec![0u8; 8]), None, None)
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn failure_prefers_server_message() {
        let err = upload_error(413, r#"{"message":"File too large"}"#).await;
        assert_eq!(err.to_string(), "File too large");
        assert_eq!(err.status(), Some(413));
    }

    #[tokio::test]
    async fn failure_falls_back_to_status() {
        let err = upload_error(500, "oops").await;
        assert_eq!(err.to_string(), "upload failed: 500");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn unauthorized_upload_signs_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/upload")
            .with_status(401)
            .create_async()
            .await;
        let session = Session::in_memory();
        session.set_token("old").unwrap();
        let nav = Arc::new(RecordingNavigator::default());
        let api = ApiClient::new(format!("{}/api", server.url()), session.clone())
            .with_navigator(nav.clone());

        let err = api
            .upload(UploadFile::from_bytes("a.jpg", vec![1]), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
        assert!(!session.has_token());
        assert_eq!(nav.routes(), vec!["/login"]);
    }

    #[tokio::test]
    async fn cancelled_upload_reports_cancelled() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let api = ApiClient::new(format!("http://{addr}/api"), Session::in_memory());
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = api
            .upload(UploadFile::from_bytes("a.jpg", vec![0u8; 16]), None, Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(err.to_string(), "Upload cancelled");
    }

    #[tokio::test]
    async fn unreachable_upload_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = ApiClient::new(format!("http://{addr}/api"), Session::in_memory());
        let err = api
            .upload(UploadFile::from_bytes("a.jpg", vec![1]), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: Network error");
        assert_eq!(err.code(), Some("NETWORK_ERROR"));
    }
}
