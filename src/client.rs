use std::path::Path;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::event::AnalysisResponse;
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_UPLOADS,
};

/// Where the assistant service listens unless told otherwise.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9610/";
const ASK_PATH: &str = "ask";
const CHECK_POSE_PATH: &str = "check_pose";
const IMAGE_FIELD: &str = "image";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A response body delivered as a sequence of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An image to send to the analysis endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of the image.
    pub mime: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Creates an upload from in-memory bytes, guessing the MIME type from the
    /// file name's extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).to_string();
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    /// Reads an image from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_mime(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// The network side of a conversation.
///
/// [`HttpTransport`] talks to the real service; tests substitute scripted
/// implementations.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issues one streaming query and returns the response body.
    ///
    /// A non-success status is an error; the body of a successful response is
    /// returned unread.
    async fn open_stream(&self, query: &str) -> Result<ByteStream>;

    /// Uploads an image and returns the analysis.
    async fn analyze_image(&self, upload: ImageUpload) -> Result<AnalysisResponse>;

    /// Turns an attachment reference from the service into something a view
    /// can load. The default returns it unchanged.
    fn resolve_attachment(&self, reference: &str) -> String {
        reference.to_string()
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// reqwest-backed transport for the assistant service.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport for the default local service.
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Creates a transport with custom settings.
    ///
    /// `timeout` bounds a whole request, streaming body included. Leave it
    /// unset for long answers; only connection setup is bounded then.
    pub fn with_options(base_url: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?;

        let mut builder = ReqwestClient::builder().connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL all endpoints and attachments are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn stream_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                self.timeout.map(|timeout| timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process a non-success response and convert it to our Error type.
    async fn process_error_response(response: Response) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status = response.status();
        let retry_after = retry_after(&response);
        match response.text().await {
            Ok(body) => error_from_body(status, retry_after, &body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, query: &str) -> Result<ByteStream> {
        let url = self.endpoint(ASK_PATH)?;
        CLIENT_REQUESTS.click();
        let started = Instant::now();

        let response = self
            .client
            .post(url)
            .headers(Self::stream_headers())
            .json(&QueryBody { query })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        debug!(status = %response.status(), "streaming response opened");

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn analyze_image(&self, upload: ImageUpload) -> Result<AnalysisResponse> {
        let url = self.endpoint(CHECK_POSE_PATH)?;
        CLIENT_UPLOADS.click();
        let started = Instant::now();

        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime)
            .map_err(|e| {
                Error::validation(format!("invalid MIME type: {e}"), Some("mime".to_string()))
            })?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let status = response.status();
        let retry_after = retry_after(&response);
        let body = response.text().await.map_err(|e| {
            Error::streaming(format!("Failed to read response: {e}"), Some(Box::new(e)))
        })?;

        // The service explains rejected images in the same JSON shape.
        match serde_json::from_str::<AnalysisResponse>(&body) {
            Ok(analysis) => {
                if !status.is_success() {
                    warn!(%status, "image analysis rejected");
                }
                Ok(analysis)
            }
            Err(_) if !status.is_success() => {
                CLIENT_REQUEST_ERRORS.click();
                Err(error_from_body(status, retry_after, &body))
            }
            Err(e) => Err(Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )),
        }
    }

    fn resolve_attachment(&self, reference: &str) -> String {
        self.base_url
            .join(reference)
            .map(String::from)
            .unwrap_or_else(|_| reference.to_string())
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    // `Url::join` replaces the last path segment unless the base ends in '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&normalized)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::validation(
            format!("unsupported URL scheme '{scheme}'"),
            Some("endpoint".to_string()),
        )),
    }
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.parse::<u64>().ok())
}

fn error_from_body(status: StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    // The service reports failures as {"error": "..."} or {"message": "..."}.
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.or(parsed.message))
        .unwrap_or_else(|| body.trim().to_string());
    Error::api(status.as_u16(), message, retry_after)
}
