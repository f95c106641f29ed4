use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use url::Url;

use crate::core::error::WorkflowError;
use crate::core::model::CompressionRequest;
use crate::core::progress::ProgressReporter;
use crate::plugins::registry::{CompressionDriver, DriverContext};

/// Bytes handed to the transport per body chunk; one progress report per chunk.
const UPLOAD_CHUNK: usize = 64 * 1024;
/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

#[derive(thiserror::Error, Debug)]
pub enum HttpDriverError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl From<HttpDriverError> for WorkflowError {
    fn from(e: HttpDriverError) -> Self {
        WorkflowError::transport(e.to_string())
    }
}

pub struct HttpDriver {
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    fn build_headers(ctx: &DriverContext) -> Result<HeaderMap, HttpDriverError> {
        let mut h = HeaderMap::new();
        let ua = HeaderValue::from_str(&ctx.user_agent)
            .map_err(|_| HttpDriverError::InvalidHeader(USER_AGENT.to_string()))?;
        h.insert(USER_AGENT, ua);
        h.insert(ACCEPT, HeaderValue::from_static("*/*"));
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|_| HttpDriverError::InvalidHeader(k.clone()))?;
            let value = HeaderValue::from_str(v)
                .map_err(|_| HttpDriverError::InvalidHeader(k.clone()))?;
            h.insert(name, value);
        }
        Ok(h)
    }

    fn build_form(req: &CompressionRequest, progress: ProgressReporter) -> Result<Form, HttpDriverError> {
        let body = reqwest::Body::wrap_stream(upload_stream(req.source.data.clone(), progress));
        let part = Part::stream_with_length(body, req.source.len())
            .file_name(req.source.name.clone())
            .mime_str(&req.source.media_type)?;
        Ok(Form::new().part(FILE_FIELD, part))
    }
}

/// `{backend}/image/compress?targetSizeKb={target}` with the target value query-encoded.
pub fn compress_url(backend_url: &str, target_size_kb: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}/image/compress", backend_url.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("targetSizeKb", target_size_kb);
    Ok(url)
}

/// Splits the file into chunks and reports cumulative bytes as each one is pulled by the transport.
fn upload_stream(
    data: Bytes,
    progress: ProgressReporter,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK).min(data.len())))
        .collect();

    let mut sent = 0u64;
    stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report(sent, Some(total));
        Ok(chunk)
    })
}

#[async_trait]
impl CompressionDriver for HttpDriver {
    fn name(&self) -> &'static str { "http-driver" }

    fn supports(&self, backend_url: &Url) -> bool {
        matches!(backend_url.scheme(), "http" | "https")
    }

    async fn compress(
        &self,
        req: &CompressionRequest,
        ctx: &DriverContext,
        progress: ProgressReporter,
    ) -> Result<Bytes, WorkflowError> {
        let url = compress_url(&ctx.backend_url, &req.target_size_kb).map_err(HttpDriverError::from)?;
        let headers = Self::build_headers(ctx)?;
        let form = Self::build_form(req, progress)?;

        tracing::debug!(request_id = %req.id, %url, bytes = req.source.len(), "posting image");

        let mut builder = self.client.post(url).headers(headers).multipart(form);
        if let Some(secs) = ctx.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let resp = builder.send().await.map_err(HttpDriverError::from)?;
        let status = resp.status();
        tracing::debug!(request_id = %req.id, %status, "response received");

        if status.is_success() {
            return Ok(resp.bytes().await.map_err(HttpDriverError::from)?);
        }

        let body = resp.bytes().await.unwrap_or_default();
        Err(WorkflowError::from_server_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorKind, COMPRESSION_FAILED};
    use crate::core::events::WorkflowEvent;
    use crate::core::model::SourceFile;
    use std::sync::atomic::AtomicU8;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(target: &str, data: Vec<u8>) -> CompressionRequest {
        CompressionRequest {
            id: Uuid::new_v4(),
            source: SourceFile::new("photo.png", "image/png", data),
            target_size_kb: target.to_string(),
        }
    }

    fn reporter() -> (ProgressReporter, broadcast::Receiver<WorkflowEvent>) {
        let (tx, rx) = broadcast::channel(256);
        (ProgressReporter::new(Uuid::new_v4(), Arc::new(AtomicU8::new(0)), tx), rx)
    }

    #[test]
    fn url_joins_backend_and_encodes_target() {
        assert_eq!(
            compress_url("http://host:8080/api/", "200").unwrap().as_str(),
            "http://host:8080/api/image/compress?targetSizeKb=200"
        );
        assert_eq!(
            compress_url("http://host", "1 5&x").unwrap().as_str(),
            "http://host/image/compress?targetSizeKb=1+5%26x"
        );
        assert!(compress_url("nope", "200").is_err());
    }

    #[tokio::test]
    async fn success_returns_response_bytes_and_sends_multipart() {
        let server = MockServer::start().await;
        let compressed: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        Mock::given(method("POST"))
            .and(path("/image/compress"))
            .and(query_param("targetSizeKb", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(compressed.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let driver = HttpDriver::new().unwrap();
        let ctx = DriverContext::new(server.uri());
        let (progress, _rx) = reporter();

        let out = driver.compress(&request("200", b"PNGDATA".to_vec()), &ctx, progress).await.unwrap();
        assert_eq!(&out[..], &compressed[..]);

        let received = server.received_requests().await.unwrap();
        let req = &received[0];
        let ct = req.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(ct.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&req.body);
        assert!(body.contains(r#"name="file""#));
        assert!(body.contains(r#"filename="photo.png""#));
        assert!(body.contains("PNGDATA"));
    }

    #[tokio::test]
    async fn structured_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image/compress"))
            .respond_with(ResponseTemplate::new(413).set_body_json(serde_json::json!({ "message": "File too large" })))
            .mount(&server)
            .await;

        let driver = HttpDriver::new().unwrap();
        let (progress, _rx) = reporter();
        let err = driver
            .compress(&request("200", vec![1; 10]), &DriverContext::new(server.uri()), progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "File too large");
    }

    #[tokio::test]
    async fn empty_error_body_falls_back_to_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let driver = HttpDriver::new().unwrap();
        let (progress, _rx) = reporter();
        let err = driver
            .compress(&request("200", vec![1; 10]), &DriverContext::new(server.uri()), progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, COMPRESSION_FAILED);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let driver = HttpDriver::new().unwrap();
        let (progress, _rx) = reporter();
        let err = driver
            .compress(&request("200", vec![1; 10]), &DriverContext::new(format!("http://127.0.0.1:{port}")), progress)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn upload_progress_is_monotonic_and_reaches_100() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8]))
            .mount(&server)
            .await;

        let driver = HttpDriver::new().unwrap();
        let (progress, mut rx) = reporter();
        driver
            .compress(&request("50", vec![7; 5 * UPLOAD_CHUNK + 123]), &DriverContext::new(server.uri()), progress)
            .await
            .unwrap();

        let mut seen = vec![];
        while let Ok(WorkflowEvent::Progress { percent, .. }) = rx.try_recv() {
            seen.push(percent);
        }
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|p| *p <= 100));
        assert_eq!(seen.last().copied(), Some(100));
    }

    #[tokio::test]
    async fn extra_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1]))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctx = DriverContext::new(server.uri());
        ctx.headers.insert("X-Api-Key".to_string(), "secret".to_string());

        let (progress, _rx) = reporter();
        HttpDriver::new().unwrap().compress(&request("200", vec![1]), &ctx, progress).await.unwrap();
    }
}
