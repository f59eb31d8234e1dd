//! HTTP fetch client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use super::discover::discover_artifact_url;
use crate::config::PipelineConfig;
use crate::domain::{DocKind, ErrorKind, PipelineError};
use crate::ports::{FetchedArtifact, Fetcher};

/// Fetcher backed by a pooled `reqwest` client.
///
/// Each worker constructs its own `HttpFetcher`: the client keeps its
/// connection to the host alive across requests (no per-request TLS and TCP
/// setup), and is never shared between workers.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.fetch_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| PipelineError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ErrorKind> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_transport)?;

        if let Some(kind) = classify_status(response.status()) {
            return Err(kind);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await.map_err(classify_transport)?;
        Ok((bytes.to_vec(), content_type))
    }
}

/// Map an HTTP status to a failure classification; `None` means success.
pub fn classify_status(status: StatusCode) -> Option<ErrorKind> {
    match status.as_u16() {
        404 | 410 => Some(ErrorKind::NotFound),
        429 => Some(ErrorKind::RateLimited),
        400..=599 => Some(ErrorKind::NetworkError),
        _ => None,
    }
}

fn classify_transport(err: reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::NetworkError
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        source_url: &str,
        kind: DocKind,
    ) -> Result<FetchedArtifact, ErrorKind> {
        match kind {
            // Fragments never reach the fetch stage; treat a slipped-through
            // one as structurally absent rather than spending a request.
            DocKind::Fragment => Err(ErrorKind::NoArtifactFound),

            // Direct artifact URL: skip HTML interpretation entirely.
            DocKind::DirectPdf => {
                let (bytes, content_type) = self.get(source_url).await?;
                Ok(FetchedArtifact {
                    bytes,
                    content_type,
                })
            }

            DocKind::FullDocument => {
                let (page, _) = self.get(source_url).await?;
                let html = String::from_utf8_lossy(&page);
                let base =
                    Url::parse(source_url).map_err(|_| ErrorKind::NoArtifactFound)?;
                let artifact_url =
                    discover_artifact_url(&html, &base).ok_or(ErrorKind::NoArtifactFound)?;
                debug!(page = source_url, artifact = %artifact_url, "discovered artifact");

                let (bytes, content_type) = self.get(artifact_url.as_str()).await?;
                Ok(FetchedArtifact {
                    bytes,
                    content_type,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StatusCode::NOT_FOUND, Some(ErrorKind::NotFound))]
    #[case(StatusCode::GONE, Some(ErrorKind::NotFound))]
    #[case(StatusCode::TOO_MANY_REQUESTS, Some(ErrorKind::RateLimited))]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, Some(ErrorKind::NetworkError))]
    #[case(StatusCode::BAD_GATEWAY, Some(ErrorKind::NetworkError))]
    #[case(StatusCode::FORBIDDEN, Some(ErrorKind::NetworkError))]
    #[case(StatusCode::OK, None)]
    #[case(StatusCode::NO_CONTENT, None)]
    fn status_classification(#[case] status: StatusCode, #[case] expected: Option<ErrorKind>) {
        assert_eq!(classify_status(status), expected);
    }
}
