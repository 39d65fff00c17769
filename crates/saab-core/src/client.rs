//! HTTP transport for the chat endpoint.

use std::collections::BTreeMap;

use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::{StreamChunk, TurnRequest};
use crate::stream::StreamDecoder;

/// Default server address (the diagnosis server listens on Flask's default port).
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Endpoint path, relative to the base URL.
pub const CHAT_PATH: &str = "chat";

/// Pre-configured client for the single streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: Url,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_headers(base_url, &BTreeMap::new())
    }

    /// Create a client that sends `extra` on every request.
    pub fn with_headers(
        base_url: impl AsRef<str>,
        extra: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let base_url = normalize_base_url(base_url.as_ref())?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        for (name, value) in extra {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header {name:?}: {e}")))?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self { base_url, http })
    }

    /// Build a client from the config file settings, with an optional URL override.
    pub fn from_config(config: &Config, url_override: Option<&str>) -> Result<Self> {
        let base_url = url_override
            .map(str::to_string)
            .unwrap_or_else(|| config.base_url());
        Self::with_headers(base_url, &config.headers)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn chat_url(&self) -> Result<Url> {
        Ok(self.base_url.join(CHAT_PATH)?)
    }

    /// POST one turn and return its decoded chunk stream.
    ///
    /// Malformed lines come through as [`Error::MalformedChunk`] items and the
    /// stream keeps going; any other error item is the last one.
    pub async fn open_stream(
        &self,
        request: &TurnRequest,
    ) -> Result<impl Stream<Item = Result<StreamChunk>> + Send> {
        let url = self.chat_url()?;
        tracing::info!(%url, "starting chat turn");

        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes_stream();
        Ok(async_stream::stream! {
            let mut decoder = StreamDecoder::new();
            futures_util::pin_mut!(body);

            while let Some(next) = body.next().await {
                match next {
                    Ok(bytes) => {
                        for chunk in decoder.feed(&bytes) {
                            yield chunk;
                        }
                    }
                    Err(e) => {
                        yield Err(Error::Http(e));
                        break;
                    }
                }
            }

            if let Some(rest) = decoder.finish() {
                tracing::debug!(rest = %rest, "discarding unterminated final line");
            }
            tracing::debug!(bytes = decoder.consumed(), "chat stream closed");
        })
    }

    /// Run one turn to completion, handing every good chunk to `on_chunk`.
    ///
    /// Malformed chunks are logged and skipped. Returns the transport error,
    /// if any, once the stream stops.
    pub async fn drive_turn<F>(&self, request: &TurnRequest, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(StreamChunk),
    {
        let stream = self.open_stream(request).await?;
        futures_util::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    tracing::debug!(?chunk, "stream chunk");
                    on_chunk(chunk);
                }
                Err(e) if e.is_malformed_chunk() => {
                    tracing::warn!(error = %e, "skipping malformed stream chunk");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Parse the base URL and make sure relative joins keep its path.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{raw} cannot be used as a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_from_bare_host() {
        let client = ChatClient::new("http://localhost:5000").unwrap();
        assert_eq!(client.chat_url().unwrap().as_str(), "http://localhost:5000/chat");
    }

    #[test]
    fn test_chat_url_keeps_base_path() {
        let client = ChatClient::new("https://example.com/api/v1").unwrap();
        assert_eq!(client.base_url().as_str(), "https://example.com/api/v1/");
        assert_eq!(
            client.chat_url().unwrap().as_str(),
            "https://example.com/api/v1/chat"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(ChatClient::new("not a url"), Err(Error::InvalidUrl(_))));
        assert!(matches!(ChatClient::new("mailto:doc@example.com"), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let err = ChatClient::with_headers(DEFAULT_BASE_URL, &headers).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_config_prefers_override() {
        let config = Config::new();
        let client = ChatClient::from_config(&config, Some("http://10.0.0.2:8080")).unwrap();
        assert_eq!(client.base_url().as_str(), "http://10.0.0.2:8080/");

        let client = ChatClient::from_config(&config, None).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/");
    }
}
