use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use reqwest::{Client, ClientBuilder, header};
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;
use crate::error::ScrapeError;

const MIN_DOCUMENT_BYTES: usize = 10;
const MAX_REDIRECTS: usize = 10;
/// How far into the document a `<meta charset>` declaration is looked for.
const CHARSET_SNIFF_BYTES: usize = 2048;

/// A downloaded document, before extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Outbound HTTP GET with bounded time and size.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    max_document_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ScrapeError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let mut builder = ClientBuilder::new();
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ScrapeError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Fetcher {
            client,
            timeout: config.timeout,
            max_document_bytes: config.max_document_bytes,
        })
    }

    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, ScrapeError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::FetchFailed(format!(
                "timed out after {} seconds",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn fetch_inner(&self, url: &Url) -> Result<FetchedPage, ScrapeError> {
        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        let final_url = response.url().clone();
        debug!(url = %url, final_url = %final_url, status = %status, "Received response");

        if !status.is_success() {
            return Err(ScrapeError::UpstreamHttp {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if let Some(ct) = content_type.as_deref() {
            if !is_textual(ct) {
                return Err(ScrapeError::FetchFailed(format!(
                    "unsupported content type '{}'",
                    ct
                )));
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_document_bytes {
                return Err(self.too_large());
            }
        }

        // Content-Length can be absent or wrong, so enforce the limit while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_document_bytes {
                return Err(self.too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.len() < MIN_DOCUMENT_BYTES {
            return Err(ScrapeError::FetchFailed("document is empty".to_string()));
        }

        let body = decode_body(&bytes, content_type.as_deref());

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }

    fn too_large(&self) -> ScrapeError {
        ScrapeError::FetchFailed(format!(
            "document exceeds {} bytes",
            self.max_document_bytes
        ))
    }
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/") || content_type.contains("html") || content_type.contains("xml")
}

/// Decodes the body using the `Content-Type` charset, then a `<meta>`
/// declaration near the top of the document, then UTF-8. A byte order mark
/// overrides all of them. Undecodable bytes become U+FFFD.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .or_else(|| meta_charset(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = used.name(), "Body contained undecodable bytes");
    }
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|label| !label.is_empty())
    })
}

/// Covers both `<meta charset="...">` and the `http-equiv` form.
fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(CHARSET_SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut rest = head.as_str();
    while let Some(pos) = rest.find("<meta") {
        rest = &rest[pos + "<meta".len()..];
        let tag = rest.split('>').next().unwrap_or_default();
        if let Some(idx) = tag.find("charset=") {
            let label: String = tag[idx + "charset=".len()..]
                .trim_start_matches(|c| c == '"' || c == '\'')
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
                .collect();
            if !label.is_empty() {
                return Some(label);
            }
        }
    }
    None
}
