use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use url::Url;

use crate::error::{AppError, ScrapeError};

pub const URL_REQUIRED: &str = "URL is required";

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// A request that passed validation and is ready for the pipeline.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub url: Url,
    /// The URL exactly as the client sent it.
    pub source_url: String,
    pub format: OutputFormat,
}

impl ScrapeRequest {
    pub fn validate(self) -> Result<ScrapeTarget, AppError> {
        let source_url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(AppError::InvalidRequest(URL_REQUIRED.to_string())),
        };

        let url = Url::parse(&source_url)
            .map_err(|e| AppError::InvalidRequest(format!("Invalid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::InvalidRequest(format!(
                "Invalid URL: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let format = match self.format {
            Some(raw) => raw.parse::<OutputFormat>()?,
            None => OutputFormat::default(),
        };

        Ok(ScrapeTarget { url, source_url, format })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Txt,
    Html,
    Json,
    Xml,
    Csv,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Txt => "txt",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" => Ok(OutputFormat::Markdown),
            "txt" => Ok(OutputFormat::Txt),
            "html" => Ok(OutputFormat::Html),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ScrapeError::InvalidFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: Option<String>,
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    pub og_locale_alternate: Vec<String>,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub status_code: u16,
}

/// Extracted body plus metadata. Serializes with the format name as the
/// content key, e.g. `{"markdown": "...", "metadata": {...}}`.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub format: OutputFormat,
    pub content: String,
    pub metadata: Metadata,
}

impl Serialize for ExtractedContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.format.as_str(), &self.content)?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.end()
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ExtractedContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(url: Option<&str>, format: Option<&str>) -> ScrapeRequest {
        ScrapeRequest {
            url: url.map(str::to_string),
            format: format.map(str::to_string),
        }
    }

    #[test]
    fn missing_or_blank_url_is_required() {
        for req in [request(None, None), request(Some(""), None), request(Some("  "), None)] {
            let err = req.validate().unwrap_err();
            assert_eq!(err.to_string(), URL_REQUIRED);
        }
    }

    #[test]
    fn relative_and_non_http_urls_are_rejected() {
        let relative = request(Some("/just/a/path"), None).validate().unwrap_err();
        assert!(relative.to_string().starts_with("Invalid URL"));

        let ftp = request(Some("ftp://example.com/file"), None).validate().unwrap_err();
        assert!(ftp.to_string().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn format_defaults_to_markdown_and_keeps_source_url() {
        let target = request(Some("https://example.com"), None).validate().unwrap();
        assert_eq!(target.format, OutputFormat::Markdown);
        assert_eq!(target.source_url, "https://example.com");
        assert_eq!(target.url.as_str(), "https://example.com/");
    }

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!(" HTML ".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert_eq!("Xml".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!(matches!("pdf".parse::<OutputFormat>(), Err(ScrapeError::InvalidFormat(_))));
    }

    #[test]
    fn extracted_content_uses_format_as_key() {
        let content = ExtractedContent {
            format: OutputFormat::Txt,
            content: "hello".to_string(),
            metadata: Metadata {
                title: Some("Title".to_string()),
                language: None,
                description: None,
                author: None,
                site_name: None,
                og_locale_alternate: vec![],
                source_url: "https://example.com".to_string(),
                status_code: 200,
            },
        };

        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!({
                "txt": "hello",
                "metadata": {
                    "title": "Title",
                    "language": null,
                    "ogLocaleAlternate": [],
                    "sourceURL": "https://example.com",
                    "statusCode": 200
                }
            })
        );
    }
}
