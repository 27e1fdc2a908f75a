// src/services/fetcher.rs

//! Network fetch collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::Result;
use crate::models::{Page, ScannerConfig};

/// HTTP method of a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// What to fetch for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Form-encoded body for POST requests
    pub body: Option<String>,
    /// Charset used when the response does not declare one
    pub encoding: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            body: None,
            encoding: None,
        }
    }

    /// Request shape configured on a page.
    pub fn for_page(page: &Page) -> Self {
        let (method, body) = if page.do_post {
            (Method::Post, Some(page.post_params.clone()))
        } else {
            (Method::Get, None)
        };
        let encoding = (!page.encoding.eq_ignore_ascii_case("auto"))
            .then(|| page.encoding.clone());

        Self {
            url: page.url.clone(),
            method,
            body,
            encoding,
        }
    }
}

/// Status code and decoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching page content.
///
/// Transport failures are errors. Any HTTP status is a response.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// reqwest-based fetcher with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a configured asynchronous HTTP client.
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self
                .client
                .post(&request.url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.body.clone().unwrap_or_default()),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = match &request.encoding {
            Some(charset) => response.text_with_charset(charset).await?,
            None => response.text().await?,
        };

        log::debug!(
            "Fetched {} ({}, {} bytes)",
            request.url,
            status,
            body.len()
        );
        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageDefaults;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_secs: u64) -> HttpFetcher {
        let config = ScannerConfig {
            timeout_secs,
            ..ScannerConfig::default()
        };
        HttpFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_request_for_page() {
        let mut page = Page::new("1", "https://example.com/search", &PageDefaults::default());
        let request = FetchRequest::for_page(&page);
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.body, None);
        assert_eq!(request.encoding, None);

        page.do_post = true;
        page.post_params = "q=rust&page=2".to_string();
        page.encoding = "iso-8859-1".to_string();
        let request = FetchRequest::for_page(&page);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.as_deref(), Some("q=rust&page=2"));
        assert_eq!(request.encoding.as_deref(), Some("iso-8859-1"));
    }

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&server)
            .await;

        let response = fetcher(5)
            .fetch(&FetchRequest::get(format!("{}/page", server.uri())))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let response = fetcher(5)
            .fetch(&FetchRequest::get(format!("{}/gone", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("q=rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string("results"))
            .expect(1)
            .mount(&server)
            .await;

        let request = FetchRequest {
            url: format!("{}/search", server.uri()),
            method: Method::Post,
            body: Some("q=rust".to_string()),
            encoding: None,
        };
        let response = fetcher(5).fetch(&request).await.unwrap();
        assert_eq!(response.body, "results");
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let result = fetcher(1)
            .fetch(&FetchRequest::get(server.uri()))
            .await;
        assert!(result.is_err());
    }
}
