//! HTTP client exposing the two operations checkers need: fetching a page
//! as text and describing a remote resource.
//!
//! Redirects are handled manually: the underlying client never follows
//! them, so `describe_remote` can validate an exact URL, while `get_text`
//! always follows. Every operation is a single attempt; retry policy
//! belongs to whoever schedules checks.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, redirect};
use sha2::{Digest, Sha256};
use url::Url;

/// Maximum redirect hops followed when redirect following is enabled.
pub const MAX_REDIRECTS: usize = 10;

static FILENAME_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").unwrap());

/// Redirect handling failures.
#[derive(Debug)]
pub enum RedirectError {
    /// A redirect response carried no Location header.
    MissingLocation(String),
    /// The Location header was unreadable or did not resolve to a URL.
    InvalidLocation { url: String, message: String },
    /// The redirect chain exceeded [`MAX_REDIRECTS`].
    TooManyRedirects(String),
}

impl std::fmt::Display for RedirectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectError::MissingLocation(url) => {
                write!(f, "Redirect from {} has no Location header", url)
            }
            RedirectError::InvalidLocation { url, message } => {
                write!(f, "Invalid redirect Location from {}: {}", url, message)
            }
            RedirectError::TooManyRedirects(url) => {
                write!(f, "Too many redirects starting from {}", url)
            }
        }
    }
}

impl std::error::Error for RedirectError {}

/// Metadata of a remote resource, gathered without persisting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    /// Final URL, after any followed redirects.
    pub url: String,
    /// Body size in bytes.
    pub size: u64,
    /// Hex-encoded sha256 of the body.
    pub checksum: String,
    /// Best-effort version guess parsed from the URL's filename. Callers
    /// that know the real version override this.
    pub version: Option<String>,
}

/// HTTP client for check operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with redirect following disabled; redirects are
    /// handled per operation.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest Client. The client must not follow
    /// redirects on its own.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Fetches the body of `url` as text, following redirects.
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}...", url);
        let response = self.get_with_redirects(url, true).await?;
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;
        Ok(body)
    }

    /// Describes the remote resource at `url`: final URL, size, sha256 and
    /// a filename-derived version guess.
    ///
    /// With `follow_redirects` off, a redirect response is described
    /// as-is; only 4xx/5xx statuses are errors.
    #[tracing::instrument(skip(self))]
    pub async fn describe_remote(
        &self,
        url: &str,
        follow_redirects: bool,
    ) -> Result<RemoteResource> {
        debug!("Describing remote resource at {}...", url);
        let mut response = self.get_with_redirects(url, follow_redirects).await?;
        let final_url = response.url().clone();

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read resource body")?
        {
            hasher.update(&chunk);
            size += chunk.len() as u64;
        }

        Ok(RemoteResource {
            version: guess_version(&final_url),
            url: final_url.to_string(),
            size,
            checksum: format!("{:x}", hasher.finalize()),
        })
    }

    async fn get_with_redirects(&self, url: &str, follow: bool) -> Result<Response> {
        let mut current = url.to_string();
        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .with_context(|| format!("Failed to send request to {}", current))?;

            if follow && response.status().is_redirection() {
                current = redirect_target(&response)?;
                debug!("Following redirect to {}...", current);
                continue;
            }
            return Ok(response.error_for_status()?);
        }
        Err(RedirectError::TooManyRedirects(url.to_string()).into())
    }
}

fn redirect_target(response: &Response) -> Result<String> {
    let url = response.url().as_str();
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| RedirectError::MissingLocation(url.to_string()))?;
    let location = location
        .to_str()
        .map_err(|e| RedirectError::InvalidLocation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    let target = response
        .url()
        .join(location)
        .map_err(|e| RedirectError::InvalidLocation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(target.to_string())
}

/// Best-effort version extraction from a URL's trailing path segment.
fn guess_version(url: &Url) -> Option<String> {
    let filename = url.path_segments()?.next_back()?;
    FILENAME_VERSION
        .find(filename)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_text_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html>v1.0</html>")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .get_text(&format!("{}/page", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, "<html>v1.0</html>");
    }

    #[tokio::test]
    async fn test_get_text_follows_redirect() {
        let mut server = mockito::Server::new_async().await;
        let _redirect = server
            .mock("GET", "/old")
            .with_status(302)
            .with_header("location", "/new")
            .create_async()
            .await;
        let target = server
            .mock("GET", "/new")
            .with_status(200)
            .with_body("moved here")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let body = client
            .get_text(&format!("{}/old", server.url()))
            .await
            .unwrap();

        target.assert_async().await;
        assert_eq!(body, "moved here");
    }

    #[tokio::test]
    async fn test_get_text_not_found_is_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let result = client.get_text(&format!("{}/missing", server.url())).await;

        mock.assert_async().await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }

    #[tokio::test]
    async fn test_describe_remote_size_and_checksum() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/app-2.1.3.tar.gz")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let resource = client
            .describe_remote(&format!("{}/files/app-2.1.3.tar.gz", server.url()), false)
            .await
            .unwrap();

        assert_eq!(resource.size, 7);
        assert_eq!(
            resource.checksum,
            format!("{:x}", Sha256::digest(b"payload"))
        );
        assert_eq!(resource.version, Some("2.1.3".to_string()));
        assert!(resource.url.ends_with("/files/app-2.1.3.tar.gz"));
    }

    #[tokio::test]
    async fn test_describe_remote_does_not_follow_redirects_by_default() {
        let mut server = mockito::Server::new_async().await;
        let _redirect = server
            .mock("GET", "/download")
            .with_status(302)
            .with_header("location", "/real/app-1.0.zip")
            .create_async()
            .await;
        let target = server
            .mock("GET", "/real/app-1.0.zip")
            .with_status(200)
            .with_body("zip bytes")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let resource = client
            .describe_remote(&format!("{}/download", server.url()), false)
            .await
            .unwrap();

        // The redirect response itself is described
        assert!(resource.url.ends_with("/download"));
        assert_eq!(resource.size, 0);
        assert!(!target.matched_async().await);
    }

    #[tokio::test]
    async fn test_describe_remote_follows_redirects_when_asked() {
        let mut server = mockito::Server::new_async().await;
        let _redirect = server
            .mock("GET", "/download")
            .with_status(302)
            .with_header("location", "/real/app-1.0.zip")
            .create_async()
            .await;
        let target = server
            .mock("GET", "/real/app-1.0.zip")
            .with_status(200)
            .with_body("zip bytes")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let resource = client
            .describe_remote(&format!("{}/download", server.url()), true)
            .await
            .unwrap();

        target.assert_async().await;
        assert!(resource.url.ends_with("/real/app-1.0.zip"));
        assert_eq!(resource.size, 9);
        assert_eq!(resource.version, Some("1.0".to_string()));
    }

    #[tokio::test]
    async fn test_describe_remote_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone")
            .with_status(500)
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let result = client
            .describe_remote(&format!("{}/gone", server.url()), false)
            .await;

        let err = result.unwrap_err();
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/loop")
            .with_status(302)
            .with_header("location", "/loop")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let result = client
            .describe_remote(&format!("{}/loop", server.url()), true)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RedirectError>(),
            Some(RedirectError::TooManyRedirects(_))
        ));
    }

    #[test]
    fn test_guess_version_from_filename() {
        let url = Url::parse("https://example.com/files/app-2.1.3.tar.gz").unwrap();
        assert_eq!(guess_version(&url), Some("2.1.3".to_string()));

        let url = Url::parse("https://example.com/files/latest.zip").unwrap();
        assert_eq!(guess_version(&url), None);

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(guess_version(&url), None);
    }
}
