//! Companion image server client.
//!
//! The server exposes three endpoints relative to a base URL: an upload
//! endpoint accepting a multipart PNG, a listen endpoint returning raw image
//! bytes for a named image, and a path-typed gallery listing returned as text.

use crate::domain::{ArCanvasError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// File name attached to uploaded images.
pub const UPLOAD_FILE_NAME: &str = "image.png";

/// Server endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL including the trailing slash.
    pub base_url: String,
    /// Endpoint serving images by name.
    pub listen_path: String,
    /// Endpoint receiving uploads.
    pub send_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1:8080/".to_string(),
            listen_path: "comm_usr".to_string(),
            send_path: "comm_ml2".to_string(),
        }
    }
}

impl ServerSettings {
    /// Upload endpoint, `<base><send_path>`.
    ///
    /// # Errors
    ///
    /// `Config` when the result is not a valid URL.
    pub fn send_url(&self) -> Result<Url> {
        parse_url(&format!("{}{}", self.base_url, self.send_path))
    }

    /// Fetch endpoint with the image name as the escaped `img` query parameter.
    ///
    /// # Errors
    ///
    /// `Config` when the result is not a valid URL.
    ///
    /// # Example
    ///
    /// ```
    /// use arcanvas::acquisition::ServerSettings;
    ///
    /// let url = ServerSettings::default().fetch_url("my photo.png").unwrap();
    /// assert_eq!(url.as_str(), "https://127.0.0.1:8080/comm_usr?img=my+photo.png");
    /// ```
    pub fn fetch_url(&self, name: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}{}", self.base_url, self.listen_path),
            &[("img", name)],
        )
        .map_err(|e| ArCanvasError::Config(format!("invalid server url: {e}")))
    }

    /// Gallery endpoint, `<base>images/<path_type>/gallery`.
    ///
    /// # Errors
    ///
    /// `Config` when the result is not a valid URL.
    pub fn gallery_url(&self, path_type: &str) -> Result<Url> {
        parse_url(&format!("{}images/{path_type}/gallery", self.base_url))
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ArCanvasError::Config(format!("invalid server url {raw}: {e}")))
}

/// Network boundary used by the acquisition service.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Uploads PNG bytes. Only success or failure is reported.
    async fn send_image(&self, png: Vec<u8>) -> Result<()>;

    /// Downloads the raw bytes of a named image.
    async fn fetch_image(&self, name: &str) -> Result<Vec<u8>>;

    /// Downloads the gallery listing for a path type as opaque text.
    async fn fetch_gallery(&self, path_type: &str) -> Result<String>;
}

/// `reqwest` implementation of [`ImageTransport`].
#[derive(Debug, Clone)]
pub struct HttpImageServer {
    client: reqwest::Client,
    settings: ServerSettings,
}

impl HttpImageServer {
    #[must_use]
    pub fn new(settings: ServerSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    #[must_use]
    pub const fn with_client(client: reqwest::Client, settings: ServerSettings) -> Self {
        Self { client, settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

#[async_trait]
impl ImageTransport for HttpImageServer {
    async fn send_image(&self, png: Vec<u8>) -> Result<()> {
        let url = self.settings.send_url()?;
        tracing::debug!(url = %url, bytes = png.len(), "sending image to server");

        let part = Part::bytes(png)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("image/png")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        self.client
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_image(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.settings.fetch_url(name)?;
        tracing::debug!(url = %url, "fetching image from server");

        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn fetch_gallery(&self, path_type: &str) -> Result<String> {
        let url = self.settings.gallery_url(path_type)?;
        tracing::debug!(url = %url, "fetching gallery");

        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }
}
