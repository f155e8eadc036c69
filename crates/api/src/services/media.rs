//! Image host client for product photos.
//!
//! Uploads are sent as base64 data URIs with a signed request; the host
//! returns a public id (used later for deletion) and a delivery URL.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use futures::future::try_join_all;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use ecom24_core::Photo;

use crate::config::CloudinaryConfig;

/// Folder all product photos are uploaded into.
const UPLOAD_FOLDER: &str = "ecom24";

/// Errors from the image host.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image host returned {status}: {message}")]
    Provider { status: u16, message: String },
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Encode the file as a `data:` URI.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Stores and deletes hosted images.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload every file, returning photos in the same order.
    async fn upload(&self, files: &[Upload]) -> Result<Vec<Photo>, MediaError>;

    /// Delete hosted images by public id.
    async fn delete(&self, public_ids: &[String]) -> Result<(), MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct HostErrorBody {
    error: HostErrorDetail,
}

#[derive(Debug, Deserialize)]
struct HostErrorDetail {
    message: String,
}

/// Cloudinary signed-upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    upload_url: String,
    destroy_url: String,
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(config: &CloudinaryConfig) -> Self {
        let base = format!(
            "{}/v1_1/{}/image",
            config.api_base.trim_end_matches('/'),
            config.cloud_name
        );
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            upload_url: format!("{base}/upload"),
            destroy_url: format!("{base}/destroy"),
        }
    }

    /// POST `signed` plus `unsigned` params with a signature over `signed`.
    async fn send_signed(
        &self,
        url: &str,
        signed: Vec<(&'static str, String)>,
        unsigned: Vec<(&'static str, String)>,
    ) -> Result<reqwest::Response, MediaError> {
        let signature = sign(&signed, self.api_secret.expose_secret());
        let mut form = signed;
        form.extend(unsigned);
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_owned()));

        let response = self.client.post(url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<HostErrorBody>()
                .await
                .map_or_else(|_| "unknown error".to_owned(), |body| body.error.message);
            return Err(MediaError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn upload_one(&self, file: &Upload) -> Result<Photo, MediaError> {
        let signed = vec![
            ("folder", UPLOAD_FOLDER.to_owned()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        // The file itself is not part of the signature.
        let response = self
            .send_signed(&self.upload_url, signed, vec![("file", file.data_uri())])
            .await?;

        let uploaded: UploadResponse = response.json().await?;
        debug!(public_id = %uploaded.public_id, file = %file.file_name, "Uploaded photo");
        Ok(Photo {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }
}

/// Sign request parameters: sorted `key=value` pairs joined with `&`,
/// followed by the API secret, hashed with SHA-256.
fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(key, _)| *key);
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn upload(&self, files: &[Upload]) -> Result<Vec<Photo>, MediaError> {
        try_join_all(files.iter().map(|file| self.upload_one(file))).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, public_ids: &[String]) -> Result<(), MediaError> {
        try_join_all(public_ids.iter().map(|public_id| {
            let params = vec![
                ("public_id", public_id.clone()),
                ("timestamp", Utc::now().timestamp().to_string()),
            ];
            self.send_signed(&self.destroy_url, params, Vec::new())
        }))
        .await?;
        debug!(count = public_ids.len(), "Deleted photos");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_params() {
        let params = [
            ("timestamp", "1700000000".to_owned()),
            ("folder", "ecom24".to_owned()),
        ];
        assert_eq!(
            sign(&params, "abcd"),
            "2ddabff3fdb11caffeafdfa7979fdd0d00f426450e01fcd1667129100e4413f5"
        );
    }

    #[test]
    fn test_sign_destroy_params() {
        let params = [
            ("public_id", "ecom24/lamp".to_owned()),
            ("timestamp", "1700000000".to_owned()),
        ];
        assert_eq!(
            sign(&params, "abcd"),
            "e625c769e7925a3bbd174f1cf73f3292c0194c7fc15c5dbc7d3eb263746b3f97"
        );
    }

    #[test]
    fn test_data_uri() {
        let upload = Upload {
            file_name: "a.png".to_owned(),
            content_type: "image/png".to_owned(),
            bytes: b"hi".to_vec(),
        };
        assert_eq!(upload.data_uri(), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_urls_built_from_cloud_name() {
        let client = CloudinaryClient::new(&CloudinaryConfig {
            cloud_name: "demo".to_owned(),
            api_key: "123".to_owned(),
            api_secret: SecretString::from("s3cr3t"),
            api_base: "https://api.cloudinary.com".to_owned(),
        });
        assert_eq!(
            client.upload_url,
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(
            client.destroy_url,
            "https://api.cloudinary.com/v1_1/demo/image/destroy"
        );
    }
}
