//! Media Relay
//!
//! Information Hiding:
//! - Platform download, format sniffing, local caching and blob upload are
//!   one call for the webhook handlers
//! - Callers only ever see the public URL of the stored image

use std::path::PathBuf;
use std::sync::Arc;

use image::ImageFormat;

use crate::config::StorageConfig;
use crate::core::blob::BlobStore;
use crate::core::line::MessagingPlatform;
use crate::error::RelayError;

/// Extension used when the content is not a recognised image.
pub const FALLBACK_EXTENSION: &str = "jpg";

/// Image format recognised from the leading bytes, if any.
pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// File extension for a sniffed format. JPEG is stored as `.jpeg`.
pub fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        other => other
            .extensions_str()
            .first()
            .copied()
            .unwrap_or(FALLBACK_EXTENSION),
    }
}

/// Bytes of one inbound image plus the name it is stored under.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub file_name: String,
    pub format: Option<ImageFormat>,
    pub bytes: Vec<u8>,
}

impl MediaAsset {
    pub fn new(message_id: &str, user_id: &str, bytes: Vec<u8>) -> Self {
        let format = sniff(&bytes);
        let ext = format.map(extension).unwrap_or(FALLBACK_EXTENSION);
        Self {
            file_name: format!("image_message_{}_user_{}.{}", message_id, user_id, ext),
            format,
            bytes,
        }
    }
}

pub struct MediaRelay {
    platform: Arc<dyn MessagingPlatform>,
    blobs: Arc<dyn BlobStore>,
    cache_dir: Option<PathBuf>,
    content_type: String,
}

impl MediaRelay {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        blobs: Arc<dyn BlobStore>,
        settings: &StorageConfig,
    ) -> Self {
        Self {
            platform,
            blobs,
            cache_dir: settings.cache_dir.as_ref().map(PathBuf::from),
            content_type: settings.upload_content_type.clone(),
        }
    }

    /// Copy the image behind `message_id` into blob storage and return its URL.
    pub async fn relay(&self, message_id: &str, user_id: &str) -> Result<String, RelayError> {
        let bytes = self
            .platform
            .fetch_content(message_id)
            .await
            .map_err(RelayError::MediaDownload)?;
        let asset = MediaAsset::new(message_id, user_id, bytes);

        if let Some(dir) = &self.cache_dir {
            // Cached copies are never cleaned up.
            let path = dir.join(&asset.file_name);
            tokio::fs::write(&path, &asset.bytes).await?;
            tracing::info!("Image {} has been cached locally at {:?}", asset.file_name, path);
        }

        if let Some(format) = asset.format {
            if format.to_mime_type() != self.content_type {
                tracing::warn!(
                    "Image {} is {} but is uploaded as {}",
                    asset.file_name,
                    format.to_mime_type(),
                    self.content_type
                );
            }
        }

        let url = self
            .blobs
            .upload(&asset.file_name, asset.bytes, &self.content_type)
            .await?;
        tracing::info!("Image {} has been uploaded, blob URL: {}", asset.file_name, url);

        Ok(url)
    }
}
