//! Image caption adapters

pub mod stub;
pub mod vision;

pub use stub::StubCaptioner;
pub use vision::VisionCaptioner;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use review_guard_domain::{CaptionError, ImageRef};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Captioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionConfig {
    /// Vision model name/ID
    pub model: String,
    /// Token cap for the generated caption
    pub max_tokens: u32,
    /// Captions longer than this (in chars) are cut and end with `…`
    pub max_chars: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            max_tokens: 40,
            max_chars: 300,
            timeout_secs: 60,
        }
    }
}

/// Read the raw bytes behind an image reference.
///
/// Remote URLs need an HTTP client; without one they fail as `Fetch`.
pub(crate) async fn load_image(
    image: &ImageRef,
    client: Option<&Client>,
) -> Result<Vec<u8>, CaptionError> {
    match image {
        ImageRef::Bytes(bytes) => Ok(bytes.clone()),
        ImageRef::Path(path) => tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CaptionError::NotFound(path.display().to_string())
            } else {
                CaptionError::Fetch(format!("{}: {}", path.display(), e))
            }
        }),
        ImageRef::Url(url) => {
            let Some(client) = client else {
                return Err(CaptionError::Fetch(format!(
                    "{}: no HTTP client available",
                    url
                )));
            };
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| CaptionError::Fetch(format!("{}: {}", url, e)))?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(CaptionError::NotFound(url.clone()));
            }
            if !status.is_success() {
                return Err(CaptionError::Fetch(format!("{}: HTTP {}", url, status)));
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| CaptionError::Fetch(format!("{}: {}", url, e)))
        }
    }
}

/// Detect the image MIME type from magic bytes; anything else is rejected
pub fn sniff_image(bytes: &[u8]) -> Result<&'static str, CaptionError> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.mime_type()),
        Some(kind) => Err(CaptionError::UnsupportedImage(format!(
            "expected an image, found {}",
            kind.mime_type()
        ))),
        None if bytes.is_empty() => Err(CaptionError::UnsupportedImage(
            "image is empty".to_string(),
        )),
        None => Err(CaptionError::UnsupportedImage(
            "unrecognised image format".to_string(),
        )),
    }
}

/// Encode image bytes as a `data:` URL for vision chat requests
pub fn data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}
