//! Stub captioner for testing and offline mode

use async_trait::async_trait;
use review_guard_domain::{Caption, CaptionError, Captioner, ImageRef};

use super::{load_image, sniff_image};

enum Mode {
    Fixed(String),
    Fail(CaptionError),
    Disabled,
}

/// Captioner that answers without a model.
///
/// Local images are still read and sniffed, so missing or corrupt files
/// fail the same way they would with a real captioner.
pub struct StubCaptioner {
    mode: Mode,
    max_chars: usize,
}

impl StubCaptioner {
    /// Always caption with the given text
    pub fn fixed(caption: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixed(caption.into()),
            max_chars: 300,
        }
    }

    /// Create a stub that always returns an error
    pub fn with_error(error: CaptionError) -> Self {
        Self {
            mode: Mode::Fail(error),
            max_chars: 300,
        }
    }

    /// Captioning turned off: every image fails with `Disabled`
    pub fn disabled() -> Self {
        Self {
            mode: Mode::Disabled,
            max_chars: 300,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

fn replay(error: &CaptionError) -> CaptionError {
    match error {
        CaptionError::NotFound(msg) => CaptionError::NotFound(msg.clone()),
        CaptionError::UnsupportedImage(msg) => CaptionError::UnsupportedImage(msg.clone()),
        CaptionError::Fetch(msg) => CaptionError::Fetch(msg.clone()),
        CaptionError::Model(msg) => CaptionError::Model(msg.clone()),
        CaptionError::Empty => CaptionError::Empty,
        CaptionError::Disabled => CaptionError::Disabled,
    }
}

#[async_trait]
impl Captioner for StubCaptioner {
    async fn caption(&self, image: &ImageRef) -> Result<Caption, CaptionError> {
        let text = match &self.mode {
            Mode::Disabled => return Err(CaptionError::Disabled),
            Mode::Fail(error) => return Err(replay(error)),
            Mode::Fixed(text) => text,
        };

        // Remote images are not downloaded offline
        if !matches!(image, ImageRef::Url(_)) {
            let bytes = load_image(image, None).await?;
            sniff_image(&bytes)?;
        }

        let caption = Caption::new(text, self.max_chars);
        if caption.is_empty() {
            return Err(CaptionError::Empty);
        }
        Ok(caption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::fixtures::PNG;

    #[tokio::test]
    async fn test_fixed_caption() {
        let captioner = StubCaptioner::fixed("a plate of pasta");
        let caption = captioner
            .caption(&ImageRef::Bytes(PNG.to_vec()))
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "a plate of pasta");
    }

    #[tokio::test]
    async fn test_corrupt_bytes_fail() {
        let captioner = StubCaptioner::fixed("a plate of pasta");
        let result = captioner
            .caption(&ImageRef::Bytes(b"corrupt".to_vec()))
            .await;
        assert!(matches!(result, Err(CaptionError::UnsupportedImage(_))));
    }

    #[tokio::test]
    async fn test_url_skips_download() {
        let captioner = StubCaptioner::fixed("a storefront");
        let caption = captioner
            .caption(&ImageRef::Url("https://example.com/x.jpg".to_string()))
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "a storefront");
    }

    #[tokio::test]
    async fn test_disabled_and_error_modes() {
        let image = ImageRef::Bytes(PNG.to_vec());

        let result = StubCaptioner::disabled().caption(&image).await;
        assert!(matches!(result, Err(CaptionError::Disabled)));

        let result = StubCaptioner::with_error(CaptionError::Model("down".into()))
            .caption(&image)
            .await;
        assert!(matches!(result, Err(CaptionError::Model(_))));
    }

    #[tokio::test]
    async fn test_max_chars() {
        let captioner = StubCaptioner::fixed("abcdefghij").with_max_chars(4);
        let caption = captioner
            .caption(&ImageRef::Bytes(PNG.to_vec()))
            .await
            .unwrap();
        assert_eq!(caption.as_str(), "abcd…");
    }
}
