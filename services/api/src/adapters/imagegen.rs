//! services/api/src/adapters/imagegen.rs
//!
//! This module contains the adapter for OpenAI's image generation API.
//! It implements the `ImageGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::images::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
    Client,
};
use async_trait::async_trait;
use visual_journal_core::ports::{ImageGenerationService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ImageGenerationService` port using the
/// OpenAI image generation API.
#[derive(Clone)]
pub struct OpenAiImageAdapter {
    client: Client<OpenAIConfig>,
    model: ImageModel,
}

impl OpenAiImageAdapter {
    /// Creates a new `OpenAiImageAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: ImageModel) -> Self {
        Self { client, model }
    }

    /// The generation API only offers a fixed set of output dimensions, so
    /// the requested aspect ratio picks the closest one.
    fn size_for_aspect_ratio(aspect_ratio: &str) -> PortResult<ImageSize> {
        match aspect_ratio {
            "1:1" => Ok(ImageSize::S1024x1024),
            "16:9" => Ok(ImageSize::S1792x1024),
            "9:16" => Ok(ImageSize::S1024x1792),
            other => Err(PortError::Unexpected(format!(
                "Unsupported aspect ratio '{}'",
                other
            ))),
        }
    }
}

//=========================================================================================
// `ImageGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageGenerationService for OpenAiImageAdapter {
    /// Generates one image for the prompt and returns it as an inline
    /// `data:` URL, ready to place on the canvas and upload at save time.
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> PortResult<String> {
        let size = Self::size_for_aspect_ratio(aspect_ratio)?;

        let request = CreateImageRequestArgs::default()
            .model(self.model.clone())
            .prompt(prompt)
            .n(1)
            .response_format(ImageResponseFormat::B64Json)
            .size(size)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .images()
            .generate(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Unexpected("No image generated".to_string()))?;

        match image.as_ref() {
            Image::B64Json { b64_json, .. } => Ok(format!("data:image/png;base64,{}", b64_json)),
            Image::Url { .. } => Err(PortError::Unexpected(
                "Image service returned a URL instead of inline data".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratios_map_to_supported_sizes() {
        assert!(matches!(
            OpenAiImageAdapter::size_for_aspect_ratio("1:1").unwrap(),
            ImageSize::S1024x1024
        ));
        assert!(matches!(
            OpenAiImageAdapter::size_for_aspect_ratio("16:9").unwrap(),
            ImageSize::S1792x1024
        ));
        assert!(OpenAiImageAdapter::size_for_aspect_ratio("4:3").is_err());
    }
}
