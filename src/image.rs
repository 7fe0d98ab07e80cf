//! Image generation client for cover art.

use crate::config::ImageConfig;
use crate::console::Console;
use crate::error::ImageError;
use crate::llm::backoff_delay;
use crate::model::{CoverImage, ImageFormat};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use std::time::Duration;

/// Anything that can render a text description into a cover image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<CoverImage, ImageError>;
}

/// Client for Stability AI's stable-image generation endpoint.
pub struct StabilityClient {
    client: Client,
    config: ImageConfig,
    format: ImageFormat,
    console: Console,
}

impl StabilityClient {
    pub fn new(config: ImageConfig, console: Console) -> Result<Self, ImageError> {
        let format = ImageFormat::from_config(&config.output_format).ok_or_else(|| {
            ImageError::InvalidResponse(format!(
                "unsupported output format '{}'",
                config.output_format
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec.max(1)))
            .build()?;

        Ok(Self {
            client,
            config,
            format,
            console,
        })
    }

    fn form(&self, prompt: &str) -> Form {
        Form::new()
            .text("prompt", prompt.to_string())
            .text("output_format", self.format.api_name())
    }

    async fn generate_once(&self, prompt: &str) -> Result<CoverImage, ImageError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.key))
            .header("Accept", "image/*")
            .multipart(self.form(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ImageError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.as_deref() {
            if !ct.starts_with("image/") {
                return Err(ImageError::InvalidResponse(format!("content type {}", ct)));
            }
        }

        let data = response.bytes().await?.to_vec();
        if data.is_empty() {
            return Err(ImageError::InvalidResponse("empty body".to_string()));
        }

        let format = sniff_format(&data).unwrap_or(self.format);
        Ok(CoverImage { data, format })
    }
}

/// Detects the encoding from the file signature.
fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(ImageFormat::Png)
    } else {
        None
    }
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    async fn generate(&self, prompt: &str) -> Result<CoverImage, ImageError> {
        let attempts = self.config.retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.generate_once(prompt).await {
                Ok(image) => return Ok(image),
                Err(e) => {
                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        self.console.warning(&format!(
                            "Cover request failed ({}), retrying in {:?} (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            attempts
                        ));
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ImageError::RetriesExhausted {
            attempts,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
