use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::anthropic_client::{ApiMessage, ContentBlock, ModelClient, ModelError};
use crate::cli::chat::conversation_state::ConversationState;
use crate::image::{ImageAttachment, MediaType};

pub const ANALYSIS_PROMPT: &str = "What do you see in this image?";

/// Which media types an image is submitted as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaTypePolicy {
    /// Submit once, as the type sniffed from the file signature (JPEG if unknown).
    #[default]
    Detect,
    /// Submit as JPEG, then PNG, then GIF until one request succeeds.
    Fallback,
}

impl MediaTypePolicy {
    pub fn candidates(&self, image: &ImageAttachment) -> Vec<MediaType> {
        match self {
            MediaTypePolicy::Detect => vec![image.media_type().unwrap_or(MediaType::Jpeg)],
            MediaTypePolicy::Fallback => MediaType::FALLBACK_ORDER.to_vec(),
        }
    }
}

/// Every media type tried for one image failed.
#[derive(Debug, Error)]
#[error("Image analysis failed for {}: {}", .source_path.display(), last_error_message(.attempts))]
pub struct AnalysisError {
    pub source_path: PathBuf,
    pub attempts: Vec<(MediaType, ModelError)>,
}

impl AnalysisError {
    #[cfg(test)]
    pub fn last_error(&self) -> Option<&ModelError> {
        self.attempts.last().map(|(_, error)| error)
    }
}

fn last_error_message(attempts: &[(MediaType, ModelError)]) -> String {
    attempts
        .last()
        .map(|(_, error)| error.to_string())
        .unwrap_or_else(|| "no media type was attempted".to_string())
}

pub struct ImageAnalyzer {
    client: Arc<dyn ModelClient>,
    policy: MediaTypePolicy,
}

impl ImageAnalyzer {
    pub fn new(client: Arc<dyn ModelClient>, policy: MediaTypePolicy) -> Self {
        Self { client, policy }
    }

    /// Describe the images on the last message, if it has any.
    ///
    /// Descriptions are only written to `state` once every image on the
    /// message has been described.
    pub async fn run(&self, state: &mut ConversationState) -> Result<(), AnalysisError> {
        debug!("Entering analyze_images");

        let Some(message) = state.last_message().filter(|m| !m.images().is_empty()) else {
            return Ok(());
        };

        let mut descriptions = Vec::with_capacity(message.images().len());
        for image in message.images() {
            descriptions.push(self.describe(image).await?);
        }

        for description in &descriptions {
            let slot = state.record_image_analysis(description.as_str());
            info!("Image analysis complete (slot {}, {} chars)", slot, description.len());
        }
        state.add_assistant_message(&descriptions.join("\n\n"));

        Ok(())
    }

    /// Ask the model to describe one image, walking the candidate media types in order.
    pub async fn describe(&self, image: &ImageAttachment) -> Result<String, AnalysisError> {
        let data = image.to_base64();
        let candidates = self.policy.candidates(image);
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, media_type) in candidates.iter().enumerate() {
            let request = [ApiMessage::user_blocks(vec![
                ContentBlock::text(ANALYSIS_PROMPT),
                ContentBlock::base64_image(media_type.as_str(), data.as_str()),
            ])];

            match self.client.complete(&request).await {
                Ok(description) => return Ok(description),
                Err(e) => {
                    warn!(
                        "Analysis of {} as {} failed (attempt {}/{}): {}",
                        image.source.display(),
                        media_type,
                        index + 1,
                        candidates.len(),
                        e
                    );
                    attempts.push((*media_type, e));
                }
            }
        }

        Err(AnalysisError {
            source_path: image.source.clone(),
            attempts,
        })
    }
}
