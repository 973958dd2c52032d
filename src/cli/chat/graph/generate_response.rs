use std::sync::Arc;

use tracing::{debug, warn};

use crate::anthropic_client::{ApiMessage, ModelClient, ModelError};
use crate::cli::chat::conversation_state::ConversationState;

pub const ANALYSIS_CONTEXT_HEADER: &str = "Previous image analysis:\n";

/// Prompt for the latest message: accumulated image analyses (if any)
/// followed by the message's literal text.
pub fn build_prompt(state: &ConversationState) -> Option<String> {
    let latest = state.last_message()?;
    let analysis = state.image_analysis();

    let mut prompt = String::new();
    if !analysis.is_empty() {
        prompt.push_str(ANALYSIS_CONTEXT_HEADER);
        prompt.push_str(&analysis.values().collect::<Vec<_>>().join("\n"));
        prompt.push_str("\n\n");
    }
    prompt.push_str(latest.text());

    Some(prompt)
}

pub struct ResponseGenerator {
    client: Arc<dyn ModelClient>,
}

impl ResponseGenerator {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Append the model's reply to the latest user message. Does nothing when
    /// the assistant already answered this turn.
    pub async fn run(&self, state: &mut ConversationState) -> Result<(), ModelError> {
        debug!("Entering generate_response");

        match state.last_message() {
            None => return Ok(()),
            Some(message) if message.is_assistant() => {
                debug!("Last message is already a reply, skipping generation");
                return Ok(());
            }
            Some(_) => {}
        }

        let Some(prompt) = build_prompt(state) else {
            return Ok(());
        };
        if prompt.trim().is_empty() {
            warn!("Prompt is empty, skipping generation");
            return Ok(());
        }

        let reply = self.client.complete(&[ApiMessage::user_text(prompt)]).await?;
        state.add_assistant_message(&reply);

        Ok(())
    }
}
