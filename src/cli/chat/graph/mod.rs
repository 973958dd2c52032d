//! The conversation graph: a fixed two-node pipeline run once per turn.
//!
//! `Start -> AnalyzeImages -> GenerateResponse -> End`. There are no
//! conditional edges; each node decides for itself whether it has work to
//! do by looking at the state.

pub mod analyze_images;
pub mod generate_response;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

pub use analyze_images::{AnalysisError, ImageAnalyzer, MediaTypePolicy};
pub use generate_response::ResponseGenerator;

use crate::anthropic_client::{ModelClient, ModelError};
use crate::cli::chat::conversation_state::ConversationState;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Response generation failed: {0}")]
    Generation(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Start,
    AnalyzeImages,
    GenerateResponse,
    End,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Start => "__start__",
            Node::AnalyzeImages => "analyze_images",
            Node::GenerateResponse => "generate_response",
            Node::End => "__end__",
        }
    }

    pub fn next(self) -> Node {
        match self {
            Node::Start => Node::AnalyzeImages,
            Node::AnalyzeImages => Node::GenerateResponse,
            Node::GenerateResponse | Node::End => Node::End,
        }
    }
}

pub struct ConversationGraph {
    analyzer: ImageAnalyzer,
    generator: ResponseGenerator,
}

impl ConversationGraph {
    pub fn new(client: Arc<dyn ModelClient>, policy: MediaTypePolicy) -> Self {
        Self {
            analyzer: ImageAnalyzer::new(client.clone(), policy),
            generator: ResponseGenerator::new(client),
        }
    }

    /// Run every node in order against `state`.
    ///
    /// On error `state` may hold the turn's partial progress; callers that
    /// need all-or-nothing turns should invoke on a copy.
    pub async fn invoke(&self, state: &mut ConversationState) -> Result<(), GraphError> {
        let mut node = Node::Start.next();

        while node != Node::End {
            debug!("Processing node: {}", node.name());
            match node {
                Node::AnalyzeImages => self.analyzer.run(state).await?,
                Node::GenerateResponse => self.generator.run(state).await?,
                Node::Start | Node::End => {}
            }
            node = node.next();
        }

        debug!("Graph execution completed");
        Ok(())
    }
}
