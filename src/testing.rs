//! Mock implementations for testing

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::anthropic_client::{
    ApiContent, ApiMessage, ContentBlock, ImageSource, ModelClient, ModelError,
};

/// Model client that returns queued responses and records every request.
pub struct MockModelClient {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<Vec<ApiMessage>>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for response in responses {
            client.queue_response(response);
        }
        client
    }

    pub fn queue_response(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(response.into()));
    }

    pub fn queue_error(&self, error: ModelError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<Vec<ApiMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Plain text prompts of every single-message text request, in order.
    pub fn text_prompts(&self) -> Vec<String> {
        self.recorded_requests()
            .into_iter()
            .filter_map(|request| match request.as_slice() {
                [ApiMessage {
                    content: ApiContent::Text(text),
                    ..
                }] => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Media types of every image block sent, in order.
    pub fn image_media_types(&self) -> Vec<String> {
        self.recorded_requests()
            .iter()
            .flatten()
            .filter_map(|message| match &message.content {
                ApiContent::Blocks(blocks) => Some(blocks.clone()),
                ApiContent::Text(_) => None,
            })
            .flatten()
            .filter_map(|block| match block {
                ContentBlock::Image {
                    source: ImageSource::Base64 { media_type, .. },
                } => Some(media_type),
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn complete(&self, messages: &[ApiMessage]) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

/// Cloneable writer whose contents can be read back after being boxed away.
#[derive(Clone, Default)]
pub struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl SharedWriter {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
