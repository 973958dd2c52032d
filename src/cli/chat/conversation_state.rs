use crate::image::ImageAttachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Multimodal {
        text: String,
        images: Vec<ImageAttachment>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_images(text: impl Into<String>, images: Vec<ImageAttachment>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Multimodal {
                text: text.into(),
                images,
            },
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn text(&self) -> &str {
        match &self.content {
            MessageContent::Text(text) => text.as_str(),
            MessageContent::Multimodal { text, .. } => text.as_str(),
        }
    }

    pub fn images(&self) -> &[ImageAttachment] {
        match &self.content {
            MessageContent::Text(_) => &[],
            MessageContent::Multimodal { images, .. } => images.as_slice(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Image descriptions keyed by their stringified slot ("0", "1", ...).
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAnalysis {
    entries: Vec<(String, String)>,
}

impl ImageAnalysis {
    /// Store a description under the next free slot and return that slot.
    pub fn insert_next(&mut self, description: impl Into<String>) -> String {
        let key = self.entries.len().to_string();
        self.entries.push((key.clone(), description.into()));
        key
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything threaded through the conversation graph for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<Message>,
    image_analysis: ImageAnalysis,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[cfg(test)]
    pub fn add_user_message(&mut self, message: &str) {
        self.push(Message::user(message));
    }

    pub fn add_assistant_message(&mut self, message: &str) {
        self.push(Message::assistant(message));
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the last message, if the assistant wrote it.
    pub fn last_reply(&self) -> Option<&str> {
        self.last_message()
            .filter(|message| message.is_assistant())
            .map(Message::text)
    }

    pub fn image_analysis(&self) -> &ImageAnalysis {
        &self.image_analysis
    }

    pub fn record_image_analysis(&mut self, description: impl Into<String>) -> String {
        self.image_analysis.insert_next(description)
    }
}
