pub mod command;
pub mod conversation_state;
pub mod graph;
pub mod input_source;
pub mod prompt;

use std::io::Write;
use std::ops::ControlFlow;
use std::process::ExitCode;

use color_print::cformat;
use command::{Command, DEFAULT_IMAGE_TEXT};
use conversation_state::{ConversationState, Message};
use eyre::{eyre, Result};
use graph::{ConversationGraph, GraphError};
use input_source::InputSource;
use prompt::generate_prompt;
use tracing::{error, info};

use crate::image::load_image;

const WELCOME_TEXT: &str = "
Welcome! Send messages or use '--image path/to/image.jpg' to analyze images. Type 'quit' to exit.

/help         Show the help dialogue
";

const HELP_TEXT: &str = "
Vision Chat CLI

--image PATH  Upload an image and get a description of it
/clear        Start a new conversation
/help         Show this help dialogue
quit          Quit the application

Anything else is sent as a question. Earlier image descriptions are
included as context for every question.
";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    images: Vec<String>,
    input_source: Option<InputSource>,
    conversation_state: ConversationState,
    graph: ConversationGraph,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        images: Vec<String>,
        graph: ConversationGraph,
    ) -> Self {
        Self {
            output,
            input,
            images,
            input_source: None,
            conversation_state: ConversationState::new(),
            graph,
        }
    }

    /// Read interactive lines from `input_source` instead of the terminal.
    #[cfg(test)]
    pub fn with_input_source(mut self, input_source: InputSource) -> Self {
        self.input_source = Some(input_source);
        self
    }

    #[cfg(test)]
    pub fn conversation_state(&self) -> &ConversationState {
        &self.conversation_state
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Non-interactive mode (single question and/or images)
        if self.input.is_some() || !self.images.is_empty() {
            return match self.run_once().await {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    Ok(ExitCode::FAILURE)
                }
            };
        }

        self.print_welcome()?;
        self.run_interactive().await?;

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    /// Submit the startup images as one turn, then the question as the next,
    /// and print only the final reply.
    async fn run_once(&mut self) -> Result<()> {
        let paths = std::mem::take(&mut self.images);
        if !paths.is_empty() {
            let mut attachments = Vec::with_capacity(paths.len());
            for path in &paths {
                attachments.push(load_image(path).await?);
            }
            info!("Analyzing {} image(s)", attachments.len());
            self.process_turn(Message::user_with_images(DEFAULT_IMAGE_TEXT, attachments))
                .await?;
        }

        // A blank question after images leaves the analysis as the reply.
        if let Some(question) = self.input.take().filter(|q| !q.trim().is_empty()) {
            self.process_turn(Message::user(question)).await?;
        }

        let reply = self
            .conversation_state
            .last_reply()
            .ok_or_else(|| eyre!("No response generated"))?;
        writeln!(self.output, "{}", reply)?;

        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut input_source = match self.input_source.take() {
            Some(input_source) => input_source,
            None => InputSource::new()?,
        };

        loop {
            let line = match input_source.read_line(&generate_prompt(None)) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            if self.handle_input(&line).await?.is_break() {
                break;
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<ControlFlow<()>> {
        let command = match Command::parse(input) {
            Ok(command) => command,
            Err(message) => {
                writeln!(self.output, "{}", message)?;
                return Ok(ControlFlow::Continue(()));
            }
        };

        match command {
            Command::Quit => return Ok(ControlFlow::Break(())),
            Command::Help => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            Command::Clear => {
                self.conversation_state = ConversationState::new();
                writeln!(self.output, "Conversation cleared.")?;
            }
            Command::Image { path } => match load_image(&path).await {
                Ok(image) => {
                    self.respond(Message::user_with_images(DEFAULT_IMAGE_TEXT, vec![image]))
                        .await?;
                }
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                }
            },
            Command::Ask { prompt } => {
                self.respond(Message::user(prompt)).await?;
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Run one turn and print its outcome. Turn failures are reported, not returned.
    async fn respond(&mut self, message: Message) -> Result<()> {
        match self.process_turn(message).await {
            Ok(()) => match self.conversation_state.last_reply() {
                Some(reply) => {
                    writeln!(self.output, "\n{} {}", cformat!("<bold>Claude:</>"), reply)?
                }
                None => writeln!(self.output, "\nError: No response generated")?,
            },
            Err(e) => {
                error!("Turn failed: {}", e);
                writeln!(self.output, "\nError occurred: {}", e)?;
            }
        }
        Ok(())
    }

    /// Run the graph on a copy of the state and keep it only if every node succeeded.
    async fn process_turn(&mut self, message: Message) -> Result<(), GraphError> {
        let mut next = self.conversation_state.clone();
        next.push(message);
        self.graph.invoke(&mut next).await?;
        self.conversation_state = next;
        Ok(())
    }
}
