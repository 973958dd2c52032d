/// Marks a line as an image upload: `--image path/to/image.jpg`.
pub const IMAGE_FLAG: &str = "--image";

/// Text carried by a user message that only uploads an image.
pub const DEFAULT_IMAGE_TEXT: &str = "Please analyze this image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask { prompt: String },
    Image { path: String },
    Help,
    Clear,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("quit") || trimmed == "/quit" {
            return Ok(Self::Quit);
        }
        match trimmed {
            "/help" => return Ok(Self::Help),
            "/clear" => return Ok(Self::Clear),
            _ => {}
        }

        if let Some(rest) = trimmed.strip_prefix(IMAGE_FLAG) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                let path = rest.trim();
                if path.is_empty() {
                    return Err("Please provide an image path".to_string());
                }
                return Ok(Self::Image {
                    path: path.to_string(),
                });
            }
        }

        Ok(Self::Ask {
            prompt: input.to_string(),
        })
    }
}
