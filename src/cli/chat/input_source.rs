use eyre::Result;
use rustyline::error::ReadlineError;
use rustyline::Editor;

use super::prompt::rl;

/// Where interactive lines come from: a terminal editor, or a fixed script in tests.
pub struct InputSource(Inner);

enum Inner {
    Readline(Editor<()>),
    #[cfg(test)]
    Mock { index: usize, lines: Vec<String> },
}

impl InputSource {
    pub fn new() -> Result<Self> {
        Ok(Self(Inner::Readline(rl()?)))
    }

    #[cfg(test)]
    pub fn new_mock(lines: Vec<String>) -> Self {
        Self(Inner::Mock { index: 0, lines })
    }

    /// Read the next line. `None` means the input is exhausted (EOF).
    /// Ctrl-C discards the current line and yields an empty one.
    pub fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ReadlineError> {
        match &mut self.0 {
            Inner::Readline(rl) => match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str());
                    }
                    Ok(Some(line))
                }
                Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
                Err(ReadlineError::Eof) => Ok(None),
                Err(e) => Err(e),
            },
            #[cfg(test)]
            Inner::Mock { index, lines } => {
                let line = lines.get(*index).cloned();
                *index += 1;
                Ok(line)
            }
        }
    }
}
