use crate::error::ScanError;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::io::IsTerminal;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::wrappers::LinesStream;

/// Where range tokens come from.
pub enum InputSource {
    /// Literal tokens, already validated by the caller.
    Args(Vec<String>),
    /// A file or pipe, read line by line.
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        interactive: bool,
    },
}

impl InputSource {
    /// Picks the source: explicit tokens win, then `--input` (`-` meaning
    /// stdin), then stdin itself when `stdin_available` is set.
    pub async fn resolve(
        targets: Vec<String>,
        input: Option<&str>,
        stdin_available: bool,
    ) -> Result<Self, ScanError> {
        if !targets.is_empty() {
            return Ok(InputSource::Args(targets));
        }

        match input {
            Some("-") => Ok(Self::stdin()),
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(ScanError::InputRead)?;
                Ok(InputSource::Reader {
                    reader: Box::new(file),
                    interactive: false,
                })
            }
            None if stdin_available => Ok(Self::stdin()),
            None => Err(ScanError::InvalidInput),
        }
    }

    /// Stdin counts as a source only when the process actually has one open.
    pub fn stdin_available() -> bool {
        #[cfg(unix)]
        {
            use std::os::fd::AsFd;
            std::io::stdin().as_fd().try_clone_to_owned().is_ok()
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    pub fn stdin() -> Self {
        InputSource::Reader {
            interactive: std::io::stdin().is_terminal(),
            reader: Box::new(tokio::io::stdin()),
        }
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        InputSource::Reader {
            reader: Box::new(reader),
            interactive: false,
        }
    }

    /// Whether tokens are typed by a person at a terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            InputSource::Reader {
                interactive: true,
                ..
            }
        )
    }

    /// Lazily yields trimmed, non-blank tokens. `#` starts a comment line.
    pub fn into_tokens(self) -> BoxStream<'static, Result<String, ScanError>> {
        match self {
            InputSource::Args(args) => stream::iter(args)
                .filter_map(|arg| async move { clean_line(&arg).map(Ok::<_, ScanError>) })
                .boxed(),
            InputSource::Reader { reader, .. } => {
                LinesStream::new(BufReader::new(reader).lines())
                    .filter_map(|line| async move {
                        match line {
                            Ok(line) => clean_line(&line).map(Ok),
                            Err(err) => Some(Err(ScanError::InputRead(err))),
                        }
                    })
                    .boxed()
            }
        }
    }
}

fn clean_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed.to_string())
}
