//! Line-based terminal presenter
//!
//! Renders prompts as plain text and reads answers one line at a time. Works
//! over any async reader/writer pair, stdio by default.

use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout},
    sync::Mutex,
};

use super::types::*;

/// Presenter that talks to the user through a text stream
pub struct TerminalPresenter<R, W> {
    io: Mutex<(R, W)>,
}

impl TerminalPresenter<BufReader<Stdin>, Stdout> {
    /// Presenter bound to the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> TerminalPresenter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    /// Give back the underlying reader and writer
    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }
}

/// Read one line without its terminator; `None` at end of input
async fn read_answer<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl<R, W> Presenter for TerminalPresenter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn present(&self, prompt: &Prompt) -> Result<Response> {
        let mut guard = self.io.lock().await;
        let (reader, writer) = &mut *guard;

        let response = match &prompt.kind {
            PromptKind::Confirmation { message } => {
                writer.write_all(format!("{}\n", message).as_bytes()).await?;
                writer.flush().await?;
                Response::Shown
            }
            PromptKind::Error { message, close_label } => {
                writer
                    .write_all(format!("Error: {}\n[{}] ", message, close_label).as_bytes())
                    .await?;
                writer.flush().await?;
                read_answer(reader).await?;
                Response::Closed
            }
            PromptKind::ConfirmAction { title, question } => {
                writer
                    .write_all(format!("{}\n{} [y/N] ", title, question).as_bytes())
                    .await?;
                writer.flush().await?;
                let answer = read_answer(reader).await?;
                Response::Answer(answer.as_deref().map(is_yes).unwrap_or(false))
            }
            PromptKind::StringInput {
                title,
                question,
                options,
            } => {
                let mut text = format!("{}\n{}", title, question);
                if let Some(placeholder) = &options.placeholder {
                    text.push_str(&format!(" ({})", placeholder));
                }
                if let Some(default_text) = &options.default_text {
                    text.push_str(&format!(" [{}]", default_text));
                }
                text.push_str(&format!(" <{}>: ", options.effective_input_type()));
                writer.write_all(text.as_bytes()).await?;
                writer.flush().await?;

                let value = read_answer(reader).await?.map(|answer| {
                    match (&options.default_text, answer.is_empty()) {
                        (Some(default_text), true) => default_text.clone(),
                        _ => answer,
                    }
                });
                Response::Input(value)
            }
        };

        Ok(response)
    }
}
