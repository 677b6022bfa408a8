use crate::domain::model::Contact;
use crate::domain::ports::AccountPicker;
use async_trait::async_trait;
use std::io::{BufRead, BufReader, Read};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stderr};
use tokio::sync::{mpsc, Mutex};

/// Numbered-menu picker fed by a line-oriented input.
///
/// An answer is either a 1-based index or the exact entry text. An empty line or end of
/// input means no selection. A preset account label skips the account prompt entirely.
///
/// Input lines are read on a plain OS thread, so an unanswered prompt can be abandoned
/// without leaving a blocked read behind in the runtime.
pub struct PromptPicker<W> {
    preset_account: Option<String>,
    answers: Mutex<mpsc::Receiver<String>>,
    writer: Mutex<W>,
}

impl PromptPicker<Stderr> {
    pub fn terminal(preset_account: Option<String>) -> Self {
        Self::new(std::io::stdin(), tokio::io::stderr(), preset_account)
    }
}

/// Forwards lines from `input` until end of input or until the receiving side is gone.
fn spawn_line_reader<R: Read + Send + 'static>(input: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("prompt-input".to_string())
        .spawn(move || {
            for line in BufReader::new(input).lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Cannot read selection: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("Cannot start prompt input reader: {}", e);
    }
    rx
}

impl<W> PromptPicker<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new<R: Read + Send + 'static>(input: R, writer: W, preset_account: Option<String>) -> Self {
        Self {
            preset_account,
            answers: Mutex::new(spawn_line_reader(input)),
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn choose(&self, title: &str, entries: &[String]) -> Option<usize> {
        let mut menu = format!("{}:\n", title);
        for (index, entry) in entries.iter().enumerate() {
            let shown = if entry.is_empty() { "(unnamed)" } else { entry.as_str() };
            menu.push_str(&format!("  {}) {}\n", index + 1, shown));
        }
        menu.push_str("Choice (empty to skip): ");

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(menu.as_bytes()).await {
                tracing::warn!("Cannot show selection prompt: {}", e);
                return None;
            }
            if let Err(e) = writer.flush().await {
                tracing::warn!("Cannot flush selection prompt: {}", e);
            }
        }

        let line = self.answers.lock().await.recv().await?;
        let answer = line.trim();
        if answer.is_empty() {
            return None;
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=entries.len()).contains(&n) => Some(n - 1),
            _ => entries.iter().position(|entry| entry == answer),
        }
    }
}

#[async_trait]
impl<W> AccountPicker for PromptPicker<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn pick_account(&self, labels: &[String]) -> Option<String> {
        if let Some(preset) = &self.preset_account {
            return Some(preset.clone());
        }
        let index = self.choose("Select an account", labels).await?;
        labels.get(index).cloned()
    }

    async fn pick_contact(&self, contacts: &[Contact]) -> Option<Contact> {
        let names: Vec<String> = contacts.iter().map(|c| c.display_name().to_string()).collect();
        let index = self.choose("Select a contact", &names).await?;
        contacts.get(index).cloned()
    }
}
